use anyhow::Context;

use ollegram::config::Config;
use ollegram::telegram;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ollegram=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env().context("loading configuration from environment")?;
    telegram::run(config).await
}

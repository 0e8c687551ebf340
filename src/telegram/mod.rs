//! Telegram gateway built on teloxide.
//!
//! Wires long polling into the relay: command handlers, an explicit
//! access-guard stage in the routing tree, and the send-then-edit renderer
//! that turns aggregator flushes into message edits.

mod thread;

pub use thread::reconstruct_thread;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatKind, Me, MessageId, ParseMode, ReplyParameters, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use crate::access::{AccessDecision, AccessPolicy};
use crate::config::Config;
use crate::llm::OllamaClient;
use crate::relay::{Relay, RelayError, ReplySink};
use crate::session::SessionStore;

const ACCESS_DENIED: &str = "Access Denied";
const TURN_FAILED: &str = "Something went wrong.";
const TURN_BUSY: &str = "Hold on, I'm still replying to your previous message.";

/// Everything the handlers need, resolved once at startup. No handler
/// reads ambient globals.
pub struct BotContext {
    pub relay: Relay<OllamaClient>,
    pub store: SessionStore,
    pub access: AccessPolicy,
    /// The bot's own `@username`, for group mention detection.
    pub mention: String,
    /// The bot's own user ID, for reply-to-bot detection.
    pub me_id: UserId,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "Start")]
    Start,
    #[command(description = "Reset Chat")]
    Reset,
    #[command(description = "Look through messages")]
    History,
}

/// Build the bot, resolve its identity, and run long polling until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    // Polling holds connections open; give the HTTP client headroom over
    // the poll timeout.
    let http = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let bot = Bot::with_client(&config.bot_token, http);

    let me: Me = bot.get_me().await?;
    let mention = format!("@{}", me.username());
    info!(mention = %mention, model = %config.model, "starting ollegram");

    bot.set_my_commands(Command::bot_commands()).await?;

    let store = SessionStore::new();
    let backend = OllamaClient::new(
        &config.ollama_host,
        config.ollama_port,
        config.request_timeout(),
    )?;

    let ctx = Arc::new(BotContext {
        relay: Relay::new(store.clone(), backend, config.model.clone()),
        store,
        access: AccessPolicy::new(
            config.allowed_ids.clone(),
            config.admin_ids.clone(),
            config.allow_all_users_in_groups,
        ),
        mention,
        me_id: me.user.id,
    });

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            // Pre-dispatch guard stages: only addressed messages from
            // permitted senders reach the relay.
            dptree::filter(is_addressed)
                .filter_async(access_guard)
                .endpoint(handle_message),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("ollegram stopped");
    Ok(())
}

// ============================================================================
// Routing Guards
// ============================================================================

/// Whether the message is for the bot at all. Private messages with text
/// always are; group messages only when they start with the bot's mention
/// or reply to one of the bot's messages.
fn is_addressed(ctx: Arc<BotContext>, msg: Message) -> bool {
    let Some(text) = message_text(&msg) else {
        return false;
    };

    if is_group(&msg) {
        text.starts_with(&ctx.mention)
            || msg
                .reply_to_message()
                .and_then(|m| m.from.as_ref())
                .is_some_and(|u| u.id == ctx.me_id)
    } else {
        matches!(msg.chat.kind, ChatKind::Private(_))
    }
}

/// Allow-list guard. Denied senders in private chats get a notice; group
/// messages are dropped silently.
async fn access_guard(ctx: Arc<BotContext>, bot: Bot, msg: Message) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };

    match ctx.access.check(user.id.0 as i64, is_group(&msg)) {
        AccessDecision::Allow => true,
        AccessDecision::DenyNotify => {
            debug!(user_id = user.id.0, "access denied");
            if let Err(e) = bot.send_message(msg.chat.id, ACCESS_DENIED).await {
                warn!(error = %e, "failed to send access denial");
            }
            false
        }
        AccessDecision::DenySilent => false,
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_command(
    ctx: Arc<BotContext>,
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, format!("Welcome, <b>{}</b>!", user.full_name()))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Reset => {
            if !guard_command(&ctx, &bot, &msg).await {
                return Ok(());
            }
            let cleared = ctx.store.reset(user.id.0 as i64).await;
            let reply = if cleared {
                "Chat history has been reset."
            } else {
                "There is no history to reset."
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
        Command::History => {
            if !guard_command(&ctx, &bot, &msg).await {
                return Ok(());
            }
            let reply = match ctx.store.history(user.id.0 as i64).await {
                Some(messages) if !messages.is_empty() => messages
                    .iter()
                    .map(|m| format!("{}: {}", m.role, m.content))
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                _ => "No messages yet.".to_string(),
            };
            bot.send_message(msg.chat.id, reply).await?;
        }
    }

    Ok(())
}

/// Commands other than `/start` run through the same access policy as
/// plain messages.
async fn guard_command(ctx: &Arc<BotContext>, bot: &Bot, msg: &Message) -> bool {
    access_guard(Arc::clone(ctx), bot.clone(), msg.clone()).await
}

async fn handle_message(ctx: Arc<BotContext>, bot: Bot, msg: Message) -> ResponseResult<()> {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    let prompt = if is_group(&msg) {
        reconstruct_thread(&msg, ctx.me_id, &ctx.mention)
    } else {
        match message_text(&msg) {
            Some(text) => text.to_string(),
            None => return Ok(()),
        }
    };
    if prompt.trim().is_empty() {
        return Ok(());
    }

    if let Err(e) = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await {
        debug!(error = %e, "failed to send typing action");
    }

    let user_id = user.id.0 as i64;
    let mut sink = TelegramSink::new(bot.clone(), msg.chat.id, msg.id, user.id);

    match ctx.relay.run_turn(user_id, prompt, &mut sink).await {
        Ok(()) => {}
        Err(RelayError::Busy) => {
            debug!(user_id, "turn rejected, one already in flight");
            if let Err(e) = bot.send_message(msg.chat.id, TURN_BUSY).await {
                warn!(error = %e, "failed to send busy notice");
            }
        }
        Err(e) => {
            error!(user_id, chat_id = msg.chat.id.0, error = %e, "turn failed");
            // Best effort; the turn is already lost.
            if let Err(e) = bot.send_message(msg.chat.id, TURN_FAILED).await {
                warn!(error = %e, "failed to deliver failure notice");
            }
        }
    }

    Ok(())
}

// ============================================================================
// Reply Rendering
// ============================================================================

/// Sends the first flush of a turn as a new message and edits it on every
/// later flush.
struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
    reply_to: MessageId,
    sender_id: UserId,
    message_id: Option<MessageId>,
}

impl TelegramSink {
    fn new(bot: Bot, chat_id: ChatId, reply_to: MessageId, sender_id: UserId) -> Self {
        Self {
            bot,
            chat_id,
            reply_to,
            sender_id,
            message_id: None,
        }
    }

    /// Given routing policy: plain send in groups (negative chat IDs) and
    /// in the sender's own private chat; send-as-reply otherwise.
    fn send_plain(&self) -> bool {
        self.chat_id.0 < 0 || self.chat_id.0 == self.sender_id.0 as i64
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn render(&mut self, text: &str) -> Result<(), RelayError> {
        match self.message_id {
            Some(id) => {
                self.bot.edit_message_text(self.chat_id, id, text).await?;
            }
            None => {
                let mut request = self.bot.send_message(self.chat_id, text);
                if !self.send_plain() {
                    request = request.reply_parameters(ReplyParameters::new(self.reply_to));
                }
                let sent = request.await?;
                self.message_id = Some(sent.id);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Message Helpers
// ============================================================================

/// Prompt text of a message: plain text or media caption.
pub(crate) fn message_text(msg: &Message) -> Option<&str> {
    msg.text().or_else(|| msg.caption())
}

fn is_group(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

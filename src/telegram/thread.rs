//! Reply-thread reconstruction for group mentions.
//!
//! When the bot is invoked inside a group thread, the prompt is the whole
//! thread, not just the triggering message. The reply-to chain is walked
//! iteratively with a depth cap so a pathological chain cannot recurse
//! without bound.

use teloxide::types::{Message, UserId};

use super::message_text;

/// Upper bound on how many messages of a reply chain are collected.
pub const MAX_THREAD_DEPTH: usize = 32;

const THREAD_HEADER: &str = "Conversation so far:";
const THREAD_TRAILER: &str = "Reply to the latest message in this conversation.";

struct ThreadEntry {
    from_bot: bool,
    content: String,
}

/// Rebuild the prompt for a group invocation from the triggering message's
/// reply chain, ordered oldest to newest. The bot's own mention is stripped
/// from the triggering message.
pub fn reconstruct_thread(msg: &Message, me_id: UserId, mention: &str) -> String {
    let mut entries = Vec::new();
    let mut current = Some(msg);

    while let Some(m) = current {
        if entries.len() == MAX_THREAD_DEPTH {
            break;
        }
        entries.push(ThreadEntry {
            from_bot: m.from.as_ref().is_some_and(|u| u.id == me_id),
            content: message_text(m).unwrap_or_default().to_string(),
        });
        current = m.reply_to_message();
    }

    // Collected newest-first; the thread reads oldest-first.
    entries.reverse();

    if let Some(trigger) = entries.last_mut() {
        trigger.content = strip_mention(&trigger.content, mention).to_string();
    }

    render_thread(&entries)
}

fn strip_mention<'a>(content: &'a str, mention: &str) -> &'a str {
    content
        .strip_prefix(mention)
        .map(str::trim_start)
        .unwrap_or(content)
}

fn render_thread(entries: &[ThreadEntry]) -> String {
    let mut parts = Vec::with_capacity(entries.len() + 2);
    parts.push(THREAD_HEADER.to_string());
    for entry in entries {
        let who = if entry.from_bot { "Bot" } else { "User" };
        parts.push(format!("{who}: {}", entry.content));
    }
    parts.push(THREAD_TRAILER.to_string());
    parts.join("\n\n")
}

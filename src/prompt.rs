//! Prompt assembly and character budgeting.
//!
//! A prompt is laid out as:
//!
//! 1. the system instruction(s),
//! 2. one `CONTEXT:` system message holding the retrieved blocks (omitted
//!    when retrieval found nothing),
//! 3. the stored history in chronological order,
//! 4. the new user message.
//!
//! [`budget`] then trims the list to a character cap. System messages are
//! never removed; non-system messages are dropped oldest first.

use crate::models::{Message, Role, SearchHit};

/// Prefix of the system message that carries retrieved context.
pub const CONTEXT_HEADER: &str = "CONTEXT:";

/// Render retrieval hits as `[source] text` blocks, in rank order.
pub fn format_context(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|h| format!("[{}] {}", h.source, h.text))
        .collect()
}

/// The `CONTEXT:` system message, or `None` when there are no blocks.
pub fn context_message(blocks: &[String]) -> Option<Message> {
    if blocks.is_empty() {
        return None;
    }
    Some(Message::system(format!(
        "{CONTEXT_HEADER}\n{}",
        blocks.join("\n\n")
    )))
}

/// Build the ordered message list for one chat turn.
pub fn assemble(
    system: &[String],
    context_blocks: &[String],
    history: &[Message],
    user_message: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(system.len() + history.len() + 2);
    messages.extend(system.iter().map(Message::system));
    messages.extend(context_message(context_blocks));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user_message));
    messages
}

/// Trim `messages` so their combined content fits in `max_chars`.
///
/// Every system message is kept. The space left after the system messages
/// is filled with the newest non-system messages, walking backwards until
/// one does not fit; everything older than that is dropped. Non-system
/// content never exceeds the cap, so the result is over it only when the
/// system messages alone are. Callers that need the final user message to
/// survive must bound its length first (see `ChatService::chat`).
///
/// Output preserves the input order.
pub fn budget(messages: Vec<Message>, max_chars: usize) -> Vec<Message> {
    let system_chars: usize = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(Message::char_len)
        .sum();
    let mut remaining = max_chars.saturating_sub(system_chars);

    let mut keep = vec![false; messages.len()];
    let mut accumulating = true;

    for (i, msg) in messages.iter().enumerate().rev() {
        if msg.role == Role::System {
            keep[i] = true;
            continue;
        }
        if !accumulating {
            continue;
        }
        let len = msg.char_len();
        if len <= remaining {
            remaining -= len;
            keep[i] = true;
        } else {
            accumulating = false;
        }
    }

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        tracing::debug!(dropped, max_chars, "prompt trimmed to budget");
    }

    messages
        .into_iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then_some(m))
        .collect()
}

/// Total content length in characters.
pub fn total_chars(messages: &[Message]) -> usize {
    messages.iter().map(Message::char_len).sum()
}

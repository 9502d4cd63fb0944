use serde_json::Value;
use tracing::{error, info};

use crate::event::InboundMessage;
use crate::server::AppState;
use crate::store::{ConversationRecord, LastChatTarget};

/// Zalo rejects messages beyond ~2000 chars; stay under with headroom.
pub const MAX_REPLY_CHARS: usize = 1900;
const TRUNCATION_MARKER: &str = "... (tin nhắn đã được rút gọn)";

/// What the relay produced for one inbound message.
#[derive(Debug)]
pub struct RelayOutcome {
    pub reply: String,
    pub sent: bool,
}

/// Cap a reply at [`MAX_REPLY_CHARS`] characters, appending a marker when
/// anything was cut.
pub fn truncate_reply(text: &str) -> String {
    match text.char_indices().nth(MAX_REPLY_CHARS) {
        Some((byte_idx, _)) => {
            let mut truncated = text[..byte_idx].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
        None => text.to_string(),
    }
}

/// Forward one inbound message through the backend and back out to Zalo.
///
/// resolve identity -> derive session -> backend reply -> truncate ->
/// attempt delivery -> record. Every stage degrades instead of failing:
/// the backend substitutes a canned reply, and a failed delivery is recorded
/// as pending manual reply.
pub async fn relay_message(
    state: &AppState,
    inbound: &InboundMessage,
    raw_payload: Value,
    persona: Option<&str>,
) -> RelayOutcome {
    let customer_id = {
        let mapping = state.identity_map.lock().await;
        mapping.resolve(&inbound.user_id)
    };

    // Same sender, same backend conversation thread.
    let session_id = format!("zalo_{}", inbound.user_id);
    let persona = persona.unwrap_or_else(|| state.backend.persona());

    info!(
        "Calling backend: customer_id={}, session_id={}, message='{}'",
        customer_id,
        session_id,
        preview(&inbound.text)
    );

    let reply = state
        .backend
        .reply(customer_id, &session_id, &inbound.text, persona)
        .await;
    let reply = truncate_reply(&reply);

    info!("Backend reply: {}", preview(&reply));

    let sent = state.zalo.send_message(&inbound.chat_id, &reply).await;
    if sent {
        info!("Sent auto reply to user {}", inbound.user_id);
    } else {
        error!(
            "Auto reply to user {} failed; saved for manual response",
            inbound.user_id
        );
    }

    let record = ConversationRecord::new(
        inbound.user_id.clone(),
        inbound.user_name.clone(),
        inbound.chat_id.clone(),
        inbound.text.clone(),
        reply.clone(),
        customer_id,
        raw_payload,
        sent,
    );

    {
        let mut log = state.conversations.lock().await;
        log.push(record);
    }
    {
        let mut target = state.last_chat_target.lock().await;
        *target = Some(LastChatTarget {
            chat_id: inbound.chat_id.clone(),
            user_id: inbound.user_id.clone(),
            user_name: inbound.user_name.clone(),
            ts: chrono::Utc::now(),
        });
    }

    RelayOutcome { reply, sent }
}

/// First 50 chars of a message, for log lines.
fn preview(text: &str) -> String {
    let mut p: String = text.chars().take(50).collect();
    if p.len() < text.len() {
        p.push_str("...");
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_reply_untouched() {
        assert_eq!(truncate_reply("Hi!"), "Hi!");
    }

    #[test]
    fn test_reply_at_limit_untouched() {
        let text = "a".repeat(MAX_REPLY_CHARS);
        assert_eq!(truncate_reply(&text), text);
    }

    #[test]
    fn test_long_reply_truncated_with_marker() {
        let text = "a".repeat(MAX_REPLY_CHARS + 500);
        let truncated = truncate_reply(&text);
        assert!(truncated.starts_with(&"a".repeat(MAX_REPLY_CHARS)));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncated.chars().count(), MAX_REPLY_CHARS + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        // Multi-byte Vietnamese text must not be sliced mid-character.
        let text = "ế".repeat(MAX_REPLY_CHARS + 1);
        let truncated = truncate_reply(&text);
        assert!(truncated.starts_with(&"ế".repeat(MAX_REPLY_CHARS)));
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_preview_caps_length() {
        let text = "x".repeat(200);
        let p = preview(&text);
        assert_eq!(p, format!("{}...", "x".repeat(50)));
        assert_eq!(preview("short"), "short");
    }
}

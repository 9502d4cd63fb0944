use serde_json::Value;

/// A text message extracted from an inbound webhook payload
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Zalo user ID as string
    pub user_id: String,
    /// Display name of the user
    pub user_name: String,
    /// Chat ID the reply should be delivered to
    pub chat_id: String,
    /// The message text
    pub text: String,
}

/// Outcome of parsing one webhook payload
#[derive(Debug)]
pub enum WebhookEvent {
    /// A text message from a user
    Text(InboundMessage),
    /// A well-formed event that carries no text (stickers, delivery
    /// receipts, unknown event names)
    NonText,
    /// Payload is missing a required field
    Invalid(&'static str),
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Chat IDs appear as strings in webhook payloads but some senders emit
/// numbers; accept both.
fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse an inbound webhook payload.
///
/// Two shapes are supported:
/// - the generic shape: `{user_id, message: {text}, timestamp}`;
/// - the Zalo Bot event shape: `{event_name: "message.text.received",
///   message: {text, chat: {id}, from: {id, display_name}}}`.
///
/// The event shape is recognized by the presence of `event_name`; everything
/// else is treated as the generic shape.
pub fn parse_webhook_event(data: &Value) -> WebhookEvent {
    if data.get("event_name").is_some() {
        parse_event_shape(data)
    } else {
        parse_generic_shape(data)
    }
}

fn parse_event_shape(data: &Value) -> WebhookEvent {
    match str_field(data, "event_name") {
        Some("message.text.received") => {}
        _ => return WebhookEvent::NonText,
    }

    let message = match data.get("message") {
        Some(m) => m,
        None => return WebhookEvent::Invalid("missing message"),
    };

    let text = match str_field(message, "text") {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return WebhookEvent::NonText,
    };

    let from = message.get("from").cloned().unwrap_or(Value::Null);
    let user_id = match id_field(&from, "id") {
        Some(id) => id,
        None => return WebhookEvent::Invalid("missing from.id"),
    };
    let user_name = str_field(&from, "display_name")
        .unwrap_or("User")
        .to_string();

    // Without a chat id the reply can still go straight to the user.
    let chat_id = message
        .get("chat")
        .and_then(|c| id_field(c, "id"))
        .unwrap_or_else(|| user_id.clone());

    WebhookEvent::Text(InboundMessage {
        user_id,
        user_name,
        chat_id,
        text,
    })
}

fn parse_generic_shape(data: &Value) -> WebhookEvent {
    let text = match data
        .get("message")
        .and_then(|m| m.get("text"))
        .and_then(Value::as_str)
    {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return WebhookEvent::NonText,
    };

    let user_id = match id_field(data, "user_id") {
        Some(id) if !id.is_empty() => id,
        _ => return WebhookEvent::Invalid("missing user_id"),
    };

    let chat_id = data
        .get("message")
        .and_then(|m| m.get("chat"))
        .and_then(|c| id_field(c, "id"))
        .unwrap_or_else(|| user_id.clone());

    WebhookEvent::Text(InboundMessage {
        user_id,
        user_name: "User".to_string(),
        chat_id,
        text,
    })
}

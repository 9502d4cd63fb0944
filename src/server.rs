use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{any, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::backend::BackendClient;
use crate::config::Config;
use crate::event::{parse_webhook_event, InboundMessage, WebhookEvent};
use crate::mapping::IdentityMap;
use crate::relay::relay_message;
use crate::store::{ConversationLog, LastChatTarget};
use crate::trigger;
use crate::zalo::ZaloClient;

const SERVICE_NAME: &str = "Zalo Bot Webhook Bridge";

/// Shared application state, passed explicitly to every handler.
pub struct AppState {
    pub backend: BackendClient,
    pub zalo: ZaloClient,
    pub conversations: Mutex<ConversationLog>,
    pub last_chat_target: Mutex<Option<LastChatTarget>>,
    pub identity_map: Mutex<IdentityMap>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            backend: BackendClient::new(config.backend.clone())?,
            zalo: ZaloClient::new(&config.zalo)?,
            conversations: Mutex::new(ConversationLog::new()),
            last_chat_target: Mutex::new(None),
            identity_map: Mutex::new(IdentityMap::new(config.backend.default_customer_id)),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/webhook-test/{test_id}", any(webhook_test))
        .route("/conversations", get(conversations))
        .route("/conversations/{user_id}", get(user_conversations))
        .route("/manual_reply", post(manual_reply))
        .route("/user_mappings", get(user_mappings))
        .route("/set_user_mapping", post(set_user_mapping))
        .route("/last_chat_target", get(last_chat_target))
        .route("/trigger/spend", post(trigger_spend))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({"status": "ok", "service": SERVICE_NAME}))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let backend_status = state.backend.health().await;
    Json(json!({
        "status": "ok",
        "backend": backend_status,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Main webhook endpoint.
///
/// The webhook contract expects HTTP 200 regardless of internal outcome
/// (non-200 responses cause upstream retry storms), so parse failures are
/// reported in the body, never as an HTTP error status.
async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let data: Value = match serde_json::from_slice(&body) {
        Ok(d) => d,
        Err(e) => {
            warn!("Webhook payload is not valid JSON: {}", e);
            return Json(json!({"status": "error", "message": "Invalid JSON payload"}));
        }
    };

    info!("Received Zalo webhook: {}", data);

    match parse_webhook_event(&data) {
        WebhookEvent::Text(inbound) => {
            let outcome = relay_message(&state, &inbound, data, None).await;
            Json(json!({"status": "ok", "sent": outcome.sent}))
        }
        WebhookEvent::NonText => {
            info!("Non-text message, ignoring");
            Json(json!({"status": "ok"}))
        }
        WebhookEvent::Invalid(reason) => {
            warn!("Missing required webhook field: {}", reason);
            Json(json!({"status": "error", "message": "Invalid message format"}))
        }
    }
}

/// Webhook-test endpoint. Zalo points test deliveries here; real messages in
/// the platform event shape are processed exactly like `/webhook`, anything
/// else gets a generic success acknowledgment.
async fn webhook_test(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    method: Method,
    body: Bytes,
) -> Json<Value> {
    if method != Method::POST {
        info!("Webhook test [{}] /webhook-test/{}", method, test_id);
        return Json(generic_test_ack(&test_id));
    }

    info!(
        "Received webhook test {}: {}",
        test_id,
        String::from_utf8_lossy(&body)
    );

    let data: Value = match serde_json::from_slice(&body) {
        Ok(d) => d,
        Err(_) => return Json(generic_test_ack(&test_id)),
    };

    match parse_webhook_event(&data) {
        WebhookEvent::Text(inbound) => {
            let outcome = relay_message(&state, &inbound, data, None).await;
            Json(json!({
                "ok": true,
                "status": "success",
                "message": "Message processed and replied",
                "test_id": test_id,
                "sent_reply": outcome.sent,
            }))
        }
        _ => Json(generic_test_ack(&test_id)),
    }
}

fn generic_test_ack(test_id: &str) -> Value {
    json!({
        "ok": true,
        "status": "success",
        "message": "Webhook test successful",
        "test_id": test_id,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

async fn conversations(State(state): State<Arc<AppState>>) -> Json<Value> {
    let log = state.conversations.lock().await;
    let pending = log.pending();
    let pending_tail = pending.len().saturating_sub(10);
    Json(json!({
        "total": log.len(),
        "pending": pending.len(),
        "conversations": log.recent(20),
        "pending_conversations": pending[pending_tail..].to_vec(),
    }))
}

async fn user_conversations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Value> {
    let log = state.conversations.lock().await;
    let user_convs = log.for_user(&user_id);
    Json(json!({
        "user_id": user_id,
        "total": user_convs.len(),
        "conversations": user_convs,
    }))
}

#[derive(Debug, Deserialize)]
struct ManualReplyRequest {
    user_id: String,
    message: String,
}

/// Operator resend: deliver a hand-written reply to the chat of the user's
/// most recent conversation and flip its delivery flag on success.
async fn manual_reply(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ManualReplyRequest>,
) -> Json<Value> {
    let (seq, chat_id) = {
        let log = state.conversations.lock().await;
        match log.latest_for_user(&request.user_id) {
            Some(record) => (record.seq, record.chat_id.clone()),
            None => {
                return Json(json!({
                    "success": false,
                    "error": "User conversation not found",
                }))
            }
        }
    };

    info!(
        "Manual reply to {} (chat: {}): {}",
        request.user_id, chat_id, request.message
    );

    let success = state.zalo.send_message(&chat_id, &request.message).await;

    let conversation_data = if success {
        let mut log = state.conversations.lock().await;
        log.mark_manual_reply(seq, request.message.clone())
    } else {
        None
    };

    Json(json!({
        "success": success,
        "user_id": request.user_id,
        "chat_id": chat_id,
        "message": request.message,
        "conversation_data": conversation_data,
    }))
}

async fn user_mappings(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mapping = state.identity_map.lock().await;
    Json(json!({"mappings": mapping.overrides()}))
}

#[derive(Debug, Deserialize)]
struct SetMappingRequest {
    zalo_user_id: String,
    customer_id: i64,
}

async fn set_user_mapping(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetMappingRequest>,
) -> Json<Value> {
    let mut mapping = state.identity_map.lock().await;
    mapping.set_override(request.zalo_user_id.clone(), request.customer_id);

    let mut entry = serde_json::Map::new();
    entry.insert(request.zalo_user_id, json!(request.customer_id));
    Json(json!({"status": "ok", "mapping": entry}))
}

async fn last_chat_target(State(state): State<Arc<AppState>>) -> Json<Value> {
    let target = state.last_chat_target.lock().await;
    match &*target {
        Some(t) => Json(json!({
            "ok": true,
            "chat_id": t.chat_id,
            "user_id": t.user_id,
            "user_name": t.user_name,
            "ts": t.ts,
        })),
        None => Json(json!({
            "ok": true,
            "chat_id": null,
            "user_id": null,
            "user_name": null,
        })),
    }
}

#[derive(Debug, Deserialize)]
struct SpendRequest {
    #[serde(default)]
    amount: Value,
    #[serde(default)]
    note: String,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    chat_id: Option<String>,
}

/// Synthesize a spend notification on behalf of the most recent chat target
/// and route it through the regular relay pipeline.
async fn trigger_spend(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpendRequest>,
) -> (StatusCode, Json<Value>) {
    let target = { state.last_chat_target.lock().await.clone() };

    let target = match target {
        Some(t) => t,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "ok": false,
                    "error": "No recent chat target. Please send a message on Zalo first.",
                })),
            );
        }
    };
    let chat_id = request.chat_id.clone().unwrap_or_else(|| target.chat_id.clone());

    let raw_amount = match &request.amount {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    let amount = trigger::parse_amount(&raw_amount);
    let note = request.note.trim();
    let base = trigger::compose_spend_message(&raw_amount, amount, note);

    // Compare against the customer's savings plan when the dashboard answers.
    let customer_id = {
        let mapping = state.identity_map.lock().await;
        mapping.resolve(&target.user_id)
    };
    let plan = match state.backend.plan_summary(customer_id).await {
        Some(summary) => trigger::plan_note(&summary, amount),
        None => None,
    };
    let message = trigger::enrich_spend_message(&base, plan);

    info!("Trigger spend -> backend: {}", message);

    let inbound = InboundMessage {
        user_id: target.user_id,
        user_name: target.user_name,
        chat_id: chat_id.clone(),
        text: message,
    };
    let raw_payload = json!({
        "trigger": "spend",
        "amount": request.amount,
        "note": request.note,
        "chat_id": chat_id,
    });
    let outcome = relay_message(&state, &inbound, raw_payload, request.persona.as_deref()).await;

    if !outcome.sent {
        error!("Trigger spend delivery to chat {} failed", chat_id);
    }

    (
        StatusCode::OK,
        Json(json!({
            "ok": outcome.sent,
            "chat_id": chat_id,
            "reply": outcome.reply,
        })),
    )
}

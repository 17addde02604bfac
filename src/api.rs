//! REST API server for the bank assistant orchestrator
//!
//! Exposes the orchestration engine as a chat endpoint. This is the
//! request boundary: any error the engine propagates is caught here,
//! reported as a generic failure, and recorded in the conversation history
//! for auditability.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agents::ChatTurn;
use crate::engine::OrchestrationEngine;

const GENERIC_FAILURE_MESSAGE: &str =
    "Something went wrong while processing your request. Please try again.";

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub chat_id: Option<String>,
    pub messages: Vec<ChatMessage>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// Conversation History
/// =============================

/// Per-chat turn log. Failures are recorded alongside normal replies so a
/// conversation shows what actually happened.
pub struct ChatHistoryStore {
    turns: RwLock<HashMap<Uuid, Vec<ChatTurn>>>,
}

impl ChatHistoryStore {
    pub fn new() -> Self {
        Self {
            turns: RwLock::new(HashMap::new()),
        }
    }

    pub async fn load(&self, chat_id: Uuid) -> Vec<ChatTurn> {
        self.turns
            .read()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn append(&self, chat_id: Uuid, turn: ChatTurn) {
        self.turns.write().await.entry(chat_id).or_default().push(turn);
    }
}

impl Default for ChatHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<OrchestrationEngine>,
    pub history: Arc<ChatHistoryStore>,
}

/// =============================
/// Helpers: Stable Chat IDs
/// =============================

fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

pub async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(last_user_index) = req.messages.iter().rposition(|m| m.role == "user") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message found".into())),
        );
    };
    let user_message = req.messages[last_user_index].content.clone();

    let chat_id = parse_or_stable_uuid(req.chat_id.as_deref(), "anonymous-chat");

    // Prefer the history the client sent; fall back to what this server
    // remembers for the chat.
    let provided: Vec<ChatTurn> = req.messages[..last_user_index]
        .iter()
        .map(|m| ChatTurn {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();
    let history = if provided.is_empty() {
        state.history.load(chat_id).await
    } else {
        provided
    };

    info!(chat_id = %chat_id, "chat request: {}", user_message);
    state
        .history
        .append(
            chat_id,
            ChatTurn {
                role: "user".into(),
                content: user_message.clone(),
            },
        )
        .await;

    match state.engine.handle(&user_message, &history).await {
        Ok(response) => {
            state
                .history
                .append(
                    chat_id,
                    ChatTurn {
                        role: "assistant".into(),
                        content: response.message.clone(),
                    },
                )
                .await;

            let mut payload = serde_json::to_value(&response).unwrap_or_default();
            if let Some(object) = payload.as_object_mut() {
                object.insert("chat_id".into(), serde_json::json!(chat_id.to_string()));
            }
            (StatusCode::OK, Json(ApiResponse::success(payload)))
        }
        Err(e) => {
            error!(chat_id = %chat_id, "orchestration failed: {}", e);
            state
                .history
                .append(
                    chat_id,
                    ChatTurn {
                        role: "assistant".into(),
                        content: GENERIC_FAILURE_MESSAGE.into(),
                    },
                )
                .await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(GENERIC_FAILURE_MESSAGE.into())),
            )
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(engine: Arc<OrchestrationEngine>) -> Router {
    let state = ApiState {
        engine,
        history: Arc::new(ChatHistoryStore::new()),
    };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    engine: Arc<OrchestrationEngine>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentId, MockAgentClient};
    use crate::store::memory::{sample_transactions, InMemoryTransactionStore};
    use crate::store::TransactionStore;

    fn state_with(mock: Arc<MockAgentClient>) -> ApiState {
        let store: Arc<dyn TransactionStore> =
            Arc::new(InMemoryTransactionStore::with_transactions(sample_transactions()));
        ApiState {
            engine: Arc::new(OrchestrationEngine::new(mock, store)),
            history: Arc::new(ChatHistoryStore::new()),
        }
    }

    fn request(chat_id: &str, messages: Vec<(&str, &str)>) -> ChatRequest {
        ChatRequest {
            chat_id: Some(chat_id.into()),
            messages: messages
                .into_iter()
                .map(|(role, content)| ChatMessage {
                    role: role.into(),
                    content: content.into(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_chat_requires_a_user_message() {
        let state = state_with(Arc::new(MockAgentClient::new()));
        let (status, Json(response)) =
            chat_handler(State(state), Json(request("c1", vec![("assistant", "hi")]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_chat_success_records_both_turns() {
        let mock = Arc::new(MockAgentClient::new());
        mock.enqueue(
            AgentId::Conversational,
            r#"{"task_type": "greeting", "intent_summary": "hello"}"#,
        );
        let state = state_with(mock);
        let history = state.history.clone();

        let (status, Json(response)) =
            chat_handler(State(state), Json(request("c2", vec![("user", "hi!")]))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        let data = response.data.expect("payload");
        assert_eq!(data["status"], "success");
        assert!(data["chat_id"].as_str().is_some());

        let chat_id = parse_or_stable_uuid(Some("c2"), "anonymous-chat");
        let turns = history.load(chat_id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_engine_failure_is_generic_and_recorded() {
        let mock = Arc::new(MockAgentClient::new());
        mock.enqueue(AgentId::Conversational, "definitely not JSON");
        let state = state_with(mock);
        let history = state.history.clone();

        let (status, Json(response)) =
            chat_handler(State(state), Json(request("c3", vec![("user", "rent?")]))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));

        let chat_id = parse_or_stable_uuid(Some("c3"), "anonymous-chat");
        let turns = history.load(chat_id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_stable_uuid_is_deterministic() {
        let a = parse_or_stable_uuid(Some("my-chat"), "seed");
        let b = parse_or_stable_uuid(Some("my-chat"), "other-seed");
        assert_eq!(a, b);

        let parsed = parse_or_stable_uuid(Some("8f2f9c60-5f5a-4b1e-9a3a-0d1e2f3a4b5c"), "seed");
        assert_eq!(
            parsed.to_string(),
            "8f2f9c60-5f5a-4b1e-9a3a-0d1e2f3a4b5c"
        );
    }
}

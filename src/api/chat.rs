//! Chat API endpoints
//!
//! - POST /api/chat - Ask a question; answers after the reply delay
//! - GET /api/chat/history - Transcript and completed turns of the caller

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::NewChatLog;
use crate::models::{ChatTurn, TranscriptEntry};
use crate::services::{ChatError, KnowledgeHit, Topic};

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyQuery => ApiError::validation_error("Please enter a question"),
            ChatError::ReplyLost(e) => {
                tracing::error!("Deferred reply task failed: {}", e);
                ApiError::internal_error("Reply was lost")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
}

/// One answered question
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub query: String,
    pub response: String,
    pub topic: Option<Topic>,
    pub sources: Vec<KnowledgeHit>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transcript: Vec<TranscriptEntry>,
    pub history: Vec<ChatTurn>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(send_message))
        .route("/chat/history", get(history))
}

/// Submit `query` for `username`, wait for the deferred reply, attach the
/// closest knowledge documents and record the exchange in the chat log.
pub(crate) async fn exchange(
    state: &AppState,
    username: &str,
    query: &str,
) -> Result<ChatResponse, ApiError> {
    let pending = state.chat_service.submit(username, query).await?;
    let topic = pending.resolution.topic;
    let turn = pending.wait().await?;

    let sources = state
        .knowledge_service
        .search(&turn.user_text, state.max_sources)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Knowledge search failed: {:#}", e);
            Vec::new()
        });

    let log = NewChatLog {
        username,
        query: &turn.user_text,
        response: &turn.bot_text,
        topic: topic.map(Topic::as_str),
    };
    if let Err(e) = state.log_repo.insert_chat(log).await {
        tracing::warn!("Failed to write chat log for {}: {:#}", username, e);
    }

    Ok(ChatResponse {
        query: turn.user_text,
        response: turn.bot_text,
        topic,
        sources,
        timestamp: turn.timestamp,
    })
}

/// POST /api/chat
async fn send_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    Ok(Json(exchange(&state, &user.0.username, &body.query).await?))
}

/// GET /api/chat/history
async fn history(State(state): State<AppState>, user: AuthenticatedUser) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        transcript: state.chat_service.transcript(&user.0.username).await,
        history: state.chat_service.history(&user.0.username).await,
    })
}

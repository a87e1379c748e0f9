// SPDX-License-Identifier: MIT

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::error::ClaimflowError;
use super::events::SessionEvent;
use super::session::SessionManager;
use super::store::{CheckpointStore, ProvenanceLedger, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub ledger: Arc<ProvenanceLedger>,
    pub checkpoints: Arc<CheckpointStore>,
    pub sessions: Arc<SessionStore>,
}

pub async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/session/create", post(session_create))
        .route("/api/chat/send", post(chat_send))
        .route("/api/chat/resume", post(chat_resume))
        .route("/api/stream/{session_id}/{token}", get(stream))
        .route("/api/provenance/{session_id}", get(get_provenance))
        .route("/api/checkpoints/{session_id}", get(list_checkpoints))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Deserialize, Default)]
struct SessionCreateRequest {
    user_id: Option<String>,
    title: Option<String>,
}

async fn session_create(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    // The body is optional; anything unparseable falls back to defaults.
    let payload: SessionCreateRequest = serde_json::from_slice(&body).unwrap_or_default();
    match state
        .sessions
        .create_session(payload.user_id.as_deref(), payload.title.as_deref())
    {
        Ok((session_id, user_id)) => Json(json!({
            "session_id": session_id,
            "user_id": user_id,
        })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

#[derive(Deserialize)]
struct ChatSendRequest {
    session_id: String,
    user_id: String,
    text: String,
}

async fn chat_send(State(state): State<AppState>, Json(payload): Json<ChatSendRequest>) -> Json<Value> {
    log::info!(
        "chat send session={} user={}",
        payload.session_id,
        payload.user_id
    );
    let token = state
        .manager
        .enqueue(&payload.session_id, &payload.user_id, &payload.text);
    Json(json!({
        "stream_url": format!("/api/stream/{}/{}", payload.session_id, token)
    }))
}

#[derive(Deserialize)]
struct ChatResumeRequest {
    checkpoint_id: String,
    text: String,
}

async fn chat_resume(
    State(state): State<AppState>,
    Json(payload): Json<ChatResumeRequest>,
) -> Json<Value> {
    log::info!("chat resume checkpoint={}", payload.checkpoint_id);
    match state
        .manager
        .enqueue_resume(&payload.checkpoint_id, &payload.text)
    {
        Ok((token, session_id)) => Json(json!({
            "stream_url": format!("/api/stream/{}/{}", session_id, token)
        })),
        Err(ClaimflowError::CheckpointNotFound(_)) => {
            Json(json!({ "error": "invalid_checkpoint" }))
        }
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn stream(
    State(state): State<AppState>,
    Path((session_id, token)): Path<(String, String)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = match state.manager.begin(&token) {
        Ok(rx) => rx,
        Err(e) => {
            log::warn!(
                "stream rejected for session={} token={}: {}",
                session_id,
                token,
                e
            );
            // Single error event, then the stream closes.
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.try_send(SessionEvent::Error(e.to_string()));
            rx
        }
    };

    let stream = ReceiverStream::new(rx).map(|event| Ok(Event::default().json_data(event).unwrap()));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(1)))
}

async fn get_provenance(State(state): State<AppState>, Path(session_id): Path<String>) -> Json<Value> {
    match state.ledger.list(&session_id) {
        Ok(rows) => Json(json!(rows)),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

async fn list_checkpoints(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Value> {
    match state.checkpoints.list_for_session(&session_id) {
        Ok(rows) => Json(json!(rows)),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

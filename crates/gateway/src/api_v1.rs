//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET    /v1/starters`                      Starter menu
//! - `POST   /v1/sessions`                      Open a session
//! - `GET    /v1/sessions/{id}`                 Session history
//! - `DELETE /v1/sessions/{id}`                 Close a session
//! - `POST   /v1/sessions/{id}/messages`        Send a message, SSE of stream events
//! - `POST   /v1/sessions/{id}/actions/{name}`  Select a starter, SSE of stream events
//! - `POST   /v1/sessions/{id}/stop`            Stop the in-flight answer
//! - `GET    /v1/logs`                          SSE of domain events

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use hsxassist_agent::{ActionButton, AgentStreamEvent};
use hsxassist_core::error::{Error, SessionError};
use hsxassist_core::message::{Message, ThreadId};
use hsxassist_session::{FOLLOW_UP_PROMPT, SessionManager};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, ReceiverStream};
use tracing::{debug, info};

pub type SharedManager = Arc<SessionManager>;

/// Events buffered per streaming response.
const STREAM_BUFFER: usize = 64;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(manager: SharedManager) -> Router {
    Router::new()
        .route("/starters", get(starters_handler))
        .route("/sessions", post(create_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(end_session_handler),
        )
        .route("/sessions/{id}/messages", post(message_handler))
        .route("/sessions/{id}/actions/{name}", post(action_handler))
        .route("/sessions/{id}/stop", post(stop_handler))
        .route("/logs", get(log_stream_handler))
        .with_state(manager)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct StarterMenuResponse {
    pub prompt: String,
    pub actions: Vec<ActionButton>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub thread_id: String,
    pub created_at: String,
    pub starters: Vec<ActionButton>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub thread_id: String,
    pub messages: usize,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub thread_id: String,
    pub stopped: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error with its HTTP status.
pub struct ApiError(StatusCode, String);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::Session(SessionError::NotFound(_) | SessionError::UnknownAction(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn starters_handler(State(manager): State<SharedManager>) -> Json<StarterMenuResponse> {
    Json(StarterMenuResponse {
        prompt: FOLLOW_UP_PROMPT.to_string(),
        actions: manager.starters().actions(),
    })
}

async fn create_session_handler(
    State(manager): State<SharedManager>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let state = manager.start_session().await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            thread_id: state.thread_id.to_string(),
            created_at: state.created_at.to_rfc3339(),
            starters: manager.starters().actions(),
        }),
    ))
}

async fn get_session_handler(
    State(manager): State<SharedManager>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let state = manager.session(&ThreadId::from(id.as_str())).await?;
    Ok(Json(SessionResponse {
        thread_id: state.thread_id.to_string(),
        messages: state.messages.as_slice().to_vec(),
        created_at: state.created_at.to_rfc3339(),
        updated_at: state.updated_at.to_rfc3339(),
    }))
}

async fn end_session_handler(
    State(manager): State<SharedManager>,
    Path(id): Path<String>,
) -> Result<Json<EndSessionResponse>, ApiError> {
    let state = manager.end_session(&ThreadId::from(id.as_str())).await?;
    Ok(Json(EndSessionResponse {
        thread_id: state.thread_id.to_string(),
        messages: state.messages.len(),
    }))
}

/// `POST /v1/sessions/{id}/messages`: run a turn, stream its events.
async fn message_handler(
    State(manager): State<SharedManager>,
    Path(id): Path<String>,
    Json(payload): Json<MessageRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let thread_id = ThreadId::from(id.as_str());
    manager.session(&thread_id).await?;
    info!(thread_id = %thread_id, "v1 message");
    Ok(sse(run_turn(manager, thread_id, Turn::Message(payload.message))))
}

/// `POST /v1/sessions/{id}/actions/{name}`: same as posting the starter's message.
async fn action_handler(
    State(manager): State<SharedManager>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let thread_id = ThreadId::from(id.as_str());
    manager.session(&thread_id).await?;
    manager.starters().resolve(&name).map_err(Error::from)?;
    info!(thread_id = %thread_id, action = %name, "v1 action");
    Ok(sse(run_turn(manager, thread_id, Turn::Action(name))))
}

async fn stop_handler(
    State(manager): State<SharedManager>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<StopResponse>), ApiError> {
    let thread_id = ThreadId::from(id.as_str());
    manager.stop(&thread_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StopResponse {
            thread_id: thread_id.to_string(),
            stopped: true,
        }),
    ))
}

// ── SSE ───────────────────────────────────────────────────────────────────

enum Turn {
    Message(String),
    Action(String),
}

/// Run the turn in the background; its events arrive on the returned stream.
///
/// The turn keeps running if the client disconnects.
fn run_turn(manager: SharedManager, thread_id: ThreadId, turn: Turn) -> ReceiverStream<AgentStreamEvent> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(async move {
        let result = match turn {
            Turn::Message(text) => manager.send_message(&thread_id, &text, &tx).await,
            Turn::Action(name) => manager.select_action(&thread_id, &name, &tx).await,
        };
        if let Err(e) = result {
            debug!(thread_id = %thread_id, error = %e, "Streamed turn ended with error");
        }
    });
    ReceiverStream::new(rx)
}

fn sse(
    events: ReceiverStream<AgentStreamEvent>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = events.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /v1/logs`: SSE stream of domain events.
async fn log_stream_handler(
    State(manager): State<SharedManager>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = manager.event_bus().subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.kind()).data(data))
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Tests ─────────────────────────────────────────────────────────────────

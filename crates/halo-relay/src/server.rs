use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use halo_core::{action::decode_action, AgentStatusEvent, CommandKind, CommandOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::AgentClient;

/// Shared state for the relay endpoints. The transport itself is
/// stateless per call; this only carries the two collaborators.
pub struct RelayState {
    pub events: mpsc::Sender<AgentStatusEvent>,
    pub agent: AgentClient,
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/api/currentaction", post(current_action))
        .route("/api/completetask", post(complete_task))
        .route("/api/chat", post(chat))
        .route("/api/stop", get(stop))
        .route("/api/pause", get(pause))
        .route("/api/resume", get(resume))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Inbound status push from the agent side.
///
/// The acknowledgement echoes what was received for caller-side debugging
/// and is sent as soon as the event is on the UI channel; it never waits
/// on rendering.
async fn current_action(State(state): State<Arc<RelayState>>, body: String) -> Response {
    let event = match decode_action(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(event = "action_rejected", error = %err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Invalid request" })),
            )
                .into_response();
        }
    };

    let received = echo_of(&body);
    info!(event = "action_received", display = %event.display_message);
    if state.events.send(event).await.is_err() {
        // UI channel gone; the push is acknowledged anyway so the agent
        // side does not start erroring during shutdown.
        warn!(event = "ui_channel_closed");
    }

    Json(json!({ "success": true, "received": received })).into_response()
}

/// Task-completion notification from the bridge. The payload carries a
/// screenshot for other consumers; the overlay only wants the message
/// line, so everything else is dropped here. A missing or blank message
/// still signals completion with a canned line.
async fn complete_task(State(state): State<Arc<RelayState>>, body: String) -> Response {
    let payload = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .unwrap_or("Task completed");

    let event = AgentStatusEvent::agent(message, message);
    info!(event = "task_complete_received", display = %event.display_message);
    if state.events.send(event).await.is_err() {
        warn!(event = "ui_channel_closed");
    }
    Json(json!({ "success": true })).into_response()
}

/// What the caller sent, as it was received: the parsed JSON when the body
/// was JSON, otherwise the trimmed raw text.
fn echo_of(body: &str) -> Value {
    serde_json::from_str::<Value>(body.trim())
        .unwrap_or_else(|_| Value::String(body.trim().to_string()))
}

/// Forward a raw prompt body to the agent server, passing its response
/// through untouched where possible.
async fn chat(State(state): State<Arc<RelayState>>, body: String) -> Response {
    let result = state.agent.submit_prompt(&body).await;
    match result.outcome {
        CommandOutcome::Success(value) => Json(value).into_response(),
        CommandOutcome::RemoteRejected(message) => {
            // Blank prompts land here without a network call.
            let status = if body.trim().is_empty() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            (
                status,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response()
        }
        CommandOutcome::TransportFailure(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response(),
    }
}

async fn stop(State(state): State<Arc<RelayState>>) -> Response {
    proxy_command(&state, CommandKind::Stop).await
}

async fn pause(State(state): State<Arc<RelayState>>) -> Response {
    proxy_command(&state, CommandKind::Pause).await
}

async fn resume(State(state): State<Arc<RelayState>>) -> Response {
    proxy_command(&state, CommandKind::Resume).await
}

async fn proxy_command(state: &RelayState, kind: CommandKind) -> Response {
    info!(event = "command_received", command = %kind);
    let result = match kind {
        CommandKind::Stop => state.agent.stop().await,
        CommandKind::Pause => state.agent.pause().await,
        CommandKind::Resume => state.agent.resume().await,
        CommandKind::Chat => unreachable!("chat goes through its own handler"),
    };
    match result.outcome {
        CommandOutcome::Success(value) => Json(value).into_response(),
        CommandOutcome::RemoteRejected(message) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response(),
        CommandOutcome::TransportFailure(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response(),
    }
}

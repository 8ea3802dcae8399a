pub mod action;
pub mod run;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Who produced a history entry. Agent entries arrive over the relay,
/// user entries are prompt echoes, system entries are locally generated
/// annotations (stop markers, forwarding failures).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    Agent,
    User,
    System,
}

/// Normalized unit flowing from the agent side to the overlay.
///
/// `received_at` is assigned at decode time; the agent's own clock is
/// never trusted. For legacy bare-string payloads `detail` equals
/// `display_message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatusEvent {
    pub display_message: String,
    pub detail: String,
    pub received_at: DateTime<Utc>,
    pub origin: EventOrigin,
}

impl AgentStatusEvent {
    fn new(origin: EventOrigin, display: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            display_message: display.into(),
            detail: detail.into(),
            received_at: Utc::now(),
            origin,
        }
    }

    pub fn agent(display: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(EventOrigin::Agent, display, detail)
    }

    pub fn user(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(EventOrigin::User, message.clone(), message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(EventOrigin::System, message.clone(), message)
    }
}

/// The four user commands the forwarder can issue against the agent server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Chat,
    Stop,
    Pause,
    Resume,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Chat => "chat",
            CommandKind::Stop => "stop",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
        }
    }

    /// Path on the agent server this command maps to.
    pub fn path(self) -> &'static str {
        match self {
            CommandKind::Chat => "/api/chat",
            CommandKind::Stop => "/api/stop",
            CommandKind::Pause => "/api/pause",
            CommandKind::Resume => "/api/resume",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one forwarded command. The forwarder never throws past its
/// boundary; every failure mode is a value the caller folds into state.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Success(Value),
    TransportFailure(String),
    RemoteRejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub kind: CommandKind,
    pub outcome: CommandOutcome,
}

impl CommandResult {
    pub fn success(kind: CommandKind, payload: Value) -> Self {
        Self {
            kind,
            outcome: CommandOutcome::Success(payload),
        }
    }

    pub fn transport_failure(kind: CommandKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: CommandOutcome::TransportFailure(message.into()),
        }
    }

    pub fn remote_rejected(kind: CommandKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: CommandOutcome::RemoteRejected(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CommandOutcome::Success(_))
    }

    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            CommandOutcome::Success(_) => None,
            CommandOutcome::TransportFailure(message) => Some(message),
            CommandOutcome::RemoteRejected(message) => Some(message),
        }
    }
}

/// Decode-side failures. Transport and remote-rejection outcomes live in
/// [`CommandOutcome`]; this only covers what the action decoder can reject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("invalid action payload: {0}")]
    MalformedPayload(&'static str),
    #[error("empty body")]
    EmptyInput,
}

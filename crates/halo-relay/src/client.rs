use halo_core::{CommandKind, CommandResult};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP forwarder for user commands against the agent server.
///
/// Every call returns a [`CommandResult`]; transport errors, rejections and
/// odd response bodies are all values, never propagated errors. The client
/// performs no retries and no deduplication; callers gate on their own
/// state before calling.
#[derive(Clone, Debug)]
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, kind: CommandKind) -> String {
        format!("{}{}", self.base_url, kind.path())
    }

    /// Forward a prompt to the agent server's `/api/chat`.
    ///
    /// Blank prompts fail fast without touching the network. The remote's
    /// response shape is not contractually JSON; a non-JSON body is wrapped
    /// as a success rather than treated as a failure.
    pub async fn submit_prompt(&self, prompt: &str) -> CommandResult {
        if prompt.trim().is_empty() {
            return CommandResult::remote_rejected(CommandKind::Chat, "prompt is empty");
        }
        let url = self.url(CommandKind::Chat);
        debug!(event = "forward_prompt", url = %url);
        match self.http.post(&url).body(prompt.to_string()).send().await {
            Ok(response) => normalize_response(CommandKind::Chat, response).await,
            Err(err) => {
                warn!(event = "forward_error", command = "chat", error = %err);
                CommandResult::transport_failure(CommandKind::Chat, err.to_string())
            }
        }
    }

    pub async fn stop(&self) -> CommandResult {
        self.control(CommandKind::Stop).await
    }

    pub async fn pause(&self) -> CommandResult {
        self.control(CommandKind::Pause).await
    }

    pub async fn resume(&self) -> CommandResult {
        self.control(CommandKind::Resume).await
    }

    async fn control(&self, kind: CommandKind) -> CommandResult {
        let url = self.url(kind);
        debug!(event = "forward_command", command = %kind, url = %url);
        match self.http.get(&url).send().await {
            Ok(response) => normalize_response(kind, response).await,
            Err(err) => {
                warn!(event = "forward_error", command = %kind, error = %err);
                CommandResult::transport_failure(kind, err.to_string())
            }
        }
    }
}

/// Collapse the heterogeneous response shapes the agent server produces
/// into the single result contract.
async fn normalize_response(kind: CommandKind, response: reqwest::Response) -> CommandResult {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            return CommandResult::transport_failure(kind, err.to_string());
        }
    };

    if !status.is_success() {
        let message = remote_error_message(&body)
            .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), body.trim()));
        return CommandResult::remote_rejected(kind, message);
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => CommandResult::success(kind, value),
        // Remote responses are not contractually JSON.
        Err(_) => CommandResult::success(kind, json!({ "success": true, "data": body })),
    }
}

fn remote_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

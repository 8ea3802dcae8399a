mod capture;
mod payload;

use anyhow::{bail, Context, Result};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "halo-bridge")]
struct Args {
    /// Loopback address the bridge binds to.
    #[arg(long, default_value = "")]
    listen: String,
    /// Base URL of the agent server.
    #[arg(long, default_value = "")]
    agent_url: String,
    /// Base URL of the overlay relay.
    #[arg(long, default_value = "")]
    ui_url: String,
    /// Base URL of the iMessage bridge process.
    #[arg(long, default_value = "")]
    imessage_url: String,
    #[arg(long, default_value_t = 10)]
    http_timeout: u64,
}

#[derive(Clone, Debug)]
struct Config {
    listen: String,
    agent_url: String,
    ui_url: String,
    imessage_url: String,
    http_timeout: Duration,
}

/// Thin reqwest wrapper with a shared base URL, mirroring the relay's
/// forwarder shape. A `None` return means the peer was unreachable; the
/// caller decides which degraded response that maps to.
#[derive(Clone, Debug)]
struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Option<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        match self.http.post(&url).json(payload).send().await {
            Ok(response) => Some(response),
            Err(err) => {
                error!(event = "forward_failed", url = %url, error = %err);
                None
            }
        }
    }

    async fn post_raw(
        &self,
        path: &str,
        body: String,
        content_type: Option<&str>,
    ) -> Option<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(&url).body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        match request.send().await {
            Ok(response) => Some(response),
            Err(err) => {
                error!(event = "forward_failed", url = %url, error = %err);
                None
            }
        }
    }

    async fn get(&self, path: &str) -> Option<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => Some(response),
            Err(err) => {
                error!(event = "forward_failed", url = %url, error = %err);
                None
            }
        }
    }
}

struct BridgeState {
    agent: RemoteClient,
    ui: RemoteClient,
    imessage: RemoteClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    init_logging();

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen))?;
    if !addr.ip().is_loopback() {
        bail!("bridge must bind loopback, got {addr}");
    }

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("building http client")?;
    let state = Arc::new(BridgeState {
        agent: RemoteClient::new(http.clone(), &config.agent_url),
        ui: RemoteClient::new(http.clone(), &config.ui_url),
        imessage: RemoteClient::new(http, &config.imessage_url),
    });

    let app = Router::new()
        .route("/api/completetask", post(complete_task))
        .route("/api/currentaction", post(current_action))
        .route("/api/chat", post(chat))
        .route("/api/new_imessage", post(new_imessage))
        .route("/api/send_imessage", post(send_imessage))
        .route("/api/stop", get(stop))
        .route("/api/pause", get(pause))
        .route("/api/resume", get(resume))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding bridge on {addr}"))?;
    info!(
        event = "bridge_start",
        addr = %addr,
        agent_url = %config.agent_url,
        ui_url = %config.ui_url,
        imessage_url = %config.imessage_url
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("bridge server")?;
    Ok(())
}

/// Task-completion notification from the agent: attach a screenshot of
/// the primary display and pass it on to the overlay relay.
async fn complete_task(State(state): State<Arc<BridgeState>>, body: String) -> Response {
    let payload = loose_object(&body);
    info!(event = "complete_task_received");

    let screenshot = match capture::capture_screenshot().await {
        Ok(encoded) => encoded,
        Err(err) => {
            error!(event = "screenshot_failed", error = %err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };

    let mut forward = payload;
    if let Some(map) = forward.as_object_mut() {
        map.insert("screenshot".to_string(), Value::String(screenshot));
    }

    match state.ui.post_json("/api/completetask", &forward).await {
        Some(remote) => forward_response(remote).await,
        None => queued_response("ui_forwarded"),
    }
}

/// Status push from the agent on its way to the overlay. The body is
/// passed through untouched so both payload revisions survive the hop.
async fn current_action(
    State(state): State<Arc<BridgeState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    info!(event = "current_action_received");
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    match state
        .ui
        .post_raw("/api/currentaction", body, content_type)
        .await
    {
        Some(remote) => forward_response(remote).await,
        None => queued_response("ui_forwarded"),
    }
}

async fn chat(State(state): State<Arc<BridgeState>>, headers: HeaderMap, body: String) -> Response {
    info!(event = "chat_received");
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    match state.agent.post_raw("/api/chat", body, content_type).await {
        Some(remote) => forward_response(remote).await,
        None => queued_response("agent_forwarded"),
    }
}

/// Inbound iMessage: the text becomes the agent prompt, the rest becomes
/// metadata.
async fn new_imessage(State(state): State<Arc<BridgeState>>, body: String) -> Response {
    let inbound = loose_object(&body);
    info!(event = "new_imessage_received");
    let forward = payload::rewrap_inbound(&inbound);
    match state.agent.post_json("/api/chat", &forward).await {
        Some(remote) => forward_response(remote).await,
        None => queued_response("agent_forwarded"),
    }
}

async fn send_imessage(State(state): State<Arc<BridgeState>>, body: String) -> Response {
    let request = loose_object(&body);
    let message = match payload::validate_outbound(&request) {
        Ok(message) => message,
        Err(err) => {
            warn!(event = "send_imessage_rejected", error = %err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response();
        }
    };
    info!(event = "send_imessage_received", target = %message.target);

    let forward = serde_json::to_value(&message).unwrap_or_default();
    match state
        .imessage
        .post_json("/api/send_imessage", &forward)
        .await
    {
        Some(remote) => forward_response(remote).await,
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "status": "failed", "bridge_forwarded": false })),
        )
            .into_response(),
    }
}

async fn stop(State(state): State<Arc<BridgeState>>) -> Response {
    proxy_command(&state, "/api/stop").await
}

async fn pause(State(state): State<Arc<BridgeState>>) -> Response {
    proxy_command(&state, "/api/pause").await
}

async fn resume(State(state): State<Arc<BridgeState>>) -> Response {
    proxy_command(&state, "/api/resume").await
}

async fn proxy_command(state: &BridgeState, path: &str) -> Response {
    info!(event = "command_received", path = path);
    match state.agent.get(path).await {
        Some(remote) => forward_response(remote).await,
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "status": "failed", "agent_forwarded": false })),
        )
            .into_response(),
    }
}

/// Parse a request body the way the original backend did: anything that
/// is not a JSON object degrades to an empty object instead of an error.
fn loose_object(body: &str) -> Value {
    serde_json::from_str::<Value>(body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}))
}

/// Mirror a peer's response to our caller: JSON bodies re-emitted as JSON
/// (with a `raw` wrapper when the peer lied about its content type),
/// everything else passed through with the original content type.
async fn forward_response(remote: reqwest::Response) -> Response {
    let status =
        StatusCode::from_u16(remote.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = remote
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    let body = remote.text().await.unwrap_or_default();

    if content_type.contains("application/json") {
        let value = serde_json::from_str::<Value>(&body).unwrap_or_else(|_| {
            warn!(event = "invalid_json_from_peer");
            json!({ "raw": body })
        });
        return (status, Json(value)).into_response();
    }

    let content_type = if content_type.is_empty() {
        "text/plain".to_string()
    } else {
        content_type
    };
    (status, [(CONTENT_TYPE, content_type)], body).into_response()
}

fn queued_response(flag: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "queued", flag: false })),
    )
        .into_response()
}

fn load_config() -> Config {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    Config {
        listen: resolve_value(&args.listen, "HALO_BRIDGE_ADDR", "127.0.0.1:4800"),
        agent_url: resolve_value(&args.agent_url, "HALO_AGENT_URL", "http://127.0.0.1:4820"),
        ui_url: resolve_value(&args.ui_url, "HALO_UI_URL", "http://127.0.0.1:4810"),
        imessage_url: resolve_value(
            &args.imessage_url,
            "HALO_IMESSAGE_URL",
            "http://127.0.0.1:4830",
        ),
        http_timeout: Duration::from_secs(args.http_timeout),
    }
}

fn resolve_value(flag: &str, env_key: &str, default: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.to_string();
    }
    if let Ok(value) = std::env::var(env_key) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    default.to_string()
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_object_degrades_non_objects_to_empty() {
        assert_eq!(loose_object(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(loose_object("not json"), json!({}));
        assert_eq!(loose_object("[1,2]"), json!({}));
        assert_eq!(loose_object(""), json!({}));
    }

    #[test]
    fn remote_client_trims_trailing_slash() {
        let client = RemoteClient::new(reqwest::Client::new(), "http://127.0.0.1:4820/");
        assert_eq!(client.base_url, "http://127.0.0.1:4820");
    }

    #[tokio::test]
    async fn unreachable_peer_returns_none() {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("client");
        let client = RemoteClient::new(http, "http://127.0.0.1:9");
        assert!(client.get("/api/stop").await.is_none());
        assert!(client.post_json("/api/chat", &json!({})).await.is_none());
    }
}

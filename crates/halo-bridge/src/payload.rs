use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Validated outbound iMessage request, ready to forward to the bridge
/// process that owns the Messages.app seam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("target is required")]
    MissingTarget,
    #[error("text must be a string")]
    TextNotString,
    #[error("attachments must be a list")]
    AttachmentsNotList,
    #[error("attachments must contain non-empty paths")]
    BadAttachment,
    #[error("text or attachments must be provided")]
    NothingToSend,
}

/// Validate a raw `/api/send_imessage` body.
///
/// Attachments arrive as user-typed paths, possibly quoted and possibly
/// `~`-relative; both are normalized before forwarding. A blank text body
/// collapses to no text at all.
pub fn validate_outbound(payload: &Value) -> Result<OutboundMessage, PayloadError> {
    let target = match payload.get("target") {
        Some(Value::String(target)) if !target.trim().is_empty() => target.trim().to_string(),
        _ => return Err(PayloadError::MissingTarget),
    };

    let text = match payload.get("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => return Err(PayloadError::TextNotString),
    };

    let attachments = match payload.get("attachments") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => {
            if items.is_empty() {
                None
            } else {
                let mut normalized = Vec::with_capacity(items.len());
                for item in items {
                    let path = item
                        .as_str()
                        .map(str::trim)
                        .filter(|path| !path.is_empty())
                        .ok_or(PayloadError::BadAttachment)?;
                    normalized.push(normalize_path(path));
                }
                Some(normalized)
            }
        }
        Some(_) => return Err(PayloadError::AttachmentsNotList),
    };

    let text = text.filter(|text| !text.trim().is_empty());
    if text.is_none() && attachments.is_none() {
        return Err(PayloadError::NothingToSend);
    }

    Ok(OutboundMessage {
        target,
        text,
        attachments,
    })
}

fn normalize_path(raw: &str) -> String {
    let unquoted = raw.trim().trim_matches(|ch| ch == '"' || ch == '\'');
    if let Some(rest) = unquoted.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    PathBuf::from(unquoted).to_string_lossy().into_owned()
}

/// Rewrap an inbound iMessage into the agent's chat request: the text
/// becomes the prompt, everything else rides along as metadata.
pub fn rewrap_inbound(payload: &Value) -> Value {
    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let metadata: Map<String, Value> = payload
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(key, _)| key.as_str() != "text")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    json!({ "prompt": text, "metadata": metadata })
}

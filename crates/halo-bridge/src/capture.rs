use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screencapture binary not available: {0}")]
    Spawn(std::io::Error),
    #[error("screencapture exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("could not read captured image: {0}")]
    Read(std::io::Error),
}

/// Capture the primary display and return it base64 encoded.
///
/// Shells out to `screencapture -x` the way the original deployment does;
/// the temp file is removed even when the capture fails.
pub async fn capture_screenshot() -> Result<String, CaptureError> {
    let path = temp_path();
    let result = run_capture(&path).await;
    if tokio::fs::remove_file(&path).await.is_err() && result.is_ok() {
        warn!(event = "screenshot_cleanup_failed", path = %path.display());
    }
    result
}

fn temp_path() -> PathBuf {
    std::env::temp_dir().join(format!("halo_{}.png", Uuid::new_v4().simple()))
}

async fn run_capture(path: &Path) -> Result<String, CaptureError> {
    let status = Command::new("screencapture")
        .arg("-x")
        .arg(path)
        .status()
        .await
        .map_err(CaptureError::Spawn)?;
    if !status.success() {
        return Err(CaptureError::Failed(status));
    }
    let bytes = tokio::fs::read(path).await.map_err(CaptureError::Read)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Body of `POST /sync`. Both fields are optional on the wire so the agent
/// can tell a missing field apart from a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl SyncRequest {
    pub fn new(filename: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            secret: Some(secret.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub file: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub slave_dir: PathBuf,
    pub timestamp: DateTime<Utc>,
}

use crate::api::models::SyncRequest;
use crate::config::PropagationConfig;
use crate::error::{Result, ZoneError};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of one push to one secondary.
#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub endpoint: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sends sync triggers to every secondary in parallel. Failures are
/// reported per host and never retried here.
#[derive(Clone)]
pub struct SecondaryNotifier {
    http: Client,
    endpoints: Vec<String>,
    secret: String,
}

impl SecondaryNotifier {
    pub fn new(endpoints: Vec<String>, secret: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ZoneError::Http(e.to_string()))?;

        Ok(Self {
            http,
            endpoints,
            secret: secret.into(),
        })
    }

    pub fn from_config(config: &PropagationConfig) -> Result<Self> {
        Self::new(config.endpoints(), config.secret.clone(), config.push_timeout())
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub async fn push(&self, filename: &str) -> Vec<PushReport> {
        if self.endpoints.is_empty() {
            warn!("No secondaries configured, skipping sync of {}", filename);
            return Vec::new();
        }

        join_all(
            self.endpoints
                .iter()
                .map(|endpoint| self.push_one(endpoint, filename)),
        )
        .await
    }

    async fn push_one(&self, endpoint: &str, filename: &str) -> PushReport {
        let url = format!("{}/sync", endpoint.trim_end_matches('/'));
        info!("Syncing {} to {}", filename, endpoint);

        let response = self
            .http
            .post(&url)
            .json(&SyncRequest::new(filename, self.secret.as_str()))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("Synced {} to {}", filename, endpoint);
                PushReport {
                    endpoint: endpoint.to_string(),
                    success: true,
                    status: Some(resp.status().as_u16()),
                    error: None,
                }
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                error!("{} returned {}: {}", endpoint, status, body);
                PushReport {
                    endpoint: endpoint.to_string(),
                    success: false,
                    status: Some(status),
                    error: Some(body),
                }
            }
            Err(e) => {
                error!("Sync of {} to {} failed: {}", filename, endpoint, e);
                PushReport {
                    endpoint: endpoint.to_string(),
                    success: false,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

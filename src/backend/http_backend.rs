//! HTTP client for the remote generation backend

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::backend::traits::{BackendOperation, GenerationBackend, Payload};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

/// Stateless forwarding client; built once at startup and shared
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
    control_timeout: Duration,
}

impl HttpBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            control_timeout: Duration::from_secs(config.control_timeout_secs),
        })
    }

    fn url_for(&self, operation: BackendOperation) -> String {
        format!("{}{}", self.base_url, operation.path())
    }

    fn timeout_for(&self, operation: BackendOperation) -> Duration {
        if operation.is_control() {
            self.control_timeout
        } else {
            self.timeout
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    async fn forward(&self, operation: BackendOperation, payload: Option<Payload>) -> Result<Value> {
        let url = self.url_for(operation);
        if !operation.is_control() {
            info!(operation = operation.name(), url = %url, "Calling remote API");
        }

        let request = if operation.is_get() {
            self.client.get(&url)
        } else {
            self.client.post(&url)
        };
        let request = match payload {
            Some(body) => request.json(&body),
            None => request,
        };

        let failed = |e: reqwest::Error| {
            error!(operation = operation.name(), error = %e, "Remote API call failed");
            AppError::RemoteCallFailed {
                operation: operation.name(),
                cause: e.to_string(),
            }
        };

        let response = request
            .timeout(self.timeout_for(operation))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(failed)?;

        response.json::<Value>().await.map_err(failed)
    }
}

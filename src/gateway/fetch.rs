//! Outbound fetch of externally referenced resources

use reqwest::{redirect::Policy, Client};
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::OptionsStore;
use crate::error::{AppError, Result};
use crate::gateway::ssrf;

/// The two independent switches that govern outbound fetches
#[derive(Debug, Clone, Default)]
pub struct FetchPolicy {
    /// `api_enable_requests`: any external fetch at all
    pub enable_requests: bool,
    /// `api_forbid_local_requests`: run the SSRF guard first
    pub forbid_local: bool,
    pub user_agent: Option<String>,
}

impl FetchPolicy {
    pub fn from_options(options: &OptionsStore) -> Self {
        let user_agent = options.get_str("api_useragent");
        Self {
            enable_requests: options.get_bool("api_enable_requests"),
            forbid_local: options.get_bool("api_forbid_local_requests"),
            user_agent: (!user_agent.is_empty()).then_some(user_agent),
        }
    }
}

/// Fetches remote resources after the policy checks pass
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    timeout: Duration,
    max_bytes: usize,
}

impl Default for ResourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Largest body accepted from a remote image URL
    pub const DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Fetch `url` if `policy` allows it. Redirects are not followed, and when the
    /// SSRF guard ran the connection is pinned to the addresses it approved.
    pub async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<Vec<u8>> {
        if !policy.enable_requests {
            return Err(AppError::ForbiddenOperation("Requests not allowed".to_string()));
        }

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::none());

        if policy.forbid_local {
            let verdict = ssrf::inspect(url).await;
            if !verdict.allowed {
                warn!(url = %url, addresses = ?verdict.addresses, "Blocked request to local resource");
                return Err(AppError::ForbiddenOperation(
                    "Request to local resource not allowed".to_string(),
                ));
            }
            if verdict.host.parse::<IpAddr>().is_err() {
                builder = builder.resolve_to_addrs(&verdict.host, &verdict.addresses);
            }
        }

        if let Some(agent) = &policy.user_agent {
            builder = builder.user_agent(agent.as_str());
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!(url = %url, "Fetching external resource");
        let mut response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(invalid_url)?;

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(self.too_large(declared));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(invalid_url)? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn too_large(&self, size: u64) -> AppError {
        warn!(size, limit = self.max_bytes, "Remote resource exceeds size limit");
        AppError::InvalidResource {
            detail: "Invalid image url".to_string(),
            cause: format!("response body of at least {} bytes exceeds {} byte limit", size, self.max_bytes),
        }
    }
}

fn invalid_url(e: reqwest::Error) -> AppError {
    AppError::InvalidResource {
        detail: "Invalid image url".to_string(),
        cause: e.to_string(),
    }
}

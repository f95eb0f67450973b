//! Startup settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub backend: BackendConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional path prefix the whole route table is nested under
    #[serde(default)]
    pub subpath: Option<String>,
    #[serde(default)]
    pub tls_keyfile: Option<String>,
    #[serde(default)]
    pub tls_certfile: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub timeout_keep_alive: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7861
}

fn default_keep_alive() -> u64 {
    30
}

/// API surface configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Comma separated `user:pass` pairs; authentication is off when unset
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub log_requests: bool,
    /// Exposes server-kill / server-restart / server-stop
    #[serde(default)]
    pub server_stop: bool,
}

/// Remote generation backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:7860".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_control_timeout() -> u64 {
    10
}

/// Local files the gateway reads or writes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_ui_settings_file")]
    pub ui_settings_file: PathBuf,
    #[serde(default = "default_styles_file")]
    pub styles_file: PathBuf,
    #[serde(default = "default_extensions_dir")]
    pub extensions_dir: PathBuf,
}

fn default_ui_settings_file() -> PathBuf {
    PathBuf::from("config.json")
}

fn default_styles_file() -> PathBuf {
    PathBuf::from("styles.csv")
}

fn default_extensions_dir() -> PathBuf {
    PathBuf::from("extensions")
}

/// Checkpoint identifiers accepted by `sd_model_checkpoint`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var("SDAPI_GATEWAY_CONFIG")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("api.log_requests", false)?
            .set_default("backend.base_url", default_base_url())?
            .set_default("backend.timeout_secs", default_timeout() as i64)?
            .set_default("paths.ui_settings_file", "config.json")?
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with SDAPI_GATEWAY_)
            .add_source(
                Environment::with_prefix("SDAPI_GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            // The backend contract variables win over everything else
            .set_override_option("backend.base_url", std::env::var("SD_API_URL").ok())?
            .set_override_option(
                "backend.timeout_secs",
                std::env::var("SD_API_TIMEOUT")
                    .ok()
                    .and_then(|v| v.trim().parse::<i64>().ok()),
            )?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.server.tls_keyfile.is_some() != self.server.tls_certfile.is_some() {
            return Err(AppError::Config(config::ConfigError::Message(
                "TLS requires both tls_keyfile and tls_certfile".to_string(),
            )));
        }

        if self.backend.base_url.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Backend base_url cannot be empty".to_string(),
            )));
        }

        if let Some(auth) = &self.api.auth {
            for pair in auth.split(',').filter(|p| !p.trim().is_empty()) {
                if pair.split_once(':').is_none() {
                    return Err(AppError::Config(config::ConfigError::Message(format!(
                        "Invalid api auth entry '{}', expected user:pass",
                        pair.split(':').next().unwrap_or_default()
                    ))));
                }
            }
        }

        Ok(())
    }

    /// Route prefix for the API, including the optional subpath
    pub fn route_prefix(&self) -> String {
        match self.server.subpath.as_deref().map(|s| s.trim_matches('/')) {
            Some(sub) if !sub.is_empty() => format!("/{}/sdapi", sub),
            _ => "/sdapi".to_string(),
        }
    }

    /// Copy of the settings safe to hand out over the API
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        copy.api.auth = self.api.auth.as_ref().map(|auth| {
            auth.split(',')
                .map(|pair| match pair.split_once(':') {
                    Some((user, _)) => format!("{}:***", user),
                    None => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",")
        });
        copy
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                subpath: None,
                tls_keyfile: None,
                tls_certfile: None,
                timeout_keep_alive: default_keep_alive(),
            },
            api: ApiConfig::default(),
            backend: BackendConfig {
                base_url: default_base_url(),
                timeout_secs: default_timeout(),
                control_timeout_secs: default_control_timeout(),
            },
            paths: PathsConfig {
                ui_settings_file: default_ui_settings_file(),
                styles_file: default_styles_file(),
                extensions_dir: default_extensions_dir(),
            },
            models: ModelsConfig::default(),
        }
    }
}

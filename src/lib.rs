//! Stable Diffusion API gateway
//!
//! An authenticated HTTP gateway in front of a remote image-generation
//! backend. Generation calls are forwarded verbatim; remote image references
//! are fetched behind an SSRF guard; every failure leaves as one JSON error
//! envelope.

pub mod api;
pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod gateway;
pub mod local;
pub mod middleware;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::{GenerationBackend, HttpBackend};
use codec::ImageCodec;
use config::{OptionsStore, Settings};
use gateway::ResourceFetcher;
use local::{ServerControl, StyleLibrary};
use middleware::credentials::Credentials;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<Settings>,
    pub credentials: Arc<Credentials>,
    pub options: Arc<OptionsStore>,
    pub backend: Arc<dyn GenerationBackend>,
    pub codec: Arc<ImageCodec>,
    pub styles: Arc<StyleLibrary>,
    pub lifecycle: Arc<ServerControl>,
}

impl AppState {
    /// Build every process scoped component from the startup settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let credentials = Credentials::from_option(settings.api.auth.as_deref())?;
        let options = OptionsStore::open(
            settings.paths.ui_settings_file.clone(),
            &settings.models.checkpoints,
        )
        .await?;
        let backend = HttpBackend::new(&settings.backend)?;
        let styles = StyleLibrary::load(&settings.paths.styles_file).await?;

        Ok(Self {
            credentials: Arc::new(credentials),
            options: Arc::new(options),
            backend: Arc::new(backend),
            codec: Arc::new(ImageCodec::new(ResourceFetcher::new())),
            styles: Arc::new(styles),
            lifecycle: Arc::new(ServerControl::from_env()),
            settings: Arc::new(settings),
        })
    }
}

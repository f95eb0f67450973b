//! Main entry point for the Stable Diffusion API gateway

use axum_server::tls_rustls::RustlsConfig;
use sdapi_gateway::{api, config::Settings, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .init();

    info!("Starting Stable Diffusion API gateway in remote proxy mode");

    // Load configuration
    let settings = Settings::load()?;
    settings.validate()?;
    info!(
        backend = %settings.backend.base_url,
        timeout_secs = settings.backend.timeout_secs,
        "Loaded configuration: server={}:{}",
        settings.server.host, settings.server.port
    );

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    let tls = match (&settings.server.tls_keyfile, &settings.server.tls_certfile) {
        (Some(key), Some(cert)) => Some(RustlsConfig::from_pem_file(cert, key).await?),
        _ => None,
    };
    let keep_alive = settings.server.timeout_keep_alive > 0;

    // Create application state
    let app_state = Arc::new(AppState::build(settings).await?);
    if !app_state.credentials.is_empty() {
        info!(users = app_state.credentials.len(), "API authentication enabled");
    }

    // Build the router
    let app = api::routes::create_router(app_state.clone())
        .into_make_service_with_connect_info::<SocketAddr>();
    let handle = app_state.lifecycle.handle();

    info!(tls = tls.is_some(), "Server listening on {}", addr);

    match tls {
        Some(tls) => {
            let mut server = axum_server::bind_rustls(addr, tls).handle(handle);
            server.http_builder().http1().keep_alive(keep_alive);
            server.serve(app).await?;
        }
        None => {
            let mut server = axum_server::bind(addr).handle(handle);
            server.http_builder().http1().keep_alive(keep_alive);
            server.serve(app).await?;
        }
    }

    if let Some(command) = app_state.lifecycle.requested() {
        info!(command = ?command, "Server stopped");
        std::process::exit(command.exit_code());
    }

    Ok(())
}

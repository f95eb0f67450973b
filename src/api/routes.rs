//! Route table of the gateway

use axum::{
    extract::DefaultBodyLimit,
    middleware::map_response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

use crate::api::handlers;
use crate::middleware::{auth::AuthLayer, timing::{defect_response, TimingLayer}};
use crate::AppState;

/// Build the full router: route table, auth gate, panic catcher and the
/// timing/error layer outermost
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut api = Router::new()
        // Forwarded to the backend
        .route("/sdapi/v1/txt2img", post(handlers::txt2img))
        .route("/sdapi/v1/img2img", post(handlers::img2img))
        .route("/sdapi/v1/extra-single-image", post(handlers::extra_single_image))
        .route("/sdapi/v1/extra-batch-images", post(handlers::extra_batch_images))
        .route("/sdapi/v1/png-info", post(handlers::png_info))
        .route("/sdapi/v1/interrogate", post(handlers::interrogate))
        .route("/sdapi/v1/progress", get(handlers::progress))
        .route("/sdapi/v1/interrupt", post(handlers::interrupt))
        .route("/sdapi/v1/skip", post(handlers::skip))
        // Settings and flags
        .route("/sdapi/v1/options", get(handlers::get_options).post(handlers::set_options))
        .route("/sdapi/v1/cmd-flags", get(handlers::get_cmd_flags))
        // Not applicable in proxy mode
        .route("/sdapi/v1/samplers", get(handlers::empty_list))
        .route("/sdapi/v1/schedulers", get(handlers::empty_list))
        .route("/sdapi/v1/upscalers", get(handlers::empty_list))
        .route("/sdapi/v1/latent-upscale-modes", get(handlers::empty_list))
        .route("/sdapi/v1/sd-models", get(handlers::empty_list))
        .route("/sdapi/v1/sd-vae", get(handlers::empty_list))
        .route("/sdapi/v1/hypernetworks", get(handlers::empty_list))
        .route("/sdapi/v1/face-restorers", get(handlers::empty_list))
        .route("/sdapi/v1/realesrgan-models", get(handlers::empty_list))
        .route("/sdapi/v1/embeddings", get(handlers::embeddings))
        .route("/sdapi/v1/refresh-embeddings", post(handlers::no_op))
        .route("/sdapi/v1/refresh-checkpoints", post(handlers::no_op))
        .route("/sdapi/v1/refresh-vae", post(handlers::no_op))
        .route("/sdapi/v1/create/embedding", post(handlers::not_supported))
        .route("/sdapi/v1/create/hypernetwork", post(handlers::not_supported))
        .route("/sdapi/v1/train/embedding", post(handlers::not_supported))
        .route("/sdapi/v1/train/hypernetwork", post(handlers::not_supported))
        .route("/sdapi/v1/unload-checkpoint", post(handlers::empty_object))
        .route("/sdapi/v1/reload-checkpoint", post(handlers::empty_object))
        .route("/sdapi/v1/scripts", get(handlers::scripts))
        .route("/sdapi/v1/script-info", get(handlers::empty_list))
        // Answered locally
        .route("/sdapi/v1/memory", get(handlers::memory))
        .route("/sdapi/v1/prompt-styles", get(handlers::prompt_styles))
        .route("/sdapi/v1/extensions", get(handlers::extensions_list));

    if state.settings.api.server_stop {
        api = api
            .route("/sdapi/v1/server-kill", post(handlers::server_kill))
            .route("/sdapi/v1/server-restart", post(handlers::server_restart))
            .route("/sdapi/v1/server-stop", post(handlers::server_stop));
    }

    // Base64 images routinely exceed the default 2 MB body limit
    let api = api
        .route_layer(AuthLayer::new(state.credentials.clone()))
        .layer(DefaultBodyLimit::disable())
        .with_state(state.clone());

    let app = match state.settings.server.subpath.as_deref().map(|s| s.trim_matches('/')) {
        Some(sub) if !sub.is_empty() => Router::new().nest(&format!("/{}", sub), api),
        _ => api,
    };

    app.fallback(handlers::not_found)
        .layer(map_response(handlers::method_not_allowed))
        .layer(CatchPanicLayer::custom(defect_response))
        .layer(TimingLayer::new(
            state.settings.api.log_requests,
            state.settings.route_prefix(),
        ))
}

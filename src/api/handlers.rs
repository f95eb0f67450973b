//! Route handlers
//!
//! Forwarded routes validate the declared shape, resolve remote image
//! references, call the matching backend method and return its JSON as is.
//! Local routes answer from the settings store, the style library, the
//! extensions dir, or with the fixed "not applicable in proxy mode" bodies.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::ALLOW, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::preprocess::ReferenceResolver;
use crate::api::shape::RequestShape;
use crate::backend::{BackendOperation, Payload};
use crate::codec::EncodeOptions;
use crate::error::{AppError, FailureNote, Result};
use crate::gateway::FetchPolicy;
use crate::local::{extensions, memory, ServerCommand};
use crate::AppState;

type SharedState = State<Arc<AppState>>;
type Body = std::result::Result<Json<Payload>, JsonRejection>;

pub const NOT_SUPPORTED: &str = "Not supported in remote API mode";

fn payload_of(body: Body) -> Result<Payload> {
    body.map(|Json(payload)| payload)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

async fn prepare(state: &AppState, operation: BackendOperation, body: Body) -> Result<Payload> {
    let mut payload = payload_of(body)?;
    RequestShape::for_operation(operation).validate(&payload)?;
    ReferenceResolver::new(
        &state.codec,
        FetchPolicy::from_options(&state.options),
        EncodeOptions::from_options(&state.options),
    )
    .resolve(operation, &mut payload)
    .await?;
    Ok(payload)
}

// Forwarded routes

pub async fn txt2img(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::Txt2Img, body).await?;
    Ok(Json(state.backend.txt2img(payload).await?))
}

pub async fn img2img(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::Img2Img, body).await?;
    Ok(Json(state.backend.img2img(payload).await?))
}

pub async fn extra_single_image(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::ExtraSingleImage, body).await?;
    Ok(Json(state.backend.extras_single_image(payload).await?))
}

pub async fn extra_batch_images(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::ExtraBatchImages, body).await?;
    Ok(Json(state.backend.extras_batch_images(payload).await?))
}

pub async fn png_info(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::PngInfo, body).await?;
    Ok(Json(state.backend.png_info(payload).await?))
}

pub async fn interrogate(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let payload = prepare(&state, BackendOperation::Interrogate, body).await?;
    Ok(Json(state.backend.interrogate(payload).await?))
}

pub async fn progress(State(state): SharedState) -> Result<Json<Value>> {
    Ok(Json(state.backend.progress().await?))
}

pub async fn interrupt(State(state): SharedState) -> Result<Json<Value>> {
    Ok(Json(state.backend.interrupt().await?))
}

pub async fn skip(State(state): SharedState) -> Result<Json<Value>> {
    Ok(Json(state.backend.skip().await?))
}

// Settings

pub async fn get_options(State(state): SharedState) -> Json<Payload> {
    Json(state.options.get_all())
}

pub async fn set_options(State(state): SharedState, body: Body) -> Result<Json<Value>> {
    let changes = payload_of(body)?;
    state.options.update(changes).await?;
    Ok(Json(Value::Null))
}

pub async fn get_cmd_flags(State(state): SharedState) -> Json<crate::config::Settings> {
    Json(state.settings.redacted())
}

// Capabilities with no local engine behind them

pub async fn empty_list() -> Json<Vec<Value>> {
    Json(Vec::new())
}

pub async fn embeddings() -> Json<Value> {
    Json(json!({"loaded": {}, "skipped": {}}))
}

pub async fn no_op() -> Json<Value> {
    Json(Value::Null)
}

pub async fn empty_object() -> Json<Value> {
    Json(json!({}))
}

pub async fn not_supported() -> Json<Value> {
    Json(json!({ "info": NOT_SUPPORTED }))
}

pub async fn scripts() -> Json<Value> {
    Json(json!({"txt2img": [], "img2img": []}))
}

// Locally computed

pub async fn memory() -> Result<Json<memory::MemoryResponse>> {
    let report = tokio::task::spawn_blocking(memory::memory_report)
        .await
        .map_err(|e| AppError::Internal(format!("memory accounting task failed: {}", e)))?;
    Ok(Json(report))
}

pub async fn prompt_styles(State(state): SharedState) -> Json<Vec<crate::local::PromptStyle>> {
    Json(state.styles.styles().to_vec())
}

pub async fn extensions_list(State(state): SharedState) -> Result<Json<Vec<extensions::ExtensionItem>>> {
    let disabled: Vec<String> = state
        .options
        .get("disabled_extensions")
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let items = extensions::list_extensions(&state.settings.paths.extensions_dir, &disabled).await?;
    Ok(Json(items))
}

// Server lifecycle, only routed when enabled

pub async fn server_kill(State(state): SharedState) -> Json<Value> {
    state.lifecycle.request(ServerCommand::Kill);
    Json(Value::Null)
}

pub async fn server_restart(State(state): SharedState) -> Response {
    if !state.lifecycle.is_restartable() {
        return StatusCode::NOT_IMPLEMENTED.into_response();
    }
    state.lifecycle.request(ServerCommand::Restart);
    Json(Value::Null).into_response()
}

pub async fn server_stop(State(state): SharedState) -> &'static str {
    state.lifecycle.request(ServerCommand::Stop);
    "Stopping."
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("{} Not Found", uri.path()))
}

/// Give the router's bare 405 (known path, wrong method) the error envelope
pub async fn method_not_allowed(method: Method, uri: Uri, response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED
        || response.extensions().get::<FailureNote>().is_some()
    {
        return response;
    }
    let allow = response.headers().get(ALLOW).cloned();
    let mut enveloped =
        AppError::MethodNotAllowed(format!("{} {} Method Not Allowed", method, uri.path()))
            .into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(ALLOW, allow);
    }
    enveloped
}

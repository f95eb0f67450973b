//! Request timing, access logging and failure logging
//!
//! Outermost layer of the router. Every response, success or failure, gets an
//! `X-Process-Time` header with the elapsed seconds.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    any::Any,
    net::SocketAddr,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{error, info};

use crate::error::{AppError, FailureNote};

pub const PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time");

/// Timing layer
#[derive(Clone)]
pub struct TimingLayer {
    log_requests: bool,
    prefix: Arc<str>,
}

impl TimingLayer {
    /// `prefix` limits the access log to paths under the API route prefix
    pub fn new(log_requests: bool, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            log_requests,
            prefix: prefix.into(),
        }
    }
}

impl<S> Layer<S> for TimingLayer {
    type Service = TimingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimingMiddleware {
            inner,
            log_requests: self.log_requests,
            prefix: self.prefix.clone(),
        }
    }
}

/// Timing middleware service
#[derive(Clone)]
pub struct TimingMiddleware<S> {
    inner: S,
    log_requests: bool,
    prefix: Arc<str>,
}

impl<S> Service<Request<Body>> for TimingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let protocol = format!("{:?}", request.version());
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let log_access = self.log_requests && path.starts_with(&*self.prefix);

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = future.await?;
            let duration = format!("{:.4}", started.elapsed().as_secs_f64());

            if let Ok(value) = HeaderValue::from_str(&duration) {
                response.headers_mut().insert(PROCESS_TIME_HEADER, value);
            }

            if let Some(note) = response.extensions().get::<FailureNote>() {
                if note.expected {
                    info!(kind = note.kind, method = %method, path = %path, "API error: {}", note.message);
                } else {
                    error!(kind = note.kind, method = %method, path = %path, "API error: {}", note.message);
                }
            }

            if log_access {
                info!(
                    target: "sdapi_gateway::access",
                    method = %method,
                    path = %path,
                    client = %client,
                    protocol = %protocol,
                    status = response.status().as_u16(),
                    duration = %duration,
                    "API"
                );
            }

            Ok(response)
        })
    }
}

/// Response for a handler that panicked; used with `CatchPanicLayer::custom`
pub fn defect_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(format!("handler panicked: {}", message)).into_response()
}

//! HTTP Basic authentication middleware

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::error::AppError;
use crate::middleware::credentials::Credentials;

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    credentials: Arc<Credentials>,
}

impl AuthLayer {
    pub fn new(credentials: Arc<Credentials>) -> Self {
        Self { credentials }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            credentials: self.credentials.clone(),
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    credentials: Arc<Credentials>,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
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
        // If no credentials are configured, allow all requests
        if self.credentials.is_empty() {
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        let outcome = match basic_credentials(&request) {
            Some((username, password)) => self.credentials.verify(&username, &password),
            None => Err(AppError::AuthenticationFailed(
                "Not authenticated".to_string(),
            )),
        };

        match outcome {
            Ok(()) => {
                let future = self.inner.call(request);
                Box::pin(async move { future.await })
            }
            Err(e) => {
                warn!(path = %request.uri().path(), "Rejected request credentials");
                Box::pin(async move { Ok(e.into_response()) })
            }
        }
    }
}

/// Extract `(username, password)` from an `Authorization: Basic ...` header
pub fn basic_credentials<B>(request: &Request<B>) -> Option<(String, String)> {
    let header = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

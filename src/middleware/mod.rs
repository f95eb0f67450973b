//! Middleware - Basic auth gate, credential store, timing and error logging

pub mod auth;
pub mod credentials;
pub mod timing;

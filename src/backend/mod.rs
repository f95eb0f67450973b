//! Backend module - forwarding client for the remote generation service

pub mod http_backend;
pub mod traits;

pub use http_backend::HttpBackend;
pub use traits::{BackendOperation, GenerationBackend, Payload};

//! HTTP API - route table, handlers, request shapes and image pre-processing

pub mod handlers;
pub mod preprocess;
pub mod routes;
pub mod shape;

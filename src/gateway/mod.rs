//! Gateway module - SSRF guard and outbound resource fetching

pub mod fetch;
pub mod ssrf;

pub use fetch::{FetchPolicy, ResourceFetcher};

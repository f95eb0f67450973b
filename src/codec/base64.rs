//! Base64 encoding and decoding utilities

use base64::{engine::general_purpose::STANDARD, Engine};
use crate::error::{AppError, Result};

/// Encode binary data to base64 string
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Drop a `data:<mime>;base64,` prefix, everything up to the first comma
pub fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        encoded.split_once(',').map(|(_, payload)| payload).unwrap_or(encoded)
    } else {
        encoded
    }
}

/// Decode a base64 string or data URI to binary data
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let payload: String = strip_data_uri(encoded)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    STANDARD
        .decode(payload)
        .map_err(|e| AppError::InvalidResource {
            detail: "Invalid encoded image".to_string(),
            cause: e.to_string(),
        })
}

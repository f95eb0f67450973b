//! Credential store for HTTP Basic authentication

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// Username to password mapping, immutable after load
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    entries: HashMap<String, String>,
}

impl Credentials {
    /// Parse a comma separated list of `user:pass` pairs
    pub fn parse(list: &str) -> Result<Self> {
        let mut entries = HashMap::new();
        for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (user, password) = pair.split_once(':').ok_or_else(|| {
                AppError::Config(config::ConfigError::Message(
                    "api auth entries must be user:pass".to_string(),
                ))
            })?;
            entries.insert(user.to_string(), password.to_string());
        }
        Ok(Self { entries })
    }

    pub fn from_option(list: Option<&str>) -> Result<Self> {
        list.map(Self::parse).unwrap_or_else(|| Ok(Self::default()))
    }

    /// No credentials configured means an open gateway
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<()> {
        match self.entries.get(username) {
            Some(expected) if constant_time_eq(password, expected) => Ok(()),
            _ => Err(AppError::AuthenticationFailed(
                "Incorrect username or password".to_string(),
            )),
        }
    }
}

// Digests first so the comparison does not leak the password length.
fn constant_time_eq(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given.as_slice().ct_eq(expected.as_slice()).into()
}

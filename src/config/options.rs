//! Runtime settings store backed by a JSON file
//!
//! Readers take an `Arc` snapshot of the whole map. Writers serialise on a
//! mutex, build the next map from the current one, persist it and only then
//! publish it, so a reader observes either the old or the new map.

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// Ordered key/value settings document
pub type OptionMap = Map<String, Value>;

pub const CHECKPOINT_KEY: &str = "sd_model_checkpoint";

/// Declared settings with their defaults, in presentation order
pub fn declared_defaults() -> OptionMap {
    let defaults = json!({
        "samples_format": "png",
        "jpeg_quality": 80,
        "api_enable_requests": true,
        "api_forbid_local_requests": true,
        "api_useragent": "",
        "sd_model_checkpoint": null,
        "sd_vae": "Automatic",
        "CLIP_stop_at_last_layers": 1,
        "eta_noise_seed_delta": 0,
        "disabled_extensions": [],
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct OptionsStore {
    path: PathBuf,
    known_checkpoints: HashSet<String>,
    data: RwLock<Arc<OptionMap>>,
    writer: Mutex<()>,
}

impl OptionsStore {
    /// Open the store, reading existing values from `path` when present
    pub async fn open(path: impl Into<PathBuf>, known_checkpoints: &[String]) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<OptionMap>(&bytes) {
                Ok(map) => {
                    info!(path = ?path, keys = map.len(), "Loaded settings");
                    map
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Settings file is not a JSON object, starting from defaults");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "No settings file yet");
                Map::new()
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        Ok(Self::with_data(path, known_checkpoints, data))
    }

    pub fn with_data(path: impl Into<PathBuf>, known_checkpoints: &[String], data: OptionMap) -> Self {
        Self {
            path: path.into(),
            known_checkpoints: known_checkpoints.iter().cloned().collect(),
            data: RwLock::new(Arc::new(data)),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Values explicitly stored, without defaults
    pub fn snapshot(&self) -> Arc<OptionMap> {
        self.data.read().clone()
    }

    /// Full settings mapping, falling back to each declared default
    pub fn get_all(&self) -> OptionMap {
        let stored = self.snapshot();
        let mut all = declared_defaults();
        for (key, value) in all.iter_mut() {
            if let Some(v) = stored.get(key) {
                *value = v.clone();
            }
        }
        for (key, value) in stored.iter() {
            if !all.contains_key(key) {
                all.insert(key.clone(), value.clone());
            }
        }
        all
    }

    /// Single value, stored or declared default
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(v) = self.snapshot().get(key) {
            return Some(v.clone());
        }
        declared_defaults().remove(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        }
    }

    pub fn is_known_checkpoint(&self, name: &str) -> bool {
        self.known_checkpoints.contains(name)
    }

    /// Apply and persist `changes`; rejects unknown checkpoints before touching anything
    pub async fn update(&self, changes: OptionMap) -> Result<()> {
        match changes.get(CHECKPOINT_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::String(name)) if self.is_known_checkpoint(name) => {}
            Some(other) => {
                let name = other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string());
                return Err(AppError::ConfigurationRejected(format!(
                    "model {:?} not found",
                    name
                )));
            }
        }

        let _guard = self.writer.lock().await;
        let mut next = (*self.snapshot()).clone();
        for (key, value) in changes {
            next.insert(key, value);
        }

        self.persist(&next).await?;
        *self.data.write() = Arc::new(next);
        debug!(path = ?self.path, "Settings updated");
        Ok(())
    }

    async fn persist(&self, data: &OptionMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

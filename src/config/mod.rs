//! Startup configuration and the runtime settings store

pub mod options;
pub mod settings;

pub use options::{OptionMap, OptionsStore};
pub use settings::{ApiConfig, BackendConfig, ModelsConfig, PathsConfig, ServerConfig, Settings};

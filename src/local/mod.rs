//! Locally answered capabilities: prompt styles, extensions, memory, lifecycle

pub mod extensions;
pub mod lifecycle;
pub mod memory;
pub mod styles;

pub use lifecycle::{ServerCommand, ServerControl};
pub use styles::{PromptStyle, StyleLibrary};

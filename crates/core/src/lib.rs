//! Veracity Core Library
//!
//! Foundational utilities shared by every Veracity crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, PipelineSettings};
pub use error::{AppError, AppResult};

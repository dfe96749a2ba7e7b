#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the docbuild orchestration service
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone where possible for easier handling.

use thiserror::Error;

pub mod build;
pub mod config;
pub mod notify;

// Re-export all error types at the root
pub use build::BuildError;
pub use config::ConfigError;
pub use notify::NotifyError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

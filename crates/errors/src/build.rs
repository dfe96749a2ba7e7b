//! Build instruction error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    /// The incoming request was malformed or names an unusable target.
    /// Raised before any resource is acquired; no notification is sent.
    #[error("rejected: {message}")]
    Rejected { message: String },

    /// A docset lifecycle that must not be published on the requested
    /// target. A policy gate, not a failure.
    #[error("lifecycle '{lifecycle}' of {product}/{docset} not publishable on target '{target}'")]
    LifecycleNotPublishable {
        product: String,
        docset: String,
        lifecycle: String,
        target: String,
    },

    /// An external command exited non-zero or failed to spawn.
    #[error("external operation '{command}' failed with exit code {exit_code:?}: {stderr}")]
    ExternalOperationFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn '{command}': {message}")]
    SpawnFailed { command: String, message: String },

    #[error("workspace setup failed: {message}")]
    WorkspaceFailed { message: String },

    #[error("commit hash resolution failed for {directory}: {message}")]
    CommitResolutionFailed { directory: String, message: String },

    #[error("instruction {id} is not initialized")]
    NotInitialized { id: String },
}

impl BuildError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

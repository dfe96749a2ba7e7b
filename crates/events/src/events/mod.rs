use serde::{Deserialize, Serialize};

// Declare all domain modules
pub mod build;
pub mod general;
pub mod publish;

// Re-export all domain events
pub use build::*;
pub use general::*;
pub use publish::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug logs)
    General(GeneralEvent),

    /// Build instruction events (validation, repo preparation, the queue)
    Build(BuildEvent),

    /// Publish pipeline events (the terminal cleanup steps)
    Publish(PublishEvent),
}

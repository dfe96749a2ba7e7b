use docbuild_types::InstructionState;
use serde::{Deserialize, Serialize};

/// Build instruction events for the orchestration state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// Request passed validation
    InstructionValidated { id: String },

    /// Request rejected before any resource acquisition
    InstructionRejected { id: String, reason: String },

    /// Stitched configuration document written and parsed for a target
    ConfigStitched { id: String, target: String },

    /// Controller is waiting for the per-remote resource lock
    RepoLockWait { id: String, resource: String },

    /// Per-remote resource lock acquired
    RepoLockAcquired { id: String, resource: String },

    /// Branch materialized into the instruction-private working directory
    RepoPrepared {
        id: String,
        remote: String,
        branch: String,
    },

    /// Commit hash of the checked-out branch resolved for provenance
    CommitResolved { id: String, commit: String },

    /// Work units generated and inserted into the open set
    DeliverablesGenerated { id: String, count: usize },

    /// A worker claimed a work unit
    DeliverableClaimed { id: String, deliverable: String },

    /// A worker reported a work unit finished (success or failure)
    DeliverableCompleted {
        id: String,
        deliverable: String,
        success: bool,
    },

    /// Both the open and building sets are empty; the instruction is
    /// eligible for the cleanup pipeline
    QueueDrained { id: String },

    /// State machine transition, for observability
    StateChanged {
        id: String,
        state: InstructionState,
    },
}

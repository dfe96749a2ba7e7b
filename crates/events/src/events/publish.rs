use serde::{Deserialize, Serialize};

/// Publish pipeline events for the terminal cleanup sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PublishEvent {
    /// A pipeline step started
    StepStarted {
        id: String,
        step: String,
        command: String,
    },

    /// A pipeline step finished successfully
    StepCompleted { id: String, step: String },

    /// A pipeline step exited non-zero; later steps still run
    StepFailed {
        id: String,
        step: String,
        command: String,
        exit_code: Option<i32>,
    },

    /// The whole pipeline body ran (exactly once per instruction)
    PipelineCompleted { id: String, steps: usize },

    /// Nothing was ever staged; the pipeline body had nothing to do
    PipelineSkipped { id: String },
}

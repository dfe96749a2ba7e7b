//! Event to tracing bridge
//!
//! Library crates never log directly; everything arrives on the event
//! channel and is converted here into structured tracing records.

use docbuild_events::{AppEvent, BuildEvent, GeneralEvent, PublishEvent};
use tracing::{debug, error, info, warn};

/// Log one event with structured fields at the appropriate level
pub fn log_event(event: &AppEvent) {
    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message } => {
                debug!("{message}");
            }
        },
        AppEvent::Build(build) => match build {
            BuildEvent::InstructionValidated { id } => {
                info!(id = %id, "build instruction validated");
            }
            BuildEvent::InstructionRejected { id, reason } => {
                warn!(id = %id, reason = %reason, "build instruction rejected");
            }
            BuildEvent::ConfigStitched { id, target } => {
                debug!(id = %id, target = %target, "configuration stitched");
            }
            BuildEvent::RepoLockWait { id, resource } => {
                debug!(id = %id, resource = %resource, "waiting for resource lock");
            }
            BuildEvent::RepoLockAcquired { id, resource } => {
                debug!(id = %id, resource = %resource, "resource lock acquired");
            }
            BuildEvent::RepoPrepared { id, remote, branch } => {
                info!(id = %id, remote = %remote, branch = %branch, "repository prepared");
            }
            BuildEvent::CommitResolved { id, commit } => {
                info!(id = %id, commit = %commit, "commit hash resolved");
            }
            BuildEvent::DeliverablesGenerated { id, count } => {
                info!(id = %id, count = count, "deliverables generated");
            }
            BuildEvent::DeliverableClaimed { id, deliverable } => {
                debug!(id = %id, deliverable = %deliverable, "deliverable claimed");
            }
            BuildEvent::DeliverableCompleted {
                id,
                deliverable,
                success,
            } => {
                if *success {
                    debug!(id = %id, deliverable = %deliverable, "deliverable built");
                } else {
                    warn!(id = %id, deliverable = %deliverable, "deliverable build failed");
                }
            }
            BuildEvent::QueueDrained { id } => {
                info!(id = %id, "all deliverables finished");
            }
            BuildEvent::StateChanged { id, state } => {
                debug!(id = %id, state = %state, "state changed");
            }
        },
        AppEvent::Publish(publish) => match publish {
            PublishEvent::StepStarted { id, step, command } => {
                debug!(id = %id, step = %step, command = %command, "cleanup step started");
            }
            PublishEvent::StepCompleted { id, step } => {
                debug!(id = %id, step = %step, "cleanup step completed");
            }
            PublishEvent::StepFailed {
                id,
                step,
                command,
                exit_code,
            } => {
                warn!(id = %id, step = %step, command = %command, exit_code = ?exit_code,
                    "cleanup step failed");
            }
            PublishEvent::PipelineCompleted { id, steps } => {
                info!(id = %id, steps = steps, "cleanup pipeline completed");
            }
            PublishEvent::PipelineSkipped { id } => {
                debug!(id = %id, "cleanup pipeline had nothing to do");
            }
        },
    }
}

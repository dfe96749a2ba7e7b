#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Build instruction orchestration for docbuild
//!
//! This crate owns one build request end-to-end: validation,
//! configuration resolution through the external stitch tool, repository
//! preparation under a per-remote resource lock, decomposition into
//! deliverable work units served to a worker pool, and the exactly-once
//! publish/cleanup pipeline that runs regardless of success or failure.

mod controller;
mod deliverable;
mod exec;
mod notify;
mod publish;
mod queue;
mod stitch;

pub use controller::BuildInstructionController;
pub use deliverable::{deliverable_id, BuildParam, Deliverable};
pub use exec::{CommandOutput, ExternalCommand};
pub use notify::{CommandMailer, Notification, Notifier, RecordingNotifier};
pub use queue::{Claim, DeliverableQueue};
pub use stitch::{DeliverableDef, ParamDef, ResolvedDocset, StitchedConfig};

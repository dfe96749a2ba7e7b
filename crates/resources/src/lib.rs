#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Resource locking for docbuild
//!
//! Named mutual exclusion shared across all concurrently running build
//! instructions. The canonical use is serializing repository preparation
//! per remote URL: two instructions resolving the same remote contend on
//! one lock, different remotes proceed fully in parallel.

pub mod lock;

pub use lock::{ResourceGuard, ResourceLockRegistry};

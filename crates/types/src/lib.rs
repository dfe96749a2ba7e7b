#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the docbuild orchestration service
//!
//! This crate provides fundamental types used throughout the system:
//! build requests, docset lifecycle classification, the instruction state
//! machine, and status snapshot types.

pub mod request;
pub mod snapshot;

// Re-export commonly used types
pub use request::BuildRequest;
pub use snapshot::{DeliverableStatus, DeliverableSummary, InstructionSnapshot};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Publication state of a docset, gating public visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Unpublished,
    Beta,
    Supported,
    Unsupported,
}

impl Lifecycle {
    /// Unpublished docsets may only appear on internal targets
    #[must_use]
    pub fn publishable_on(self, internal_target: bool) -> bool {
        !matches!(self, Self::Unpublished) || internal_target
    }

    /// Unsupported docsets receive only an archive, not a browsable copy
    #[must_use]
    pub fn browsable(self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unpublished => "unpublished",
            Self::Beta => "beta",
            Self::Supported => "supported",
            Self::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Lifecycle {
    type Err = docbuild_errors::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpublished" => Ok(Self::Unpublished),
            "beta" => Ok(Self::Beta),
            "supported" => Ok(Self::Supported),
            "unsupported" => Ok(Self::Unsupported),
            other => Err(docbuild_errors::ConfigError::Invalid {
                message: format!("unknown lifecycle '{other}'"),
            }),
        }
    }
}

/// Lifecycle phases of one build instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionState {
    Validating,
    ConfigResolving,
    RepoPreparing,
    Generating,
    Serving,
    Cleaning,
    Terminated,
    Aborted,
}

impl fmt::Display for InstructionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::ConfigResolving => "config_resolving",
            Self::RepoPreparing => "repo_preparing",
            Self::Generating => "generating",
            Self::Serving => "serving",
            Self::Cleaning => "cleaning",
            Self::Terminated => "terminated",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Canonicalize a logical resource name (usually a remote repository URL)
/// into a filesystem-safe string. Equal inputs always map to equal outputs,
/// so the result doubles as the mirror directory name and the resource lock
/// key for that remote.
#[must_use]
pub fn resource_to_filename(resource: &str) -> String {
    resource
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trip() {
        for s in ["unpublished", "beta", "supported", "unsupported"] {
            let l: Lifecycle = s.parse().unwrap();
            assert_eq!(l.to_string(), s);
        }
        assert!("retired".parse::<Lifecycle>().is_err());
    }

    #[test]
    fn lifecycle_policy_gates() {
        assert!(!Lifecycle::Unpublished.publishable_on(false));
        assert!(Lifecycle::Unpublished.publishable_on(true));
        assert!(Lifecycle::Beta.publishable_on(false));
        assert!(!Lifecycle::Unsupported.browsable());
        assert!(Lifecycle::Supported.browsable());
    }

    #[test]
    fn resource_filename_is_canonical() {
        let a = resource_to_filename("https://github.com/SUSE/doc-sle.git");
        let b = resource_to_filename("https://github.com/SUSE/doc-sle.git");
        assert_eq!(a, b);
        assert_eq!(a, "https___github.com_SUSE_doc-sle.git");
    }
}

//! Status snapshot types returned to API clients

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::request::BuildRequest;

/// Execution status of one deliverable work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableStatus {
    Open,
    Building,
    Success,
    Failed,
}

/// Bookkeeping summary of one deliverable, kept by the instruction after
/// the work unit itself has been handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableSummary {
    pub id: String,
    /// Source document identifier (DC file name)
    pub document: String,
    pub format: String,
    pub status: DeliverableStatus,
}

/// Point-in-time view of a build instruction: the original request
/// augmented with queue state and provenance.
///
/// The flattened request must carry an empty `deliverables` map; the
/// top-level `deliverables` field is the authoritative copy. Producers
/// empty the embedded map so the serialized form has exactly one
/// `deliverables` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionSnapshot {
    #[serde(flatten)]
    pub request: BuildRequest,
    /// Work-unit ids not yet claimed by a worker
    pub open: Vec<String>,
    /// Work-unit ids currently building
    pub building: Vec<String>,
    /// Per-deliverable summaries, id-keyed
    pub deliverables: HashMap<String, DeliverableSummary>,
    /// Commit hash of the materialized branch, once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_flattens_request() {
        let request: BuildRequest = serde_json::from_str(
            r#"{"id": "r1", "product": "sles", "docset": "15ga",
                "lang": "en", "target": "external"}"#,
        )
        .unwrap();
        let snap = InstructionSnapshot {
            request,
            open: vec!["a".into()],
            building: vec![],
            deliverables: HashMap::new(),
            commit: Some("deadbeef".into()),
        };
        let v: serde_json::Value = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["product"], "sles");
        assert_eq!(v["open"][0], "a");
        assert_eq!(v["commit"], "deadbeef");
    }
}

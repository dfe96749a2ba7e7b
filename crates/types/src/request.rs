//! Incoming build request contract

use docbuild_errors::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::snapshot::DeliverableSummary;

/// One request to build all deliverables for a
/// product/docset/language/target tuple.
///
/// Deserialized from the JSON mapping submitted by the API frontend:
/// `{"id": "...", "product": "sles", "docset": "15ga", "lang": "en",
///   "target": "external"}`. The `id` is opaque and used only for
/// logging and correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub id: String,
    pub product: String,
    pub docset: String,
    pub lang: String,
    pub target: String,
    /// Pre-populated deliverable summaries, carried over when a request
    /// is resubmitted with known state.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub deliverables: HashMap<String, DeliverableSummary>,
}

impl BuildRequest {
    /// Validate completeness of the request. Serde already enforces the
    /// string typing of every field; this rejects empty values, which the
    /// wire format cannot express as "missing".
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Rejected` naming the first empty field.
    pub fn validate(&self) -> Result<(), BuildError> {
        for (field, value) in [
            ("product", &self.product),
            ("docset", &self.docset),
            ("lang", &self.lang),
            ("target", &self.target),
        ] {
            if value.is_empty() {
                return Err(BuildError::rejected(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BuildRequest {
        serde_json::from_str(
            r#"{"id": "abc123", "product": "sles", "docset": "15ga",
                "lang": "en", "target": "external"}"#,
        )
        .unwrap()
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn empty_field_rejects() {
        let mut r = request();
        r.docset = String::new();
        let err = r.validate().unwrap_err();
        assert!(err.to_string().contains("docset"));
    }

    #[test]
    fn missing_field_fails_deserialization() {
        let r: Result<BuildRequest, _> =
            serde_json::from_str(r#"{"id": "x", "product": "sles", "lang": "en"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn non_string_field_fails_deserialization() {
        let r: Result<BuildRequest, _> = serde_json::from_str(
            r#"{"id": "x", "product": "sles", "docset": 15, "lang": "en", "target": "t"}"#,
        );
        assert!(r.is_err());
    }
}

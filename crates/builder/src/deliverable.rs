//! Deliverable work units
//!
//! One deliverable is one document+format combination to be produced. The
//! conversion itself is an external operation; this module only carries
//! the unit's identity and parameters and knows how to invoke the
//! converter.

use crate::exec::{CommandOutput, ExternalCommand};
use crate::stitch::ParamDef;
use docbuild_errors::BuildError;
use docbuild_types::{DeliverableStatus, DeliverableSummary};
use std::path::PathBuf;

/// Named build parameter forwarded to the converter
#[derive(Debug, Clone)]
pub struct BuildParam {
    pub name: String,
    pub value: String,
}

impl From<ParamDef> for BuildParam {
    fn from(def: ParamDef) -> Self {
        Self {
            name: def.name,
            value: def.value,
        }
    }
}

/// Deterministic work-unit identifier: a truncated content hash over the
/// source document, the output format, and a salt for documents that
/// expand into multiple subdeliverable sets.
#[must_use]
pub fn deliverable_id(document: &str, format: &str, salt: u32) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(document.as_bytes());
    hasher.update(b"\0");
    hasher.update(format.as_bytes());
    hasher.update(b"\0");
    hasher.update(&salt.to_le_bytes());
    hasher.finalize().to_hex()[..12].to_string()
}

/// One independently buildable unit, created and exclusively owned by its
/// build instruction until handed to a worker. Once handed out, the
/// instruction keeps only the id for bookkeeping.
#[derive(Debug, Clone)]
pub struct Deliverable {
    id: String,
    document: String,
    format: String,
    subdeliverables: Vec<String>,
    params: Vec<BuildParam>,
    /// Source tree of the checked-out branch (per-language subdirectory
    /// already applied)
    source_dir: PathBuf,
    /// Staging directory for this instruction's tuple
    output_dir: PathBuf,
    /// Directory of the external converter tool
    bin_dir: PathBuf,
}

impl Deliverable {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        document: String,
        format: String,
        subdeliverables: Vec<String>,
        params: Vec<BuildParam>,
        source_dir: PathBuf,
        output_dir: PathBuf,
        bin_dir: PathBuf,
        salt: u32,
    ) -> Self {
        Self {
            id: deliverable_id(&document, &format, salt),
            document,
            format,
            subdeliverables,
            params,
            source_dir,
            output_dir,
            bin_dir,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Converter invocation for this unit
    #[must_use]
    pub fn command(&self) -> ExternalCommand {
        let mut cmd = ExternalCommand::new(self.bin_dir.join("docbuild-convert"))
            .arg("--source-dir")
            .path_arg(&self.source_dir)
            .arg("--document")
            .arg(&self.document)
            .arg("--format")
            .arg(&self.format)
            .arg("--output-dir")
            .path_arg(&self.output_dir);
        for sub in &self.subdeliverables {
            cmd = cmd.arg("--subdeliverable").arg(sub);
        }
        for param in &self.params {
            cmd = cmd
                .arg("--param")
                .arg(format!("{}={}", param.name, param.value));
        }
        cmd
    }

    /// Run the external converter for this unit.
    ///
    /// A failed conversion is reported through the returned output, not as
    /// an error; the worker reports completion either way.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::SpawnFailed` when the converter cannot be
    /// started at all.
    pub async fn build(&self) -> Result<CommandOutput, BuildError> {
        self.command().run().await
    }

    /// Bookkeeping summary kept by the instruction
    #[must_use]
    pub fn summary(&self, status: DeliverableStatus) -> DeliverableSummary {
        DeliverableSummary {
            id: self.id.clone(),
            document: self.document.clone(),
            format: self.format.clone(),
            status,
        }
    }
}

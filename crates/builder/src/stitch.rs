//! Stitched configuration resolution
//!
//! The external stitch tool merges and validates the per-target XML
//! configuration directory into one simplified JSON document, written to a
//! shared per-target location so concurrent instructions for the same
//! target reuse it. This module runs the tool and answers the queries a
//! build instruction needs: maintainers, branch, remote, lifecycle,
//! per-language build subdirectory, and the deliverable definitions.

use crate::exec::ExternalCommand;
use docbuild_config::{Config, TargetConfig};
use docbuild_errors::{ConfigError, Error};
use docbuild_types::Lifecycle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One deliverable definition from the stitched configuration: a source
/// document with its enabled output formats, subdeliverables, and build
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableDef {
    /// Source document identifier (DC file name)
    pub dc: String,
    /// Format name to enabled flag; disabled formats produce no work unit
    #[serde(default)]
    pub formats: BTreeMap<String, bool>,
    #[serde(default)]
    pub subdeliverables: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LanguageDef {
    lang: String,
    branch: String,
    #[serde(default)]
    subdir: Option<String>,
    #[serde(default)]
    deliverables: Vec<DeliverableDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildDocsDef {
    remote: String,
    #[serde(default)]
    languages: Vec<LanguageDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct DocsetDef {
    setid: String,
    lifecycle: Lifecycle,
    builddocs: Option<BuildDocsDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductDef {
    productid: String,
    #[serde(default)]
    maintainers: Vec<String>,
    #[serde(default)]
    docsets: Vec<DocsetDef>,
}

/// Parsed stitched configuration document. Read-only; the controller
/// discards it right after work-unit generation to bound memory.
#[derive(Debug, Clone, Deserialize)]
pub struct StitchedConfig {
    #[serde(default)]
    products: Vec<ProductDef>,
}

/// Everything one build instruction extracts from the stitched document
#[derive(Debug, Clone)]
pub struct ResolvedDocset {
    pub maintainers: Vec<String>,
    pub branch: String,
    pub remote: String,
    pub lifecycle: Lifecycle,
    /// Per-language build subdirectory; falls back to the working-copy
    /// root when absent
    pub subdir: Option<String>,
    pub deliverables: Vec<DeliverableDef>,
}

impl StitchedConfig {
    /// Load and parse a stitched document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::StitchParseFailed` when the file cannot be
    /// read or is not a valid stitched document.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::StitchParseFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::StitchParseFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parse a stitched document from a string (used by tests and the
    /// load path).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::StitchParseFailed` on malformed input.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::StitchParseFailed {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Extract the per-instruction view for one
    /// product/docset/language combination.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingConfigPath` naming the first element
    /// of the query path that does not exist.
    pub fn resolve(
        &self,
        product: &str,
        docset: &str,
        lang: &str,
    ) -> Result<ResolvedDocset, ConfigError> {
        let missing = |what: &str| ConfigError::MissingConfigPath {
            what: what.to_string(),
            product: product.to_string(),
            docset: docset.to_string(),
            lang: lang.to_string(),
        };

        let product_def = self
            .products
            .iter()
            .find(|p| p.productid == product)
            .ok_or_else(|| missing("product"))?;
        let docset_def = product_def
            .docsets
            .iter()
            .find(|d| d.setid == docset)
            .ok_or_else(|| missing("docset"))?;
        let builddocs = docset_def.builddocs.as_ref().ok_or_else(|| missing("builddocs"))?;
        let language = builddocs
            .languages
            .iter()
            .find(|l| l.lang == lang)
            .ok_or_else(|| missing("language"))?;

        Ok(ResolvedDocset {
            maintainers: product_def.maintainers.clone(),
            branch: language.branch.clone(),
            remote: builddocs.remote.clone(),
            lifecycle: docset_def.lifecycle,
            subdir: language.subdir.clone(),
            deliverables: language.deliverables.clone(),
        })
    }
}

/// Command line for the external stitch tool, writing the simplified
/// document for `target` to `out_file`.
#[must_use]
pub fn stitch_command(
    config: &Config,
    target: &TargetConfig,
    out_file: &Path,
) -> ExternalCommand {
    ExternalCommand::new(config.server.bin_dir.join("docbuild-stitch"))
        .arg("--simplify")
        .arg("--revalidate-only")
        .arg(format!(
            "--valid-languages={}",
            config.server.valid_languages
        ))
        .path_arg(&target.config_dir)
        .path_arg(out_file)
}

/// Run the stitch tool for `target_name`, producing the shared per-target
/// stitched document, and parse it.
///
/// # Errors
///
/// Returns `ConfigError::StitchFailed` on non-zero tool exit (an operator
/// configuration issue; logged by the caller, never mailed) and parse
/// errors from [`StitchedConfig::load`].
pub async fn run_stitch(
    config: &Config,
    target_name: &str,
    target: &TargetConfig,
) -> Result<(StitchedConfig, PathBuf), Error> {
    let out_file = config.stitch_file(target_name);
    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ConfigError::ReadFailed {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
    }

    let output = stitch_command(config, target, &out_file).run().await?;
    if !output.success {
        return Err(ConfigError::StitchFailed {
            config_dir: target.config_dir.display().to_string(),
            stderr: output.stderr,
        }
        .into());
    }

    let stitched = StitchedConfig::load(&out_file).await?;
    Ok((stitched, out_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "products": [{
            "productid": "sles",
            "maintainers": ["docs@example.com", "owner@example.com"],
            "docsets": [{
                "setid": "15ga",
                "lifecycle": "supported",
                "builddocs": {
                    "remote": "https://github.com/SUSE/doc-sle.git",
                    "languages": [{
                        "lang": "en",
                        "branch": "maintenance/SLE15GA",
                        "subdir": "sle15",
                        "deliverables": [{
                            "dc": "DC-SLES-administration",
                            "formats": {"html": true, "pdf": true, "epub": false},
                            "subdeliverables": ["book-admin"],
                            "params": [{"name": "draft", "value": "no"}]
                        }]
                    }]
                }
            }]
        }]
    }"#;

    #[test]
    fn resolves_full_path() {
        let stitched = StitchedConfig::parse(SAMPLE).unwrap();
        let resolved = stitched.resolve("sles", "15ga", "en").unwrap();
        assert_eq!(resolved.branch, "maintenance/SLE15GA");
        assert_eq!(resolved.remote, "https://github.com/SUSE/doc-sle.git");
        assert_eq!(resolved.lifecycle, Lifecycle::Supported);
        assert_eq!(resolved.subdir.as_deref(), Some("sle15"));
        assert_eq!(resolved.maintainers.len(), 2);
        assert_eq!(resolved.deliverables.len(), 1);
        let def = &resolved.deliverables[0];
        assert_eq!(def.formats.values().filter(|v| **v).count(), 2);
    }

    #[test]
    fn missing_language_names_path_element() {
        let stitched = StitchedConfig::parse(SAMPLE).unwrap();
        let err = stitched.resolve("sles", "15ga", "de").unwrap_err();
        assert!(err.to_string().contains("language"));
        let err = stitched.resolve("caasp", "15ga", "en").unwrap_err();
        assert!(err.to_string().contains("product"));
    }

    #[test]
    fn malformed_document_fails_parse() {
        assert!(StitchedConfig::parse("{\"products\": 7}").is_err());
    }

    #[test]
    fn stitch_command_shape() {
        let config = Config::default();
        let target: TargetConfig = serde_json::from_value(serde_json::json!({
            "config_dir": "/etc/docbuild/external",
            "backup_path": "/b",
            "target_path": "/t",
            "template_dir": "/tpl"
        }))
        .unwrap();
        let cmd = stitch_command(&config, &target, Path::new("/tmp/out.json"));
        let display = cmd.display();
        assert!(display.contains("docbuild-stitch"));
        assert!(display.contains("--simplify"));
        assert!(display.contains("--valid-languages=en-us"));
        assert!(display.ends_with("/etc/docbuild/external /tmp/out.json"));
    }
}

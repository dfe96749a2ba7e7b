#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for docbuild
//!
//! This crate handles loading the server configuration from:
//! - Default values (hard-coded)
//! - Configuration file (/etc/docbuild/config.toml)
//! - Environment variables for the directory roots

use docbuild_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Publishing destinations, keyed by target name
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Server-wide settings shared by all build instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Instance name, used to namespace the deliverable cache
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Space-separated list of languages the stitch tool accepts
    #[serde(default = "default_valid_languages")]
    pub valid_languages: String,
    /// Shared local mirrors of remote repositories, one per remote
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,
    /// Instruction-private working copies are created under this root
    #[serde(default = "default_temp_repo_dir")]
    pub temp_repo_dir: PathBuf,
    /// Per-target stitched configuration documents land here
    #[serde(default = "default_stitch_tmp_dir")]
    pub stitch_tmp_dir: PathBuf,
    /// External helper tools (stitch, git-copy-branch, archive, navigation)
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,
    /// Static data shipped with the service (rsync excludes, templates)
    #[serde(default = "default_share_dir")]
    pub share_dir: PathBuf,
    /// Deliverable cache root, namespaced by server name and target
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Command used to deliver failure notifications; the message is
    /// piped to its stdin in sendmail format
    #[serde(default = "default_mail_command")]
    pub mail_command: String,
    /// Git binary used for read-only provenance queries
    #[serde(default = "default_git_command")]
    pub git_command: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            valid_languages: default_valid_languages(),
            repo_dir: default_repo_dir(),
            temp_repo_dir: default_temp_repo_dir(),
            stitch_tmp_dir: default_stitch_tmp_dir(),
            bin_dir: default_bin_dir(),
            share_dir: default_share_dir(),
            cache_dir: default_cache_dir(),
            mail_command: default_mail_command(),
            git_command: default_git_command(),
        }
    }
}

/// One named publishing destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Inactive targets reject all build instructions
    #[serde(default = "default_true")]
    pub active: bool,
    /// Internal targets may publish unpublished docsets
    #[serde(default)]
    pub internal: bool,
    /// Directory of XML configuration files fed to the stitch tool
    pub config_dir: PathBuf,
    /// Local staging mirror of the live tree
    pub backup_path: PathBuf,
    /// Live web server tree, mirrored from the backup path
    pub target_path: PathBuf,
    /// UI languages offered by the navigation pages, space-separated
    #[serde(default = "default_valid_languages")]
    pub languages: String,
    #[serde(default = "default_lang")]
    pub default_lang: String,
    /// Omit the default language from navigation URLs
    #[serde(default)]
    pub omit_default_lang_path: bool,
    /// Archive formats handed to the archive tool, space-separated
    #[serde(default = "default_zip_formats")]
    pub zip_formats: String,
    pub template_dir: PathBuf,
    #[serde(default = "default_server_base_path")]
    pub server_base_path: String,
    #[serde(default)]
    pub htaccess: PathBuf,
    #[serde(default)]
    pub favicon: PathBuf,
}

impl TargetConfig {
    /// Archive formats in the comma-separated form the archive tool expects
    #[must_use]
    pub fn zip_formats_csv(&self) -> String {
        self.zip_formats.replace(' ', ",")
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
        config.merge_env();
        Ok(config)
    }

    /// Load from the given path, or fall back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Self::load(path).await
        } else {
            let mut config = Self::default();
            config.merge_env();
            Ok(config)
        }
    }

    /// Apply `DOCBUILD_*` directory overrides from the environment
    pub fn merge_env(&mut self) {
        if let Ok(dir) = std::env::var("DOCBUILD_BIN_DIR") {
            self.server.bin_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DOCBUILD_SHARE_DIR") {
            self.server.share_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DOCBUILD_CACHE_DIR") {
            self.server.cache_dir = PathBuf::from(dir);
        }
    }

    /// Look up a target and enforce the active gate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTarget` for names not configured and
    /// `ConfigError::TargetInactive` for targets switched off.
    pub fn target(&self, name: &str) -> Result<&TargetConfig, ConfigError> {
        let target = self
            .targets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTarget {
                target: name.to_string(),
            })?;
        if !target.active {
            return Err(ConfigError::TargetInactive {
                target: name.to_string(),
            });
        }
        Ok(target)
    }

    /// Deliverable cache root for a target, namespaced by server name
    #[must_use]
    pub fn deliverable_cache_dir(&self, target: &str) -> PathBuf {
        self.server.cache_dir.join(&self.server.name).join(target)
    }

    /// Path of the shared stitched configuration document for a target
    #[must_use]
    pub fn stitch_file(&self, target: &str) -> PathBuf {
        self.server
            .stitch_tmp_dir
            .join(format!("productconfig_simplified_{target}.json"))
    }
}

fn default_true() -> bool {
    true
}

fn default_server_name() -> String {
    "docbuild".to_string()
}

fn default_valid_languages() -> String {
    "en-us".to_string()
}

fn default_lang() -> String {
    "en-us".to_string()
}

fn default_zip_formats() -> String {
    "html pdf".to_string()
}

fn default_server_base_path() -> String {
    "/".to_string()
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from("/var/lib/docbuild/repos")
}

fn default_temp_repo_dir() -> PathBuf {
    PathBuf::from("/var/tmp/docbuild/repos")
}

fn default_stitch_tmp_dir() -> PathBuf {
    PathBuf::from("/var/tmp/docbuild/stitch")
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("/usr/bin")
}

fn default_share_dir() -> PathBuf {
    PathBuf::from("/usr/share/docbuild")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/docbuild")
}

fn default_mail_command() -> String {
    "sendmail".to_string()
}

fn default_git_command() -> String {
    "git".to_string()
}

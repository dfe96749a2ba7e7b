//! Configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("unknown target '{target}'")]
    UnknownTarget { target: String },

    #[error("target '{target}' is not active")]
    TargetInactive { target: String },

    /// The stitch tool exited non-zero. Stitching failures are operator
    /// configuration issues; they are logged but never mailed.
    #[error("stitching of {config_dir} failed: {stderr}")]
    StitchFailed { config_dir: String, stderr: String },

    #[error("stitched config at {path} could not be parsed: {message}")]
    StitchParseFailed { path: String, message: String },

    /// A path the build instruction requires is absent from the stitched
    /// configuration (no such product/docset/language combination).
    #[error("stitched config has no {what} for {product}/{docset} ({lang})")]
    MissingConfigPath {
        what: String,
        product: String,
        docset: String,
        lang: String,
    },
}

//! Command line interface definition

use clap::Parser;
use std::path::PathBuf;

/// Documentation build orchestration service
#[derive(Debug, Parser)]
#[command(name = "docbuild", version, about)]
pub struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "DOCBUILD_CONFIG",
        default_value = "/etc/docbuild/config.toml"
    )]
    pub config: PathBuf,

    /// Worker tasks per build instruction
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Build request files (JSON), one instruction each; instructions
    /// run concurrently
    #[arg(required = true)]
    pub requests: Vec<PathBuf>,
}

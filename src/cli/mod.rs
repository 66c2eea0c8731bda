//! CLI support for pickaxe-lang
//!
//! Provides programmatic access to the `pickaxe` commands so other tools
//! can embed them.

mod convert;
mod run;

pub use convert::{table_to_json, value_to_json};
pub use run::{CheckResult, OutputFormat, RunOptions, execute_check, execute_run, render};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Script(#[from] crate::Error),

    #[error("could not start downloader: {0}")]
    Http(#[from] crate::DownloadError),

    #[error("could not write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No script provided. Pass a file name or pipe the script to stdin.")]
    NoInput,
}

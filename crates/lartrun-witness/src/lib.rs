#![doc = include_str!("../README.md")]

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub mod check;
pub mod document;
pub mod graphml;
pub mod hash;

pub use check::{check_witness, WitnessIssue};
pub use document::{WitnessContext, WitnessDocument, WitnessKind};

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("cannot hash program {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write witness {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Render `document` as GraphML and write it to `path`.
pub fn write_witness(document: &WitnessDocument, path: &Path) -> Result<(), WitnessError> {
    info!("Writing {} to {}...", document.kind(), path.display());
    fs::write(path, graphml::render(document)).map_err(|source| WitnessError::Write {
        path: path.to_path_buf(),
        source,
    })
}

//! Crate-level error type for extraction runs.
//!
//! Only two situations abort a run: a malformed index header and an
//! unusable output directory.  Every other kind is caught at the per-entry
//! boundary in the driver, logged, and skipped.

use std::path::PathBuf;

use thiserror::Error;

use crate::container::ContainerError;
use crate::index::IndexError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    /// Entry extent does not fit its assembled window.
    #[error("entry {entry} is malformed: {reason}")]
    EntryMalformed { entry: u32, reason: String },

    /// Output root missing and not creatable — fatal.
    #[error("output directory {path} is not usable: {source}")]
    OutputDir { path: PathBuf, source: std::io::Error },

    #[error("write failed for {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

//! Typed error taxonomy for the pipeline, per the error handling design.
//!
//! Fatal errors (`EnumerationError`, `EditorError`) propagate with `?` and
//! abort before any filesystem mutation happens. `ReconcileError` is
//! collected per-step by the executor instead of propagating, so one failed
//! rename never aborts the independent steps around it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("path contains a newline and cannot round-trip through the listing: {0:?}")]
    EmbeddedNewline(PathBuf),
    #[error("no such file or directory: {0:?}")]
    NotFound(PathBuf),
    #[error("failed to walk {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("failed to launch editor `{editor}`: {source}")]
    Spawn {
        editor: String,
        #[source]
        source: std::io::Error,
    },
    #[error("editor exited with a non-zero status")]
    NonZeroExit,
    #[error("editor I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-line problems in the edited listing. Never fatal on their own; the
/// parser collects these and the caller logs and discards them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    #[error("line {line_no} references id {id} which is not in the original listing; ignoring")]
    UnknownId { line_no: usize, id: u32 },
    #[error("line {line_no} has an empty path; ignoring")]
    EmptyPath { line_no: usize },
    #[error("line {line_no} could not be parsed: {reason}")]
    Malformed { line_no: usize, reason: String },
}

/// A single failed filesystem mutation. Collected by the executor; never
/// unwinds past the step that produced it.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to rename {from:?} -> {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("destination already exists, refusing to overwrite: {to:?}")]
    DestinationExists { to: PathBuf },
    #[error("failed to delete {path:?}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create directory {path:?}: {source}")]
    Mkdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stash {path:?} to {stash_path:?}: {source}")]
    Stash {
        path: PathBuf,
        stash_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "stashed file at {stash_path:?} could not be restored to {to:?}: {source}. \
         The file remains at its stash path and must be moved back manually."
    )]
    Unstash {
        stash_path: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum BumvError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("no usable lines remained after parsing the edited listing")]
    EmptyListing,
}

use std::path::PathBuf;

use thiserror::Error;

use crate::{BlockOffset, DocId};

/// Errors raised by the index stores and the engine.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("document {0} is already registered")]
    DuplicateDocument(DocId),

    #[error("document id {0} is reserved for empty posting slots")]
    ReservedId(DocId),

    #[error("store {} is unavailable: {reason}", .path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    /// `slot` is `None` when the next-block pointer could not be read.
    #[error("degraded read in posting block at offset {offset} (slot {slot:?})")]
    DegradedRead { offset: BlockOffset, slot: Option<usize> },

    #[error("posting chain starting at {head} revisits block {offset}")]
    CorruptChain { head: BlockOffset, offset: BlockOffset },

    #[error("posting block at offset {offset} holds invalid next pointer {value}")]
    InvalidPointer { offset: BlockOffset, value: i64 },

    #[error("incompatible index format: {0}")]
    IncompatibleFormat(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Errors the caller can report and move past; the index is left untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IndexError::DuplicateDocument(_) | IndexError::ReservedId(_))
    }
}

use std::{io, path::PathBuf};

/// Every failure inside the manifest engine. None of these are retried or
/// skipped; they abort the current manifest operation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("index type mismatch in {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("corrupt index data: {0}")]
    Corrupt(String),

    #[error("list {list_type}: copied {copied} bytes, expected {expected}")]
    SizeMismatch {
        list_type: u32,
        expected: u64,
        copied: u64,
    },

    #[error("record format error: {0}")]
    Format(String),

    #[error("list type {0} is not declared by this index")]
    UnknownList(u32),

    #[error("{side} manifest is not sorted: {current:?} follows {previous:?}")]
    Unsorted {
        side: &'static str,
        previous: String,
        current: String,
    },
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        IndexError::Corrupt(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        IndexError::Format(msg.into())
    }
}

//! Error types for property graph loading, mutation and persistence.

use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

/// Coarse classification of a [`GraphError`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfRange,
    Io,
    InvalidState,
    Corruption,
}

/// Errors returned by graph and store operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("property index {index} out of range (schema has {len} properties)")]
    OutOfRange { index: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("graph location already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("location {} holds a different graph", .0.display())]
    ForeignGraph(PathBuf),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("topology serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("graph failed validation: {0}")]
    Corruption(String),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::Io(_)
            | Self::AlreadyExists(_)
            | Self::ForeignGraph(_)
            | Self::Arrow(_)
            | Self::Bincode(_)
            | Self::Metadata(_) => ErrorKind::Io,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Corruption(_) => ErrorKind::Corruption,
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

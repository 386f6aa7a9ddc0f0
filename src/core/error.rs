//! Error type shared by the store, scanner and session

use std::path::PathBuf;

use thiserror::Error;

use super::node::NodeKind;

/// Failure of a single document tree operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("invalid name: {name:?}")]
    InvalidName { name: String },

    #[error("path escapes the notes root: {}", path.display())]
    InvalidPath { path: PathBuf },

    #[error("already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("{id} is a folder and has no content")]
    NotALeaf { id: String },

    #[error("no node with id {id}")]
    UnknownNode { id: String },

    #[error("no leaf is selected")]
    NoSelection,

    #[error("{id} is not the selected leaf")]
    NotSelected { id: String },

    #[error("content shape does not match a {kind} record")]
    ContentMismatch { kind: NodeKind },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("session worker is no longer running")]
    Worker,
}

impl StoreError {
    /// Wrap an I/O error, mapping `NotFound` onto the dedicated variant
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = StoreError::io(
            "a/b.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = StoreError::io(
            "a/b.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, StoreError::Io { .. }));
    }
}

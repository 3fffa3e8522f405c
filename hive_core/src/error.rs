use cid::Cid;
use std::path::{Path, PathBuf};

use crate::identifier::IdentifierError;
use crate::node::NodeKind;
use crate::store::StoreError;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Flat classification of every failure a core operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    InvalidIdentifier,
    InvalidPath,
    NotPinned,
    IndirectlyPinned,
    DeleteRejected,
    PartialDelete,
    PinFailed,
    UnsupportedNodeKind,
    MalformedEntry,
    DestinationError,
    Cancelled,
    DeadlineExceeded,
    RemoteError,
}

impl ErrorKind {
    /// Validation-class failures that a façade should report as a client
    /// error. Everything else is a server-side incident.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidInput
                | ErrorKind::InvalidIdentifier
                | ErrorKind::InvalidPath
                | ErrorKind::NotPinned
                | ErrorKind::IndirectlyPinned
                | ErrorKind::DeleteRejected
        )
    }
}

/// Error returned by every lifecycle operation.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid content identifier {identifier:?}: {source}")]
    InvalidIdentifier {
        identifier: String,
        #[source]
        source: IdentifierError,
    },

    #[error("invalid object path {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: IdentifierError,
    },

    #[error("object {path} is not pinned")]
    NotPinned { path: String },

    /// The object is only retained through another direct pin; removing a
    /// pin record would not remove the object.
    #[error("object {path} is pinned {detail}")]
    IndirectlyPinned { path: String, detail: String },

    #[error("refused to delete {path}: {source}")]
    DeleteRejected {
        path: String,
        #[source]
        source: Box<CoreError>,
    },

    /// The pin was removed but the collection pass failed; the bytes may
    /// still occupy the store until a later collection.
    #[error("unpinned {path} but garbage collection failed: {source}")]
    PartialDelete {
        path: String,
        #[source]
        source: Box<CoreError>,
    },

    /// The content was stored as `root` but the pin step failed.
    #[error("stored {root} but failed to pin it as {name:?}: {source}")]
    PinFailed {
        root: Cid,
        name: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("unsupported node kind: {kind}")]
    UnsupportedNodeKind { kind: NodeKind },

    #[error("malformed entry: {0}")]
    MalformedEntry(String),

    #[error("cannot write {}: {source}", .path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A materialization failure with the offending entry's path relative
    /// to the destination root.
    #[error("failed to materialize {}: {source}", .path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: Box<CoreError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("remote store error: {0}")]
    Remote(#[source] StoreError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::InvalidIdentifier { .. } => ErrorKind::InvalidIdentifier,
            CoreError::InvalidPath { .. } => ErrorKind::InvalidPath,
            CoreError::NotPinned { .. } => ErrorKind::NotPinned,
            CoreError::IndirectlyPinned { .. } => ErrorKind::IndirectlyPinned,
            CoreError::DeleteRejected { .. } => ErrorKind::DeleteRejected,
            CoreError::PartialDelete { .. } => ErrorKind::PartialDelete,
            CoreError::PinFailed { .. } => ErrorKind::PinFailed,
            CoreError::UnsupportedNodeKind { .. } => ErrorKind::UnsupportedNodeKind,
            CoreError::MalformedEntry(_) => ErrorKind::MalformedEntry,
            CoreError::Destination { .. } => ErrorKind::DestinationError,
            CoreError::Materialize { source, .. } => source.kind(),
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            CoreError::Remote(_) => ErrorKind::RemoteError,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind().is_client_error()
    }

    /// Relative path of the entry a materialization failed on.
    pub fn entry_path(&self) -> Option<&Path> {
        match self {
            CoreError::Materialize { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Attaches the path of the entry being materialized. An error that
    /// already carries a path keeps it.
    pub fn at_entry(self, path: impl Into<PathBuf>) -> Self {
        match self {
            err @ CoreError::Materialize { .. } => err,
            err => CoreError::Materialize {
                path: path.into(),
                source: Box::new(err),
            },
        }
    }

    pub fn invalid_identifier(identifier: &str, source: IdentifierError) -> Self {
        CoreError::InvalidIdentifier {
            identifier: identifier.to_owned(),
            source,
        }
    }

    pub fn invalid_path(path: &str, source: IdentifierError) -> Self {
        CoreError::InvalidPath {
            path: path.to_owned(),
            source,
        }
    }

    pub fn destination(path: &Path, source: std::io::Error) -> Self {
        CoreError::Destination {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(what),
            StoreError::Malformed(what) => CoreError::MalformedEntry(what),
            StoreError::Cancelled => CoreError::Cancelled,
            StoreError::DeadlineExceeded => CoreError::DeadlineExceeded,
            other => CoreError::Remote(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_client_errors() {
        assert!(CoreError::InvalidInput("x".into()).is_client_error());
        assert!(CoreError::NotPinned { path: "p".into() }.is_client_error());
        assert!(
            CoreError::IndirectlyPinned {
                path: "p".into(),
                detail: "indirect through x".into()
            }
            .is_client_error()
        );
        let rejected = CoreError::DeleteRejected {
            path: "p".into(),
            source: Box::new(CoreError::NotPinned { path: "p".into() }),
        };
        assert!(rejected.is_client_error());
    }

    #[test]
    fn test_incidents_are_server_errors() {
        assert!(!CoreError::Cancelled.is_client_error());
        assert!(!CoreError::NotFound("x".into()).is_client_error());
        let remote: CoreError = StoreError::Other(anyhow::anyhow!("boom")).into();
        assert_eq!(remote.kind(), ErrorKind::RemoteError);
        assert!(!remote.is_client_error());
    }

    #[test]
    fn test_entry_path_is_kept_and_kind_is_transparent() {
        let err = CoreError::UnsupportedNodeKind {
            kind: NodeKind::Symlink,
        }
        .at_entry("a/b")
        .at_entry("ignored");
        assert_eq!(err.entry_path(), Some(Path::new("a/b")));
        assert_eq!(err.kind(), ErrorKind::UnsupportedNodeKind);
        assert_eq!(
            err.to_string(),
            "failed to materialize a/b: unsupported node kind: symlink"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let err: CoreError = StoreError::Malformed("bad line".into()).into();
        assert_eq!(err.kind(), ErrorKind::MalformedEntry);
        let err: CoreError = StoreError::DeadlineExceeded.into();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }
}

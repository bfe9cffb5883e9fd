//! Error taxonomy shared across the crate.
//!
//! Every externally surfaced error carries a stable machine-readable category
//! (see [`Error::category`]) so automated callers can branch on it without
//! parsing prose, plus whatever structured context was available (file path,
//! line number).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store failed integrity check: {detail}")]
    Corrupt { detail: String },

    /// Another process holds the write lock and the busy timeout elapsed.
    #[error("store is locked by another writer")]
    Busy,

    #[error("source unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("no such {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable category string, preserved end-to-end for automated callers.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Open { .. } => "open_failed",
            Error::Corrupt { .. } => "corrupt",
            Error::Busy => "locked",
            Error::SourceUnreadable { .. } => "source_unreadable",
            Error::InvalidQuery(_) => "invalid_query",
            Error::NotFound { .. } => "not_found",
            Error::Storage(_) => "storage",
            Error::Io(_) => "io",
        }
    }

    /// User errors get exit code 2; everything else is internal (exit 1).
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidQuery(_) | Error::NotFound { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => Error::Busy,
            _ => Error::Storage(e),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable() {
        assert_eq!(Error::Busy.category(), "locked");
        assert_eq!(
            Error::InvalidQuery("empty".into()).category(),
            "invalid_query"
        );
        assert_eq!(
            Error::NotFound {
                kind: "session",
                id: "abc".into()
            }
            .category(),
            "not_found"
        );
    }

    #[test]
    fn user_errors_distinguished_from_internal() {
        assert!(Error::InvalidQuery("x".into()).is_user_error());
        assert!(!Error::Busy.is_user_error());
        assert!(!Error::Corrupt {
            detail: "bad page".into()
        }
        .is_user_error());
    }
}

//! Error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Errors returned by resolver operations.
///
/// Only startup surfaces these to the caller. Reconciliation logs them
/// per item and keeps going.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Filesystem I/O failed (typically `PermissionDenied` on `/etc/resolver/`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A resolver file could not be parsed.
    #[error("{file} line {line}: {problem}")]
    Parse {
        /// File being parsed.
        file: String,
        /// 1-based line number of the offending line.
        line: usize,
        /// What was wrong with it.
        problem: ParseProblem,
    },

    /// The resolver directory does not exist and could not be created.
    #[error("cannot create resolver directory {}: {source}", .path.display())]
    DirCreate {
        /// The expected path.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The primary resolver file could not be written at startup.
    #[error("cannot write initial resolver file {}: {source}", .path.display())]
    InitialWrite {
        /// The primary file path.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// The DNS listener could not report its address or failed to start.
    #[error("DNS listener error: {0}")]
    Listener(std::io::Error),

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// The specific problem found on a resolver file line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseProblem {
    /// A key with no value fields.
    #[error("{0:?} must have a value")]
    MissingValue(String),

    /// A single-valued key with more than one value.
    #[error("{0:?} must have exactly one value")]
    TooManyValues(String),

    /// `port` value is not an integer in range.
    #[error("{0:?} is not a valid integer")]
    InvalidInteger(String),

    /// `nameserver` value is not an IP literal.
    #[error("value {value:?} for {key:?} is not a valid IP")]
    InvalidIp {
        /// The key (always `nameserver`).
        key: String,
        /// The rejected value.
        value: String,
    },

    /// Unknown key.
    #[error("{0:?} is not a recognized key")]
    UnknownKey(String),

    /// The file ended without a `port` line.
    #[error("\"port\" is required")]
    MissingPort,
}

impl ResolverError {
    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.io_kind() == Some(std::io::ErrorKind::PermissionDenied)
    }

    /// Returns `true` if the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(std::io::ErrorKind::NotFound)
    }

    fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io(e)
            | Self::Listener(e)
            | Self::DirCreate { source: e, .. }
            | Self::InitialWrite { source: e, .. } => Some(e.kind()),
            Self::Parse { .. } | Self::InvalidConfig(_) => None,
        }
    }
}

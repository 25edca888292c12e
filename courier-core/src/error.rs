//! Error types for courier-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the store ports and their adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A lookup by id found nothing.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A write would break a store invariant (duplicate id, version order, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The blocking task serving a port call panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Classification of a failed git operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitErrorKind {
    /// Credentials rejected or permission denied. Terminal.
    Auth,
    /// The branch moved underneath the write.
    Conflict,
    /// Transport failure.
    Network,
    /// The per-target deadline elapsed.
    Timeout,
}

impl fmt::Display for GitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitErrorKind::Auth => write!(f, "auth"),
            GitErrorKind::Conflict => write!(f, "conflict"),
            GitErrorKind::Network => write!(f, "network"),
            GitErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// A failed git operation, scoped to one target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("git {kind} error: {message}")]
pub struct GitError {
    pub kind: GitErrorKind,
    pub message: String,
}

impl GitError {
    pub fn new(kind: GitErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(GitErrorKind::Auth, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(GitErrorKind::Conflict, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GitErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GitErrorKind::Timeout, message)
    }

    /// Transient failures a caller may choose to retry. The core never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, GitErrorKind::Network | GitErrorKind::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_git_errors_are_retryable() {
        assert!(GitError::network("reset").is_retryable());
        assert!(GitError::timeout("60s").is_retryable());
        assert!(!GitError::auth("denied").is_retryable());
        assert!(!GitError::conflict("moved").is_retryable());
    }

    #[test]
    fn git_error_message_names_kind() {
        let err = GitError::auth("token expired");
        assert_eq!(err.to_string(), "git auth error: token expired");
    }

    #[test]
    fn not_found_message() {
        let err = StoreError::not_found("target", "t-9");
        assert_eq!(err.to_string(), "target 't-9' not found");
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(StoreError::HomeNotFound.to_string().contains("home directory"));
    }
}

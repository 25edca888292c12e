//! Error types for courier-sync.

use std::path::PathBuf;

use thiserror::Error;

use courier_core::error::{GitError, StoreError};
use courier_core::types::{ArtifactVersionId, TargetId};
use courier_renderer::RenderError;

/// A request rejected before any git I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty request: at least one target and one artifact or removal are required")]
    EmptyRequest,

    #[error("target '{0}' not found")]
    UnknownTarget(TargetId),

    #[error("artifact version '{0}' not found")]
    UnknownArtifactVersion(ArtifactVersionId),
}

/// Errors that fail a whole `publish`/`preview`/`overview` call.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A store read failed outside any single target's pipeline.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Planning a preview for one target failed.
    #[error("target '{target_id}': {failure}")]
    Target {
        target_id: TargetId,
        #[source]
        failure: TargetFailure,
    },
}

/// Why one target's pipeline did not produce a recorded deployment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetFailure {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error("render error: {0}")]
    Render(String),

    #[error("store error: {0}")]
    Store(String),

    /// The pipeline task panicked or was cancelled.
    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

impl From<RenderError> for TargetFailure {
    fn from(err: RenderError) -> Self {
        TargetFailure::Render(err.to_string())
    }
}

impl From<StoreError> for TargetFailure {
    fn from(err: StoreError) -> Self {
        TargetFailure::Store(err.to_string())
    }
}

/// Errors of the local checkout gateway, before mapping to [`GitError`].
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing path outside the checkout: {0}")]
    PathEscape(String),

    /// The caller stopped waiting before any file was written.
    #[error("commit cancelled before writing")]
    Cancelled,
}

/// Convenience constructor for [`CheckoutError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CheckoutError {
    CheckoutError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_failure_message_is_preserved() {
        let failure = TargetFailure::from(GitError::auth("bad token"));
        assert_eq!(failure.to_string(), "git auth error: bad token");
    }

    #[test]
    fn validation_wraps_transparently() {
        let err = PublishError::from(ValidationError::UnknownTarget(TargetId::from("t-9")));
        assert_eq!(err.to_string(), "target 't-9' not found");
    }
}

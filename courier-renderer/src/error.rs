//! Error types for courier-renderer.

use std::path::PathBuf;

use thiserror::Error;

use courier_core::types::RenderMode;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Template registration or parsing failed.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// A template failed while rendering one artifact for one mode.
    #[error("failed to render '{slug}' for {mode} with template {template}: {source}")]
    Section {
        slug: String,
        mode: RenderMode,
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

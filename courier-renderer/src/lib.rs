//! # courier-renderer
//!
//! Tera-based renderer that turns artifact versions into marker-ready file
//! sections for each [`RenderMode`](courier_core::types::RenderMode).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use courier_core::types::{ArtifactVersion, RenderMode};
//! use courier_renderer::{ContentRenderer, TemplateRenderer};
//!
//! fn render_all(version: &ArtifactVersion) {
//!     if let Ok(renderer) = TemplateRenderer::new() {
//!         for mode in RenderMode::all() {
//!             if let Ok(sections) = renderer.render(version, *mode) {
//!                 for section in sections {
//!                     println!("{} [{}]: {} bytes", section.file_path, section.section_key, section.content.len());
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::SectionContext;
pub use engine::{output_spec, ContentRenderer, OutputSpec, TemplateEngine, TemplateRenderer};
pub use error::RenderError;

//! Tera rendering engine: output layout per [`RenderMode`] and [`TemplateRenderer`].
//!
//! # Path mapping
//!
//! | Mode        | Recipe                                  | Standard                                      |
//! |-------------|-----------------------------------------|-----------------------------------------------|
//! | AGENTS_MD   | `AGENTS.md`                             | `AGENTS.md`                                   |
//! | CLAUDE      | `CLAUDE.md`                             | `CLAUDE.md`                                   |
//! | JUNIE       | `.junie/guidelines.md`                  | `.junie/guidelines.md`                        |
//! | GH_COPILOT  | `.github/copilot-instructions.md`       | `.github/copilot-instructions.md`             |
//! | CURSOR      | `.cursor/commands/packmind/<slug>.md`   | `.cursor/rules/packmind/standard-<slug>.mdc`  |
//! | PACKMIND    | `.packmind/commands/<slug>.md`          | `.packmind/standards/<slug>.md`               |
//!
//! Every output uses the artifact id as its section key, so shared files hold
//! one marker block per artifact even when a recipe and a standard share a slug.
//! CURSOR and PACKMIND outputs are dedicated: one file per artifact, written
//! whole so frontmatter stays on the first line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use courier_core::types::{ArtifactKind, ArtifactVersion, RenderMode, RenderedSection};

use crate::context::{normalize_line_endings, SectionContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_header.tera", include_str!("templates/_partials/header.tera")),
    ("shared/_provenance.tera", include_str!("templates/_partials/provenance.tera")),
    ("agents_md/agents.md.tera", include_str!("templates/agents.md.tera")),
    ("claude/claude.md.tera", include_str!("templates/claude.md.tera")),
    ("junie/guidelines.md.tera", include_str!("templates/junie.md.tera")),
    (
        "gh_copilot/copilot-instructions.md.tera",
        include_str!("templates/copilot.md.tera"),
    ),
    ("cursor/rule.mdc.tera", include_str!("templates/cursor_rule.mdc.tera")),
    ("cursor/command.md.tera", include_str!("templates/cursor_command.md.tera")),
    ("packmind/artifact.md.tera", include_str!("templates/packmind.md.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() && path.extension().and_then(|s| s.to_str()) == Some("tera") {
            out.push(path);
        }
    }
    Ok(())
}

/// `.tera` files under `dir`, keyed by their lowercased relative path.
fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();
    let mut templates = Vec::with_capacity(files.len());
    for path in files {
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (normalize_template_name(Path::new(name)), (*content).to_string()))
        .collect();
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            tracing::debug!(template = %name, "user template override");
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Output layout
// ---------------------------------------------------------------------------

/// Where one rendered artifact lands and which template produces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub template: &'static str,
    /// Repository-relative path, before target prefixing.
    pub file_path: String,
    /// The file holds this artifact alone.
    pub dedicated: bool,
}

/// Output layout of `kind`/`slug` under `mode`.
pub fn output_spec(mode: RenderMode, kind: ArtifactKind, slug: &str) -> OutputSpec {
    let (template, file_path) = match (mode, kind) {
        (RenderMode::AgentsMd, _) => ("agents_md/agents.md.tera", "AGENTS.md".to_string()),
        (RenderMode::Claude, _) => ("claude/claude.md.tera", "CLAUDE.md".to_string()),
        (RenderMode::Junie, _) => ("junie/guidelines.md.tera", ".junie/guidelines.md".to_string()),
        (RenderMode::GhCopilot, _) => (
            "gh_copilot/copilot-instructions.md.tera",
            ".github/copilot-instructions.md".to_string(),
        ),
        (RenderMode::Cursor, ArtifactKind::Recipe) => (
            "cursor/command.md.tera",
            format!(".cursor/commands/packmind/{slug}.md"),
        ),
        (RenderMode::Cursor, ArtifactKind::Standard) => (
            "cursor/rule.mdc.tera",
            format!(".cursor/rules/packmind/standard-{slug}.mdc"),
        ),
        (RenderMode::Packmind, ArtifactKind::Recipe) => (
            "packmind/artifact.md.tera",
            format!(".packmind/commands/{slug}.md"),
        ),
        (RenderMode::Packmind, ArtifactKind::Standard) => (
            "packmind/artifact.md.tera",
            format!(".packmind/standards/{slug}.md"),
        ),
    };
    let dedicated = matches!(mode, RenderMode::Cursor | RenderMode::Packmind);
    OutputSpec {
        template,
        file_path,
        dedicated,
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that replace embedded defaults
/// of the same relative name (e.g. `claude/claude.md.tera`).
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(TemplateEngine { tera: build_tera(user_template_dir)? })
    }

    /// Render `version` for `mode`. Output has LF line endings and no trailing
    /// whitespace.
    pub fn render(
        &self,
        version: &ArtifactVersion,
        mode: RenderMode,
    ) -> Result<Vec<RenderedSection>, RenderError> {
        let spec = output_spec(mode, version.kind, &version.slug);
        let ctx = SectionContext::new(version, mode).to_tera_context()?;
        let rendered = self
            .tera
            .render(spec.template, &ctx)
            .map_err(|source| RenderError::Section {
                slug: version.slug.clone(),
                mode,
                template: spec.template,
                source,
            })?;
        Ok(vec![RenderedSection {
            file_path: spec.file_path,
            section_key: version.artifact_id.to_string(),
            content: normalize_line_endings(&rendered).trim_end().to_string(),
            dedicated: spec.dedicated,
        }])
    }
}

// ---------------------------------------------------------------------------
// ContentRenderer
// ---------------------------------------------------------------------------

/// Turns one artifact version and one render mode into file sections.
pub trait ContentRenderer: Send + Sync {
    fn render(
        &self,
        version: &ArtifactVersion,
        mode: RenderMode,
    ) -> Result<Vec<RenderedSection>, RenderError>;
}

/// [`ContentRenderer`] over the embedded templates plus optional overrides.
///
/// Create once and reuse.
pub struct TemplateRenderer {
    engine: TemplateEngine,
}

impl TemplateRenderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_template_dir(None)
    }

    pub fn with_template_dir(dir: Option<&Path>) -> Result<Self, RenderError> {
        Ok(TemplateRenderer { engine: TemplateEngine::new(dir)? })
    }
}

impl ContentRenderer for TemplateRenderer {
    fn render(
        &self,
        version: &ArtifactVersion,
        mode: RenderMode,
    ) -> Result<Vec<RenderedSection>, RenderError> {
        self.engine.render(version, mode)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

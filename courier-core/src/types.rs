//! Domain types for artifact distribution.
//!
//! Repository-relative paths (`FileUpdate::path`, `RenderedSection::file_path`,
//! `Target::path`) are `String`s with forward slashes: they address files inside a
//! git tree, never the local filesystem.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Organization owning repositories, artifacts and render mode settings.
    OrganizationId
);
string_id!(
    /// Identity of a recipe or standard across all of its versions.
    ArtifactId
);
string_id!(
    /// Identity of one immutable artifact snapshot.
    ArtifactVersionId
);
string_id!(GitRepoId);
string_id!(TargetId);
string_id!(DeploymentId);
string_id!(
    /// Commit identifier returned by a git gateway.
    CommitId
);

impl DeploymentId {
    /// Fresh random deployment id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ---------------------------------------------------------------------------
// Render modes
// ---------------------------------------------------------------------------

/// Output convention an artifact is rendered for.
///
/// Declaration order is the canonical order: `Ord` is derived from it and every
/// normalized list of render modes is sorted by it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderMode {
    Packmind,
    AgentsMd,
    Claude,
    Cursor,
    GhCopilot,
    Junie,
}

impl RenderMode {
    /// All render modes in canonical order.
    pub fn all() -> &'static [RenderMode] {
        &[
            RenderMode::Packmind,
            RenderMode::AgentsMd,
            RenderMode::Claude,
            RenderMode::Cursor,
            RenderMode::GhCopilot,
            RenderMode::Junie,
        ]
    }

    /// Stable upper-snake name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Packmind => "PACKMIND",
            RenderMode::AgentsMd => "AGENTS_MD",
            RenderMode::Claude => "CLAUDE",
            RenderMode::Cursor => "CURSOR",
            RenderMode::GhCopilot => "GH_COPILOT",
            RenderMode::Junie => "JUNIE",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace('-', "_");
        RenderMode::all()
            .iter()
            .copied()
            .find(|mode| mode.as_str() == key)
            .ok_or_else(|| {
                let expected: Vec<&str> = RenderMode::all().iter().map(|m| m.as_str()).collect();
                format!(
                    "unknown render mode '{s}'; expected one of: {}",
                    expected.join(", ")
                )
            })
    }
}

/// Deduplicate and sort render modes into canonical order.
///
/// Two inputs holding the same modes in any order and multiplicity produce the
/// same output, so the result can be embedded in commits and records as-is.
pub fn normalize_render_modes<I>(modes: I) -> Vec<RenderMode>
where
    I: IntoIterator<Item = RenderMode>,
{
    modes.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Per-organization render mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderModeConfiguration {
    pub organization_id: OrganizationId,
    pub active_render_modes: Vec<RenderMode>,
}

impl RenderModeConfiguration {
    /// Build a configuration with normalized modes.
    pub fn new<I>(organization_id: OrganizationId, modes: I) -> Self
    where
        I: IntoIterator<Item = RenderMode>,
    {
        Self {
            organization_id,
            active_render_modes: normalize_render_modes(modes),
        }
    }

    /// Re-apply normalization, e.g. after deserializing a hand-edited file.
    pub fn normalized(self) -> Self {
        Self::new(self.organization_id, self.active_render_modes)
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Kind of knowledge artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Recipe,
    Standard,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Recipe => write!(f, "recipe"),
            ArtifactKind::Standard => write!(f, "standard"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "recipe" => Ok(ArtifactKind::Recipe),
            "standard" => Ok(ArtifactKind::Standard),
            other => Err(format!(
                "unknown artifact kind '{other}'; expected: recipe, standard"
            )),
        }
    }
}

/// Immutable snapshot of an artifact.
///
/// `version` strictly increases per `artifact_id`, starting at 1. `slug` is the
/// section key the artifact occupies in rendered files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub id: ArtifactVersionId,
    pub artifact_id: ArtifactId,
    pub organization_id: OrganizationId,
    pub kind: ArtifactKind,
    pub slug: String,
    pub name: String,
    pub version: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Repositories and targets
// ---------------------------------------------------------------------------

/// A remote git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRepo {
    pub id: GitRepoId,
    pub organization_id: OrganizationId,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl GitRepo {
    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A deployable location: the repository root or a sub-path of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub git_repo_id: GitRepoId,
    pub name: String,
    /// `/` for the repository root, otherwise e.g. `/services/api`.
    pub path: String,
}

impl Target {
    /// Prefix a repository-relative file path with this target's path.
    ///
    /// `"/"` leaves the path untouched; `"/backend/"` turns `AGENTS.md` into
    /// `backend/AGENTS.md`.
    pub fn prefixed_path(&self, file_path: &str) -> String {
        let prefix = self.path.trim_matches('/');
        let file_path = file_path.trim_start_matches('/');
        if prefix.is_empty() {
            file_path.to_string()
        } else {
            format!("{prefix}/{file_path}")
        }
    }
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

/// Outcome recorded on a deployment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Pending => write!(f, "pending"),
            DeploymentStatus::Succeeded => write!(f, "succeeded"),
            DeploymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Durable record of one publish outcome for one target. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub organization_id: OrganizationId,
    pub target_id: TargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit_id: Option<CommitId>,
    #[serde(default)]
    pub deployed_artifact_version_ids: Vec<ArtifactVersionId>,
    #[serde(default)]
    pub render_modes: Vec<RenderMode>,
    pub status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    /// A successful deployment pinned to `commit`.
    pub fn succeeded(
        organization_id: OrganizationId,
        target_id: TargetId,
        commit: CommitId,
        deployed_artifact_version_ids: Vec<ArtifactVersionId>,
        render_modes: Vec<RenderMode>,
        commit_message: Option<String>,
    ) -> Self {
        Self {
            id: DeploymentId::generate(),
            organization_id,
            target_id,
            git_commit_id: Some(commit),
            deployed_artifact_version_ids,
            render_modes,
            status: DeploymentStatus::Succeeded,
            error: None,
            commit_message,
            created_at: Utc::now(),
        }
    }

    /// A failed deployment carrying the attempted artifact set.
    pub fn failed(
        organization_id: OrganizationId,
        target_id: TargetId,
        deployed_artifact_version_ids: Vec<ArtifactVersionId>,
        render_modes: Vec<RenderMode>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: DeploymentId::generate(),
            organization_id,
            target_id,
            git_commit_id: None,
            deployed_artifact_version_ids,
            render_modes,
            status: DeploymentStatus::Failed,
            error: Some(error.into()),
            commit_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == DeploymentStatus::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Rendering and merge payloads
// ---------------------------------------------------------------------------

/// A marker-delimited block destined for one file. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSection {
    pub key: String,
    pub content: String,
}

impl FileSection {
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }
}

/// One output of rendering an artifact version for a render mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSection {
    pub file_path: String,
    pub section_key: String,
    pub content: String,
    /// The file holds this artifact alone. It is written whole, without
    /// markers, and deleted when the artifact or its render mode goes away.
    #[serde(default)]
    pub dedicated: bool,
}

/// Full content of one file in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub path: String,
    pub content: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

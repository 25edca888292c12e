//! Collaborator interfaces consumed by the deployment engine.
//!
//! All ports are async and backend-agnostic. [`crate::memory`] provides in-memory
//! implementations, [`crate::store::FileStore`] a YAML-backed one.

use async_trait::async_trait;

use crate::error::{GitError, StoreError};
use crate::types::{
    ArtifactId, ArtifactVersion, ArtifactVersionId, CommitId, Deployment, FileUpdate, GitRepo,
    GitRepoId, OrganizationId, RenderModeConfiguration, Target, TargetId,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to immutable artifact versions.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Newest version of `artifact`. `StoreError::NotFound` if the artifact has none.
    async fn latest_version(&self, artifact: &ArtifactId) -> StoreResult<ArtifactVersion>;

    /// A specific version by id.
    async fn version(&self, id: &ArtifactVersionId) -> StoreResult<ArtifactVersion>;

    /// Newest version of every artifact in the organization.
    async fn latest_versions(&self, organization: &OrganizationId)
        -> StoreResult<Vec<ArtifactVersion>>;
}

/// Deployment ledger. Rows are append-only.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Most recent `Succeeded` deployment for `target`, if any.
    async fn latest_successful(&self, target: &TargetId) -> StoreResult<Option<Deployment>>;

    /// Persist a new row and return it.
    async fn save(&self, deployment: Deployment) -> StoreResult<Deployment>;

    /// Every row for the organization, oldest first.
    async fn list_by_organization(&self, organization: &OrganizationId)
        -> StoreResult<Vec<Deployment>>;
}

/// Remote repository access.
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Current content of `path` on the repository branch, `None` if absent.
    async fn fetch_file(&self, repo: &GitRepo, path: &str) -> Result<Option<String>, GitError>;

    /// Write every file and delete every path in `deletions` in one atomic
    /// commit, and return its id. Deleting an absent path is not an error.
    ///
    /// `target_path` is the deployment target's path, for gateways that scope
    /// writes or logging to it; file paths are already prefixed.
    ///
    /// If the returned future is dropped, the commit must either not land or
    /// complete before any later call on the same repository observes it.
    async fn commit_files(
        &self,
        repo: &GitRepo,
        target_path: &str,
        files: &[FileUpdate],
        deletions: &[String],
        message: &str,
    ) -> Result<CommitId, GitError>;
}

/// Per-organization render mode settings.
#[async_trait]
pub trait RenderModeConfigStore: Send + Sync {
    async fn get(&self, organization: &OrganizationId)
        -> StoreResult<Option<RenderModeConfiguration>>;

    /// Insert or replace the organization's configuration.
    async fn put(&self, configuration: RenderModeConfiguration) -> StoreResult<()>;
}

/// Lookup of deployment targets and their repositories.
#[async_trait]
pub trait TargetCatalog: Send + Sync {
    async fn target(&self, id: &TargetId) -> StoreResult<Target>;

    async fn repo(&self, id: &GitRepoId) -> StoreResult<GitRepo>;

    async fn targets_by_organization(&self, organization: &OrganizationId)
        -> StoreResult<Vec<Target>>;

    async fn repos_by_organization(&self, organization: &OrganizationId)
        -> StoreResult<Vec<GitRepo>>;
}

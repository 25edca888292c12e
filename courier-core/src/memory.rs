//! In-memory implementations of every port.
//!
//! [`MemoryStore`] satisfies all store traits; [`MemoryGitGateway`] keeps one file
//! tree per repository and supports failure injection and artificial latency.
//! Rows are kept in insertion order, which stands in for chronological order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GitError, StoreError};
use crate::ports::{
    DeploymentStore, GitGateway, RenderModeConfigStore, StoreResult, TargetCatalog, VersionStore,
};
use crate::types::{
    ArtifactId, ArtifactVersion, ArtifactVersionId, CommitId, Deployment, FileUpdate, GitRepo,
    GitRepoId, OrganizationId, RenderModeConfiguration, Target, TargetId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    repos: Vec<GitRepo>,
    targets: Vec<Target>,
    versions: Vec<ArtifactVersion>,
    deployments: Vec<Deployment>,
    render_modes: HashMap<OrganizationId, RenderModeConfiguration>,
    fail_saves: bool,
}

/// In-memory store backed by plain vectors behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_repo(&self, repo: GitRepo) {
        lock(&self.state).repos.push(repo);
    }

    pub fn insert_target(&self, target: Target) {
        lock(&self.state).targets.push(target);
    }

    /// Add a version. Rejects a version number that is not above the artifact's
    /// current latest.
    pub fn insert_version(&self, version: ArtifactVersion) -> StoreResult<()> {
        let mut state = lock(&self.state);
        let current = state
            .versions
            .iter()
            .filter(|v| v.artifact_id == version.artifact_id)
            .map(|v| v.version)
            .max();
        if let Some(current) = current {
            if version.version <= current {
                return Err(StoreError::Conflict(format!(
                    "artifact '{}' already has version {current}; got {}",
                    version.artifact_id, version.version
                )));
            }
        }
        state.versions.push(version);
        Ok(())
    }

    /// Snapshot of every deployment row, oldest first.
    pub fn deployments(&self) -> Vec<Deployment> {
        lock(&self.state).deployments.clone()
    }

    /// Make every subsequent `save` fail.
    pub fn fail_saves(&self, fail: bool) {
        lock(&self.state).fail_saves = fail;
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn latest_version(&self, artifact: &ArtifactId) -> StoreResult<ArtifactVersion> {
        lock(&self.state)
            .versions
            .iter()
            .filter(|v| &v.artifact_id == artifact)
            .max_by_key(|v| v.version)
            .cloned()
            .ok_or_else(|| StoreError::not_found("artifact", artifact))
    }

    async fn version(&self, id: &ArtifactVersionId) -> StoreResult<ArtifactVersion> {
        lock(&self.state)
            .versions
            .iter()
            .find(|v| &v.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("artifact version", id))
    }

    async fn latest_versions(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<ArtifactVersion>> {
        let state = lock(&self.state);
        Ok(latest_per_artifact(
            state.versions.iter().filter(|v| &v.organization_id == organization),
        ))
    }
}

/// Keep the highest version of each artifact, sorted by slug then artifact id.
pub(crate) fn latest_per_artifact<'a>(
    versions: impl Iterator<Item = &'a ArtifactVersion>,
) -> Vec<ArtifactVersion> {
    let mut latest: BTreeMap<&ArtifactId, &ArtifactVersion> = BTreeMap::new();
    for version in versions {
        let entry = latest.entry(&version.artifact_id).or_insert(version);
        if version.version > entry.version {
            *entry = version;
        }
    }
    let mut out: Vec<ArtifactVersion> = latest.into_values().cloned().collect();
    out.sort_by(|a, b| a.slug.cmp(&b.slug).then_with(|| a.artifact_id.cmp(&b.artifact_id)));
    out
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn latest_successful(&self, target: &TargetId) -> StoreResult<Option<Deployment>> {
        Ok(lock(&self.state)
            .deployments
            .iter()
            .rev()
            .find(|d| &d.target_id == target && d.is_succeeded())
            .cloned())
    }

    async fn save(&self, deployment: Deployment) -> StoreResult<Deployment> {
        let mut state = lock(&self.state);
        if state.fail_saves {
            return Err(StoreError::Conflict(format!(
                "deployment ledger rejected write for target '{}'",
                deployment.target_id
            )));
        }
        state.deployments.push(deployment.clone());
        Ok(deployment)
    }

    async fn list_by_organization(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<Deployment>> {
        Ok(lock(&self.state)
            .deployments
            .iter()
            .filter(|d| &d.organization_id == organization)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RenderModeConfigStore for MemoryStore {
    async fn get(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Option<RenderModeConfiguration>> {
        Ok(lock(&self.state).render_modes.get(organization).cloned())
    }

    async fn put(&self, configuration: RenderModeConfiguration) -> StoreResult<()> {
        let configuration = configuration.normalized();
        lock(&self.state)
            .render_modes
            .insert(configuration.organization_id.clone(), configuration);
        Ok(())
    }
}

#[async_trait]
impl TargetCatalog for MemoryStore {
    async fn target(&self, id: &TargetId) -> StoreResult<Target> {
        lock(&self.state)
            .targets
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("target", id))
    }

    async fn repo(&self, id: &GitRepoId) -> StoreResult<GitRepo> {
        lock(&self.state)
            .repos
            .iter()
            .find(|r| &r.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("repository", id))
    }

    async fn targets_by_organization(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<Target>> {
        let state = lock(&self.state);
        Ok(state
            .targets
            .iter()
            .filter(|t| {
                state
                    .repos
                    .iter()
                    .any(|r| r.id == t.git_repo_id && &r.organization_id == organization)
            })
            .cloned()
            .collect())
    }

    async fn repos_by_organization(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<GitRepo>> {
        Ok(lock(&self.state)
            .repos
            .iter()
            .filter(|r| &r.organization_id == organization)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryGitGateway
// ---------------------------------------------------------------------------

/// A commit recorded by [`MemoryGitGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub id: CommitId,
    pub repo: GitRepoId,
    pub target_path: String,
    pub message: String,
    pub files: Vec<FileUpdate>,
    pub deletions: Vec<String>,
}

#[derive(Debug, Default)]
struct GatewayState {
    trees: HashMap<GitRepoId, BTreeMap<String, String>>,
    commits: Vec<RecordedCommit>,
    failures: HashMap<GitRepoId, GitError>,
    delay: Option<Duration>,
}

/// In-memory git remote: one file tree per repository, one entry per commit.
#[derive(Debug, Default)]
pub struct MemoryGitGateway {
    state: Mutex<GatewayState>,
}

impl MemoryGitGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every commit to `repo` fails with `error` until [`Self::clear_failure`].
    pub fn fail_commits(&self, repo: &GitRepoId, error: GitError) {
        lock(&self.state).failures.insert(repo.clone(), error);
    }

    pub fn clear_failure(&self, repo: &GitRepoId) {
        lock(&self.state).failures.remove(repo);
    }

    /// Sleep for `delay` before each commit.
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.state).delay = delay;
    }

    /// Seed or overwrite a file without recording a commit.
    pub fn put_file(&self, repo: &GitRepoId, path: &str, content: &str) {
        lock(&self.state)
            .trees
            .entry(repo.clone())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    pub fn file(&self, repo: &GitRepoId, path: &str) -> Option<String> {
        lock(&self.state)
            .trees
            .get(repo)
            .and_then(|tree| tree.get(path))
            .cloned()
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        lock(&self.state).commits.clone()
    }
}

#[async_trait]
impl GitGateway for MemoryGitGateway {
    async fn fetch_file(&self, repo: &GitRepo, path: &str) -> Result<Option<String>, GitError> {
        Ok(self.file(&repo.id, path))
    }

    async fn commit_files(
        &self,
        repo: &GitRepo,
        target_path: &str,
        files: &[FileUpdate],
        deletions: &[String],
        message: &str,
    ) -> Result<CommitId, GitError> {
        let delay = lock(&self.state).delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        if let Some(error) = state.failures.get(&repo.id) {
            return Err(error.clone());
        }
        let tree = state.trees.entry(repo.id.clone()).or_default();
        for file in files {
            tree.insert(file.path.clone(), file.content.clone());
        }
        for path in deletions {
            tree.remove(path);
        }
        let id = CommitId::from(format!("mem-{}", state.commits.len() + 1));
        state.commits.push(RecordedCommit {
            id: id.clone(),
            repo: repo.id.clone(),
            target_path: target_path.to_string(),
            message: message.to_string(),
            files: files.to_vec(),
            deletions: deletions.to_vec(),
        });
        Ok(id)
    }
}

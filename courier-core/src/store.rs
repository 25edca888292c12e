//! YAML-backed store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.courier/
//!   config.yaml               (optional, see crate::config)
//!   workspace.yaml            (repos, targets, artifact versions, render modes: 0600)
//!   deployments/
//!     <target_id>.yaml        (append-only ledger, one per target: 0600)
//! ```
//!
//! # API pattern
//!
//! Authoring helpers come in two forms:
//! - `fn_at(home: &Path, …)` takes an explicit home; tests use it with `TempDir`
//! - `fn(…)` resolves home from `dirs::home_dir()` and delegates to `_at`
//!
//! [`FileStore`] implements every store port over the same files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::memory::latest_per_artifact;
use crate::ports::{DeploymentStore, RenderModeConfigStore, StoreResult, TargetCatalog, VersionStore};
use crate::types::{
    ArtifactId, ArtifactKind, ArtifactVersion, ArtifactVersionId, Deployment, GitRepo, GitRepoId,
    OrganizationId, RenderMode, RenderModeConfiguration, Target, TargetId,
};

// ---------------------------------------------------------------------------
// 1. Documents and path helpers
// ---------------------------------------------------------------------------

/// Everything except deployments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub repos: Vec<GitRepo>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub artifact_versions: Vec<ArtifactVersion>,
    #[serde(default)]
    pub render_modes: Vec<RenderModeConfiguration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    #[serde(default)]
    deployments: Vec<Deployment>,
}

/// `<home>/.courier/`
pub fn courier_dir_at(home: &Path) -> PathBuf {
    home.join(".courier")
}

/// `<home>/.courier/workspace.yaml`
pub fn workspace_path_at(home: &Path) -> PathBuf {
    courier_dir_at(home).join("workspace.yaml")
}

/// `<home>/.courier/deployments/<target>.yaml`
pub fn ledger_path_at(home: &Path, target: &TargetId) -> PathBuf {
    let file: String = target
        .as_str()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    courier_dir_at(home)
        .join("deployments")
        .join(format!("{file}.yaml"))
}

/// Lowercase, with every run of non-alphanumerics collapsed to `-`.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// 2. Load / save
// ---------------------------------------------------------------------------

fn load_yaml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
fn save_yaml_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }
    let yaml = serde_yaml::to_string(value)?;
    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Load the workspace document. A missing file is an empty workspace.
pub fn load_workspace_at(home: &Path) -> Result<Workspace, StoreError> {
    load_yaml_or_default(&workspace_path_at(home))
}

pub fn save_workspace_at(home: &Path, workspace: &Workspace) -> Result<(), StoreError> {
    save_yaml_atomic(&workspace_path_at(home), workspace)
}

/// Every deployment recorded for `target`, oldest first.
pub fn load_deployments_at(home: &Path, target: &TargetId) -> Result<Vec<Deployment>, StoreError> {
    let ledger: Ledger = load_yaml_or_default(&ledger_path_at(home, target))?;
    Ok(ledger.deployments)
}

/// Append one row to the target's ledger.
pub fn append_deployment_at(home: &Path, deployment: &Deployment) -> Result<(), StoreError> {
    let path = ledger_path_at(home, &deployment.target_id);
    let mut ledger: Ledger = load_yaml_or_default(&path)?;
    ledger.deployments.push(deployment.clone());
    save_yaml_atomic(&path, &ledger)
}

// ---------------------------------------------------------------------------
// 3. Authoring helpers
// ---------------------------------------------------------------------------

/// Register `owner/repo`. The id is the slug of the full name.
pub fn add_repo_at(
    home: &Path,
    organization: OrganizationId,
    owner: &str,
    repo: &str,
    branch: &str,
) -> Result<GitRepo, StoreError> {
    let mut workspace = load_workspace_at(home)?;
    let id = GitRepoId::from(slugify(&format!("{owner}-{repo}")));
    if workspace.repos.iter().any(|r| r.id == id) {
        return Err(StoreError::Conflict(format!("repository '{id}' already exists")));
    }
    let git_repo = GitRepo {
        id,
        organization_id: organization,
        owner: owner.to_string(),
        repo: repo.to_string(),
        branch: branch.to_string(),
    };
    workspace.repos.push(git_repo.clone());
    save_workspace_at(home, &workspace)?;
    Ok(git_repo)
}

pub fn add_repo(
    organization: OrganizationId,
    owner: &str,
    repo: &str,
    branch: &str,
) -> Result<GitRepo, StoreError> {
    add_repo_at(&home()?, organization, owner, repo, branch)
}

/// Add a target to an existing repository. The id is `<repo id>-<slug of name>`.
pub fn add_target_at(
    home: &Path,
    repo: &GitRepoId,
    name: &str,
    path: &str,
) -> Result<Target, StoreError> {
    let mut workspace = load_workspace_at(home)?;
    if !workspace.repos.iter().any(|r| &r.id == repo) {
        return Err(StoreError::not_found("repository", repo));
    }
    let id = TargetId::from(format!("{repo}-{}", slugify(name)));
    if workspace.targets.iter().any(|t| t.id == id) {
        return Err(StoreError::Conflict(format!("target '{id}' already exists")));
    }
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let target = Target {
        id,
        git_repo_id: repo.clone(),
        name: name.to_string(),
        path,
    };
    workspace.targets.push(target.clone());
    save_workspace_at(home, &workspace)?;
    Ok(target)
}

pub fn add_target(repo: &GitRepoId, name: &str, path: &str) -> Result<Target, StoreError> {
    add_target_at(&home()?, repo, name, path)
}

/// Inputs for a new artifact version.
#[derive(Debug, Clone)]
pub struct NewArtifactVersion {
    pub organization: OrganizationId,
    pub slug: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub content: String,
}

/// Record the next version of the artifact identified by `slug`.
///
/// The first version is 1; later ones are the current maximum plus one.
pub fn add_artifact_version_at(
    home: &Path,
    new: NewArtifactVersion,
) -> Result<ArtifactVersion, StoreError> {
    let mut workspace = load_workspace_at(home)?;
    let slug = slugify(&new.slug);
    if slug.is_empty() {
        return Err(StoreError::Conflict(format!("'{}' is not a usable slug", new.slug)));
    }
    let artifact_id = ArtifactId::from(slug.clone());
    if let Some(existing) = workspace
        .artifact_versions
        .iter()
        .find(|v| v.artifact_id == artifact_id)
    {
        if existing.organization_id != new.organization {
            return Err(StoreError::Conflict(format!(
                "artifact '{artifact_id}' belongs to organization '{}'",
                existing.organization_id
            )));
        }
        if existing.kind != new.kind {
            return Err(StoreError::Conflict(format!(
                "artifact '{artifact_id}' is a {}, not a {}",
                existing.kind, new.kind
            )));
        }
    }
    let version = workspace
        .artifact_versions
        .iter()
        .filter(|v| v.artifact_id == artifact_id)
        .map(|v| v.version)
        .max()
        .unwrap_or(0)
        + 1;
    let artifact_version = ArtifactVersion {
        id: ArtifactVersionId::from(format!("{slug}-v{version}")),
        artifact_id,
        organization_id: new.organization,
        kind: new.kind,
        slug,
        name: new.name,
        version,
        content: new.content,
        created_at: Utc::now(),
    };
    workspace.artifact_versions.push(artifact_version.clone());
    save_workspace_at(home, &workspace)?;
    Ok(artifact_version)
}

pub fn add_artifact_version(new: NewArtifactVersion) -> Result<ArtifactVersion, StoreError> {
    add_artifact_version_at(&home()?, new)
}

/// Insert or replace the organization's render modes. Stored normalized.
pub fn set_render_modes_at(
    home: &Path,
    organization: OrganizationId,
    modes: Vec<RenderMode>,
) -> Result<RenderModeConfiguration, StoreError> {
    let mut workspace = load_workspace_at(home)?;
    let configuration = RenderModeConfiguration::new(organization, modes);
    workspace
        .render_modes
        .retain(|c| c.organization_id != configuration.organization_id);
    workspace.render_modes.push(configuration.clone());
    save_workspace_at(home, &workspace)?;
    Ok(configuration)
}

pub fn set_render_modes(
    organization: OrganizationId,
    modes: Vec<RenderMode>,
) -> Result<RenderModeConfiguration, StoreError> {
    set_render_modes_at(&home()?, organization, modes)
}

// ---------------------------------------------------------------------------
// 4. FileStore
// ---------------------------------------------------------------------------

/// Port implementation over the files under `<home>/.courier/`.
///
/// Port calls run their file I/O on tokio's blocking pool. Writes go through
/// an internal mutex so concurrent pipelines appending to ledgers, or updating
/// the workspace, do not interleave read-modify-write cycles.
#[derive(Debug, Clone)]
pub struct FileStore {
    home: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store rooted at the user's home directory.
    pub fn open() -> Result<Self, StoreError> {
        Ok(Self::at(home()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn workspace(&self) -> Result<Workspace, StoreError> {
        load_workspace_at(&self.home)
    }

    /// Run `work` against the home directory on the blocking pool.
    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StoreResult<T> + Send + 'static,
    {
        let home = self.home.clone();
        tokio::task::spawn_blocking(move || work(&home))
            .await
            .map_err(|err| StoreError::Task(err.to_string()))?
    }

    /// Like [`Self::blocking`], holding the write lock for the duration.
    async fn blocking_write<T, F>(&self, work: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> StoreResult<T> + Send + 'static,
    {
        let write_lock = Arc::clone(&self.write_lock);
        self.blocking(move |home| {
            let _guard = write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            work(home)
        })
        .await
    }

    async fn load_workspace(&self) -> StoreResult<Workspace> {
        self.blocking(load_workspace_at).await
    }
}

#[async_trait]
impl VersionStore for FileStore {
    async fn latest_version(&self, artifact: &ArtifactId) -> StoreResult<ArtifactVersion> {
        self.load_workspace()
            .await?
            .artifact_versions
            .into_iter()
            .filter(|v| &v.artifact_id == artifact)
            .max_by_key(|v| v.version)
            .ok_or_else(|| StoreError::not_found("artifact", artifact))
    }

    async fn version(&self, id: &ArtifactVersionId) -> StoreResult<ArtifactVersion> {
        self.load_workspace()
            .await?
            .artifact_versions
            .into_iter()
            .find(|v| &v.id == id)
            .ok_or_else(|| StoreError::not_found("artifact version", id))
    }

    async fn latest_versions(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<ArtifactVersion>> {
        let workspace = self.load_workspace().await?;
        Ok(latest_per_artifact(
            workspace
                .artifact_versions
                .iter()
                .filter(|v| &v.organization_id == organization),
        ))
    }
}

#[async_trait]
impl DeploymentStore for FileStore {
    async fn latest_successful(&self, target: &TargetId) -> StoreResult<Option<Deployment>> {
        let target = target.clone();
        Ok(self
            .blocking(move |home| load_deployments_at(home, &target))
            .await?
            .into_iter()
            .rev()
            .find(Deployment::is_succeeded))
    }

    async fn save(&self, deployment: Deployment) -> StoreResult<Deployment> {
        let deployment = self
            .blocking_write(move |home| {
                append_deployment_at(home, &deployment)?;
                Ok(deployment)
            })
            .await?;
        tracing::debug!(
            deployment_id = %deployment.id,
            target_id = %deployment.target_id,
            status = %deployment.status,
            "deployment recorded"
        );
        Ok(deployment)
    }

    async fn list_by_organization(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<Deployment>> {
        let organization = organization.clone();
        self.blocking(move |home| {
            let workspace = load_workspace_at(home)?;
            let mut rows = Vec::new();
            for target in &workspace.targets {
                rows.extend(
                    load_deployments_at(home, &target.id)?
                        .into_iter()
                        .filter(|d| d.organization_id == organization),
                );
            }
            rows.sort_by_key(|d| d.created_at);
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl RenderModeConfigStore for FileStore {
    async fn get(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Option<RenderModeConfiguration>> {
        Ok(self
            .load_workspace()
            .await?
            .render_modes
            .into_iter()
            .find(|c| &c.organization_id == organization)
            .map(RenderModeConfiguration::normalized))
    }

    async fn put(&self, configuration: RenderModeConfiguration) -> StoreResult<()> {
        self.blocking_write(move |home| {
            set_render_modes_at(
                home,
                configuration.organization_id,
                configuration.active_render_modes,
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl TargetCatalog for FileStore {
    async fn target(&self, id: &TargetId) -> StoreResult<Target> {
        self.load_workspace()
            .await?
            .targets
            .into_iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::not_found("target", id))
    }

    async fn repo(&self, id: &GitRepoId) -> StoreResult<GitRepo> {
        self.load_workspace()
            .await?
            .repos
            .into_iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found("repository", id))
    }

    async fn targets_by_organization(
        &self,
        organization: &OrganizationId,
    ) -> StoreResult<Vec<Target>> {
        let workspace = self.load_workspace().await?;
        let repos = &workspace.repos;
        Ok(workspace
            .targets
            .iter()
            .filter(|t| {
                repos
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
        Ok(self
            .load_workspace()
            .await?
            .repos
            .into_iter()
            .filter(|r| &r.organization_id == organization)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// Create `dir` (mode `0700`) if it does not exist.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn make_home() -> TempDir {
        TempDir::new().expect("tempdir")
    }

    #[test]
    fn paths_are_correct() {
        let home = make_home();
        assert!(workspace_path_at(home.path()).ends_with(".courier/workspace.yaml"));
        assert!(ledger_path_at(home.path(), &TargetId::from("acme-api-root"))
            .ends_with(".courier/deployments/acme-api-root.yaml"));
    }

    #[rstest]
    #[case("Acme/API  Docs", "acme-api-docs")]
    #[case("--x--", "x")]
    #[case("error_handling", "error-handling")]
    #[case("v2.1", "v2-1")]
    fn slugify_collapses_separators(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(slugify(raw), expected);
    }

    #[test]
    fn missing_workspace_is_empty() {
        let home = make_home();
        let ws = load_workspace_at(home.path()).expect("load");
        assert_eq!(ws, Workspace::default());
    }

    #[test]
    fn courier_dir_created_with_perms() {
        let home = make_home();
        save_workspace_at(home.path(), &Workspace::default()).expect("save");
        let dir = courier_dir_at(home.path());
        assert!(dir.exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
            let file_mode = std::fs::metadata(workspace_path_at(home.path()))
                .unwrap()
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(file_mode, 0o600);
        }
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let home = make_home();
        save_workspace_at(home.path(), &Workspace::default()).expect("save");
        let tmp = workspace_path_at(home.path()).with_extension("yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after successful save");
    }

    #[test]
    fn artifact_versions_increment() {
        let home = make_home();
        let new = |content: &str| NewArtifactVersion {
            organization: OrganizationId::from("acme"),
            slug: "foo".into(),
            name: "Foo".into(),
            kind: ArtifactKind::Recipe,
            content: content.into(),
        };
        let v1 = add_artifact_version_at(home.path(), new("one")).expect("v1");
        let v2 = add_artifact_version_at(home.path(), new("two")).expect("v2");
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(v2.id.as_str(), "foo-v2");
        assert_eq!(v2.artifact_id, v1.artifact_id);
    }

    #[test]
    fn artifact_kind_cannot_change() {
        let home = make_home();
        let new = |kind| NewArtifactVersion {
            organization: OrganizationId::from("acme"),
            slug: "testing".into(),
            name: "Testing".into(),
            kind,
            content: "body".into(),
        };
        add_artifact_version_at(home.path(), new(ArtifactKind::Recipe)).expect("recipe");
        let err = add_artifact_version_at(home.path(), new(ArtifactKind::Standard)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let ws = load_workspace_at(home.path()).expect("load");
        assert_eq!(ws.artifact_versions.len(), 1);
        assert_eq!(ws.artifact_versions[0].kind, ArtifactKind::Recipe);
    }

    #[test]
    fn target_requires_existing_repo() {
        let home = make_home();
        let err = add_target_at(home.path(), &GitRepoId::from("nope"), "root", "/").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "repository", .. }));
    }

    #[test]
    fn duplicate_repo_is_conflict() {
        let home = make_home();
        let org = OrganizationId::from("acme");
        add_repo_at(home.path(), org.clone(), "acme", "api", "main").expect("first");
        let err = add_repo_at(home.path(), org, "acme", "api", "main").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn malformed_workspace_reports_path() {
        let home = make_home();
        let path = workspace_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "repos: [unclosed").unwrap();
        let err = load_workspace_at(home.path()).unwrap_err();
        match err {
            StoreError::Parse { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}

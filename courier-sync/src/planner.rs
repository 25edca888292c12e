//! Deployment planner: publishes artifact versions to deployment targets.
//!
//! ## Per-target pipeline
//!
//! 1. Load the target's latest successful deployment.
//! 2. Artifact set = (previous ∪ requested) − removals; a requested version
//!    replaces the previously deployed version of the same artifact.
//! 3. Resolve render modes (override > organization configuration > default).
//! 4. Render every (artifact version, render mode) pair.
//! 5. Group outputs by target-prefixed path and fetch current content. Shared
//!    files get their sections merged; dedicated files are replaced whole.
//!    Removed artifacts, and render modes dropped since the previous
//!    deployment, get empty sections in shared files and their dedicated
//!    files deleted.
//! 6. Commit every file and deletion in one commit, then record the deployment.
//!
//! Targets run as independent tokio tasks, bounded by a semaphore. Steps 1–6
//! for one target hold that target's async mutex, so publishes to the same
//! target are serialized. Steps 1–5 plus the commit run under the configured
//! timeout; recording the deployment does not. On timeout the pipeline future
//! is dropped; gateways keep their repository consistent for the next caller
//! (see [`GitGateway::commit_files`]).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

use courier_core::config::CourierConfig;
use courier_core::error::{GitError, StoreError};
use courier_core::events::{DeploymentCompleted, DeploymentFailed, EventBus};
use courier_core::ports::{
    DeploymentStore, GitGateway, RenderModeConfigStore, TargetCatalog, VersionStore,
};
use courier_core::types::{
    normalize_render_modes, ArtifactId, ArtifactVersion, ArtifactVersionId, CommitId, Deployment,
    DeploymentId, FileSection, FileUpdate, GitRepo, RenderMode, Target, TargetId,
};
use courier_renderer::ContentRenderer;

use crate::error::{PublishError, TargetFailure, ValidationError};
use crate::merge::merge;
use crate::resolver::RenderModeResolver;

// ---------------------------------------------------------------------------
// 1. Requests and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub targets: Vec<TargetId>,
    pub artifact_versions: Vec<ArtifactVersionId>,
    /// Replaces the organization's render modes for this call when non-empty.
    pub render_mode_override: Option<Vec<RenderMode>>,
    /// Artifacts to take off every requested target.
    pub removals: Vec<ArtifactId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Committed and recorded.
    Succeeded { deployment: Deployment },
    /// Nothing was committed. `deployment_id` is the failed row, if it could be saved.
    Failed {
        error: TargetFailure,
        deployment_id: Option<DeploymentId>,
    },
    /// The commit landed but the deployment row could not be saved. Publishing
    /// the same request again reconciles the ledger.
    Unrecorded { commit_id: CommitId, error: String },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPublishResult {
    pub target_id: TargetId,
    pub outcome: PublishOutcome,
}

/// Content of one file before and after a planned publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilePlan {
    pub path: String,
    pub before: String,
    pub after: String,
    /// The file is removed; `after` is empty.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl FilePlan {
    pub fn is_changed(&self) -> bool {
        self.deleted || self.before != self.after
    }
}

/// What a publish would write to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPreview {
    pub target_id: TargetId,
    pub commit_message: String,
    pub files: Vec<FilePlan>,
}

// ---------------------------------------------------------------------------
// 2. Ports bundle
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PlannerPorts {
    pub versions: Arc<dyn VersionStore>,
    pub deployments: Arc<dyn DeploymentStore>,
    pub render_modes: Arc<dyn RenderModeConfigStore>,
    pub catalog: Arc<dyn TargetCatalog>,
    pub git: Arc<dyn GitGateway>,
    pub renderer: Arc<dyn ContentRenderer>,
}

impl PlannerPorts {
    /// All store ports served by one backend.
    pub fn from_store<S>(
        store: Arc<S>,
        git: Arc<dyn GitGateway>,
        renderer: Arc<dyn ContentRenderer>,
    ) -> Self
    where
        S: VersionStore + DeploymentStore + RenderModeConfigStore + TargetCatalog + 'static,
    {
        Self {
            versions: store.clone(),
            deployments: store.clone(),
            render_modes: store.clone(),
            catalog: store,
            git,
            renderer,
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Planner
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share locks, permits and the event bus.
#[derive(Clone)]
pub struct DeploymentPlanner {
    inner: Arc<Inner>,
}

struct Inner {
    ports: PlannerPorts,
    resolver: RenderModeResolver,
    events: Arc<EventBus>,
    timeout: Duration,
    permits: Arc<Semaphore>,
    locks: Mutex<HashMap<TargetId, Arc<AsyncMutex<()>>>>,
}

/// Validated, deduplicated request shared by every target task.
struct ResolvedRequest {
    /// Newest requested version per artifact, sorted by slug.
    versions: Vec<ArtifactVersion>,
    removals: BTreeSet<ArtifactId>,
    render_mode_override: Option<Vec<RenderMode>>,
}

/// Artifact set and render modes a deployment row records.
struct Attempt {
    version_ids: Vec<ArtifactVersionId>,
    render_modes: Vec<RenderMode>,
}

struct TargetPlan {
    files: Vec<FilePlan>,
    commit_message: String,
    attempt: Attempt,
}

/// Rendered outputs of one target, grouped by prefixed path.
#[derive(Default)]
struct FileLayout {
    sections: BTreeMap<String, Vec<FileSection>>,
    dedicated: BTreeMap<String, String>,
    deletions: BTreeSet<String>,
}

impl ResolvedRequest {
    /// Used when a pipeline fails before its artifact set is known.
    fn fallback_attempt(&self) -> Attempt {
        Attempt {
            version_ids: self
                .versions
                .iter()
                .filter(|v| !self.removals.contains(&v.artifact_id))
                .map(|v| v.id.clone())
                .collect(),
            render_modes: self
                .render_mode_override
                .clone()
                .map(normalize_render_modes)
                .unwrap_or_default(),
        }
    }
}

impl DeploymentPlanner {
    pub fn new(ports: PlannerPorts, config: &CourierConfig) -> Self {
        Self::with_events(ports, config, Arc::new(EventBus::new()))
    }

    pub fn with_events(ports: PlannerPorts, config: &CourierConfig, events: Arc<EventBus>) -> Self {
        let resolver = RenderModeResolver::new(ports.render_modes.clone(), config.default_modes());
        Self {
            inner: Arc::new(Inner {
                ports,
                resolver,
                events,
                timeout: config.publish_timeout(),
                permits: Arc::new(Semaphore::new(config.parallelism())),
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Publish to every requested target and return one result per target, in
    /// request order.
    ///
    /// Fails as a whole only on validation or store errors detected before any
    /// git I/O; a failing target never fails the call.
    pub async fn publish(
        &self,
        request: PublishRequest,
    ) -> Result<Vec<TargetPublishResult>, PublishError> {
        let targets = self.inner.resolve_targets(&request).await?;
        let resolved = Arc::new(self.inner.resolve_request(&request).await?);
        tracing::info!(
            targets = targets.len(),
            artifacts = resolved.versions.len(),
            removals = resolved.removals.len(),
            "publish started"
        );

        let mut handles = Vec::with_capacity(targets.len());
        for (target, repo) in targets {
            let inner = Arc::clone(&self.inner);
            let resolved = Arc::clone(&resolved);
            let target_id = target.id.clone();
            let handle = tokio::spawn(async move {
                let _permit = Arc::clone(&inner.permits).acquire_owned().await.ok();
                inner.run_target(target, repo, &resolved).await
            });
            handles.push((target_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (target_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(target_id = %target_id, error = %err, "target pipeline aborted");
                    PublishOutcome::Failed {
                        error: TargetFailure::Aborted(err.to_string()),
                        deployment_id: None,
                    }
                }
            };
            results.push(TargetPublishResult { target_id, outcome });
        }
        Ok(results)
    }

    /// Run steps 1–5 for every requested target without committing or
    /// recording anything.
    pub async fn preview(&self, request: PublishRequest) -> Result<Vec<TargetPreview>, PublishError> {
        let targets = self.inner.resolve_targets(&request).await?;
        let resolved = self.inner.resolve_request(&request).await?;
        let mut previews = Vec::with_capacity(targets.len());
        for (target, repo) in targets {
            let plan = self
                .inner
                .plan(&target, &repo, &resolved)
                .await
                .map_err(|failure| PublishError::Target {
                    target_id: target.id.clone(),
                    failure,
                })?;
            previews.push(TargetPreview {
                target_id: target.id,
                commit_message: plan.commit_message,
                files: plan.files,
            });
        }
        Ok(previews)
    }
}

impl Inner {
    // -- validation ---------------------------------------------------------

    async fn resolve_targets(
        &self,
        request: &PublishRequest,
    ) -> Result<Vec<(Target, GitRepo)>, PublishError> {
        if request.targets.is_empty()
            || (request.artifact_versions.is_empty() && request.removals.is_empty())
        {
            return Err(ValidationError::EmptyRequest.into());
        }

        let mut targets = Vec::with_capacity(request.targets.len());
        for id in &request.targets {
            let target = match self.ports.catalog.target(id).await {
                Ok(target) => target,
                Err(StoreError::NotFound { .. }) => {
                    return Err(ValidationError::UnknownTarget(id.clone()).into())
                }
                Err(err) => return Err(err.into()),
            };
            let repo = self.ports.catalog.repo(&target.git_repo_id).await?;
            targets.push((target, repo));
        }
        Ok(targets)
    }

    async fn resolve_request(&self, request: &PublishRequest) -> Result<ResolvedRequest, PublishError> {
        let mut newest: BTreeMap<ArtifactId, ArtifactVersion> = BTreeMap::new();
        for id in &request.artifact_versions {
            let version = match self.ports.versions.version(id).await {
                Ok(version) => version,
                Err(StoreError::NotFound { .. }) => {
                    return Err(ValidationError::UnknownArtifactVersion(id.clone()).into())
                }
                Err(err) => return Err(err.into()),
            };
            match newest.get(&version.artifact_id) {
                Some(current) if current.version >= version.version => {}
                _ => {
                    newest.insert(version.artifact_id.clone(), version);
                }
            }
        }
        Ok(ResolvedRequest {
            versions: sorted_by_slug(newest.into_values()),
            removals: request.removals.iter().cloned().collect(),
            render_mode_override: request.render_mode_override.clone(),
        })
    }

    // -- per-target pipeline ------------------------------------------------

    fn target_lock(&self, target: &TargetId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(target.clone()).or_default())
    }

    /// Drop the target's entry once no pipeline holds or waits on it.
    fn release_lock(&self, target: &TargetId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(target).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(target);
        }
    }

    async fn run_target(&self, target: Target, repo: GitRepo, request: &ResolvedRequest) -> PublishOutcome {
        let lock = self.target_lock(&target.id);
        let outcome = {
            let _guard = lock.lock().await;
            self.run_locked(&target, &repo, request).await
        };
        drop(lock);
        self.release_lock(&target.id);
        outcome
    }

    async fn run_locked(&self, target: &Target, repo: &GitRepo, request: &ResolvedRequest) -> PublishOutcome {
        tracing::info!(target_id = %target.id, repo = %repo.full_name(), path = %target.path, "publishing to target");

        match tokio::time::timeout(self.timeout, self.plan_and_commit(target, repo, request)).await {
            Ok(Ok((commit_id, plan))) => self.record_success(target, repo, commit_id, plan).await,
            Ok(Err((failure, attempt))) => self.record_failure(target, repo, attempt, failure).await,
            Err(_) => {
                let failure = TargetFailure::Git(GitError::timeout(format!(
                    "publish to '{}' exceeded {}s",
                    target.name,
                    self.timeout.as_secs_f64()
                )));
                self.record_failure(target, repo, request.fallback_attempt(), failure)
                    .await
            }
        }
    }

    async fn plan_and_commit(
        &self,
        target: &Target,
        repo: &GitRepo,
        request: &ResolvedRequest,
    ) -> Result<(CommitId, TargetPlan), (TargetFailure, Attempt)> {
        let plan = self
            .plan(target, repo, request)
            .await
            .map_err(|failure| (failure, request.fallback_attempt()))?;

        let updates: Vec<FileUpdate> = plan
            .files
            .iter()
            .filter(|f| !f.deleted)
            .map(|f| FileUpdate {
                path: f.path.clone(),
                content: f.after.clone(),
            })
            .collect();
        let deletions: Vec<String> = plan
            .files
            .iter()
            .filter(|f| f.deleted)
            .map(|f| f.path.clone())
            .collect();
        let changed = plan.files.iter().filter(|f| f.is_changed()).count();
        tracing::debug!(
            target_id = %target.id,
            files = updates.len(),
            deletions = deletions.len(),
            changed,
            "committing"
        );

        match self
            .ports
            .git
            .commit_files(repo, &target.path, &updates, &deletions, &plan.commit_message)
            .await
        {
            Ok(commit_id) => Ok((commit_id, plan)),
            Err(err) => Err((TargetFailure::Git(err), plan.attempt)),
        }
    }

    /// Steps 1–5.
    async fn plan(
        &self,
        target: &Target,
        repo: &GitRepo,
        request: &ResolvedRequest,
    ) -> Result<TargetPlan, TargetFailure> {
        let previous = self.ports.deployments.latest_successful(&target.id).await?;
        let (previous_versions, previous_modes) = match &previous {
            Some(deployment) => (
                self.load_deployed(&deployment.deployed_artifact_version_ids).await?,
                deployment.render_modes.clone(),
            ),
            None => (Vec::new(), Vec::new()),
        };

        let mut set: BTreeMap<ArtifactId, ArtifactVersion> = BTreeMap::new();
        for version in &previous_versions {
            set.insert(version.artifact_id.clone(), version.clone());
        }
        for version in &request.versions {
            set.insert(version.artifact_id.clone(), version.clone());
        }
        for artifact in &request.removals {
            set.remove(artifact);
        }
        let deployed = sorted_by_slug(set.into_values());
        let removed: Vec<&ArtifactVersion> = previous_versions
            .iter()
            .filter(|v| request.removals.contains(&v.artifact_id))
            .collect();

        let modes = self
            .resolver
            .resolve(&repo.organization_id, request.render_mode_override.as_deref())
            .await?;
        let dropped_modes: Vec<RenderMode> = previous_modes
            .iter()
            .copied()
            .filter(|m| !modes.contains(m))
            .collect();
        let clear_modes = normalize_render_modes(previous_modes.iter().chain(modes.iter()).copied());

        let mut layout = FileLayout::default();
        for version in &removed {
            self.push_outputs(target, version, &clear_modes, true, &mut layout)?;
        }
        for version in &deployed {
            self.push_outputs(target, version, &dropped_modes, true, &mut layout)?;
        }
        for version in &deployed {
            self.push_outputs(target, version, &modes, false, &mut layout)?;
        }
        let files = self.plan_files(repo, layout).await?;

        let requested: Vec<&ArtifactVersion> = request
            .versions
            .iter()
            .filter(|v| !request.removals.contains(&v.artifact_id))
            .collect();
        let commit_message = build_commit_message(target, &requested, &removed, deployed.len());

        Ok(TargetPlan {
            files,
            commit_message,
            attempt: Attempt {
                version_ids: deployed.iter().map(|v| v.id.clone()).collect(),
                render_modes: modes,
            },
        })
    }

    /// Versions recorded on a previous deployment. Versions that can no longer
    /// be found are skipped.
    async fn load_deployed(&self, ids: &[ArtifactVersionId]) -> Result<Vec<ArtifactVersion>, TargetFailure> {
        let mut versions = Vec::with_capacity(ids.len());
        for id in ids {
            match self.ports.versions.version(id).await {
                Ok(version) => versions.push(version),
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(artifact_version_id = %id, "previously deployed version not found, dropping it");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(versions)
    }

    fn push_outputs(
        &self,
        target: &Target,
        version: &ArtifactVersion,
        modes: &[RenderMode],
        clear: bool,
        out: &mut FileLayout,
    ) -> Result<(), TargetFailure> {
        for mode in modes {
            for rendered in self.ports.renderer.render(version, *mode)? {
                let path = target.prefixed_path(&rendered.file_path);
                match (rendered.dedicated, clear) {
                    (true, true) => {
                        out.deletions.insert(path);
                    }
                    (true, false) => {
                        out.dedicated.insert(path, format!("{}\n", rendered.content));
                    }
                    (false, _) => {
                        let content = if clear { String::new() } else { rendered.content };
                        out.sections
                            .entry(path)
                            .or_default()
                            .push(FileSection::new(rendered.section_key, content));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fetch current content and compute each file's new content, in path order.
    /// Deletions of files that do not exist are dropped.
    async fn plan_files(&self, repo: &GitRepo, layout: FileLayout) -> Result<Vec<FilePlan>, TargetFailure> {
        let FileLayout {
            sections,
            dedicated,
            deletions,
        } = layout;
        let mut files: BTreeMap<String, FilePlan> = BTreeMap::new();
        for (path, file_sections) in sections {
            let before = self.ports.git.fetch_file(repo, &path).await?.unwrap_or_default();
            let after = merge(&before, &file_sections);
            files.insert(path.clone(), FilePlan { path, before, after, deleted: false });
        }
        for (path, after) in dedicated {
            let before = self.ports.git.fetch_file(repo, &path).await?.unwrap_or_default();
            files.insert(path.clone(), FilePlan { path, before, after, deleted: false });
        }
        for path in deletions {
            if files.contains_key(&path) {
                continue;
            }
            if let Some(before) = self.ports.git.fetch_file(repo, &path).await? {
                files.insert(
                    path.clone(),
                    FilePlan {
                        path,
                        before,
                        after: String::new(),
                        deleted: true,
                    },
                );
            }
        }
        Ok(files.into_values().collect())
    }

    // -- recording ----------------------------------------------------------

    async fn record_success(
        &self,
        target: &Target,
        repo: &GitRepo,
        commit_id: CommitId,
        plan: TargetPlan,
    ) -> PublishOutcome {
        let deployment = Deployment::succeeded(
            repo.organization_id.clone(),
            target.id.clone(),
            commit_id.clone(),
            plan.attempt.version_ids,
            plan.attempt.render_modes,
            Some(plan.commit_message),
        );
        match self.ports.deployments.save(deployment).await {
            Ok(deployment) => {
                tracing::info!(
                    target_id = %target.id,
                    commit = %commit_id,
                    artifacts = deployment.deployed_artifact_version_ids.len(),
                    "deployment succeeded"
                );
                self.events.publish(&DeploymentCompleted {
                    deployment: deployment.clone(),
                });
                PublishOutcome::Succeeded { deployment }
            }
            Err(err) => {
                tracing::error!(
                    target_id = %target.id,
                    commit = %commit_id,
                    error = %err,
                    "commit landed but deployment was not recorded"
                );
                PublishOutcome::Unrecorded {
                    commit_id,
                    error: err.to_string(),
                }
            }
        }
    }

    async fn record_failure(
        &self,
        target: &Target,
        repo: &GitRepo,
        attempt: Attempt,
        failure: TargetFailure,
    ) -> PublishOutcome {
        let message = failure.to_string();
        tracing::warn!(target_id = %target.id, error = %message, "deployment failed");
        let row = Deployment::failed(
            repo.organization_id.clone(),
            target.id.clone(),
            attempt.version_ids,
            attempt.render_modes,
            message.clone(),
        );
        let deployment_id = match self.ports.deployments.save(row).await {
            Ok(saved) => Some(saved.id),
            Err(err) => {
                tracing::error!(target_id = %target.id, error = %err, "failed deployment was not recorded");
                None
            }
        };
        self.events.publish(&DeploymentFailed {
            target_id: target.id.clone(),
            error: message,
        });
        PublishOutcome::Failed {
            error: failure,
            deployment_id,
        }
    }
}

// ---------------------------------------------------------------------------
// 4. Helpers
// ---------------------------------------------------------------------------

fn sorted_by_slug(versions: impl IntoIterator<Item = ArtifactVersion>) -> Vec<ArtifactVersion> {
    let mut out: Vec<ArtifactVersion> = versions.into_iter().collect();
    out.sort_by(|a, b| a.slug.cmp(&b.slug).then_with(|| a.artifact_id.cmp(&b.artifact_id)));
    out
}

/// ```text
/// [COURIER] Update 2 artifact(s) on backend
///
/// - error-handling v3
/// - naming v1
/// - removed legacy-setup
/// - Total artifacts on target: 5
/// ```
pub(crate) fn build_commit_message(
    target: &Target,
    requested: &[&ArtifactVersion],
    removed: &[&ArtifactVersion],
    total: usize,
) -> String {
    let mut lines = vec![
        format!("[COURIER] Update {} artifact(s) on {}", requested.len(), target.name),
        String::new(),
    ];
    for version in requested {
        lines.push(format!("- {} v{}", version.slug, version.version));
    }
    for version in removed {
        lines.push(format!("- removed {}", version.slug));
    }
    lines.push(format!("- Total artifacts on target: {total}"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_core::memory::{MemoryGitGateway, MemoryStore};
    use courier_core::types::{ArtifactKind, GitRepoId, OrganizationId};
    use courier_renderer::TemplateRenderer;

    fn version(slug: &str, n: u32) -> ArtifactVersion {
        ArtifactVersion {
            id: ArtifactVersionId::from(format!("{slug}-v{n}")),
            artifact_id: ArtifactId::from(slug),
            organization_id: OrganizationId::from("acme"),
            kind: ArtifactKind::Recipe,
            slug: slug.to_string(),
            name: slug.to_string(),
            version: n,
            content: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn commit_message_lists_changes() {
        let target = Target {
            id: TargetId::from("t"),
            git_repo_id: GitRepoId::from("r"),
            name: "backend".into(),
            path: "/backend/".into(),
        };
        let foo = version("foo", 2);
        let old = version("old", 1);
        let message = build_commit_message(&target, &[&foo], &[&old], 3);
        assert_eq!(
            message,
            "[COURIER] Update 1 artifact(s) on backend\n\n- foo v2\n- removed old\n- Total artifacts on target: 3"
        );
    }

    #[test]
    fn fallback_attempt_excludes_removed_and_normalizes_modes() {
        let request = ResolvedRequest {
            versions: vec![version("a", 1), version("b", 1)],
            removals: [ArtifactId::from("b")].into_iter().collect(),
            render_mode_override: Some(vec![RenderMode::Junie, RenderMode::AgentsMd]),
        };
        let attempt = request.fallback_attempt();
        assert_eq!(attempt.version_ids, vec![ArtifactVersionId::from("a-v1")]);
        assert_eq!(attempt.render_modes, vec![RenderMode::AgentsMd, RenderMode::Junie]);
    }

    fn lock_count(planner: &DeploymentPlanner) -> usize {
        planner.inner.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn target_locks_are_pruned_once_idle() {
        let store = Arc::new(MemoryStore::new());
        store.insert_repo(GitRepo {
            id: GitRepoId::from("r"),
            organization_id: OrganizationId::from("acme"),
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
        });
        for id in ["t1", "t2"] {
            store.insert_target(Target {
                id: TargetId::from(id),
                git_repo_id: GitRepoId::from("r"),
                name: id.into(),
                path: "/".into(),
            });
        }
        store.insert_version(version("foo", 1)).unwrap();
        let ports = PlannerPorts::from_store(
            store,
            Arc::new(MemoryGitGateway::new()),
            Arc::new(TemplateRenderer::new().unwrap()),
        );
        let planner = DeploymentPlanner::new(ports, &CourierConfig::default());

        let request = PublishRequest {
            targets: vec![TargetId::from("t1"), TargetId::from("t2")],
            artifact_versions: vec![ArtifactVersionId::from("foo-v1")],
            ..PublishRequest::default()
        };
        for _ in 0..3 {
            let results = planner.publish(request.clone()).await.unwrap();
            assert!(results.iter().all(|r| r.outcome.is_success()));
        }
        assert_eq!(lock_count(&planner), 0);
    }

    #[test]
    fn held_lock_survives_release() {
        let ports = PlannerPorts::from_store(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryGitGateway::new()),
            Arc::new(TemplateRenderer::new().unwrap()),
        );
        let planner = DeploymentPlanner::new(ports, &CourierConfig::default());
        let target = TargetId::from("t");

        let held = planner.inner.target_lock(&target);
        planner.inner.release_lock(&target);
        assert_eq!(lock_count(&planner), 1);

        drop(held);
        planner.inner.release_lock(&target);
        assert_eq!(lock_count(&planner), 0);
    }
}

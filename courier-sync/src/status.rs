//! Up-to-date / outdated status across targets, repositories and artifacts.
//!
//! The target view is computed first from each target's latest successful
//! deployment; the repository view is that same data grouped by repository,
//! and the artifact view is its transpose. Reads take no locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use courier_core::error::StoreError;
use courier_core::ports::{DeploymentStore, StoreResult, TargetCatalog, VersionStore};
use courier_core::types::{
    ArtifactId, ArtifactKind, ArtifactVersion, ArtifactVersionId, CommitId, DeploymentId, GitRepo,
    GitRepoId, OrganizationId, RenderMode, Target, TargetId,
};

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentOverview {
    pub repositories: Vec<RepositoryStatus>,
    pub targets: Vec<TargetStatus>,
    pub artifacts: Vec<ArtifactStatus>,
}

/// One artifact as deployed on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployedArtifact {
    pub artifact_id: ArtifactId,
    pub slug: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub deployed_version_id: ArtifactVersionId,
    pub deployed_version: u32,
    pub latest_version: u32,
    pub is_up_to_date: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastDeployment {
    pub id: DeploymentId,
    pub commit_id: Option<CommitId>,
    pub render_modes: Vec<RenderMode>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub target: Target,
    /// `None` when the target never had a successful deployment.
    pub last_deployment: Option<LastDeployment>,
    pub artifacts: Vec<DeployedArtifact>,
    pub has_outdated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryStatus {
    pub repo: GitRepo,
    pub targets: Vec<TargetStatus>,
    pub has_outdated: bool,
}

/// Where one artifact is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactTargetStatus {
    pub target_id: TargetId,
    pub target_name: String,
    pub git_repo_id: GitRepoId,
    pub deployed_version: u32,
    pub is_up_to_date: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    pub artifact_id: ArtifactId,
    pub slug: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub latest_version: u32,
    pub deployments: Vec<ArtifactTargetStatus>,
    pub has_outdated_deployments: bool,
}

// ---------------------------------------------------------------------------
// Computer
// ---------------------------------------------------------------------------

pub struct DeploymentStatusComputer {
    versions: Arc<dyn VersionStore>,
    deployments: Arc<dyn DeploymentStore>,
    catalog: Arc<dyn TargetCatalog>,
}

impl DeploymentStatusComputer {
    pub fn new(
        versions: Arc<dyn VersionStore>,
        deployments: Arc<dyn DeploymentStore>,
        catalog: Arc<dyn TargetCatalog>,
    ) -> Self {
        Self {
            versions,
            deployments,
            catalog,
        }
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: VersionStore + DeploymentStore + TargetCatalog + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub async fn overview(&self, organization: &OrganizationId) -> StoreResult<DeploymentOverview> {
        let latest: HashMap<ArtifactId, ArtifactVersion> = self
            .versions
            .latest_versions(organization)
            .await?
            .into_iter()
            .map(|v| (v.artifact_id.clone(), v))
            .collect();

        let repos = self.catalog.repos_by_organization(organization).await?;
        let mut targets = self.catalog.targets_by_organization(organization).await?;
        let repo_names: HashMap<&GitRepoId, String> =
            repos.iter().map(|r| (&r.id, r.full_name())).collect();
        targets.sort_by(|a, b| {
            repo_names
                .get(&a.git_repo_id)
                .cmp(&repo_names.get(&b.git_repo_id))
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut target_statuses = Vec::with_capacity(targets.len());
        for target in targets {
            target_statuses.push(self.target_status(target, &latest).await?);
        }

        let repositories = group_by_repository(repos, &target_statuses);
        let artifacts = artifact_view(&latest, &target_statuses);

        Ok(DeploymentOverview {
            repositories,
            targets: target_statuses,
            artifacts,
        })
    }

    async fn target_status(
        &self,
        target: Target,
        latest: &HashMap<ArtifactId, ArtifactVersion>,
    ) -> StoreResult<TargetStatus> {
        let Some(deployment) = self.deployments.latest_successful(&target.id).await? else {
            return Ok(TargetStatus {
                target,
                last_deployment: None,
                artifacts: Vec::new(),
                has_outdated: false,
            });
        };

        let mut artifacts = Vec::with_capacity(deployment.deployed_artifact_version_ids.len());
        for id in &deployment.deployed_artifact_version_ids {
            let deployed = match self.versions.version(id).await {
                Ok(version) => version,
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(target_id = %target.id, artifact_version_id = %id, "deployed version not found, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let Some(current) = latest.get(&deployed.artifact_id) else {
                tracing::warn!(target_id = %target.id, artifact_id = %deployed.artifact_id, "latest version not found, skipping");
                continue;
            };
            artifacts.push(DeployedArtifact {
                artifact_id: deployed.artifact_id.clone(),
                slug: current.slug.clone(),
                name: current.name.clone(),
                kind: current.kind,
                deployed_version_id: deployed.id.clone(),
                deployed_version: deployed.version,
                latest_version: current.version,
                is_up_to_date: deployed.version == current.version,
            });
        }
        artifacts.sort_by(|a, b| a.slug.cmp(&b.slug));

        Ok(TargetStatus {
            has_outdated: artifacts.iter().any(|a| !a.is_up_to_date),
            last_deployment: Some(LastDeployment {
                id: deployment.id,
                commit_id: deployment.git_commit_id,
                render_modes: deployment.render_modes,
                created_at: deployment.created_at,
            }),
            target,
            artifacts,
        })
    }
}

fn group_by_repository(mut repos: Vec<GitRepo>, targets: &[TargetStatus]) -> Vec<RepositoryStatus> {
    repos.sort_by_key(|r| r.full_name());
    repos
        .into_iter()
        .map(|repo| {
            let targets: Vec<TargetStatus> = targets
                .iter()
                .filter(|t| t.target.git_repo_id == repo.id)
                .cloned()
                .collect();
            RepositoryStatus {
                has_outdated: targets.iter().any(|t| t.has_outdated),
                repo,
                targets,
            }
        })
        .collect()
}

fn artifact_view(
    latest: &HashMap<ArtifactId, ArtifactVersion>,
    targets: &[TargetStatus],
) -> Vec<ArtifactStatus> {
    let mut by_artifact: BTreeMap<&ArtifactId, Vec<ArtifactTargetStatus>> = BTreeMap::new();
    for status in targets {
        for artifact in &status.artifacts {
            by_artifact
                .entry(&artifact.artifact_id)
                .or_default()
                .push(ArtifactTargetStatus {
                    target_id: status.target.id.clone(),
                    target_name: status.target.name.clone(),
                    git_repo_id: status.target.git_repo_id.clone(),
                    deployed_version: artifact.deployed_version,
                    is_up_to_date: artifact.is_up_to_date,
                });
        }
    }

    let mut view: Vec<ArtifactStatus> = latest
        .values()
        .map(|version| {
            let deployments = by_artifact.remove(&version.artifact_id).unwrap_or_default();
            ArtifactStatus {
                artifact_id: version.artifact_id.clone(),
                slug: version.slug.clone(),
                name: version.name.clone(),
                kind: version.kind,
                latest_version: version.version,
                has_outdated_deployments: deployments.iter().any(|d| !d.is_up_to_date),
                deployments,
            }
        })
        .collect();
    view.sort_by(|a, b| a.slug.cmp(&b.slug).then_with(|| a.artifact_id.cmp(&b.artifact_id)));
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::memory::MemoryStore;
    use courier_core::ports::DeploymentStore as _;
    use courier_core::types::Deployment;

    fn org() -> OrganizationId {
        OrganizationId::from("acme")
    }

    fn version(slug: &str, n: u32) -> ArtifactVersion {
        ArtifactVersion {
            id: ArtifactVersionId::from(format!("{slug}-v{n}")),
            artifact_id: ArtifactId::from(slug),
            organization_id: org(),
            kind: ArtifactKind::Standard,
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            version: n,
            content: String::new(),
            created_at: Utc::now(),
        }
    }

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert_repo(GitRepo {
            id: GitRepoId::from("r"),
            organization_id: org(),
            owner: "acme".into(),
            repo: "api".into(),
            branch: "main".into(),
        });
        for (id, path) in [("root", "/"), ("web", "/web/")] {
            store.insert_target(Target {
                id: TargetId::from(id),
                git_repo_id: GitRepoId::from("r"),
                name: id.into(),
                path: path.into(),
            });
        }
        store
    }

    #[tokio::test]
    async fn empty_ledger_lists_everything_undeployed() {
        let store = seeded();
        store.insert_version(version("foo", 1)).unwrap();
        let overview = DeploymentStatusComputer::from_store(store).overview(&org()).await.unwrap();

        assert_eq!(overview.targets.len(), 2);
        assert!(overview.targets.iter().all(|t| t.last_deployment.is_none()));
        assert_eq!(overview.repositories.len(), 1);
        assert!(!overview.repositories[0].has_outdated);
        assert_eq!(overview.artifacts.len(), 1);
        assert!(overview.artifacts[0].deployments.is_empty());
    }

    #[tokio::test]
    async fn outdated_flags_propagate() {
        let store = seeded();
        store.insert_version(version("foo", 1)).unwrap();
        store.insert_version(version("bar", 1)).unwrap();
        store
            .save(Deployment::succeeded(
                org(),
                TargetId::from("root"),
                CommitId::from("c1"),
                vec![ArtifactVersionId::from("foo-v1"), ArtifactVersionId::from("bar-v1")],
                vec![RenderMode::AgentsMd],
                None,
            ))
            .await
            .unwrap();
        store.insert_version(version("foo", 2)).unwrap();

        let overview = DeploymentStatusComputer::from_store(store).overview(&org()).await.unwrap();
        let root = overview.targets.iter().find(|t| t.target.id.as_str() == "root").unwrap();
        let foo = root.artifacts.iter().find(|a| a.slug == "foo").unwrap();
        let bar = root.artifacts.iter().find(|a| a.slug == "bar").unwrap();
        assert_eq!((foo.deployed_version, foo.latest_version, foo.is_up_to_date), (1, 2, false));
        assert!(bar.is_up_to_date);
        assert!(root.has_outdated);
        assert!(overview.repositories[0].has_outdated);

        let foo_view = overview.artifacts.iter().find(|a| a.slug == "foo").unwrap();
        assert!(foo_view.has_outdated_deployments);
        let bar_view = overview.artifacts.iter().find(|a| a.slug == "bar").unwrap();
        assert!(!bar_view.has_outdated_deployments);
    }

    #[tokio::test]
    async fn unknown_deployed_version_is_skipped() {
        let store = seeded();
        store.insert_version(version("foo", 1)).unwrap();
        store
            .save(Deployment::succeeded(
                org(),
                TargetId::from("root"),
                CommitId::from("c1"),
                vec![ArtifactVersionId::from("ghost-v9"), ArtifactVersionId::from("foo-v1")],
                vec![RenderMode::AgentsMd],
                None,
            ))
            .await
            .unwrap();

        let overview = DeploymentStatusComputer::from_store(store).overview(&org()).await.unwrap();
        let root = overview.targets.iter().find(|t| t.target.id.as_str() == "root").unwrap();
        assert_eq!(root.artifacts.len(), 1);
        assert_eq!(root.artifacts[0].slug, "foo");
    }
}

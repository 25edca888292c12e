//! `courier publish`: render, merge and commit artifacts on targets.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use courier_core::{ArtifactId, ArtifactVersionId, RenderMode, TargetId};
use courier_sync::{PublishOutcome, PublishRequest, TargetPublishResult};

use super::{home_dir, planner};

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Target id; repeat for several targets.
    #[arg(long = "target", required = true, value_name = "TARGET_ID")]
    pub targets: Vec<String>,

    /// Artifact version id, e.g. `error-handling-v3`.
    #[arg(long = "artifact", value_name = "VERSION_ID")]
    pub artifacts: Vec<String>,

    /// Render modes for this publish only, replacing the organization's.
    #[arg(long = "mode", value_name = "MODE")]
    pub modes: Vec<RenderMode>,

    /// Artifact id to take off the targets.
    #[arg(long = "remove", value_name = "ARTIFACT_ID")]
    pub removals: Vec<String>,
}

impl PublishArgs {
    pub(crate) fn into_request(self) -> PublishRequest {
        PublishRequest {
            targets: self.targets.into_iter().map(TargetId::from).collect(),
            artifact_versions: self.artifacts.into_iter().map(ArtifactVersionId::from).collect(),
            render_mode_override: (!self.modes.is_empty()).then_some(self.modes),
            removals: self.removals.into_iter().map(ArtifactId::from).collect(),
        }
    }

    pub async fn run(self) -> Result<ExitCode> {
        let home = home_dir()?;
        let planner = planner(&home)?;
        let request = self.into_request();
        tracing::debug!(
            targets = request.targets.len(),
            artifacts = request.artifact_versions.len(),
            removals = request.removals.len(),
            "publish requested"
        );
        let results = planner.publish(request).await.context("publish rejected")?;

        for result in &results {
            print_result(result);
        }

        let failed = results.iter().filter(|r| !r.outcome.is_success()).count();
        tracing::info!(targets = results.len(), failed, "publish finished");
        if failed > 0 {
            eprintln!("{failed} of {} target(s) failed", results.len());
            return Ok(ExitCode::from(1));
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_result(result: &TargetPublishResult) {
    match &result.outcome {
        PublishOutcome::Succeeded { deployment } => {
            let commit = deployment
                .git_commit_id
                .as_ref()
                .map(|c| short(c.as_str()))
                .unwrap_or_default();
            println!(
                "{} {} — {} artifact(s), commit {}",
                "✓".green().bold(),
                result.target_id,
                deployment.deployed_artifact_version_ids.len(),
                commit
            );
        }
        PublishOutcome::Failed { error, .. } => {
            println!("{} {} — {}", "✗".red().bold(), result.target_id, error);
        }
        PublishOutcome::Unrecorded { commit_id, error } => {
            println!(
                "{} {} — committed {} but not recorded: {}",
                "!".yellow().bold(),
                result.target_id,
                short(commit_id.as_str()),
                error
            );
        }
    }
}

fn short(id: &str) -> String {
    id.chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mode_list_means_no_override() {
        let args = PublishArgs {
            targets: vec!["t".into()],
            artifacts: vec!["foo-v1".into()],
            modes: Vec::new(),
            removals: vec!["bar".into()],
        };
        let request = args.into_request();
        assert!(request.render_mode_override.is_none());
        assert_eq!(request.removals, vec![ArtifactId::from("bar")]);
    }
}

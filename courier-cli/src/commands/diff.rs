//! `courier diff`: unified diffs of what publish would commit.

use anyhow::{Context, Result};
use clap::Args;

use courier_core::{ArtifactId, ArtifactVersionId, RenderMode, TargetId};
use courier_sync::{preview_diffs, PublishRequest};

use super::{home_dir, planner};

#[derive(Args, Debug)]
pub struct DiffArgs {
    #[arg(long = "target", required = true, value_name = "TARGET_ID")]
    pub targets: Vec<String>,

    #[arg(long = "artifact", value_name = "VERSION_ID")]
    pub artifacts: Vec<String>,

    #[arg(long = "mode", value_name = "MODE")]
    pub modes: Vec<RenderMode>,

    #[arg(long = "remove", value_name = "ARTIFACT_ID")]
    pub removals: Vec<String>,
}

impl DiffArgs {
    pub async fn run(self) -> Result<()> {
        let home = home_dir()?;
        let planner = planner(&home)?;
        let request = PublishRequest {
            targets: self.targets.into_iter().map(TargetId::from).collect(),
            artifact_versions: self.artifacts.into_iter().map(ArtifactVersionId::from).collect(),
            render_mode_override: (!self.modes.is_empty()).then_some(self.modes),
            removals: self.removals.into_iter().map(ArtifactId::from).collect(),
        };
        let previews = planner.preview(request).await.context("diff failed")?;

        for preview in previews {
            let diffs = preview_diffs(&preview);
            if diffs.is_empty() {
                println!("No differences for '{}'.", preview.target_id);
                continue;
            }
            for diff in diffs {
                print!("{}", diff.unified_diff);
                if !diff.unified_diff.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}

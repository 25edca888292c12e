//! `courier status --org <org>`: which targets run outdated artifacts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use courier_core::OrganizationId;
use courier_sync::{DeploymentOverview, DeploymentStatusComputer, TargetStatus};

use super::home_dir;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub org: String,

    /// Emit the full overview as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct TargetRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "artifacts")]
    artifacts: String,
    #[tabled(rename = "last deployment")]
    last_deployment: String,
}

impl StatusArgs {
    pub async fn run(self) -> Result<()> {
        let home = home_dir()?;
        let store = std::sync::Arc::new(courier_core::FileStore::at(&home));
        let overview = DeploymentStatusComputer::from_store(store)
            .overview(&OrganizationId::from(self.org.clone()))
            .await
            .with_context(|| format!("failed to compute status for '{}'", self.org))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&overview).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&self.org, &overview);
        Ok(())
    }
}

fn print_table(org: &str, overview: &DeploymentOverview) {
    let outdated = overview.targets.iter().filter(|t| t.has_outdated).count();
    println!(
        "Courier v{} | {} | {} repositories | {} targets | {} outdated",
        env!("CARGO_PKG_VERSION"),
        org,
        overview.repositories.len(),
        overview.targets.len(),
        outdated,
    );

    if overview.repositories.is_empty() {
        println!("No repositories registered.");
        return;
    }

    for repo in &overview.repositories {
        let marker = if repo.has_outdated {
            "■".yellow().bold()
        } else {
            "■".green().bold()
        };
        println!("{} {}", marker, repo.repo.full_name().bold());
        if repo.targets.is_empty() {
            println!("  no targets");
            continue;
        }
        let rows: Vec<TargetRow> = repo.targets.iter().map(target_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if outdated > 0 {
        println!("Run 'courier publish' with the latest versions to update outdated targets.");
    }
}

fn target_row(status: &TargetStatus) -> TargetRow {
    let label = match (&status.last_deployment, status.has_outdated) {
        (None, _) => "NEVER DEPLOYED",
        (Some(_), true) => "OUTDATED",
        (Some(_), false) => "UP TO DATE",
    };
    let artifacts = if status.artifacts.is_empty() {
        "-".to_string()
    } else {
        status
            .artifacts
            .iter()
            .map(|a| {
                if a.is_up_to_date {
                    format!("{} v{}", a.slug, a.deployed_version)
                } else {
                    format!("{} v{} → v{}", a.slug, a.deployed_version, a.latest_version)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let last_deployment = status
        .last_deployment
        .as_ref()
        .map(|d| d.created_at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    TargetRow {
        target: format!("{}\n({})", status.target.name, status.target.id),
        path: status.target.path.clone(),
        status: label.to_string(),
        artifacts,
        last_deployment,
    }
}

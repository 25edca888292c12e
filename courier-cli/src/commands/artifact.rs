//! `courier artifact add` and `courier artifact list`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tabled::{settings::Style, Table, Tabled};

use courier_core::store::{self, NewArtifactVersion};
use courier_core::ArtifactKind;

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum ArtifactCommand {
    /// Record the next version of a recipe or standard from a markdown file.
    Add(AddArgs),

    /// List the latest version of every artifact of an organization.
    List {
        #[arg(long)]
        org: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Artifact slug; also the section key in rendered files.
    pub slug: String,

    #[arg(long)]
    pub org: String,

    /// recipe | standard
    #[arg(long)]
    pub kind: ArtifactKind,

    /// Markdown file holding the artifact body.
    #[arg(long)]
    pub file: PathBuf,

    /// Display name. Defaults to the slug.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "artifact")]
    slug: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "latest")]
    latest: String,
    #[tabled(rename = "name")]
    name: String,
}

pub fn run(cmd: ArtifactCommand) -> Result<()> {
    match cmd {
        ArtifactCommand::Add(args) => add(args),
        ArtifactCommand::List { org } => list(&org),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read '{}'", args.file.display()))?;
    let name = args.name.unwrap_or_else(|| args.slug.clone());
    let version = store::add_artifact_version_at(
        &home,
        NewArtifactVersion {
            organization: args.org.into(),
            slug: args.slug.clone(),
            name,
            kind: args.kind,
            content,
        },
    )
    .with_context(|| format!("failed to add a version of '{}'", args.slug))?;
    println!(
        "✓ Recorded {} '{}' v{} ({})",
        version.kind, version.slug, version.version, version.id
    );
    Ok(())
}

fn list(org: &str) -> Result<()> {
    let home = home_dir()?;
    let workspace = store::load_workspace_at(&home).context("failed to load workspace")?;
    let mut latest: Vec<&courier_core::ArtifactVersion> = Vec::new();
    for version in workspace
        .artifact_versions
        .iter()
        .filter(|v| v.organization_id.as_str() == org)
    {
        match latest.iter_mut().find(|v| v.artifact_id == version.artifact_id) {
            Some(current) if current.version < version.version => *current = version,
            Some(_) => {}
            None => latest.push(version),
        }
    }
    if latest.is_empty() {
        println!("No artifacts recorded for '{org}'.");
        return Ok(());
    }
    latest.sort_by(|a, b| a.slug.cmp(&b.slug));

    let rows: Vec<ArtifactRow> = latest
        .into_iter()
        .map(|v| ArtifactRow {
            slug: v.slug.clone(),
            kind: v.kind.to_string(),
            latest: format!("v{} ({})", v.version, v.id),
            name: v.name.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

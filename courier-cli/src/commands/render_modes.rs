//! `courier render-modes set|show --org <org>`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use courier_core::{config, store, FileStore, OrganizationId, RenderMode};
use courier_sync::RenderModeResolver;

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum RenderModesCommand {
    /// Replace the organization's active render modes.
    Set(SetArgs),

    /// Print the render modes publish would use for the organization.
    Show {
        #[arg(long)]
        org: String,
    },
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[arg(long)]
    pub org: String,

    /// PACKMIND, AGENTS_MD, CLAUDE, CURSOR, GH_COPILOT, JUNIE
    #[arg(required = true, value_name = "MODE")]
    pub modes: Vec<RenderMode>,
}

pub async fn run(cmd: RenderModesCommand) -> Result<()> {
    match cmd {
        RenderModesCommand::Set(args) => set(args),
        RenderModesCommand::Show { org } => show(&org).await,
    }
}

fn set(args: SetArgs) -> Result<()> {
    let home = home_dir()?;
    let configuration = store::set_render_modes_at(&home, OrganizationId::from(args.org.clone()), args.modes)
        .with_context(|| format!("failed to save render modes for '{}'", args.org))?;
    println!(
        "✓ '{}' now publishes: {}",
        configuration.organization_id,
        join(&configuration.active_render_modes)
    );
    Ok(())
}

async fn show(org: &str) -> Result<()> {
    let home = home_dir()?;
    let config = config::load_config_at(&home).context("failed to load ~/.courier/config.yaml")?;
    let resolver = RenderModeResolver::new(Arc::new(FileStore::at(&home)), config.default_modes());
    let modes = resolver
        .resolve(&OrganizationId::from(org), None)
        .await
        .with_context(|| format!("failed to resolve render modes for '{org}'"))?;
    println!("{}", join(&modes));
    Ok(())
}

fn join(modes: &[RenderMode]) -> String {
    modes.iter().map(RenderMode::as_str).collect::<Vec<_>>().join(", ")
}

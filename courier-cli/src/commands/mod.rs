//! Subcommand implementations and the wiring they share.

pub mod artifact;
pub mod diff;
pub mod publish;
pub mod render_modes;
pub mod repo;
pub mod status;
pub mod target;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use courier_core::{config, FileStore};
use courier_renderer::TemplateRenderer;
use courier_sync::{DeploymentPlanner, LocalCheckoutGateway, PlannerPorts};

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// `<home>/.courier/checkouts`
pub(crate) fn checkouts_dir(home: &Path) -> PathBuf {
    courier_core::store::courier_dir_at(home).join("checkouts")
}

/// Planner over the file store, local checkouts and the configured templates.
pub(crate) fn planner(home: &Path) -> Result<DeploymentPlanner> {
    let config = config::load_config_at(home).context("failed to load ~/.courier/config.yaml")?;
    let store = Arc::new(FileStore::at(home));
    let renderer = TemplateRenderer::with_template_dir(config.template_dir.as_deref())
        .context("failed to load templates")?;
    let git = Arc::new(LocalCheckoutGateway::new(checkouts_dir(home)));
    let ports = PlannerPorts::from_store(store, git, Arc::new(renderer));
    Ok(DeploymentPlanner::new(ports, &config))
}

//! `courier target add <repo-id> --name <name> [--path /]`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use courier_core::{store, GitRepoId};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Add a target to a registered repository.
    Add(AddArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository id as printed by `courier repo add`.
    pub repo_id: String,

    /// Display name, also used to derive the target id.
    #[arg(long)]
    pub name: String,

    /// Directory inside the repository; `/` is the root.
    #[arg(long, default_value = "/")]
    pub path: String,
}

pub fn run(cmd: TargetCommand) -> Result<()> {
    match cmd {
        TargetCommand::Add(args) => add(args),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let target = store::add_target_at(&home, &GitRepoId::from(args.repo_id.clone()), &args.name, &args.path)
        .with_context(|| format!("failed to add target to '{}'", args.repo_id))?;
    println!("✓ Added target '{}' at {} ({})", target.name, target.path, target.id);
    Ok(())
}

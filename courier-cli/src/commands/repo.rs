//! `courier repo add <owner>/<repo>` and `courier repo list`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use courier_core::{store, OrganizationId};

use super::home_dir;

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Register a repository.
    Add(AddArgs),

    /// List repositories of an organization.
    List {
        #[arg(long)]
        org: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository as `owner/repo`.
    pub full_name: String,

    /// Owning organization.
    #[arg(long)]
    pub org: String,

    /// Branch commits are made on.
    #[arg(long, default_value = "main")]
    pub branch: String,
}

pub fn run(cmd: RepoCommand) -> Result<()> {
    match cmd {
        RepoCommand::Add(args) => add(args),
        RepoCommand::List { org } => list(&org),
    }
}

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => Err(anyhow::anyhow!(
            "expected '<owner>/<repo>', got '{full_name}'"
        )),
    }
}

fn add(args: AddArgs) -> Result<()> {
    let home = home_dir()?;
    let (owner, repo) = split_full_name(&args.full_name)?;
    let repo = store::add_repo_at(&home, OrganizationId::from(args.org), owner, repo, &args.branch)
        .with_context(|| format!("failed to add repository '{}'", args.full_name))?;
    println!("✓ Added repository '{}' ({})", repo.full_name(), repo.id);
    println!("  Next: courier target add {} --name <name> [--path /]", repo.id);
    Ok(())
}

fn list(org: &str) -> Result<()> {
    let home = home_dir()?;
    let workspace = store::load_workspace_at(&home).context("failed to load workspace")?;
    let repos: Vec<_> = workspace
        .repos
        .iter()
        .filter(|r| r.organization_id.as_str() == org)
        .collect();
    if repos.is_empty() {
        println!("No repositories registered for '{org}'.");
        return Ok(());
    }
    for repo in repos {
        println!("{} ({}, branch {})", repo.id, repo.full_name(), repo.branch);
        for target in workspace.targets.iter().filter(|t| t.git_repo_id == repo.id) {
            println!("  - {} [{}] {}", target.id, target.name, target.path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_must_have_owner_and_repo() {
        assert_eq!(split_full_name("acme/api").unwrap(), ("acme", "api"));
        assert!(split_full_name("acme").is_err());
        assert!(split_full_name("/api").is_err());
        assert!(split_full_name("acme/api/extra").is_err());
    }
}

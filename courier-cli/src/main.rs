//! Courier: publish recipes and standards into git repositories.
//!
//! # Usage
//!
//! ```text
//! courier repo add <owner>/<repo> --org <org> [--branch main]
//! courier repo list --org <org>
//! courier target add <repo-id> --name <name> [--path /]
//! courier artifact add <slug> --org <org> --kind recipe|standard --file <path> [--name <name>]
//! courier artifact list --org <org>
//! courier render-modes set --org <org> <MODE>...
//! courier render-modes show --org <org>
//! courier publish --target <id>... [--artifact <version-id>...] [--mode <MODE>...] [--remove <artifact-id>...]
//! courier status --org <org> [--json]
//! courier diff --target <id>... --artifact <version-id>... [--mode <MODE>...]
//! ```
//!
//! Logs go to stderr; `RUST_LOG` controls verbosity (default `info`).

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    artifact::ArtifactCommand, diff::DiffArgs, publish::PublishArgs,
    render_modes::RenderModesCommand, repo::RepoCommand, status::StatusArgs,
    target::TargetCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    version,
    about = "Publish versioned recipes and standards into git repositories",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register git repositories.
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },

    /// Register deployment targets inside a repository.
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },

    /// Record new artifact versions.
    Artifact {
        #[command(subcommand)]
        command: ArtifactCommand,
    },

    /// Configure which agent file conventions an organization publishes.
    RenderModes {
        #[command(subcommand)]
        command: RenderModesCommand,
    },

    /// Publish artifact versions to targets and commit the result.
    Publish(PublishArgs),

    /// Show which targets run outdated artifact versions.
    Status(StatusArgs),

    /// Show a unified diff of what publish would commit.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn dispatch(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Repo { command } => commands::repo::run(command).map(|_| ExitCode::SUCCESS),
        Commands::Target { command } => commands::target::run(command).map(|_| ExitCode::SUCCESS),
        Commands::Artifact { command } => {
            commands::artifact::run(command).map(|_| ExitCode::SUCCESS)
        }
        Commands::RenderModes { command } => commands::render_modes::run(command)
            .await
            .map(|_| ExitCode::SUCCESS),
        Commands::Publish(args) => args.run().await,
        Commands::Status(args) => args.run().await.map(|_| ExitCode::SUCCESS),
        Commands::Diff(args) => args.run().await.map(|_| ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    dispatch(cli.command).await
}

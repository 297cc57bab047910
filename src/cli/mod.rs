pub mod snapshot;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use snapshot::process_snapshot_command;
use tracing::level_filters::LevelFilter;

use crate::{
    session::{SessionConfig, start_session},
    utils::{
        dir::create_application_default_path,
        logging::{CLI_PREFIX, SESSION_PREFIX, enable_logging},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Codepulse", version, long_about = None)]
#[command(about = "Coding session tracker that lives in your terminal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Track a workspace from the current console. Type 'report' into it for a one-shot report")]
    Run {
        #[arg(
            long,
            help = "Workspace root to track. Defaults to the current directory"
        )]
        workspace: Option<PathBuf>,
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Print a one-shot count of workspace lines and errors")]
    Snapshot {
        #[arg(
            long,
            help = "Workspace root to scan. Defaults to the current directory"
        )]
        workspace: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Run { workspace, dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            enable_logging(SESSION_PREFIX, &app_dir, logging_level, args.log)?;
            start_session(SessionConfig {
                workspace: resolve_workspace(workspace)?,
            })
            .await
        }
        Commands::Snapshot { workspace } => {
            let app_dir = create_application_default_path()?;
            enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;
            process_snapshot_command(resolve_workspace(workspace)?).await
        }
    }
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    Ok(match workspace {
        Some(v) => v,
        None => env::current_dir()?,
    })
}

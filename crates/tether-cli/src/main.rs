//! Tether CLI application.
//!
//! Command-line front end for the Tether alignment engine: hook
//! observation, feature and plan management, checkpoints, and the
//! session activity view.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands, FeatureCommands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use tether_core::{params::StatusQuery, EngineBuilder};
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        no_color,
        command,
    } = Args::parse();

    // The hook path builds its own engine so that a broken store degrades
    // to a silent exit 0 instead of an error the agent would surface.
    if matches!(command, Some(Hook)) {
        return cli::run_hook(database_file).await;
    }

    let engine = EngineBuilder::new()
        .with_database_path(database_file)
        .build()
        .await
        .context("Failed to initialize engine")?;

    let renderer = TerminalRenderer::new(!no_color);
    let cli = Cli::new(engine, renderer);

    info!("Tether started");

    match command {
        Some(Hook) => unreachable!("handled above"),
        Some(Status(args)) => cli.status(&args.into()).await,
        Some(Plan(args)) => cli.plan(args).await,
        Some(Checkpoint(args)) => cli.checkpoint(&args.into()).await,
        Some(Feature { command }) => match command {
            FeatureCommands::Add(args) => cli.add_feature(&args.into()).await,
            FeatureCommands::List(args) => cli.list_features(&args.into()).await,
            FeatureCommands::Activate(args) => cli.activate_feature(&args.into()).await,
            FeatureCommands::Complete(args) => cli.complete_feature(&args.into()).await,
        },
        Some(Sessions(args)) => cli.sessions(&args).await,
        None => cli.status(&StatusQuery { project: None }).await,
    }
}

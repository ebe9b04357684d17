//! Simple Notes CLI - your Supabase-synced notes from the terminal
//!
//! Sign in with an emailed magic link, then list, watch, create, edit and
//! delete notes. Every view goes through the same auth guard as the app.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::new::run_new;
use crate::commands::open::run_open;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "notes=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::List { search, json } => run_list(search.as_deref(), json, profile).await,
        Commands::Watch { search } => run_watch(search.as_deref(), profile).await,
        Commands::New { title, content } => run_new(title, &content, profile).await,
        Commands::Edit { id } => run_edit(&id, profile).await,
        Commands::Delete { id } => run_delete(&id, profile).await,
        Commands::Open { path } => run_open(&path, profile).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
        Commands::Config { command } => run_config(command, profile),
        Commands::Auth { command } => run_auth(command, profile).await,
    }
}

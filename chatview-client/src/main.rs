//! chatview - terminal chat viewer
//!
//! Connects to a chat channel, renders incoming messages and lets the user
//! type replies and slash commands without incoming traffic tearing the
//! line being edited.

use chatview_utils::{init_logging_with_config, LogConfig, Result};

mod app;
mod auth;
mod cli;
mod color;
mod commands;
mod config;
mod connection;
mod editor;
mod output;
mod render;

use app::App;
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments first (before terminal setup)
    let args = Args::parse_args();

    // Initialize logging to file (not stderr, since we're using the terminal)
    init_logging_with_config(LogConfig::client())?;
    tracing::info!("chatview starting");
    tracing::debug!("CLI args: {:?}", args);

    match App::new(args).run().await {
        Ok(()) => {
            tracing::info!("chatview exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("chatview error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

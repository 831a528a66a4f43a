//! `agora`: command-line front end to an Agora SQLite store.
//!
//! Reads `agora.toml` (or the path given with `--config`), overlays any
//! `AGORA_*` environment variables, opens the store and runs one subcommand.
//!
//! # Usage
//!
//! ```text
//! agora user add alice
//! agora post add --channel 1 --author 1
//! agora reply create --post 1 --author 1 "first!"
//! agora reply list 1 --threaded
//! agora vote cast 1 reply 1 upvote
//! ```

mod commands;
mod settings;

use std::path::PathBuf;

use agora_store_sqlite::SqliteStore;
use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{commands::Command, settings::AgoraConfig};

#[derive(Parser, Debug)]
#[command(name = "agora", version, about = "Threaded replies and votes for discussion posts")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "agora.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr; stdout carries the JSON output.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AgoraConfig::load(&cli.config)?;

  let store_path = cfg.store_path();
  let store = SqliteStore::open_with(&store_path, cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(path = ?store_path, "opened store");

  commands::run(&store, cli.command).await
}

//! `folio cache` subcommand group.

use std::io::ErrorKind;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use folio_config::Config;
use tracing::debug;

use crate::error::CliError;
use crate::output::Output;

/// Cache commands.
#[derive(Subcommand)]
pub(crate) enum CacheCommand {
    /// Remove the page cache directory.
    Clear(ClearArgs),
}

impl CacheCommand {
    /// Execute the cache subcommand.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Clear(args) => args.execute(),
        }
    }
}

/// Arguments for the cache clear command.
#[derive(Args)]
pub(crate) struct ClearArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ClearArgs {
    fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;
        let cache_dir = &config.docs_resolved.cache_dir;

        match std::fs::remove_dir_all(cache_dir) {
            Ok(()) => {
                output.success(&format!("Removed cache directory {}", cache_dir.display()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %cache_dir.display(), "Cache directory absent");
                output.info("Cache is already empty");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

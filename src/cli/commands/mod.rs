//! CLI command implementations.

pub mod init;
pub mod rules;
pub mod serve;
pub mod session;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::setup::{build_engine, Engine};

/// Load configuration from `path`, or the project hierarchy when unset.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the persistent engine for one-shot commands.
pub async fn open_engine(config: &Config) -> Result<Engine> {
    build_engine(config, false)
        .await
        .context("Failed to open the session store. Run 'specforge init' first.")
}

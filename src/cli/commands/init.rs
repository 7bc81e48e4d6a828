//! Implementation of the `specforge init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput};
use crate::infrastructure::setup::{create_config_dir, create_config_file, run_migrations, SetupPaths};

/// Arguments for `specforge init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// Result of `specforge init`.
#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    /// Whether setup completed
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Directory that was initialized
    pub initialized_path: PathBuf,
    /// Whether the config file was written
    pub config_written: bool,
    /// SQLite database location
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nWrote default configuration to {}", self.initialized_path.join(".specforge/config.yaml").display()));
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }
}

/// Create the config directory, config file and database.
pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };

    let paths = SetupPaths::in_dir(&target_path);
    let already = paths.is_initialized();

    create_config_dir(&paths)?;
    let config_written = create_config_file(&paths, args.force)?;
    run_migrations(&paths).await?;

    let message = match (already, args.force) {
        (true, true) => "Project reinitialized successfully.",
        (true, false) => "Project already initialized; pending migrations applied.",
        (false, _) => "Project initialized successfully.",
    };

    let out = InitOutput {
        success: true,
        message: message.to_string(),
        initialized_path: target_path,
        config_written,
        database_path: paths.database_file,
    };
    output(&out, json_mode);
    Ok(())
}

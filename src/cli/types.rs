//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::init::InitArgs;
use crate::cli::commands::rules::RulesArgs;
use crate::cli::commands::serve::ServeArgs;
use crate::cli::commands::session::SessionArgs;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "specforge")]
#[command(about = "Specforge - refine ambiguous requests into a checked specification", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .specforge/config.yaml)
    #[arg(short, long, global = true, env = "SPECFORGE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Specforge configuration and database
    Init(InitArgs),

    /// Run the HTTP session API
    Serve(ServeArgs),

    /// Specification session commands
    Session(SessionArgs),

    /// Inference rule commands
    Rules(RulesArgs),
}

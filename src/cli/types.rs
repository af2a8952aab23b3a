//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::demo::DemoArgs;

#[derive(Parser, Debug)]
#[command(name = "logweave")]
#[command(about = "Logweave - unified structured logging pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML logging configuration (defaults apply when absent or invalid)
    #[arg(short, long, global = true, env = "LOGWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deployment environment bound to every record (defaults to APP_ENVIRONMENT)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show application settings resolved from APP_* variables
    ShowSettings,

    /// Set up the pipeline from the configuration and emit sample records
    Demo(DemoArgs),
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Streaming chat and model-download orchestration for on-device and cloud AI", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write a configuration template
    Init,
    /// Print the effective configuration
    Config,
    /// Report missing engine settings and configured providers
    Check,
}

//! CLI interface for riskgate
//!
//! Provides subcommands for:
//! - `run`: Replay recorded ticks and signals through the risk gate
//! - `serve`: Run the scheduled engine against a tick stream
//! - `config`: Show the effective configuration

mod run;
mod serve;

pub use run::{replay, ReplaySummary, RunArgs};
pub use serve::ServeArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "riskgate")]
#[command(about = "Risk-gated paper execution engine for predictor signals")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a tick file (and optional signal file) through the engine
    Run(RunArgs),
    /// Run the scheduled engine until Ctrl-C
    Serve(ServeArgs),
    /// Show the effective configuration
    Config,
}

//! CLI argument definitions.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rank` | Run one scoring cycle and print the ranked watch-list |
//! | `run` | Start the polling engine with paper execution |
//! | `sources` | List data source capabilities and health |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | (defaults) | Path to a YAML config file |
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Force deterministic offline data sources |

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Pulsetick - momentum scanner and bounded-risk scalping engine.
///
/// Polls market data for a small watch-list, scores each symbol on a
/// weighted battery of technical factors, and drives a position lifecycle
/// off the ranked output.
#[derive(Debug, Parser)]
#[command(
    name = "pulsetick",
    author,
    version,
    about = "Momentum scanner and bounded-risk scalping engine"
)]
pub struct Cli {
    /// Path to a YAML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Force deterministic offline data sources regardless of credentials.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one scoring cycle and print the ranked watch-list.
    Rank(RankArgs),
    /// Start the polling engine with paper execution until interrupted.
    Run,
    /// List registered data sources with capabilities and health.
    Sources,
}

#[derive(Debug, Args)]
pub struct RankArgs {
    /// Only print records at or above this overall score.
    #[arg(long, default_value_t = 0.0)]
    pub min_score: f64,

    /// Maximum number of records to print.
    #[arg(long, default_value_t = 25)]
    pub limit: usize,
}

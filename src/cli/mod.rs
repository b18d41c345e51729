//! CLI interface using clap
//!
//! Provides the command-line interface for the alignment engine

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// DocAlign - code-to-documentation alignment and gap detection engine
#[derive(Parser, Debug)]
#[command(name = "docalign")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the engine database
    #[arg(long, global = true, env = "DOCALIGN_DB", default_value = "docalign.db")]
    pub db: String,

    /// Path to the engine configuration file
    #[arg(long, global = true, env = "DOCALIGN_CONFIG", default_value = "docalign.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the alignment pipeline over a project input file
    Run(RunArgs),

    /// List detected gaps for a project
    Gaps(GapsArgs),

    /// List mappings for a project
    Mappings(MappingsArgs),

    /// Record a human decision on a gap
    Resolve(ResolveArgs),

    /// Show or reset engine configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the project inputs JSON (entities, docs, signals)
    pub input: String,

    /// Run in delta mode, rescoring only records above the watermark
    #[arg(long)]
    pub delta: bool,

    /// Version watermark for delta mode
    #[arg(long, default_value = "0", requires = "delta")]
    pub watermark: u64,

    /// Probe external links over the network
    #[arg(long)]
    pub probe_links: bool,

    /// Compute but do not persist the results
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for gaps command
#[derive(Parser, Debug)]
pub struct GapsArgs {
    /// Project to list gaps for
    #[arg(short, long)]
    pub project: String,

    /// Filter by severity (critical, high, medium, low)
    #[arg(short, long)]
    pub severity: Option<String>,

    /// Include resolved and wont-fix gaps
    #[arg(short, long)]
    pub all: bool,
}

/// Arguments for mappings command
#[derive(Parser, Debug)]
pub struct MappingsArgs {
    /// Project to list mappings for
    #[arg(short, long)]
    pub project: String,

    /// Filter by relation (describes, references, mentions)
    #[arg(short, long)]
    pub relation: Option<String>,
}

/// Arguments for resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Gap id to update
    pub gap_id: String,

    /// Mark as wont-fix instead of resolved
    #[arg(long)]
    pub wont_fix: bool,

    /// Reason for the decision
    #[arg(short, long)]
    pub reason: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

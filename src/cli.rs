use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Drive Sweeper - frees disk space by retiring aged files on low volumes
#[derive(Parser, Debug)]
#[command(name = "drive-sweeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH", env = "DRIVE_SWEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the retention service
    Run(RunArgs),

    /// Write the default configuration file
    InitConfig(InitConfigArgs),

    /// Print the effective configuration
    ShowConfig(ShowConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Evaluate every rule once and exit
    #[arg(long)]
    pub once: bool,

    /// Log what would be disposed of without touching anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Activity log location (overrides the config file)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the pass report as JSON (with --once)
    #[arg(long, requires = "once")]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ShowConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

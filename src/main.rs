use std::io;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use drive_sweeper::cli::{Cli, Command};
use drive_sweeper::commands;
use drive_sweeper::error::EXIT_STARTUP_FAILURE;

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = dispatch(cli) {
        tracing::debug!(error = ?e, "Startup failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_STARTUP_FAILURE);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run(args) => {
            tracing::info!(?args, "Starting service");
            commands::run::run(args, config_path)?;
        }
        Command::InitConfig(args) => {
            commands::config::init(args, config_path)
                .context("Could not write the default configuration")?;
        }
        Command::ShowConfig(args) => {
            commands::config::show(args, config_path)
                .context("Could not load the configuration")?;
        }
        Command::Completions(args) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "drive-sweeper", &mut io::stdout());
        }
    }

    Ok(())
}

fn init_logging(verbosity: u8, quiet: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drive_sweeper={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

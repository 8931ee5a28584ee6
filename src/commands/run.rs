use std::path::Path;
use std::sync::Arc;

use crate::activity_log::ActivityLog;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::Result;
use crate::monitor::{service, MonitorService, MountTableInspector, PassReport, RunOptions};

pub fn run(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let (config, path) = Config::load_or_create(config_path)?;
    tracing::info!("Loaded configuration from {}", path.display());

    let mut service_config = config.into_service_config()?;
    if let Some(log_file) = args.log_file {
        service_config.log_file = log_file;
    }
    tracing::info!("Activity log: {}", service_config.log_file.display());

    let options = RunOptions {
        dry_run: args.dry_run,
    };

    if !args.once {
        return service::run(service_config, options);
    }

    let log = Arc::new(ActivityLog::open(
        &service_config.log_file,
        service_config.verbose,
    )?);
    let report = MonitorService::new(
        service_config,
        log,
        Box::new(MountTableInspector::new()),
        options,
    )
    .run_once()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PassReport) {
    for rule in &report.rules {
        let status = if !rule.volume_found {
            "not found".to_string()
        } else if rule.triggered {
            format!(
                "{} disposed, {} failed, {} left by dry run",
                rule.disposed, rule.failed, rule.dry_run
            )
        } else {
            "no action".to_string()
        };
        println!("{}: {}", rule.volume, status);
    }
}

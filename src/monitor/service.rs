use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::disk::{DriveInspector, MountTableInspector};
use super::disposer::{DisposeOptions, Disposer};
use super::rules::RuleEvaluator;
use super::scheduler::Scheduler;
use super::signals::{install_signal_handlers, LifecycleSignals};
use super::types::{PassReport, ServiceConfig};
use crate::activity_log::ActivityLog;
use crate::error::Result;

/// How often the control loop looks at lifecycle requests
const CONTROL_POLL: Duration = Duration::from_millis(100);

/// Runtime switches that are not part of the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log disposals without performing them
    pub dry_run: bool,
}

/// Run against the live mount table until SIGTERM or SIGINT.
pub fn run(config: ServiceConfig, options: RunOptions) -> Result<()> {
    let log = Arc::new(ActivityLog::open(&config.log_file, config.verbose)?);
    let signals = install_signal_handlers()?;

    MonitorService::new(config, log, Box::new(MountTableInspector::new()), options).run(&signals)
}

pub struct MonitorService {
    config: ServiceConfig,
    log: Arc<ActivityLog>,
    evaluator: Arc<RuleEvaluator>,
}

impl MonitorService {
    pub fn new(
        config: ServiceConfig,
        log: Arc<ActivityLog>,
        inspector: Box<dyn DriveInspector>,
        options: RunOptions,
    ) -> Self {
        let disposer = Disposer::new(DisposeOptions {
            dry_run: options.dry_run,
        });
        let evaluator = RuleEvaluator::new(
            config.rules.clone(),
            inspector,
            disposer,
            Arc::clone(&log),
        );

        Self {
            config,
            log,
            evaluator: Arc::new(evaluator),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Evaluate every rule once and return
    pub fn run_once(&self) -> Result<PassReport> {
        self.announce_start();
        let report = self.evaluator.run_pass();
        self.log.log("Stopping service");
        report
    }

    /// Run passes every poll interval until `signals` asks to stop.
    pub fn run(&self, signals: &LifecycleSignals) -> Result<()> {
        self.announce_start();

        let evaluator = Arc::clone(&self.evaluator);
        let scheduler = Scheduler::start(self.config.poll_interval, Arc::clone(&self.log), move || {
            let report = evaluator.run_pass()?;
            tracing::info!(
                disposed = report.total_disposed(),
                failed = report.total_failed(),
                "Pass complete"
            );
            Ok(())
        })?;

        while !signals.should_stop() {
            if signals.take_pause() && !scheduler.is_paused() {
                self.log.log("Pausing service");
                scheduler.pause();
            }

            if signals.take_resume() && scheduler.is_paused() {
                self.log.log("Resuming service");
                scheduler.resume();
            }

            thread::sleep(CONTROL_POLL);
        }

        let stats = scheduler.stop();
        tracing::info!(?stats, "Scheduler stopped");

        self.log.log("Stopping service");
        Ok(())
    }

    fn announce_start(&self) {
        tracing::info!(
            "Starting with {}s interval and {} rule(s)",
            self.config.poll_interval.as_secs(),
            self.config.rules.len()
        );
        self.log.log("Starting service");
        self.log.log(self.config.settings_summary());
    }
}

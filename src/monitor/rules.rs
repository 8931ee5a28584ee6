//! One evaluation pass: inspect, decide, sweep, dispose, for every rule in order.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::disk::DriveInspector;
use super::disposer::{DisposalOutcome, Disposer};
use super::sweeper::RetentionSweeper;
use super::types::{Candidate, DisposalMethod, MonitorRule, PassReport, RuleReport};
use crate::activity_log::{format_timestamp, ActivityLog};
use crate::error::Result;

const RULER: &str = "-----------------------------------------------------------";

pub struct RuleEvaluator {
    rules: Vec<MonitorRule>,
    inspector: Box<dyn DriveInspector>,
    disposer: Disposer,
    log: Arc<ActivityLog>,
}

impl RuleEvaluator {
    pub fn new(
        rules: Vec<MonitorRule>,
        inspector: Box<dyn DriveInspector>,
        disposer: Disposer,
        log: Arc<ActivityLog>,
    ) -> Self {
        Self {
            rules,
            inspector,
            disposer,
            log,
        }
    }

    /// Evaluate every rule in configured order.
    ///
    /// A failing rule is logged and does not stop the rules after it.
    pub fn run_pass(&self) -> Result<PassReport> {
        self.log
            .log(format!("Checking {} drive(s) {}", self.rules.len(), RULER));

        let mut report = PassReport::default();

        for rule in &self.rules {
            self.log
                .log(format!("Checking drive: {} {}", rule.volume, RULER));

            let rule_report = match self.evaluate(rule) {
                Ok(rule_report) => rule_report,
                Err(e) => {
                    self.log
                        .log(format!("Skipping drive {}: {}", rule.volume, e));
                    RuleReport {
                        volume: rule.volume.clone(),
                        ..Default::default()
                    }
                }
            };

            report.rules.push(rule_report);
        }

        Ok(report)
    }

    fn evaluate(&self, rule: &MonitorRule) -> Result<RuleReport> {
        let mut report = RuleReport {
            volume: rule.volume.clone(),
            ..Default::default()
        };

        let Some(snapshot) = self.inspector.inspect(&rule.volume)? else {
            self.log.log(format!("Drive {} not found", rule.volume));
            return Ok(report);
        };
        report.volume_found = true;

        let ratio = snapshot.free_ratio()?;
        report.free_ratio = Some(ratio);

        self.log.log(format!(
            "\n\tTotal space = {} ({})\n\tAvailable space = {} ({}, {:.2}%)",
            snapshot.total_bytes,
            snapshot.total_human(),
            snapshot.available_bytes,
            snapshot.available_human(),
            ratio * 100.0
        ));

        if !rule.is_triggered(ratio) {
            self.log.log(format!(
                "No action for {}: {:.2}% free, trigger is {}%",
                rule.volume,
                ratio * 100.0,
                rule.trigger_ratio * 100.0
            ));
            return Ok(report);
        }
        report.triggered = true;

        self.log.log(format!(
            "Clearing files and folders from {} older than {} days",
            rule.watch_path.display(),
            rule.age_threshold_days
        ));

        self.sweep(rule, &mut report);
        Ok(report)
    }

    fn sweep(&self, rule: &MonitorRule, report: &mut RuleReport) {
        for item in RetentionSweeper::new(&rule.watch_path).candidates() {
            let candidate = match item {
                Ok(candidate) => candidate,
                Err(e) => {
                    report.unreadable += 1;
                    self.log.log(e.to_string());
                    continue;
                }
            };
            report.examined += 1;

            let expired = candidate.is_expired(rule.age_threshold_days);

            if self.log.verbose() {
                self.log
                    .log(describe_candidate(&candidate, rule.age_threshold_days, expired));
            }

            if !expired {
                continue;
            }

            if self.log.verbose() {
                self.log.log(describe_action(&candidate, &rule.disposal));
            }

            match self.disposer.dispose(&candidate, &rule.disposal) {
                DisposalOutcome::Deleted => {
                    report.disposed += 1;
                    self.log
                        .log(format!("Deleted {}", candidate.path.display()));
                }
                DisposalOutcome::Moved { to } => {
                    report.disposed += 1;
                    self.log.log(format!(
                        "Moved {} to {}",
                        candidate.path.display(),
                        to.display()
                    ));
                }
                DisposalOutcome::DryRun => {
                    report.dry_run += 1;
                    self.log.log(format!(
                        "Dry run, leaving {} in place",
                        candidate.path.display()
                    ));
                }
                DisposalOutcome::Failed { reason } => {
                    report.failed += 1;
                    self.log.log(format!(
                        "Failed to dispose of {}: {}",
                        candidate.path.display(),
                        reason
                    ));
                }
            }
        }
    }
}

fn describe_candidate(candidate: &Candidate, threshold_days: u32, expired: bool) -> String {
    let modified: DateTime<Utc> = candidate.modified.into();
    let kind = candidate.kind();

    format!(
        "\n\t\t(verbose logging):\
         \n\t\t\t{kind} {} last write time: {}\
         \n\t\t\t\t{kind} is {:.4} days old.\
         \n\t\t\t\tDispose (older than {} days): {}",
        candidate.path.display(),
        format_timestamp(modified),
        candidate.age_days,
        threshold_days,
        expired
    )
}

fn describe_action(candidate: &Candidate, method: &DisposalMethod) -> String {
    match method {
        DisposalMethod::Delete => format!("\t\t\t\tDeleting {}", candidate.path.display()),
        DisposalMethod::Move { destination } => format!(
            "\t\t\t\tMoving {} to {}",
            candidate.path.display(),
            destination.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_log::{LogSink, MemorySink, RetryPolicy};
    use crate::error::SweeperError;
    use crate::monitor::disposer::DisposeOptions;
    use crate::monitor::types::VolumeSnapshot;
    use filetime::{set_file_mtime, FileTime};
    use std::collections::HashMap;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Serves fixed capacities; unknown volumes are "not found".
    struct FixedInspector {
        volumes: HashMap<String, (u64, u64)>,
    }

    impl FixedInspector {
        fn with(volumes: &[(&str, u64, u64)]) -> Box<dyn DriveInspector> {
            Box::new(Self {
                volumes: volumes
                    .iter()
                    .map(|(name, total, avail)| (name.to_string(), (*total, *avail)))
                    .collect(),
            })
        }
    }

    impl DriveInspector for FixedInspector {
        fn inspect(&self, volume: &str) -> Result<Option<VolumeSnapshot>> {
            Ok(self
                .volumes
                .get(volume)
                .map(|&(total_bytes, available_bytes)| VolumeSnapshot {
                    volume: volume.to_string(),
                    mount_point: PathBuf::from("/mnt").join(volume),
                    total_bytes,
                    available_bytes,
                }))
        }
    }

    struct BrokenInspector;

    impl DriveInspector for BrokenInspector {
        fn inspect(&self, _volume: &str) -> Result<Option<VolumeSnapshot>> {
            Err(SweeperError::Other("mount table unreadable".to_string()))
        }
    }

    fn aged(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * 86_400);
        set_file_mtime(path, FileTime::from_system_time(when)).unwrap();
    }

    fn rule(volume: &str, watch: &Path, disposal: DisposalMethod, trigger_ratio: f64) -> MonitorRule {
        MonitorRule {
            volume: volume.to_string(),
            watch_path: watch.to_path_buf(),
            disposal,
            age_threshold_days: 30,
            trigger_ratio,
        }
    }

    fn evaluator(
        rules: Vec<MonitorRule>,
        inspector: Box<dyn DriveInspector>,
        verbose: bool,
    ) -> (RuleEvaluator, MemorySink) {
        let sink = MemorySink::new();
        let log = Arc::new(ActivityLog::with_sink(
            Box::new(sink.clone()),
            verbose,
            RetryPolicy::default(),
        ));
        let disposer = Disposer::new(DisposeOptions::default());
        (RuleEvaluator::new(rules, inspector, disposer, log), sink)
    }

    /// old-dir (31 days), fresh.txt (10 days), old.txt (45 days)
    fn watch_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir(root.join("old-dir")).unwrap();
        fs::write(root.join("old-dir/frame.bin"), "x").unwrap();
        fs::write(root.join("fresh.txt"), "x").unwrap();
        fs::write(root.join("old.txt"), "x").unwrap();
        aged(&root.join("old-dir"), 31);
        aged(&root.join("fresh.txt"), 10);
        aged(&root.join("old.txt"), 45);
        tmp
    }

    fn contains(lines: &[String], needle: &str) -> bool {
        lines.iter().any(|l| l.contains(needle))
    }

    #[test]
    fn test_low_space_triggers_sweep() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, 0.10)],
            FixedInspector::with(&[("X", 1000, 50)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert!(report.rules[0].triggered);
        assert_eq!(report.rules[0].disposed, 2);
        assert!(!watch.path().join("old-dir").exists());
        assert!(!watch.path().join("old.txt").exists());
        assert!(watch.path().join("fresh.txt").exists());
        assert!(contains(&sink.lines(), "Clearing files and folders from"));
    }

    #[test]
    fn test_plenty_of_space_takes_no_action() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, 0.10)],
            FixedInspector::with(&[("X", 1000, 500)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert!(!report.rules[0].triggered);
        assert_eq!(report.rules[0].examined, 0);
        assert!(watch.path().join("old.txt").exists());
        assert!(contains(&sink.lines(), "No action for X"));
    }

    #[test]
    fn test_negative_trigger_sweeps_a_free_volume() {
        let watch = watch_dir();
        let (eval, _sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -0.01)],
            FixedInspector::with(&[("X", 1000, 1000)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert!(report.rules[0].triggered);
        assert_eq!(report.total_disposed(), 2);
    }

    #[test]
    fn test_missing_volume_skips_only_that_rule() {
        let first = watch_dir();
        let second = watch_dir();
        let (eval, sink) = evaluator(
            vec![
                rule("missing", first.path(), DisposalMethod::Delete, -1.0),
                rule("X", second.path(), DisposalMethod::Delete, -1.0),
            ],
            FixedInspector::with(&[("X", 1000, 10)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert!(!report.rules[0].volume_found);
        assert!(first.path().join("old.txt").exists());
        assert_eq!(report.rules[1].disposed, 2);
        assert!(contains(&sink.lines(), "Drive missing not found"));
    }

    #[test]
    fn test_zero_capacity_is_logged_not_divided() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 0, 0)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert!(report.rules[0].free_ratio.is_none());
        assert!(watch.path().join("old.txt").exists());
        assert!(contains(&sink.lines(), "zero total capacity"));
    }

    #[test]
    fn test_inspector_error_does_not_escape_the_pass() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            Box::new(BrokenInspector),
            false,
        );

        assert!(eval.run_pass().is_ok());
        assert!(contains(&sink.lines(), "mount table unreadable"));
    }

    #[test]
    fn test_failure_does_not_stop_later_entries() {
        let watch = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = watch.path().join(name);
            fs::write(&path, name).unwrap();
            aged(&path, 40);
        }
        fs::write(archive.path().join("b.txt"), "already here").unwrap();

        let method = DisposalMethod::Move {
            destination: archive.path().to_path_buf(),
        };
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), method, -1.0)],
            FixedInspector::with(&[("X", 1000, 10)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert_eq!(report.rules[0].disposed, 2);
        assert_eq!(report.rules[0].failed, 1);
        assert!(archive.path().join("a.txt").exists());
        assert!(archive.path().join("c.txt").exists());
        assert!(watch.path().join("b.txt").exists());
        assert!(contains(&sink.lines(), "Failed to dispose of"));
    }

    #[test]
    fn test_second_pass_finds_nothing_left() {
        let watch = watch_dir();
        let (eval, _sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 1000, 10)]),
            false,
        );

        let first = eval.run_pass().unwrap();
        let second = eval.run_pass().unwrap();

        assert_eq!(first.total_disposed(), 2);
        assert_eq!(second.total_disposed(), 0);
        assert_eq!(second.total_failed(), 0);
        assert_eq!(second.rules[0].examined, 1);
    }

    /// Records lines and removes `victim` once a line mentions `trigger`
    struct RemovingSink {
        inner: MemorySink,
        trigger: String,
        victim: PathBuf,
    }

    impl LogSink for RemovingSink {
        fn append(&mut self, line: &str) -> io::Result<()> {
            if line.contains(&self.trigger) && self.victim.exists() {
                fs::remove_file(&self.victim)?;
            }
            self.inner.append(line)
        }
    }

    #[test]
    fn test_vanished_entry_is_counted_and_sweep_continues() {
        let watch = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let path = watch.path().join(name);
            fs::write(&path, "x").unwrap();
            aged(&path, 40);
        }

        let lines = MemorySink::new();
        let sink = RemovingSink {
            inner: lines.clone(),
            trigger: format!("Deleted {}", watch.path().join("a.txt").display()),
            victim: watch.path().join("b.txt"),
        };
        let log = Arc::new(ActivityLog::with_sink(
            Box::new(sink),
            false,
            RetryPolicy::default(),
        ));
        let eval = RuleEvaluator::new(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 1000, 500)]),
            Disposer::new(DisposeOptions::default()),
            log,
        );

        let report = eval.run_pass().unwrap();

        assert_eq!(report.rules[0].unreadable, 1);
        assert_eq!(report.rules[0].disposed, 2);
        assert!(!watch.path().join("c.txt").exists());
        assert!(contains(&lines.lines(), "b.txt"));
        assert!(contains(
            &lines.lines(),
            &format!("Deleted {}", watch.path().join("c.txt").display())
        ));
    }

    #[test]
    fn test_unreadable_watch_path_is_logged() {
        let tmp = TempDir::new().unwrap();
        let (eval, sink) = evaluator(
            vec![rule("X", &tmp.path().join("gone"), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 1000, 10)]),
            false,
        );

        let report = eval.run_pass().unwrap();

        assert_eq!(report.rules[0].unreadable, 1);
        assert!(contains(&sink.lines(), "Cannot read"));
    }

    #[test]
    fn test_verbose_logs_each_decision() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 1000, 10)]),
            true,
        );

        eval.run_pass().unwrap();
        let lines = sink.lines();

        let diagnostics = lines.iter().filter(|l| l.contains("(verbose logging)")).count();
        assert_eq!(diagnostics, 3);
        assert!(contains(&lines, "Dispose (older than 30 days): false"));
        assert!(contains(&lines, "Dispose (older than 30 days): true"));
        assert!(contains(&lines, "Folder "));
        assert!(contains(&lines, "\t\t\t\tDeleting "));
    }

    #[test]
    fn test_quiet_mode_omits_diagnostics() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![rule("X", watch.path(), DisposalMethod::Delete, -1.0)],
            FixedInspector::with(&[("X", 1000, 10)]),
            false,
        );

        eval.run_pass().unwrap();

        assert!(!contains(&sink.lines(), "(verbose logging)"));
    }

    #[test]
    fn test_rules_logged_in_configured_order() {
        let watch = watch_dir();
        let (eval, sink) = evaluator(
            vec![
                rule("B", watch.path(), DisposalMethod::Delete, 0.0),
                rule("A", watch.path(), DisposalMethod::Delete, 0.0),
            ],
            FixedInspector::with(&[("A", 10, 5), ("B", 10, 5)]),
            false,
        );

        eval.run_pass().unwrap();
        let headers: Vec<String> = sink
            .lines()
            .into_iter()
            .filter(|l| l.contains("Checking drive:"))
            .collect();

        assert!(headers[0].contains("Checking drive: B"));
        assert!(headers[1].contains("Checking drive: A"));
        assert!(sink.lines()[0].contains("Checking 2 drive(s)"));
    }
}

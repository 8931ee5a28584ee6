pub mod disk;
pub mod disposer;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod signals;
pub mod sweeper;
pub mod types;

pub use disk::{DriveInspector, MountPoint, MountTableInspector};
pub use disposer::{DisposalOutcome, DisposeOptions, Disposer};
pub use rules::RuleEvaluator;
pub use scheduler::{Scheduler, SchedulerStats};
pub use service::{MonitorService, RunOptions};
pub use signals::{install_signal_handlers, LifecycleSignals};
pub use sweeper::{RetentionSweeper, SweepError};
pub use types::{
    Candidate, DisposalMethod, MonitorRule, PassReport, RuleReport, ServiceConfig, VolumeSnapshot,
};

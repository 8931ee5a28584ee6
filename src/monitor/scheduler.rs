//! Fixed-interval driver for evaluation passes.
//!
//! A ticker thread owns the clock and a worker thread runs passes. The
//! in-flight flag is set by the ticker when it hands a tick over and cleared
//! by the worker when the pass ends, so a tick that finds it set is dropped.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::activity_log::ActivityLog;
use crate::error::{Result, SweeperError};

/// Counters since the scheduler started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Passes started
    pub fired: u64,
    /// Ticks dropped because a pass was still running
    pub skipped: u64,
    /// Ticks swallowed while paused
    pub paused: u64,
}

#[derive(Default)]
struct Shared {
    in_flight: AtomicBool,
    paused: AtomicBool,
    stopping: AtomicBool,
    fired: AtomicU64,
    skipped: AtomicU64,
    paused_ticks: AtomicU64,
}

pub struct Scheduler {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start firing `pass` every `interval`, beginning immediately.
    pub fn start<F>(interval: Duration, log: Arc<ActivityLog>, pass: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(SweeperError::Other(
                "Scheduler interval must be greater than zero".to_string(),
            ));
        }

        let shared = Arc::new(Shared::default());
        let (work_tx, work_rx) = bounded::<u64>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("sweeper-pass".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                let log = Arc::clone(&log);
                move || worker_loop(work_rx, &shared, &log, pass)
            })?;

        let ticker = thread::Builder::new()
            .name("sweeper-ticker".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || ticker_loop(interval, stop_rx, work_tx, &shared, &log)
            })?;

        Ok(Self {
            shared,
            stop_tx: Some(stop_tx),
            ticker: Some(ticker),
            worker: Some(worker),
        })
    }

    /// Suspend firing; the interval phase is kept
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Whether a pass is running right now
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            fired: self.shared.fired.load(Ordering::SeqCst),
            skipped: self.shared.skipped.load(Ordering::SeqCst),
            paused: self.shared.paused_ticks.load(Ordering::SeqCst),
        }
    }

    /// Stop firing and block until the running pass, if any, has finished.
    pub fn stop(mut self) -> SchedulerStats {
        self.shutdown();
        self.stats()
    }

    fn shutdown(&mut self) {
        self.shared.stopping.store(true, Ordering::SeqCst);

        // Disconnecting wakes the ticker; it drops the work sender on exit
        drop(self.stop_tx.take());

        if let Some(ticker) = self.ticker.take() {
            if ticker.join().is_err() {
                tracing::error!("Scheduler ticker thread panicked");
            }
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Scheduler worker thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn ticker_loop(
    interval: Duration,
    stop_rx: Receiver<()>,
    work_tx: Sender<u64>,
    shared: &Shared,
    log: &ActivityLog,
) {
    let mut deadline = Instant::now();
    let mut tick: u64 = 0;

    loop {
        if shared.paused.load(Ordering::SeqCst) {
            shared.paused_ticks.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Tick {} ignored while paused", tick);
        } else {
            fire(tick, &work_tx, shared, log);
        }

        tick += 1;
        deadline += interval;

        let wait = deadline.saturating_duration_since(Instant::now());
        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn fire(tick: u64, work_tx: &Sender<u64>, shared: &Shared, log: &ActivityLog) {
    // Once shutdown starts only the service's final line may be logged
    if shared.stopping.load(Ordering::SeqCst) {
        return;
    }

    if shared
        .in_flight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        shared.skipped.fetch_add(1, Ordering::SeqCst);
        log.log(format!(
            "Previous check still running, skipping cycle {}",
            tick
        ));
        return;
    }

    if work_tx.try_send(tick).is_err() {
        // Worker is gone; nothing will clear the flag otherwise
        shared.in_flight.store(false, Ordering::SeqCst);
        tracing::error!("Pass worker unavailable, dropping tick {}", tick);
    }
}

fn worker_loop<F>(work_rx: Receiver<u64>, shared: &Shared, log: &ActivityLog, mut pass: F)
where
    F: FnMut() -> Result<()>,
{
    for tick in work_rx.iter() {
        if shared.stopping.load(Ordering::SeqCst) {
            shared.in_flight.store(false, Ordering::SeqCst);
            continue;
        }

        shared.fired.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Starting pass for tick {}", tick);

        match panic::catch_unwind(AssertUnwindSafe(&mut pass)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log.log(format!("Check failed: {}", e)),
            Err(payload) => log.log(format!(
                "Check aborted: {}",
                SweeperError::PassPanicked(panic_message(payload.as_ref()))
            )),
        }

        shared.in_flight.store(false, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

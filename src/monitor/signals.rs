use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use nix::sys::signal::{self, SigHandler, Signal};

static INSTALLED: OnceLock<Arc<LifecycleSignals>> = OnceLock::new();

/// Stop/pause/resume requests from the host, polled by the service loop
#[derive(Debug, Default)]
pub struct LifecycleSignals {
    stop: AtomicBool,
    pause: AtomicBool,
    resume: AtomicBool,
}

impl LifecycleSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn request_resume(&self) {
        self.resume.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Check and clear a pending pause request
    pub fn take_pause(&self) -> bool {
        self.pause.swap(false, Ordering::SeqCst)
    }

    /// Check and clear a pending resume request
    pub fn take_resume(&self) -> bool {
        self.resume.swap(false, Ordering::SeqCst)
    }
}

/// Route SIGTERM/SIGINT to stop, SIGUSR1 to pause and SIGUSR2 to resume.
///
/// Every call returns the same process-wide instance.
pub fn install_signal_handlers() -> nix::Result<Arc<LifecycleSignals>> {
    let signals = Arc::clone(INSTALLED.get_or_init(|| Arc::new(LifecycleSignals::new())));

    // SAFETY: the handlers only touch atomics reachable through a static
    // that is initialised before any handler is registered.
    unsafe {
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_stop))?;
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_stop))?;
        signal::signal(Signal::SIGUSR1, SigHandler::Handler(handle_pause))?;
        signal::signal(Signal::SIGUSR2, SigHandler::Handler(handle_resume))?;
    }

    Ok(signals)
}

extern "C" fn handle_stop(_: i32) {
    if let Some(signals) = INSTALLED.get() {
        signals.request_stop();
    }
}

extern "C" fn handle_pause(_: i32) {
    if let Some(signals) = INSTALLED.get() {
        signals.request_pause();
    }
}

extern "C" fn handle_resume(_: i32) {
    if let Some(signals) = INSTALLED.get() {
        signals.request_resume();
    }
}

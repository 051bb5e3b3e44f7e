//! Run context threaded through every component call.
//!
//! Holds the step counters and the log sink handle for one run. There is no
//! global mutable state: whoever needs to log or report progress receives a
//! `&RunContext`.

use crate::run_log::RunLog;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct RunContext {
    log: Arc<RunLog>,
    current_step: AtomicUsize,
    total_steps: AtomicUsize,
}

impl RunContext {
    pub fn new(log: RunLog) -> Self {
        Self {
            log: Arc::new(log),
            current_step: AtomicUsize::new(0),
            total_steps: AtomicUsize::new(0),
        }
    }

    /// Context whose log only goes to tracing
    pub fn quiet() -> Self {
        Self::new(RunLog::discard())
    }

    #[inline]
    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Reset the counters for a sequence of `total` steps
    pub fn begin_steps(&self, total: usize) {
        self.current_step.store(0, Ordering::SeqCst);
        self.total_steps.store(total, Ordering::SeqCst);
    }

    /// Increment the step counter and log `[current/total] name`.
    ///
    /// Returns the new current step.
    pub fn next_step(&self, name: &str) -> usize {
        let current = self.current_step.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total_steps.load(Ordering::SeqCst);
        self.log.info(format!("[{}/{}] {}", current, total, name));
        current
    }

    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::SeqCst)
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps.load(Ordering::SeqCst)
    }
}

//! Download Manager
//!
//! Fetches groups of artifacts in bounded parallel batches with per-task
//! retries and linear backoff.
//!
//! # Scheduling
//!
//! Tasks are split into batches of `max_parallel`. Each full batch runs as
//! scoped worker threads and the caller blocks until the whole batch joins.
//! Tasks left over after the last full batch run one at a time on the
//! calling thread. There is no long-lived pool.
//!
//! # Success
//!
//! A fetch counts only when the client reports success *and* an independent
//! presence check confirms the artifact. A clean exit from the fetch command
//! alone is not enough.
//!
//! The manager never decides whether an exhausted task is fatal; the calling
//! stage does.

use crate::context::RunContext;
use crate::error::Result;
use std::thread;
use std::time::Duration;

/// Default number of concurrent fetches
pub const DEFAULT_MAX_PARALLEL: usize = 2;

/// Default attempts per task
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff unit
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(5);

// ============================================================================
// Capabilities
// ============================================================================

/// Fetches artifacts by id and confirms their presence.
pub trait ArtifactClient: Send + Sync {
    fn fetch(&self, artifact_id: &str) -> Result<()>;

    /// Independent post-fetch check. Must not mutate anything.
    fn is_present(&self, artifact_id: &str) -> bool;
}

/// Blocking sleep, injectable so retry timing can be observed in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

// ============================================================================
// Tasks and results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub artifact_id: String,
    pub display_name: String,
    pub max_attempts: u32,
}

impl DownloadTask {
    pub fn new(artifact_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            display_name: display_name.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Linear backoff: the sleep after failed attempt `n` is `n × unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub unit: Duration,
}

impl BackoffPolicy {
    pub const fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_UNIT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub artifact_id: String,
    pub display_name: String,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success { .. })
    }
}

/// Display names of the tasks that did not succeed
pub fn exhausted_names(results: &[TaskResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.display_name.clone())
        .collect()
}

// ============================================================================
// Manager
// ============================================================================

pub struct DownloadManager<'a> {
    client: &'a dyn ArtifactClient,
    sleeper: &'a dyn Sleeper,
    backoff: BackoffPolicy,
}

impl<'a> DownloadManager<'a> {
    pub fn new(client: &'a dyn ArtifactClient, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            client,
            sleeper,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch every task; results come back in task order.
    pub fn fetch_group(
        &self,
        ctx: &RunContext,
        tasks: &[DownloadTask],
        max_parallel: usize,
    ) -> Vec<TaskResult> {
        let max_parallel = max_parallel.max(1);
        let mut results = Vec::with_capacity(tasks.len());

        let mut batches = tasks.chunks_exact(max_parallel);
        for batch in batches.by_ref() {
            if max_parallel == 1 {
                results.push(self.fetch_one(ctx, &batch[0]));
                continue;
            }
            tracing::debug!("Starting download batch of {}", batch.len());
            let joined: Vec<TaskResult> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|task| (task, scope.spawn(move || self.fetch_one(ctx, task))))
                    .collect();
                handles
                    .into_iter()
                    .map(|(task, handle)| {
                        handle.join().unwrap_or_else(|_| TaskResult {
                            artifact_id: task.artifact_id.clone(),
                            display_name: task.display_name.clone(),
                            outcome: TaskOutcome::Exhausted {
                                attempts: 0,
                                last_error: "download worker panicked".to_string(),
                            },
                        })
                    })
                    .collect()
            });
            results.extend(joined);
        }

        for task in batches.remainder() {
            results.push(self.fetch_one(ctx, task));
        }
        results
    }

    /// Run one task's retry loop on the current thread.
    pub fn fetch_one(&self, ctx: &RunContext, task: &DownloadTask) -> TaskResult {
        let log = ctx.log();
        let max_attempts = task.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            log.info(format!(
                "Downloading {} (attempt {}/{})",
                task.display_name, attempt, max_attempts
            ));

            match self.client.fetch(&task.artifact_id) {
                Ok(()) if self.client.is_present(&task.artifact_id) => {
                    log.success(format!("Downloaded {}", task.display_name));
                    return TaskResult {
                        artifact_id: task.artifact_id.clone(),
                        display_name: task.display_name.clone(),
                        outcome: TaskOutcome::Success { attempts: attempt },
                    };
                }
                Ok(()) => {
                    last_error = "fetch reported success but artifact is not present".to_string();
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < max_attempts {
                let delay = self.backoff.delay_after(attempt);
                log.warning(format!(
                    "{} failed: {}; retrying in {}s",
                    task.display_name,
                    last_error,
                    delay.as_secs()
                ));
                self.sleeper.sleep(delay);
            }
        }

        log.error(format!(
            "{} failed after {} attempts: {}",
            task.display_name, max_attempts, last_error
        ));
        TaskResult {
            artifact_id: task.artifact_id.clone(),
            display_name: task.display_name.clone(),
            outcome: TaskOutcome::Exhausted {
                attempts: max_attempts,
                last_error,
            },
        }
    }
}

//! DownloadManager: retries, backoff and batch scheduling.

mod common;

use common::{captured_log, FakeArtifacts, RecordingSleeper};
use stackprov::context::RunContext;
use stackprov::download::{
    ArtifactClient, BackoffPolicy, DownloadManager, DownloadTask, TaskOutcome,
};
use stackprov::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::{self, ThreadId};
use std::time::Duration;

#[test]
fn test_success_on_third_attempt_sleeps_twice() {
    let client = FakeArtifacts::new().failing("llama3.2:3b", 2);
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper)
        .with_backoff(BackoffPolicy::new(Duration::from_secs(5)));

    let result = manager.fetch_one(&RunContext::quiet(), &DownloadTask::new("llama3.2:3b", "Chat"));

    assert_eq!(result.outcome, TaskOutcome::Success { attempts: 3 });
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
    assert_eq!(client.fetches_of("llama3.2:3b"), 3);
}

#[test]
fn test_exhausted_never_tries_a_fourth_time() {
    let client = FakeArtifacts::new().always_failing("wiki.zim");
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);

    let result = manager.fetch_one(&RunContext::quiet(), &DownloadTask::new("wiki.zim", "Wikipedia"));

    match result.outcome {
        TaskOutcome::Exhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(client.fetches_of("wiki.zim"), 3);
    // no sleep after the final attempt
    assert_eq!(sleeper.recorded().len(), 2);
}

#[test]
fn test_first_attempt_success_never_sleeps() {
    let client = FakeArtifacts::new();
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);

    let result = manager.fetch_one(&RunContext::quiet(), &DownloadTask::new("a", "A"));
    assert_eq!(result.outcome, TaskOutcome::Success { attempts: 1 });
    assert!(sleeper.recorded().is_empty());
}

#[test]
fn test_unconfirmed_fetch_is_retried() {
    let client = FakeArtifacts::new().phantom("voice.onnx");
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);

    let result = manager.fetch_one(&RunContext::quiet(), &DownloadTask::new("voice.onnx", "Voice"));
    assert!(!result.is_success());
    assert_eq!(client.fetches_of("voice.onnx"), 3);
}

/// Records which thread ran each fetch and how many ran at once.
struct ThreadTracking {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    threads: Mutex<HashMap<String, ThreadId>>,
}

impl ThreadTracking {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            threads: Mutex::new(HashMap::new()),
        }
    }
}

impl ArtifactClient for ThreadTracking {
    fn fetch(&self, artifact_id: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.threads
            .lock()
            .unwrap()
            .insert(artifact_id.to_string(), thread::current().id());
        thread::sleep(Duration::from_millis(100));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_present(&self, _artifact_id: &str) -> bool {
        true
    }
}

#[test]
fn test_batches_are_bounded_and_remainder_is_sequential() {
    let client = ThreadTracking::new();
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);
    let tasks: Vec<DownloadTask> = (1..=5)
        .map(|i| DownloadTask::new(format!("t{}", i), format!("Task {}", i)))
        .collect();

    let results = manager.fetch_group(&RunContext::quiet(), &tasks, 2);

    let ids: Vec<&str> = results.iter().map(|r| r.artifact_id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3", "t4", "t5"]);
    assert!(results.iter().all(|r| r.is_success()));

    let max = client.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 2, "at most two fetches may run at once, saw {}", max);
    assert_eq!(max, 2);

    let threads = client.threads.lock().unwrap();
    let caller = thread::current().id();
    for batched in ["t1", "t2", "t3", "t4"] {
        assert_ne!(threads[batched], caller, "{} should run on a worker", batched);
    }
    assert_eq!(threads["t5"], caller, "leftover task runs on the calling thread");
}

#[test]
fn test_group_with_mixed_outcomes() {
    let client = FakeArtifacts::new().always_failing("bad");
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);
    let tasks = vec![
        DownloadTask::new("good", "Good"),
        DownloadTask::new("bad", "Bad").with_max_attempts(2),
        DownloadTask::new("fine", "Fine"),
    ];

    let results = manager.fetch_group(&RunContext::quiet(), &tasks, 2);
    assert!(results[0].is_success());
    assert_eq!(
        results[1].outcome,
        TaskOutcome::Exhausted {
            attempts: 2,
            last_error: "Command failed: connection reset (bad)".to_string()
        }
    );
    assert!(results[2].is_success());
    assert_eq!(client.fetches_of("bad"), 2);
}

#[test]
fn test_workers_share_the_run_log() {
    let (log, buf) = captured_log();
    let ctx = RunContext::new(log);
    let client = FakeArtifacts::new();
    let sleeper = RecordingSleeper::default();
    let manager = DownloadManager::new(&client, &sleeper);
    let tasks = vec![DownloadTask::new("a", "Alpha"), DownloadTask::new("b", "Beta")];

    manager.fetch_group(&ctx, &tasks, 2);

    let content = buf.contents();
    assert!(content.contains("[SUCCESS] Downloaded Alpha"));
    assert!(content.contains("[SUCCESS] Downloaded Beta"));
}

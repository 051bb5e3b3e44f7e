//! Append-only run log
//!
//! One timestamped, leveled line per event. The sink is shared by the control
//! thread and concurrent download workers; each line is a single write under
//! the lock, but ordering between workers is not guaranteed.

use chrono::Local;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DEFAULT_LOG_FILE: &str = "/var/log/stackprov/provision.log";

/// Level of a run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only log sink for a single run.
pub struct RunLog {
    writer: Mutex<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
}

impl RunLog {
    /// Open (or create) the log file in append mode.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Log into an arbitrary writer (used when no file is wanted).
    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
            path: None,
        }
    }

    /// Log sink that only mirrors to tracing
    pub fn discard() -> Self {
        Self::to_writer(io::sink())
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Hand the log file over to the run identity.
    ///
    /// The orchestrator typically runs under sudo; the log belongs to the
    /// account the installed tools operate under.
    pub fn chown_to(&self, username: &str) -> io::Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let user = nix::unistd::User::from_name(username)
            .map_err(io::Error::from)?
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such user '{}'", username))
            })?;
        nix::unistd::chown(path, Some(user.uid), Some(user.gid)).map_err(io::Error::from)
    }

    /// Write one line at the given level and mirror it to tracing.
    ///
    /// Failures to write the file are reported through tracing only; a
    /// broken log must never abort provisioning.
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        match level {
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Success => tracing::info!(success = true, "{}", message),
            LogLevel::Warning => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }

        let line = format!(
            "[{}] [{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        match self.writer.lock() {
            Ok(mut writer) => {
                if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
                    tracing::warn!("Failed to write run log: {}", e);
                }
            }
            Err(_) => tracing::warn!("Run log lock poisoned; line dropped"),
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl fmt::Debug for RunLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_lines_are_timestamped_and_leveled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/run.log");
        let log = RunLog::open(&path).unwrap();

        log.info("starting");
        log.success("done");
        log.warning("careful");
        log.error("broken");

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("[INFO] starting"));
        assert!(lines[1].ends_with("[SUCCESS] done"));
        assert!(lines[2].ends_with("[WARNING] careful"));
        assert!(lines[3].ends_with("[ERROR] broken"));
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");

        RunLog::open(&path).unwrap().info("first run");
        RunLog::open(&path).unwrap().info("second run");

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("first run"));
        assert!(content.contains("second run"));
    }

    #[test]
    fn test_concurrent_writers_keep_whole_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        let log = Arc::new(RunLog::open(&path).unwrap());

        std::thread::scope(|s| {
            for worker in 0..4 {
                let log = Arc::clone(&log);
                s.spawn(move || {
                    for i in 0..25 {
                        log.info(format!("worker {} line {}", worker, i));
                    }
                });
            }
        });

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 100);
        assert!(content.lines().all(|l| l.contains("[INFO] worker")));
    }
}

//! Daemon loop around the monitor.
//!
//! The scheduler owns the cadence and reacts to commands over an mpsc
//! channel instead of sharing mutable config with callers. Runs are
//! single-flight: a RunNow that arrives mid-run is deferred until the
//! current run finishes, never stacked on top of it. Between runs the
//! sleep is chunked so a Stop lands within seconds and the status file
//! keeps a fresh heartbeat.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::monitor::Monitor;
use crate::stats::RunStats;

const MAX_SLEEP_CHUNK: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum Command {
    Stop,
    RunNow,
    Reconfigure { interval: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
    Error,
    Stopped,
}

/// Snapshot written to the status file after every transition and on
/// each heartbeat. Advisory only, never read back.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: MonitorState,
    pub companies: Vec<String>,
    pub interval_secs: u64,
    pub runs_completed: u64,
    pub last_run_started: Option<DateTime<Utc>>,
    pub last_run_completed: Option<DateTime<Utc>>,
    pub next_run_due: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Anything the scheduler can drive. The production impl is [`Monitor`].
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run_once(&self) -> Result<RunStats>;
}

#[async_trait]
impl Runner for Monitor {
    async fn run_once(&self) -> Result<RunStats> {
        Monitor::run_once(self).await
    }
}

enum WaitOutcome {
    Elapsed,
    RunNow,
    Stop,
}

pub struct Scheduler {
    interval: Duration,
    status_file: Option<PathBuf>,
    companies: Vec<String>,
    runs_completed: u64,
    last_run_started: Option<DateTime<Utc>>,
    last_run_completed: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Scheduler {
    pub fn new(interval: Duration, status_file: Option<PathBuf>, companies: Vec<String>) -> Self {
        Self {
            interval,
            status_file,
            companies,
            runs_completed: 0,
            last_run_started: None,
            last_run_completed: None,
            last_error: None,
        }
    }

    /// Run until a Stop command arrives or the command channel closes.
    pub async fn run(mut self, runner: &dyn Runner, mut rx: mpsc::Receiver<Command>) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "scheduler starting");
        self.write_status(MonitorState::Idle);

        loop {
            self.last_run_started = Some(Utc::now());
            self.write_status(MonitorState::Running);

            match runner.run_once().await {
                Ok(stats) => {
                    info!("{stats}");
                    self.runs_completed += 1;
                    self.last_run_completed = Some(Utc::now());
                    self.last_error = None;
                    self.write_status(MonitorState::Idle);
                }
                Err(e) => {
                    error!(error = %e, "monitoring run failed");
                    self.last_error = Some(e.to_string());
                    self.write_status(MonitorState::Error);
                }
            }

            // Commands that arrived mid-run.
            let mut run_again = false;
            loop {
                match rx.try_recv() {
                    Ok(Command::Stop) => {
                        self.write_status(MonitorState::Stopped);
                        return Ok(());
                    }
                    Ok(Command::RunNow) => run_again = true,
                    Ok(Command::Reconfigure { interval }) => self.set_interval(interval),
                    Err(_) => break,
                }
            }
            if run_again {
                continue;
            }

            match self.wait_for_next_run(&mut rx).await {
                WaitOutcome::Elapsed | WaitOutcome::RunNow => continue,
                WaitOutcome::Stop => {
                    self.write_status(MonitorState::Stopped);
                    return Ok(());
                }
            }
        }
    }

    /// Sleep out the interval in short chunks, heartbeating the status
    /// file and staying responsive to commands. A Reconfigure restarts
    /// the countdown at the new interval.
    async fn wait_for_next_run(&mut self, rx: &mut mpsc::Receiver<Command>) -> WaitOutcome {
        let mut remaining = self.interval;
        while !remaining.is_zero() {
            let chunk = remaining.min(MAX_SLEEP_CHUNK);
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Stop) | None => return WaitOutcome::Stop,
                    Some(Command::RunNow) => return WaitOutcome::RunNow,
                    Some(Command::Reconfigure { interval }) => {
                        self.set_interval(interval);
                        remaining = interval;
                    }
                },
                _ = tokio::time::sleep(chunk) => {
                    remaining = remaining.saturating_sub(chunk);
                    self.write_status(MonitorState::Idle);
                }
            }
        }
        WaitOutcome::Elapsed
    }

    fn set_interval(&mut self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "interval reconfigured");
        self.interval = interval;
    }

    /// Best-effort status write. A broken status file must not take the
    /// daemon down.
    fn write_status(&self, state: MonitorState) {
        let Some(path) = &self.status_file else {
            return;
        };
        let next_run_due = match state {
            MonitorState::Idle => chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|d| self.last_run_completed.map(|t| t + d)),
            _ => None,
        };
        let report = StatusReport {
            state,
            companies: self.companies.clone(),
            interval_secs: self.interval.as_secs(),
            runs_completed: self.runs_completed,
            last_run_started: self.last_run_started,
            last_run_completed: self.last_run_completed,
            next_run_due,
            last_error: self.last_error.clone(),
            updated_at: Utc::now(),
        };
        let result = serde_json::to_string_pretty(&report)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "status file write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingRunner {
        runs: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl Runner for CountingRunner {
        async fn run_once(&self) -> Result<RunStats> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("simulated run failure");
            }
            Ok(RunStats::default())
        }
    }

    fn status_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chainwatch-sched-{name}-{}.json", std::process::id()))
    }

    #[tokio::test(start_paused = true)]
    async fn run_now_and_stop_are_honored() {
        let runs = Arc::new(AtomicU32::new(0));
        let runner = CountingRunner { runs: runs.clone(), fail: false };
        let (tx, rx) = mpsc::channel(8);
        tx.send(Command::RunNow).await.unwrap();
        tx.send(Command::Stop).await.unwrap();

        let scheduler = Scheduler::new(Duration::from_secs(3600), None, Vec::new());
        scheduler.run(&runner, rx).await.unwrap();

        // Initial run plus the queued RunNow.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_elapse_triggers_next_run() {
        let runs = Arc::new(AtomicU32::new(0));
        let runner = CountingRunner { runs: runs.clone(), fail: false };
        let (tx, rx) = mpsc::channel(8);

        let handle = {
            let scheduler = Scheduler::new(Duration::from_secs(60), None, Vec::new());
            tokio::spawn(async move { scheduler.run(&runner, rx).await })
        };

        while runs.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        tx.send(Command::Stop).await.unwrap();
        handle.await.unwrap().unwrap();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_channel_stops_the_loop() {
        let runs = Arc::new(AtomicU32::new(0));
        let runner = CountingRunner { runs: runs.clone(), fail: false };
        let (tx, rx) = mpsc::channel::<Command>(1);
        drop(tx);

        let scheduler = Scheduler::new(Duration::from_secs(3600), None, Vec::new());
        scheduler.run(&runner, rx).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_keeps_looping_and_records_error() {
        let runs = Arc::new(AtomicU32::new(0));
        let runner = CountingRunner { runs: runs.clone(), fail: true };
        let (tx, rx) = mpsc::channel(8);
        tx.send(Command::RunNow).await.unwrap();
        tx.send(Command::Stop).await.unwrap();

        let path = status_path("error");
        let scheduler = Scheduler::new(Duration::from_secs(3600), Some(path.clone()), vec!["Apple Inc".to_string()]);
        scheduler.run(&runner, rx).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        let status: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(status["state"], "stopped");
        assert_eq!(status["runs_completed"], 0);
        assert!(status["last_error"]
            .as_str()
            .unwrap()
            .contains("simulated run failure"));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn status_file_records_completed_runs() {
        let runs = Arc::new(AtomicU32::new(0));
        let runner = CountingRunner { runs: runs.clone(), fail: false };
        let (tx, rx) = mpsc::channel(8);
        tx.send(Command::Stop).await.unwrap();

        let path = status_path("ok");
        let scheduler = Scheduler::new(Duration::from_secs(3600), Some(path.clone()), vec!["Apple Inc".to_string()]);
        scheduler.run(&runner, rx).await.unwrap();

        let status: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(status["state"], "stopped");
        assert_eq!(status["runs_completed"], 1);
        assert!(status["last_error"].is_null());
        std::fs::remove_file(&path).ok();
    }
}

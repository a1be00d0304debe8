//! Point-in-time view of the current (or last) full ingestion run.
//!
//! [`StatusTracker`] is fed by the same events as any other
//! [`ProgressReporter`] and answers [`StatusTracker::snapshot`] without ever
//! waiting on the pipeline: its mutex only guards a handful of fields and is
//! never held across an await point.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::progress::{IngestEvent, ProgressReporter};

/// Lifecycle state of the full ingestion run guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// No run has happened yet.
    Idle,
    /// A run is executing.
    Running,
    /// The last run finished.
    Completed,
    /// The last run failed.
    Failed,
}

impl RunState {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Running => 1,
            RunState::Completed => 2,
            RunState::Failed => 3,
        }
    }

    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Completed,
            3 => RunState::Failed,
            _ => RunState::Idle,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub running: bool,
    /// Human-readable phase message.
    pub phase: String,
    /// 0 to 100, never decreasing within one run.
    pub percent: u8,
    pub state: RunState,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            running: false,
            phase: "Ready".to_string(),
            percent: 0,
            state: RunState::Idle,
        }
    }
}

/// Thread-safe holder of the current [`RunStatus`].
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<Mutex<RunStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunStatus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> RunStatus {
        self.lock().clone()
    }

    /// Takes the run guard and resets the status in one step, so no reader
    /// sees a running guard next to the previous run's status.
    pub(crate) fn begin(&self, run_state: &AtomicU8) -> Result<(), RunState> {
        let mut status = self.lock();
        let running = RunState::Running.as_u8();
        let mut current = run_state.load(Ordering::Acquire);
        loop {
            if current == running {
                return Err(RunState::Running);
            }
            match run_state.compare_exchange(current, running, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        apply(&mut status, IngestEvent::Started);
        Ok(())
    }

    /// Publishes a terminal event and releases the run guard in one step.
    ///
    /// A caller observing `running == false` can always take the guard.
    pub(crate) fn conclude(&self, run_state: &AtomicU8, event: IngestEvent<'_>) {
        let mut status = self.lock();
        apply(&mut status, event);
        if status.state == RunState::Running {
            status.running = false;
            status.state = RunState::Failed;
        }
        run_state.store(status.state.as_u8(), Ordering::Release);
    }

    /// Marks a run that ended without reporting as failed and releases the
    /// run guard.
    pub(crate) fn mark_aborted(&self, run_state: &AtomicU8) {
        let mut status = self.lock();
        status.running = false;
        status.state = RunState::Failed;
        status.phase = "Failed: ingestion task aborted".to_string();
        run_state.store(RunState::Failed.as_u8(), Ordering::Release);
    }
}

/// Integer percentage of `processed` over `total`, rounded down.
pub(crate) fn percent_of(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (processed.min(total) * 100 / total) as u8
}

fn apply(status: &mut RunStatus, event: IngestEvent<'_>) {
    match event {
        IngestEvent::Started => {
            *status = RunStatus {
                running: true,
                phase: "Starting data load...".to_string(),
                percent: 0,
                state: RunState::Running,
            };
        }
        IngestEvent::Fetched { .. } => {
            status.phase = "Processing products...".to_string();
        }
        IngestEvent::BatchFlushed {
            processed, total, ..
        } => {
            status.percent = status.percent.max(percent_of(processed, total));
            status.phase = format!("Processed {}/{} products", processed, total);
        }
        IngestEvent::Completed { result } => {
            status.running = false;
            status.percent = 100;
            status.state = RunState::Completed;
            status.phase = if result.index_warning {
                "Completed with warnings".to_string()
            } else {
                "Completed successfully".to_string()
            };
        }
        IngestEvent::Failed { error } => {
            status.running = false;
            status.state = RunState::Failed;
            status.phase = format!("Failed: {}", error);
        }
        IngestEvent::Cleared { .. } => {
            status.phase = "Database cleared".to_string();
        }
        IngestEvent::RecordSkipped { .. }
        | IngestEvent::BatchFailed { .. }
        | IngestEvent::IndexRebuildFailed { .. } => {}
    }
}

impl ProgressReporter for StatusTracker {
    fn report(&self, event: IngestEvent<'_>) {
        apply(&mut self.lock(), event);
    }
}

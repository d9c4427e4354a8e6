// src/pipeline/guard.rs

//! Single-flight guard and live progress for runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Hearings,
    Rulings,
}

/// Snapshot of the current run, readable at any time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    pub running: bool,
    pub phase: Option<RunPhase>,
    /// 1-based index of the subject being processed
    pub index: usize,
    pub total: usize,
    pub current_subject: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Process-wide `Idle | Running` flag.
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
    progress: Mutex<RunProgress>,
}

impl RunGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Move `Idle -> Running`, or return `None` if a run is in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        *self.lock_progress() = RunProgress {
            running: true,
            started_at: Some(Utc::now()),
            ..RunProgress::default()
        };
        Some(RunPermit {
            guard: Arc::clone(self),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> RunProgress {
        self.lock_progress().clone()
    }

    fn lock_progress(&self) -> MutexGuard<'_, RunProgress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Proof of holding the guard. Dropping it returns the guard to `Idle`.
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<RunGuard>,
}

impl RunPermit {
    pub fn enter_phase(&self, phase: RunPhase, total: usize) {
        let mut progress = self.guard.lock_progress();
        progress.phase = Some(phase);
        progress.total = total;
        progress.index = 0;
        progress.current_subject = None;
    }

    pub fn advance(&self, index: usize, subject: &str) {
        let mut progress = self.guard.lock_progress();
        progress.index = index;
        progress.current_subject = Some(subject.to_string());
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        *self.guard.lock_progress() = RunProgress::default();
        self.guard.running.store(false, Ordering::Release);
    }
}

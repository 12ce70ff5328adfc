//! Clock and cooperative scheduler.
//!
//! Nothing here spawns threads or sleeps. The host asks the [`Scheduler`]
//! when the next task is due, waits however it likes (the CLI sleeps, tests
//! just move a [`ManualClock`]), then pops due tasks and runs them.

use crate::types::Phase;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Source of the current time
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the timer.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared flag that marks a scheduled task as dead
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// What a scheduled task does when it fires
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// One second of the tick engine
    Tick,
    /// End of the `transition` placeholder toward this phase
    FinishTransition(Phase),
}

#[derive(Clone, Debug)]
pub struct ScheduledTask {
    pub id: u64,
    pub kind: TaskKind,
    pub due: DateTime<Utc>,
    pub token: CancellationToken,
}

/// Queue of pending tasks ordered by due time
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `kind` to fire at `due`
    pub fn schedule(&mut self, kind: TaskKind, due: DateTime<Utc>) -> CancellationToken {
        self.next_id += 1;
        let token = CancellationToken::default();
        self.tasks.push(ScheduledTask {
            id: self.next_id,
            kind,
            due,
            token: token.clone(),
        });
        tracing::trace!("Scheduled {:?} at {}", kind, due);
        token
    }

    /// Cancel every pending task matching `pred`
    pub fn cancel_where(&mut self, pred: impl Fn(&TaskKind) -> bool) {
        self.tasks.retain(|task| {
            if pred(&task.kind) {
                task.token.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Cancel every pending task of exactly this kind
    pub fn cancel(&mut self, kind: TaskKind) {
        self.cancel_where(|pending| *pending == kind);
    }

    /// Cancel all pending ticks
    pub fn cancel_ticks(&mut self) {
        self.cancel(TaskKind::Tick);
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) {
        self.cancel_where(|_| true);
    }

    pub fn has_pending(&self, kind: TaskKind) -> bool {
        self.tasks
            .iter()
            .any(|task| task.kind == kind && !task.token.is_cancelled())
    }

    pub fn has_pending_tick(&self) -> bool {
        self.has_pending(TaskKind::Tick)
    }

    pub fn is_idle(&self) -> bool {
        self.next_due().is_none()
    }

    /// Earliest due time among live tasks
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.tasks
            .iter()
            .filter(|task| !task.token.is_cancelled())
            .map(|task| task.due)
            .min()
    }

    /// Remove and return the earliest live task due at or before `now`
    ///
    /// Ties go to the task scheduled first. Cancelled tasks are dropped on
    /// the way.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledTask> {
        self.tasks.retain(|task| !task.token.is_cancelled());
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= now)
            .min_by_key(|(_, task)| (task.due, task.id))
            .map(|(index, _)| index)?;
        Some(self.tasks.remove(index))
    }
}

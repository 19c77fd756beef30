//! Deferred and periodic task scheduling.
//!
//! The orchestrator never touches a runtime timer directly. It hands closures
//! to a [`Scheduler`] and keeps the returned [`TaskHandle`] so the task can be
//! cancelled before it is replaced.
//!
//! - [`TokioScheduler`]: production implementation on tokio timers
//! - [`VirtualScheduler`]: deterministic implementation bound to a
//!   [`ManualClock`], advanced explicitly by tests

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, ManualClock, add_duration};

/// One-shot task body.
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Periodic task body. Returning [`ControlFlow::Break`] stops the task.
pub type RepeatingTask = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

/// Runs closures after a delay or on a fixed period.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle;

    /// Run `task` every `period`, first firing one period from now.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TaskHandle;
}

/// Cancelable handle to a scheduled task.
///
/// Cancelling is idempotent and safe from inside the task itself.
#[derive(Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TaskHandle {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    /// Prevent the task from running again.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokio
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduler backed by `tokio::time`. Must be used inside a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        TaskHandle::new(cancelled, Some(join.abort_handle()))
    }

    fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let join = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if flag.load(Ordering::SeqCst) || task().is_break() {
                    break;
                }
            }
        });

        TaskHandle::new(cancelled, Some(join.abort_handle()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Virtual
// ─────────────────────────────────────────────────────────────────────────────

enum Job {
    Once(OnceTask),
    Repeating {
        period: Duration,
        task: RepeatingTask,
    },
}

struct Pending {
    due: DateTime<Utc>,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    job: Job,
}

/// Scheduler that runs tasks only when [`advance`](Self::advance) moves its
/// [`ManualClock`] past their due time.
///
/// Tasks due at the same instant run in scheduling order. Tasks may schedule
/// or cancel other tasks while running.
pub struct VirtualScheduler {
    clock: Arc<ManualClock>,
    queue: Mutex<Vec<Pending>>,
    next_seq: AtomicU64,
}

impl VirtualScheduler {
    /// Create a scheduler driving `clock`.
    #[must_use]
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// The clock this scheduler advances.
    #[must_use]
    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// Number of tasks still waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move time forward by `by`, running every task that falls due on the way.
    ///
    /// The clock is set to each task's due time before the task runs, and
    /// ends at exactly `now + by`.
    pub fn advance(&self, by: Duration) {
        let target = add_duration(self.clock.now(), by);

        while let Some(pending) = self.pop_due(target) {
            self.clock.set(pending.due);
            match pending.job {
                Job::Once(task) => task(),
                Job::Repeating { period, mut task } => {
                    let keep = task().is_continue();
                    if keep && !pending.cancelled.load(Ordering::SeqCst) {
                        self.push(
                            add_duration(pending.due, period),
                            pending.cancelled,
                            Job::Repeating { period, task },
                        );
                    }
                }
            }
        }

        self.clock.set(target);
    }

    fn pop_due(&self, target: DateTime<Utc>) -> Option<Pending> {
        let mut queue = self.queue.lock();
        queue.retain(|p| !p.cancelled.load(Ordering::SeqCst));

        let index = queue
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= target)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;

        Some(queue.swap_remove(index))
    }

    fn push(&self, due: DateTime<Utc>, cancelled: Arc<AtomicBool>, job: Job) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push(Pending {
            due,
            seq,
            cancelled,
            job,
        });
    }

    fn enqueue(&self, delay: Duration, job: Job) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let due = add_duration(self.clock.now(), delay);
        self.push(due, Arc::clone(&cancelled), job);
        TaskHandle::new(cancelled, None)
    }
}

impl fmt::Debug for VirtualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualScheduler")
            .field("now", &self.clock.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_once(&self, delay: Duration, task: OnceTask) -> TaskHandle {
        self.enqueue(delay, Job::Once(task))
    }

    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TaskHandle {
        self.enqueue(period, Job::Repeating { period, task })
    }
}

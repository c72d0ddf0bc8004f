//! Timers for the progress poll and the delayed unmute.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use watch_core::{Clock, Timer};

use crate::driver::Signal;

/// Runs `timer` once after `delay`.
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration, timer: Timer);
}

pub type SchedulerRef = std::sync::Arc<dyn Scheduler>;

//
// ─── TOKIO ─────────────────────────────────────────────────────────────────────
//

/// Wall-clock timers delivered back into the driver's signal channel.
#[derive(Clone)]
pub struct TokioScheduler {
    signals: UnboundedSender<Signal>,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(signals: UnboundedSender<Signal>) -> Self {
        Self { signals }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, timer: Timer) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!(?timer, "no runtime; timer dropped");
            return;
        };
        let signals = self.signals.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // The driver may already be gone.
            let _ = signals.send(Signal::TimerFired(timer));
        });
    }
}

//
// ─── MANUAL ────────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
struct PendingTimer {
    due: Duration,
    seq: u64,
    timer: Timer,
}

#[derive(Debug, Default)]
struct ManualQueue {
    elapsed: Duration,
    next_seq: u64,
    pending: Vec<PendingTimer>,
}

/// Virtual-time scheduler. Time only moves when the owner fires timers.
///
/// Every step also advances the shared manual `Clock`, so wall-clock reads
/// (session duration, simulated playback) follow virtual time.
#[derive(Debug)]
pub struct ManualScheduler {
    clock: Clock,
    queue: Mutex<ManualQueue>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            queue: Mutex::new(ManualQueue::default()),
        }
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    #[must_use]
    pub fn is_scheduled(&self, timer: Timer) -> bool {
        self.lock().pending.iter().any(|p| p.timer == timer)
    }

    /// Fires the earliest timer due no later than `deadline` (virtual time
    /// since creation), moving time to its due instant. With nothing due,
    /// moves time to `deadline` and returns `None`.
    pub fn fire_next_until(&self, deadline: Duration) -> Option<Timer> {
        let mut queue = self.lock();
        let next = queue
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= deadline)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(index, _)| index);

        let (target, fired) = match next {
            Some(index) => {
                let pending = queue.pending.swap_remove(index);
                (pending.due, Some(pending.timer))
            }
            None => (deadline, None),
        };

        if target > queue.elapsed {
            let step = target - queue.elapsed;
            queue.elapsed = target;
            self.clock
                .advance(chrono::Duration::from_std(step).unwrap_or(chrono::Duration::zero()));
        }
        fired
    }

    /// Fires every timer due within `by`, in due order, then lands on `by`.
    ///
    /// Nothing can reschedule while this drains; drive `fire_next_until`
    /// directly when handlers run between timers.
    pub fn advance(&self, by: Duration) -> Vec<Timer> {
        let deadline = self.elapsed() + by;
        let mut due = Vec::new();
        while let Some(timer) = self.fire_next_until(deadline) {
            due.push(timer);
        }
        due
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, timer: Timer) {
        let mut queue = self.lock();
        let due = queue.elapsed + delay;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(PendingTimer { due, seq, timer });
    }
}

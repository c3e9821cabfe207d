//! Cancelable timers and search-input debouncing.
//!
//! The [`Scheduler`] trait is the only timing primitive the listing uses:
//! - [`TokioScheduler`] runs timers on a tokio runtime
//! - [`ManualScheduler`] runs them against a virtual clock, for tests and
//!   hosts without an event loop
//!
//! [`Debouncer`] builds cancel-and-reschedule on top of either.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Default quiet period for search input.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Schedules work after a delay and cancels it before it runs.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, task: Task) -> TimerId;

    /// Prevents a scheduled task from running. Unknown or already fired
    /// timers are ignored.
    fn cancel(&self, id: TimerId);
}

/// Scheduler backed by tokio timers.
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, JoinHandle<()>>>>,
}

impl TokioScheduler {
    /// Creates a scheduler spawning on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(1),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a scheduler on the runtime of the calling context, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timers = Arc::clone(&self.timers);

        // hold the lock so the task cannot deregister before it is registered
        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            task();
        });
        guard.insert(id, join);
        id
    }

    fn cancel(&self, id: TimerId) {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(join) = removed {
            join.abort();
        }
    }
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    queue: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<TimerId, (Duration, u64)>,
}

/// Scheduler driven by an explicit virtual clock.
///
/// Nothing runs until [`ManualScheduler::advance`] moves the clock past a
/// timer's deadline. Timers with equal deadlines run in scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    /// Creates a scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Moves the clock forward, running every timer that falls due.
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut ran = 0;

        loop {
            // release the lock before running so tasks may reschedule
            let due = {
                let mut clock = self.lock();
                let key = match clock.queue.keys().next() {
                    Some(key) if key.0 <= target => *key,
                    _ => break,
                };
                clock.now = key.0;
                clock.deadlines.remove(&TimerId(key.1));
                clock.queue.remove(&key)
            };
            if let Some(task) = due {
                task();
                ran += 1;
            }
        }

        self.lock().now = target;
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> TimerId {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = TimerId(seq);
        let mut clock = self.lock();
        let key = (clock.now + delay, seq);
        clock.queue.insert(key, task);
        clock.deadlines.insert(id, key);
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut clock = self.lock();
        if let Some(key) = clock.deadlines.remove(&id) {
            clock.queue.remove(&key);
        }
    }
}

#[derive(Default)]
struct DebounceSlot {
    generation: u64,
    timer: Option<TimerId>,
}

/// Runs only the last of a burst of calls, once the quiet period elapses.
pub struct Debouncer {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    slot: Arc<Mutex<DebounceSlot>>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiet period.
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self {
            scheduler,
            delay,
            slot: Arc::new(Mutex::new(DebounceSlot::default())),
        }
    }

    /// The quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any pending task and schedules `task` after the quiet period.
    pub fn call(&self, task: impl FnOnce() + Send + 'static) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.timer.take() {
            self.scheduler.cancel(timer);
        }
        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::clone(&self.slot);
        let id = self.scheduler.schedule_after(
            self.delay,
            Box::new(move || {
                {
                    let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    // superseded or cancelled while in flight
                    if slot.generation != generation {
                        return;
                    }
                    slot.timer = None;
                }
                task();
            }),
        );
        slot.timer = Some(id);
        tracing::trace!(delay_ms = self.delay.as_millis() as u64, "debounce scheduled");
    }

    /// Drops the pending task, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        match slot.timer.take() {
            Some(timer) => {
                self.scheduler.cancel(timer);
                true
            }
            None => false,
        }
    }

    /// Returns whether a task is waiting for the quiet period to end.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timer
            .is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

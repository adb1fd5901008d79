//! Scheduler abstraction for cooldown timers.
//!
//! The coalescing store never sleeps itself; it asks a `Scheduler` to run a
//! callback after a delay and keeps the returned handle so it can cancel it.
//!
//! - `TokioScheduler` -- production implementation on the tokio runtime
//! - `ManualScheduler` -- deterministic fake clock driven by `advance()`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

/// Callback run when a timer expires.
pub type TimerCallback = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Runs callbacks after a delay and cancels them on request.
///
/// Implementations must never invoke the callback synchronously from inside
/// `schedule`: the store calls `schedule` while holding the lock that the
/// callback itself needs.
pub trait Scheduler: Send + Sync + 'static {
    /// Opaque, cancellable reference to one scheduled fire.
    type Handle: Send + Sync + 'static;

    /// Run `callback` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> Self::Handle;

    /// Best-effort cancellation. A callback that has already started running
    /// is not interrupted; callers must tolerate a late fire.
    fn cancel(&self, handle: Self::Handle);
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// Scheduler backed by `tokio::time::sleep` on spawned tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    type Handle = AbortHandle;

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> AbortHandle {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        })
        .abort_handle()
    }

    fn cancel(&self, handle: AbortHandle) {
        handle.abort();
    }
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

/// Deterministic scheduler with a virtual clock.
///
/// Nothing fires until `advance()` moves the clock past a timer's deadline.
/// Due timers fire in deadline order, ties broken by scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    /// Virtual time elapsed since construction, in nanoseconds.
    now_nanos: AtomicU64,
    next_id: AtomicU64,
    timers: DashMap<u64, ManualTimer>,
}

struct ManualTimer {
    due_nanos: u64,
    callback: TimerCallback,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        Duration::from_nanos(self.now_nanos.load(Ordering::SeqCst))
    }

    /// Number of armed (not yet fired or cancelled) timers.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Move the clock forward and fire every timer that became due.
    ///
    /// Returns how many callbacks ran. `advance(Duration::ZERO)` fires
    /// zero-delay timers.
    pub fn advance(&self, by: Duration) -> usize {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let now = self.now_nanos.fetch_add(by, Ordering::SeqCst).saturating_add(by);

        let mut due: Vec<(u64, u64)> = self
            .timers
            .iter()
            .filter(|t| t.value().due_nanos <= now)
            .map(|t| (t.value().due_nanos, *t.key()))
            .collect();
        due.sort_unstable();

        let mut fired = 0;
        for (_, id) in due {
            // Removed before running so no map lock is held inside the callback.
            if let Some((_, timer)) = self.timers.remove(&id) {
                (timer.callback)();
                fired += 1;
            }
        }
        fired
    }
}

impl Scheduler for ManualScheduler {
    type Handle = u64;

    fn schedule(&self, delay: Duration, callback: TimerCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let delay = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let due_nanos = self.now_nanos.load(Ordering::SeqCst).saturating_add(delay);
        self.timers.insert(id, ManualTimer { due_nanos, callback });
        id
    }

    fn cancel(&self, handle: u64) {
        self.timers.remove(&handle);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> TimerCallback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_fires_only_when_due() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::from_secs(30), counter_callback(&counter));

        assert_eq!(scheduler.advance(Duration::from_secs(29)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_zero_delay_fires_on_zero_advance() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(Duration::ZERO, counter_callback(&counter));
        assert_eq!(scheduler.advance(Duration::ZERO), 1);
    }

    #[test]
    fn manual_cancel_prevents_fire() {
        let scheduler = ManualScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(1), counter_callback(&counter));
        scheduler.cancel(handle);
        assert_eq!(scheduler.advance(Duration::from_secs(5)), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_fires_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(DashMap::new());
        for (i, secs) in [(0_usize, 3_u64), (1, 1), (2, 2)] {
            let order = Arc::clone(&order);
            scheduler.schedule(
                Duration::from_secs(secs),
                Box::new(move || {
                    let pos = order.len();
                    order.insert(pos, i);
                }),
            );
        }
        assert_eq!(scheduler.advance(Duration::from_secs(3)), 3);
        let fired: Vec<usize> = (0..3).map(|p| *order.get(&p).unwrap()).collect();
        assert_eq!(fired, vec![1, 2, 0]);
    }

    #[tokio::test]
    async fn tokio_scheduler_fires_and_cancels() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let cancelled = scheduler.schedule(Duration::from_millis(20), counter_callback(&counter));
        scheduler.cancel(cancelled);
        scheduler.schedule(Duration::from_millis(1), counter_callback(&counter));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

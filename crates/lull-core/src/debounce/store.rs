//! Coalescing store: pending requests keyed by conversation + anchor message.
//!
//! Every record owns exactly one armed timer. Each arming gets a fresh
//! generation number, and the timer callback captures `(key, generation)`.
//! On fire, the record is popped only if its generation still matches, under
//! the same map-shard lock that `mutate_if_present` and `remove_if_present`
//! take. Whichever side takes the lock first wins:
//!
//! - store operation first: the old timer is cancelled or superseded, so the
//!   late fire finds a newer generation (or no record) and does nothing
//! - fire first: the record is gone, so the mutation reports `false`
//!
//! Fired records are sent on an unbounded channel; the receiver dispatches
//! them. A record therefore leaves the store at most once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lull_types::request::{CoalescingKey, NewRequest, PendingRequest};
use tokio::sync::mpsc;

use super::timer::Scheduler;

/// One pending record plus the timer currently armed for it.
struct Slot<H> {
    request: PendingRequest,
    generation: u64,
    timer: Option<H>,
}

struct StoreInner<S: Scheduler> {
    slots: DashMap<CoalescingKey, Slot<S::Handle>>,
    scheduler: S,
    next_generation: AtomicU64,
    fired_tx: mpsc::UnboundedSender<PendingRequest>,
}

impl<S: Scheduler> StoreInner<S> {
    /// Timer expiry for `key` armed at `generation`.
    fn fire(&self, key: &CoalescingKey, generation: u64) {
        let Some((_, slot)) = self
            .slots
            .remove_if(key, |_, slot| slot.generation == generation)
        else {
            tracing::trace!(%key, generation, "stale timer fired, ignoring");
            return;
        };

        tracing::debug!(
            %key,
            workflow = %slot.request.target_workflow,
            "cooldown elapsed, releasing request"
        );
        if self.fired_tx.send(slot.request).is_err() {
            tracing::warn!(%key, "dispatcher has shut down, dropping fired request");
        }
    }
}

/// In-memory store of pending requests with per-key debounce timers.
///
/// Cheap to clone; clones share the same records.
pub struct CoalescingStore<S: Scheduler> {
    inner: Arc<StoreInner<S>>,
}

impl<S: Scheduler> Clone for CoalescingStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Scheduler> CoalescingStore<S> {
    /// Create an empty store. The receiver yields each request whose
    /// cooldown elapsed without interruption.
    pub fn new(scheduler: S) -> (Self, mpsc::UnboundedReceiver<PendingRequest>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let store = Self {
            inner: Arc::new(StoreInner {
                slots: DashMap::new(),
                scheduler,
                next_generation: AtomicU64::new(0),
                fired_tx,
            }),
        };
        (store, fired_rx)
    }

    /// The scheduler driving this store's timers.
    pub fn scheduler(&self) -> &S {
        &self.inner.scheduler
    }

    /// Insert a new record and arm its timer, unless the key is already
    /// pending. Returns `true` only when a record was created.
    pub fn create_or_ignore(&self, request: NewRequest, cooldown: Duration) -> bool {
        match self.inner.slots.entry(request.key.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(key = %request.key, "request already pending, ignoring duplicate");
                false
            }
            Entry::Vacant(vacant) => {
                let now = Utc::now();
                let mut pending = PendingRequest::from_new(request, now);
                pending.deadline = deadline_after(now, cooldown);
                let (generation, timer) = self.arm(&pending.key, cooldown);
                tracing::debug!(
                    key = %pending.key,
                    workflow = %pending.target_workflow,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "request pending"
                );
                vacant.insert(Slot {
                    request: pending,
                    generation,
                    timer: Some(timer),
                });
                true
            }
        }
    }

    /// Cancel the key's timer, apply `mutation`, and re-arm with a full
    /// cooldown. Returns `false` (and runs nothing) when the key is absent.
    pub fn mutate_if_present<F>(&self, key: &CoalescingKey, mutation: F, cooldown: Duration) -> bool
    where
        F: FnOnce(&mut PendingRequest),
    {
        let Some(mut slot) = self.inner.slots.get_mut(key) else {
            return false;
        };

        if let Some(old) = slot.timer.take() {
            self.inner.scheduler.cancel(old);
        }
        mutation(&mut slot.request);

        let now = Utc::now();
        let (generation, timer) = self.arm(key, cooldown);
        slot.generation = generation;
        slot.timer = Some(timer);
        slot.request.last_scheduled_at = now;
        slot.request.deadline = deadline_after(now, cooldown);
        tracing::debug!(%key, "pending request updated, cooldown restarted");
        true
    }

    /// Remove the record and cancel its timer. The returned request will
    /// never be dispatched.
    pub fn remove_if_present(&self, key: &CoalescingKey) -> Option<PendingRequest> {
        let (_, slot) = self.inner.slots.remove(key)?;
        if let Some(timer) = slot.timer {
            self.inner.scheduler.cancel(timer);
        }
        tracing::debug!(%key, "pending request removed");
        Some(slot.request)
    }

    /// Whether `key` is currently pending.
    pub fn contains(&self, key: &CoalescingKey) -> bool {
        self.inner.slots.contains_key(key)
    }

    /// Copy of the pending record for `key`.
    pub fn get(&self, key: &CoalescingKey) -> Option<PendingRequest> {
        self.inner.slots.get(key).map(|slot| slot.request.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    /// Drop every pending record and cancel its timer. Used on shutdown.
    pub fn clear(&self) -> usize {
        let keys: Vec<CoalescingKey> = self.inner.slots.iter().map(|s| s.key().clone()).collect();
        keys.iter()
            .filter(|key| self.remove_if_present(key).is_some())
            .count()
    }

    /// Arm a timer for `key` under a fresh generation.
    fn arm(&self, key: &CoalescingKey, cooldown: Duration) -> (u64, S::Handle) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let store: Weak<StoreInner<S>> = Arc::downgrade(&self.inner);
        let key = key.clone();
        let timer = self.inner.scheduler.schedule(
            cooldown,
            Box::new(move || {
                if let Some(inner) = store.upgrade() {
                    inner.fire(&key, generation);
                }
            }),
        );
        (generation, timer)
    }
}

fn deadline_after(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(cooldown)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

mod callback;
mod entry;
mod list;
mod queue;
mod wheel;

pub use callback::Callback;

use crate::config::Strategy;
use crate::error::{InsertError, TimerError};
use crate::slot::{SlotKey, Slots};
use crate::timer::entry::{Placement, TimerEntry};
use crate::timer::queue::SortedQueue;
use crate::timer::wheel::TimingWheel;
use crate::trace::{debug, trace, warn};

/// A schedulable timer.
///
/// `fire` runs once the timer is due, with mutable access to the engine that
/// fired it, so a timer can schedule, cancel or reset other timers and
/// itself. Its own handle stays valid while `fire` runs. Calling
/// [`TimerEngine::reset`] on it re-arms the same entry, which keeps its
/// handle and is not released. Otherwise the entry is finalized once `fire`
/// returns.
///
/// `release` runs exactly once when the entry is finalized: right after a
/// `fire` that did not re-arm it, on [`TimerEngine::del`], or when the
/// engine is destroyed or dropped while the timer is still pending. A timer
/// that deletes itself from inside `fire` is released after `fire` returns.
pub trait Timer: Sized {
    type Context;

    fn fire(&mut self, now: u64, ctx: &mut Self::Context, timers: &mut TimerEngine<Self>);

    fn release(self) {}
}

/// Strategy capability behind the engine.
///
/// Drivers own only ordering state. Entries live in the engine's slot arena
/// and drivers address them by slot index.
pub(crate) trait Driver {
    fn name(&self) -> &'static str;

    /// Heap bytes owned by the driver itself.
    fn storage_bytes(&self) -> usize;

    /// Whether a new entry expiring at `expiry` would be accepted.
    fn admit(&self, expiry: u64) -> Result<(), TimerError>;

    /// Place an admitted entry. Its expiry is already set.
    fn link<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32, now: u64);

    fn unlink<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32);

    /// Reschedule an entry to `now + timeout`, whether it is linked or
    /// currently firing. On error nothing changes.
    fn relink<T>(
        &mut self,
        slots: &mut Slots<TimerEntry<T>>,
        index: u32,
        now: u64,
        timeout: u64,
    ) -> Result<(), TimerError>;

    /// Unlink and return the next entry due by `now`, advancing the driver's
    /// own clock as far as needed to find it.
    fn pop_due<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, now: u64) -> Option<u32>;
}

enum Backend {
    Queue(SortedQueue),
    Wheel(TimingWheel),
}

macro_rules! dispatch {
    ($backend:expr, $driver:ident => $call:expr) => {
        match $backend {
            Backend::Queue($driver) => $call,
            Backend::Wheel($driver) => $call,
        }
    };
}

impl Backend {
    fn from_strategy(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Queue => Backend::Queue(SortedQueue::new()),
            Strategy::Wheel { size, resolution } => {
                Backend::Wheel(TimingWheel::new(size, resolution))
            }
        }
    }
}

impl Driver for Backend {
    #[inline(always)]
    fn name(&self) -> &'static str {
        dispatch!(self, d => d.name())
    }

    #[inline(always)]
    fn storage_bytes(&self) -> usize {
        dispatch!(self, d => d.storage_bytes())
    }

    #[inline(always)]
    fn admit(&self, expiry: u64) -> Result<(), TimerError> {
        dispatch!(self, d => d.admit(expiry))
    }

    #[inline(always)]
    fn link<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32, now: u64) {
        dispatch!(self, d => d.link(slots, index, now))
    }

    #[inline(always)]
    fn unlink<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        dispatch!(self, d => d.unlink(slots, index))
    }

    #[inline(always)]
    fn relink<T>(
        &mut self,
        slots: &mut Slots<TimerEntry<T>>,
        index: u32,
        now: u64,
        timeout: u64,
    ) -> Result<(), TimerError> {
        dispatch!(self, d => d.relink(slots, index, now, timeout))
    }

    #[inline(always)]
    fn pop_due<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, now: u64) -> Option<u32> {
        dispatch!(self, d => d.pop_due(slots, now))
    }
}

/// Handle to a scheduled timer.
///
/// Handles are `Copy`. Once the timer is finalized (fired without re-arming,
/// or removed) every copy goes stale, and operations through it return [`TimerError::StaleHandle`]
/// without touching whatever timer later reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    key: SlotKey,
}

/// Snapshot of an engine's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub live: usize,
    pub memory: usize,
    pub total_added: u64,
    pub total_fired: u64,
    pub total_removed: u64,
    pub strategy: &'static str,
}

/// Caller-driven timer engine.
///
/// The engine never reads a clock. Every operation that needs the current
/// time takes it as `now`, and due timers fire only inside [`check`].
///
/// [`check`]: TimerEngine::check
pub struct TimerEngine<T: Timer> {
    slots: Slots<TimerEntry<T>>,
    backend: Backend,
    memory: usize,
    total_added: u64,
    total_fired: u64,
    total_removed: u64,
}

impl<T: Timer> TimerEngine<T> {
    const ENTRY_FOOTPRINT: usize = Slots::<TimerEntry<T>>::slot_footprint();

    pub fn new(strategy: Strategy) -> Result<Self, TimerError> {
        if let Err(err) = strategy.validate() {
            warn!(?strategy, %err, "rejected engine configuration");
            return Err(err);
        }
        Ok(Self::with_backend(Backend::from_strategy(strategy)))
    }

    /// Like [`new`](Self::new), with room for `capacity` timers reserved up front.
    pub fn with_capacity(strategy: Strategy, capacity: usize) -> Result<Self, TimerError> {
        let mut engine = Self::new(strategy)?;
        engine.slots = Slots::with_capacity(capacity);
        Ok(engine)
    }

    /// Sorted-queue engine. Adds must arrive in non-decreasing expiry order.
    pub fn queue() -> Self {
        Self::with_backend(Backend::from_strategy(Strategy::Queue))
    }

    /// Timing-wheel engine with `size` spokes of one time unit each.
    pub fn wheel(size: usize) -> Result<Self, TimerError> {
        Self::new(Strategy::wheel(size))
    }

    fn with_backend(backend: Backend) -> Self {
        let memory = std::mem::size_of::<Self>() + backend.storage_bytes();
        debug!(strategy = backend.name(), memory, "timer engine created");

        Self {
            slots: Slots::new(),
            backend,
            memory,
            total_added: 0,
            total_fired: 0,
            total_removed: 0,
        }
    }

    /// Schedule `timer` to fire at `now + timeout`.
    ///
    /// A sorted-queue engine rejects an expiry earlier than the latest one
    /// it holds. The error hands the timer back.
    pub fn add(&mut self, now: u64, timeout: u64, timer: T) -> Result<TimerHandle, InsertError<T>> {
        let expiry = now.saturating_add(timeout);
        if let Err(error) = self.backend.admit(expiry) {
            warn!(now, timeout, %error, "rejected add");
            return Err(InsertError { error, timer });
        }

        let key = self.slots.insert(TimerEntry::new(now, timeout, timer));
        self.backend.link(&mut self.slots, key.index(), now);

        self.memory += Self::ENTRY_FOOTPRINT;
        self.total_added += 1;
        trace!(slot = key.index(), expiry, live = self.slots.len(), "timer added");

        Ok(TimerHandle { key })
    }

    /// Cancel a pending timer and release it. Returns the expiry it had.
    pub fn del(&mut self, handle: TimerHandle) -> Result<u64, TimerError> {
        if !self.slots.contains(handle.key) {
            debug!(?handle, "del on stale handle");
            return Err(TimerError::StaleHandle);
        }

        let index = handle.key.index();
        if self.slots[index].placement != Placement::Firing {
            self.backend.unlink(&mut self.slots, index);
        }
        let entry = self.slots.remove_at(index);

        self.memory -= Self::ENTRY_FOOTPRINT;
        self.total_removed += 1;
        trace!(slot = index, expiry = entry.expiry, "timer removed");

        // A timer deleting itself is released by `check` once `fire` returns
        if let Some(timer) = entry.timer {
            timer.release();
        }
        Ok(entry.expiry)
    }

    /// Reschedule a pending timer to `now + timeout`, keeping its handle.
    ///
    /// On a sorted-queue engine an expiry below what the rest of the queue
    /// allows is rejected and the timer stays where it was. Called on a
    /// timer from inside its own `fire`, this re-arms it.
    pub fn reset(&mut self, handle: TimerHandle, now: u64, timeout: u64) -> Result<(), TimerError> {
        if !self.slots.contains(handle.key) {
            debug!(?handle, "reset on stale handle");
            return Err(TimerError::StaleHandle);
        }

        let index = handle.key.index();
        match self.backend.relink(&mut self.slots, index, now, timeout) {
            Ok(()) => {
                trace!(slot = index, expiry = self.slots[index].expiry, "timer reset");
                Ok(())
            }
            Err(err) => {
                warn!(slot = index, now, timeout, %err, "rejected reset");
                Err(err)
            }
        }
    }

    /// Fire up to `max_fire` timers due by `now`. Returns how many fired.
    ///
    /// Due timers beyond the budget stay scheduled and go first on the next
    /// call. A queue timer that re-arms itself with a zero timeout fires again
    /// within the same call, up to the budget.
    pub fn check(&mut self, now: u64, max_fire: usize, ctx: &mut T::Context) -> usize {
        let mut fired = 0;
        while fired < max_fire {
            let Some(index) = self.backend.pop_due(&mut self.slots, now) else {
                break;
            };
            let Some(key) = self.slots.key_at(index) else {
                unreachable!("driver returned vacant slot {index}");
            };

            let entry = &mut self.slots[index];
            entry.placement = Placement::Firing;
            let Some(mut timer) = entry.timer.take() else {
                // Re-armed and popped again by a nested check while its
                // first fire is still running. That outer call finalizes it.
                continue;
            };

            self.total_fired += 1;
            timer.fire(now, ctx, self);
            fired += 1;
            self.settle(key, timer);
        }

        if fired > 0 {
            trace!(now, fired, live = self.slots.len(), "check fired timers");
        }
        fired
    }

    /// Finalize a fired entry unless its callback re-armed it.
    fn settle(&mut self, key: SlotKey, timer: T) {
        let Some(entry) = self.slots.get_mut(key) else {
            // Deleted by its own callback
            timer.release();
            return;
        };
        if entry.placement != Placement::Firing {
            trace!(slot = key.index(), expiry = entry.expiry, "timer re-armed");
            entry.timer = Some(timer);
            return;
        }

        self.slots.remove_at(key.index());
        self.memory -= Self::ENTRY_FOOTPRINT;
        timer.release();
    }

    /// Number of scheduled timers, including one whose `fire` is running.
    #[inline(always)]
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Approximate bytes held by the engine, scheduled entries included.
    #[inline(always)]
    pub fn memory_footprint(&self) -> usize {
        self.memory
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline(always)]
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.slots.contains(handle.key)
    }

    /// Expiry of a pending timer.
    #[inline(always)]
    pub fn expiry(&self, handle: TimerHandle) -> Option<u64> {
        self.slots.get(handle.key).map(|entry| entry.expiry)
    }

    /// Timeout given by the latest `add` or `reset` of a pending timer.
    #[inline(always)]
    pub fn timeout(&self, handle: TimerHandle) -> Option<u64> {
        self.slots.get(handle.key).map(|entry| entry.timeout)
    }

    /// The pending timer behind `handle`. `None` while its own `fire` runs.
    #[inline(always)]
    pub fn timer(&self, handle: TimerHandle) -> Option<&T> {
        self.slots.get(handle.key).and_then(|entry| entry.timer.as_ref())
    }

    #[inline(always)]
    pub fn timer_mut(&mut self, handle: TimerHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.key)
            .and_then(|entry| entry.timer.as_mut())
    }

    #[inline(always)]
    pub fn strategy_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            live: self.slots.len(),
            memory: self.memory,
            total_added: self.total_added,
            total_fired: self.total_fired,
            total_removed: self.total_removed,
            strategy: self.backend.name(),
        }
    }

    /// Release every pending timer and free the engine. Returns how many
    /// timers were released.
    pub fn destroy(mut self) -> usize {
        let released = self.release_all();
        debug!(released, "timer engine destroyed");
        released
    }

    // Only called on the way out: the backend keeps dangling links.
    fn release_all(&mut self) -> usize {
        let entries = self.slots.drain();
        self.memory -= entries.len() * Self::ENTRY_FOOTPRINT;

        let released = entries.len();
        for timer in entries.into_iter().filter_map(|entry| entry.timer) {
            timer.release();
        }
        released
    }
}

impl<T: Timer> Drop for TimerEngine<T> {
    fn drop(&mut self) {
        if !self.slots.is_empty() {
            debug!(pending = self.slots.len(), "timer engine dropped with pending timers");
            self.release_all();
        }
    }
}


#[cfg(test)]
mod latency_tests {
    use super::*;
    use hdrhistogram::Histogram;
    use std::time::Instant;

    const WARMUP: u64 = 100_000;
    const ITERATIONS: u64 = 1_000_000;

    struct LatencyTimer;

    impl Timer for LatencyTimer {
        type Context = ();

        fn fire(&mut self, _now: u64, _ctx: &mut (), _timers: &mut TimerEngine<Self>) {}
    }

    fn print_histogram(name: &str, hist: &Histogram<u64>) {
        println!("\n=== {} ===", name);
        println!("  count:  {}", hist.len());
        println!("  min:    {} ns", hist.min());
        println!("  max:    {} ns", hist.max());
        println!("  mean:   {:.1} ns", hist.mean());
        println!("  p50:    {} ns", hist.value_at_quantile(0.50));
        println!("  p99:    {} ns", hist.value_at_quantile(0.99));
        println!("  p99.9:  {} ns", hist.value_at_quantile(0.999));
    }

    fn measure_add_del(name: &str, mut engine: TimerEngine<LatencyTimer>) {
        let mut add_hist = Histogram::<u64>::new(3).unwrap();
        let mut del_hist = Histogram::<u64>::new(3).unwrap();

        for i in 0..WARMUP {
            let handle = engine.add(0, (i % 500) + 10, LatencyTimer).unwrap();
            engine.del(handle).unwrap();
        }

        for i in 0..ITERATIONS {
            let start = Instant::now();
            let handle = engine.add(0, (i % 500) + 10, LatencyTimer).unwrap();
            add_hist.record(start.elapsed().as_nanos() as u64).unwrap();

            let start = Instant::now();
            engine.del(handle).unwrap();
            del_hist.record(start.elapsed().as_nanos() as u64).unwrap();
        }

        print_histogram(&format!("{name} add"), &add_hist);
        print_histogram(&format!("{name} del"), &del_hist);
    }

    #[test]
    #[ignore]
    fn hdr_queue_add_del_latency() {
        measure_add_del("queue", TimerEngine::queue());
    }

    #[test]
    #[ignore]
    fn hdr_wheel_add_del_latency() {
        measure_add_del("wheel", TimerEngine::wheel(1024).unwrap());
    }

    #[test]
    #[ignore]
    fn hdr_wheel_steady_state() {
        let mut engine = TimerEngine::wheel(1024).unwrap();
        let mut hist = Histogram::<u64>::new(3).unwrap();

        // Keep ~10k timers in flight, one tick per iteration
        for now in 0..ITERATIONS {
            for j in 0..10 {
                engine.add(now, 500 + (now + j) % 1500, LatencyTimer).unwrap();
            }

            let start = Instant::now();
            engine.check(now, usize::MAX, &mut ());
            if now >= WARMUP {
                hist.record(start.elapsed().as_nanos() as u64).unwrap();
            }
        }

        print_histogram("wheel check (steady state)", &hist);
    }
}

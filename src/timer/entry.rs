use crate::timer::list::Links;

/// Which wheel list currently holds an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bucket {
    /// Live spoke, visited once per revolution.
    Spoke(usize),
    /// Detached batch of the tick being swept.
    Sweep,
    /// Due tick already swept; fires on the next check.
    Overdue,
}

/// Strategy-private placement data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Queue,
    Wheel { bucket: Bucket, rotation: u64 },
    /// Popped by `check` and in no list while its callback runs.
    Firing,
}

/// A scheduled timer as stored in the slot arena.
///
/// An entry lives from `add` until it is deleted, torn down, or fires
/// without being reset by its own callback. Vacating the slot finalizes it.
pub(crate) struct TimerEntry<T> {
    pub(crate) expiry: u64,
    pub(crate) timeout: u64,
    pub(crate) placement: Placement,
    pub(crate) links: Links,
    /// Taken out while the timer's own `fire` runs.
    pub(crate) timer: Option<T>,
}

impl<T> TimerEntry<T> {
    pub(crate) fn new(now: u64, timeout: u64, timer: T) -> Self {
        Self {
            expiry: now.saturating_add(timeout),
            timeout,
            placement: Placement::Queue,
            links: Links::default(),
            timer: Some(timer),
        }
    }

    #[cfg(test)]
    pub(crate) fn rotation(&self) -> Option<u64> {
        match self.placement {
            Placement::Wheel { rotation, .. } => Some(rotation),
            Placement::Queue | Placement::Firing => None,
        }
    }

    #[inline(always)]
    pub(crate) fn bucket(&self) -> Option<Bucket> {
        match self.placement {
            Placement::Wheel { bucket, .. } => Some(bucket),
            Placement::Queue | Placement::Firing => None,
        }
    }
}

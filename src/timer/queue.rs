use crate::error::TimerError;
use crate::slot::Slots;
use crate::timer::Driver;
use crate::timer::entry::{Placement, TimerEntry};
use crate::timer::list::List;

/// Expiry-ordered queue.
///
/// Entries are only ever appended at the tail, which keeps the list sorted
/// because every accepted expiry is at least the current tail's. The head is
/// therefore always the earliest entry, and `pop_due` is O(1).
pub(crate) struct SortedQueue {
    entries: List,
    last_expiry: Option<u64>,
}

impl SortedQueue {
    pub(crate) const fn new() -> Self {
        Self {
            entries: List::new(),
            last_expiry: None,
        }
    }

    /// Expiry of the tail, `None` when empty.
    #[cfg(test)]
    pub(crate) fn last_expiry(&self) -> Option<u64> {
        self.last_expiry
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn next_expiry<T>(&self, slots: &Slots<TimerEntry<T>>) -> Option<u64> {
        self.entries.front().map(|head| slots[head].expiry)
    }

    #[inline(always)]
    fn check_bound(expiry: u64, bound: Option<u64>) -> Result<(), TimerError> {
        match bound {
            Some(last) if expiry < last => Err(TimerError::NonMonotonicInsert { expiry, last }),
            _ => Ok(()),
        }
    }

    fn refresh_bound<T>(&mut self, slots: &Slots<TimerEntry<T>>) {
        self.last_expiry = self.entries.back().map(|tail| slots[tail].expiry);
    }
}

impl Driver for SortedQueue {
    fn name(&self) -> &'static str {
        "sorted_queue"
    }

    fn storage_bytes(&self) -> usize {
        0
    }

    fn admit(&self, expiry: u64) -> Result<(), TimerError> {
        Self::check_bound(expiry, self.last_expiry)
    }

    fn link<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32, _now: u64) {
        let entry = &mut slots[index];
        entry.placement = Placement::Queue;
        let expiry = entry.expiry;

        debug_assert!(Self::check_bound(expiry, self.last_expiry).is_ok());
        self.entries.push_back(slots, index);
        self.last_expiry = Some(expiry);
    }

    fn unlink<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        self.entries.unlink(slots, index);
        self.refresh_bound(slots);
    }

    fn relink<T>(
        &mut self,
        slots: &mut Slots<TimerEntry<T>>,
        index: u32,
        now: u64,
        timeout: u64,
    ) -> Result<(), TimerError> {
        let expiry = now.saturating_add(timeout);
        let linked = slots[index].placement != Placement::Firing;

        // Validate against the bound the removal would leave behind, before
        // touching anything, so a rejected reset changes nothing.
        let bound = if linked && self.entries.back() == Some(index) {
            self.entries
                .prev_of(slots, index)
                .map(|prev| slots[prev].expiry)
        } else {
            self.last_expiry
        };
        Self::check_bound(expiry, bound)?;

        if linked {
            self.entries.unlink(slots, index);
        }
        let entry = &mut slots[index];
        entry.expiry = expiry;
        entry.timeout = timeout;
        entry.placement = Placement::Queue;
        self.entries.push_back(slots, index);
        self.last_expiry = Some(expiry);
        Ok(())
    }

    fn pop_due<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, now: u64) -> Option<u32> {
        let head = self.entries.front()?;
        if slots[head].expiry > now {
            return None;
        }

        self.entries.pop_front(slots);
        if self.entries.is_empty() {
            self.last_expiry = None;
        }
        Some(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(
        queue: &mut SortedQueue,
        slots: &mut Slots<TimerEntry<u32>>,
        now: u64,
        timeout: u64,
        id: u32,
    ) -> Result<u32, TimerError> {
        queue.admit(now.saturating_add(timeout))?;
        let key = slots.insert(TimerEntry::new(now, timeout, id));
        queue.link(slots, key.index(), now);
        Ok(key.index())
    }

    fn drain_due(
        queue: &mut SortedQueue,
        slots: &mut Slots<TimerEntry<u32>>,
        now: u64,
    ) -> Vec<u32> {
        let mut ids = Vec::new();
        while let Some(index) = queue.pop_due(slots, now) {
            ids.extend(slots.remove_at(index).timer);
        }
        ids
    }

    #[test]
    fn test_new_empty() {
        let queue = SortedQueue::new();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.last_expiry(), None);
        assert_eq!(queue.name(), "sorted_queue");
    }

    #[test]
    fn test_monotonic_adds_accepted() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        add(&mut queue, &mut slots, 0, 100, 2).unwrap(); // equal expiry is fine
        add(&mut queue, &mut slots, 50, 100, 3).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.last_expiry(), Some(150));
        assert_eq!(queue.next_expiry(&slots), Some(100));
    }

    #[test]
    fn test_non_monotonic_add_rejected() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 200, 1).unwrap();
        let err = add(&mut queue, &mut slots, 0, 100, 2).unwrap_err();

        assert_eq!(
            err,
            TimerError::NonMonotonicInsert {
                expiry: 100,
                last: 200
            }
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(slots.len(), 1);
        assert_eq!(queue.last_expiry(), Some(200));
    }

    #[test]
    fn test_pop_due_in_order_with_ties() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 10, 1).unwrap();
        add(&mut queue, &mut slots, 0, 20, 2).unwrap();
        add(&mut queue, &mut slots, 5, 15, 3).unwrap(); // expiry 20, ties with 2
        add(&mut queue, &mut slots, 0, 30, 4).unwrap();

        assert_eq!(drain_due(&mut queue, &mut slots, 9), Vec::<u32>::new());
        assert_eq!(drain_due(&mut queue, &mut slots, 20), vec![1, 2, 3]);
        assert_eq!(queue.last_expiry(), Some(30));
        assert_eq!(drain_due(&mut queue, &mut slots, 100), vec![4]);

        // Emptied by firing, the bound resets
        assert_eq!(queue.last_expiry(), None);
        add(&mut queue, &mut slots, 0, 1, 5).unwrap();
    }

    #[test]
    fn test_unlink_tail_lowers_bound() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        let tail = add(&mut queue, &mut slots, 0, 200, 2).unwrap();

        queue.unlink(&mut slots, tail);
        slots.remove_at(tail);
        assert_eq!(queue.last_expiry(), Some(100));

        // 150 is now admissible
        add(&mut queue, &mut slots, 0, 150, 3).unwrap();
    }

    #[test]
    fn test_unlink_middle_keeps_bound() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        let mid = add(&mut queue, &mut slots, 0, 150, 2).unwrap();
        add(&mut queue, &mut slots, 0, 200, 3).unwrap();

        queue.unlink(&mut slots, mid);
        slots.remove_at(mid);

        assert_eq!(queue.last_expiry(), Some(200));
        assert_eq!(drain_due(&mut queue, &mut slots, 1000), vec![1, 3]);
    }

    #[test]
    fn test_unlink_last_clears_bound() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        let only = add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        queue.unlink(&mut slots, only);
        assert_eq!(queue.last_expiry(), None);
    }

    #[test]
    fn test_relink_moves_to_tail() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        let first = add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        add(&mut queue, &mut slots, 0, 200, 2).unwrap();

        queue.relink(&mut slots, first, 100, 150).unwrap();

        assert_eq!(slots[first].expiry, 250);
        assert_eq!(slots[first].timeout, 150);
        assert_eq!(queue.last_expiry(), Some(250));
        assert_eq!(drain_due(&mut queue, &mut slots, 1000), vec![2, 1]);
    }

    #[test]
    fn test_relink_tail_checks_against_predecessor() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        let tail = add(&mut queue, &mut slots, 0, 200, 2).unwrap();

        // Pulling the tail earlier is fine as long as it stays >= 100
        queue.relink(&mut slots, tail, 0, 120).unwrap();
        assert_eq!(queue.last_expiry(), Some(120));

        let err = queue.relink(&mut slots, tail, 0, 50).unwrap_err();
        assert_eq!(
            err,
            TimerError::NonMonotonicInsert {
                expiry: 50,
                last: 100
            }
        );
    }

    #[test]
    fn test_relink_rejected_leaves_state() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        let first = add(&mut queue, &mut slots, 0, 100, 1).unwrap();
        add(&mut queue, &mut slots, 0, 200, 2).unwrap();

        assert!(queue.relink(&mut slots, first, 0, 150).is_err());

        assert_eq!(queue.len(), 2);
        assert_eq!(slots[first].expiry, 100);
        assert_eq!(queue.last_expiry(), Some(200));
        assert_eq!(drain_due(&mut queue, &mut slots, 1000), vec![1, 2]);
    }

    #[test]
    fn test_relink_popped_entry_appends() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        let first = add(&mut queue, &mut slots, 0, 10, 1).unwrap();
        add(&mut queue, &mut slots, 0, 20, 2).unwrap();

        assert_eq!(queue.pop_due(&mut slots, 10), Some(first));
        slots[first].placement = Placement::Firing;

        // Out of the list, so only the tail bounds it
        let err = queue.relink(&mut slots, first, 10, 5).unwrap_err();
        assert_eq!(
            err,
            TimerError::NonMonotonicInsert {
                expiry: 15,
                last: 20
            }
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(slots[first].placement, Placement::Firing);

        queue.relink(&mut slots, first, 10, 15).unwrap();
        assert_eq!(slots[first].placement, Placement::Queue);
        assert_eq!(queue.last_expiry(), Some(25));
        assert_eq!(drain_due(&mut queue, &mut slots, 100), vec![2, 1]);
    }

    #[test]
    fn test_relink_popped_last_entry() {
        let mut queue = SortedQueue::new();
        let mut slots = Slots::new();

        let only = add(&mut queue, &mut slots, 0, 10, 1).unwrap();
        assert_eq!(queue.pop_due(&mut slots, 10), Some(only));
        slots[only].placement = Placement::Firing;
        assert_eq!(queue.last_expiry(), None);

        // Emptied queue accepts any expiry
        queue.relink(&mut slots, only, 10, 0).unwrap();
        assert_eq!(queue.last_expiry(), Some(10));
        assert_eq!(drain_due(&mut queue, &mut slots, 10), vec![1]);
    }
}

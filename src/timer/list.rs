use crate::slot::Slots;
use crate::timer::entry::TimerEntry;

pub(crate) const NIL: u32 = u32::MAX;

/// Neighbour slot indices of an entry inside its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    prev: u32,
    next: u32,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            prev: NIL,
            next: NIL,
        }
    }
}

/// Intrusive FIFO list of arena entries.
///
/// The list owns only head, tail and length. Links live in the entries, so
/// moving a whole list (a spoke detached for sweeping) is O(1), as are
/// push-back, pop-front and unlinking an arbitrary member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct List {
    head: u32,
    tail: u32,
    len: usize,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    pub(crate) const fn new() -> Self {
        Self {
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub(crate) fn front(&self) -> Option<u32> {
        (self.head != NIL).then_some(self.head)
    }

    #[inline(always)]
    pub(crate) fn back(&self) -> Option<u32> {
        (self.tail != NIL).then_some(self.tail)
    }

    pub(crate) fn push_back<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        slots[index].links = Links {
            prev: self.tail,
            next: NIL,
        };

        if self.tail == NIL {
            self.head = index;
        } else {
            slots[self.tail].links.next = index;
        }
        self.tail = index;
        self.len += 1;
    }

    pub(crate) fn pop_front<T>(&mut self, slots: &mut Slots<TimerEntry<T>>) -> Option<u32> {
        let index = self.front()?;
        self.unlink(slots, index);
        Some(index)
    }

    /// Unlink a member. The caller guarantees `index` belongs to this list.
    pub(crate) fn unlink<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        debug_assert!(self.len > 0, "unlink from empty list");
        let Links { prev, next } = slots[index].links;

        if prev == NIL {
            self.head = next;
        } else {
            slots[prev].links.next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            slots[next].links.prev = prev;
        }

        slots[index].links = Links::default();
        self.len -= 1;
    }

    /// Predecessor of a member, if any.
    #[inline(always)]
    pub(crate) fn prev_of<T>(&self, slots: &Slots<TimerEntry<T>>, index: u32) -> Option<u32> {
        let prev = slots[index].links.prev;
        (prev != NIL).then_some(prev)
    }

    /// Detach every member, leaving this list empty.
    #[inline(always)]
    pub(crate) fn take(&mut self) -> List {
        std::mem::take(self)
    }

    /// Visit members front to back.
    pub(crate) fn for_each_mut<T>(
        &self,
        slots: &mut Slots<TimerEntry<T>>,
        mut f: impl FnMut(&mut TimerEntry<T>),
    ) {
        let mut cursor = self.head;
        while cursor != NIL {
            let entry = &mut slots[cursor];
            cursor = entry.links.next;
            f(entry);
        }
    }

    /// Member indices front to back.
    #[cfg(test)]
    pub(crate) fn indices<T>(&self, slots: &Slots<TimerEntry<T>>) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while cursor != NIL {
            out.push(cursor);
            cursor = slots[cursor].links.next;
        }
        out
    }
}

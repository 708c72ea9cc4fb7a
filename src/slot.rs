use std::ops::{Index, IndexMut};

const NONE: u32 = u32::MAX;

enum Entry<T> {
    Vacant { next: u32 },
    Occupied(T),
}

struct Slot<T> {
    generation: u32,
    entry: Entry<T>,
}

/// Stable address of an occupied slot.
///
/// The generation is bumped every time a slot is vacated, so a key kept past
/// the removal of its value never reaches whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    #[inline(always)]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[cfg(test)]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Growable slab with a LIFO free list and generation-checked keys.
pub struct Slots<T> {
    slots: Vec<Slot<T>>,
    free_head: u32,
    len: usize,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slots<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: NONE,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: NONE,
            len: 0,
        }
    }

    /// Bytes one slot occupies, value included.
    pub const fn slot_footprint() -> usize {
        std::mem::size_of::<Slot<T>>()
    }

    /// Insert a value. Returns its key.
    ///
    /// # Panics
    /// Panics if the slab would need more than `u32::MAX - 1` slots.
    pub fn insert(&mut self, value: T) -> SlotKey {
        self.len += 1;

        if self.free_head != NONE {
            let index = self.free_head;
            let slot = &mut self.slots[index as usize];
            let Entry::Vacant { next } = slot.entry else {
                unreachable!("free list pointed at occupied slot {index}");
            };
            self.free_head = next;
            slot.entry = Entry::Occupied(value);
            return SlotKey {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&i| i != NONE)
            .unwrap_or_else(|| panic!("slot arena overflow"));
        self.slots.push(Slot {
            generation: 0,
            entry: Entry::Occupied(value),
        });
        SlotKey {
            index,
            generation: 0,
        }
    }

    #[inline(always)]
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        match self.slots.get(key.index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(value),
            }) if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        match self.slots.get_mut(key.index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(value),
            }) if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Key of the value currently at `index`, `None` if the slot is vacant.
    #[inline(always)]
    pub fn key_at(&self, index: u32) -> Option<SlotKey> {
        match self.slots.get(index as usize) {
            Some(Slot {
                generation,
                entry: Entry::Occupied(_),
            }) => Some(SlotKey {
                index,
                generation: *generation,
            }),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Remove by key. Returns `None` if the key is stale.
    #[cfg(test)]
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        if !self.contains(key) {
            return None;
        }
        self.vacate(key.index)
    }

    /// Remove by raw index, bypassing the generation check.
    ///
    /// # Panics
    /// Panics if the slot is vacant.
    pub fn remove_at(&mut self, index: u32) -> T {
        match self.vacate(index) {
            Some(value) => value,
            None => panic!("slot {index} is vacant"),
        }
    }

    /// Remove every occupied value, in slot order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        for index in 0..self.slots.len() {
            if let Some(value) = self.vacate(index as u32) {
                values.push(value);
            }
        }
        values
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn vacate(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if let Entry::Vacant { .. } = slot.entry {
            return None;
        }

        let old = std::mem::replace(
            &mut slot.entry,
            Entry::Vacant {
                next: self.free_head,
            },
        );
        slot.generation = slot.generation.wrapping_add(1);
        self.free_head = index;
        self.len -= 1;

        match old {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant { .. } => None,
        }
    }
}

impl<T> Index<u32> for Slots<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, index: u32) -> &T {
        match self.slots.get(index as usize) {
            Some(Slot {
                entry: Entry::Occupied(value),
                ..
            }) => value,
            _ => panic!("slot {index} is vacant"),
        }
    }
}

impl<T> IndexMut<u32> for Slots<T> {
    #[inline(always)]
    fn index_mut(&mut self, index: u32) -> &mut T {
        match self.slots.get_mut(index as usize) {
            Some(Slot {
                entry: Entry::Occupied(value),
                ..
            }) => value,
            _ => panic!("slot {index} is vacant"),
        }
    }
}

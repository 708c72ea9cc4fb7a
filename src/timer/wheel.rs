use crate::error::TimerError;
use crate::slot::Slots;
use crate::timer::Driver;
use crate::timer::entry::{Bucket, Placement, TimerEntry};
use crate::timer::list::List;

/// The tick whose spoke has been detached but not yet fully visited.
struct Sweep {
    tick: u64,
    spoke: usize,
    batch: List,
}

/// Single-level hashed timing wheel.
///
/// Tick `t` (counted from the first add) visits spoke `t % size`. An entry
/// due at tick `d` is parked on spoke `d % size` with a rotation count of
/// the full revolutions that pass before `d`. Each visit either decrements
/// the rotation and re-parks the entry, or hands it out as due.
pub(crate) struct TimingWheel {
    spokes: Box<[List]>,
    resolution: u64,
    origin: Option<u64>,
    ticks_processed: u64,
    sweep: Option<Sweep>,
    overdue: List,
    // Entries parked on live spokes, for the empty fast-forward
    parked: usize,
}

impl TimingWheel {
    /// `size` and `resolution` must already be validated (both non-zero).
    pub(crate) fn new(size: usize, resolution: u64) -> Self {
        debug_assert!(size > 0 && resolution > 0);
        Self {
            spokes: vec![List::new(); size].into_boxed_slice(),
            resolution,
            origin: None,
            ticks_processed: 0,
            sweep: None,
            overdue: List::new(),
            parked: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> usize {
        self.spokes.len()
    }

    #[cfg(test)]
    pub(crate) fn resolution(&self) -> u64 {
        self.resolution
    }

    /// Time of the first add, `None` until then.
    #[cfg(test)]
    pub(crate) fn origin(&self) -> Option<u64> {
        self.origin
    }

    #[cfg(test)]
    pub(crate) fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    #[cfg(test)]
    pub(crate) fn current_spoke(&self) -> usize {
        self.spoke_for_tick(self.ticks_processed)
    }

    #[cfg(test)]
    pub(crate) fn spoke_len(&self, spoke: usize) -> usize {
        self.spokes[spoke].len()
    }

    /// Last tick whose sweep has started.
    #[inline(always)]
    fn floor(&self) -> u64 {
        self.sweep
            .as_ref()
            .map_or(self.ticks_processed, |sweep| sweep.tick)
    }

    #[inline(always)]
    fn spoke_for_tick(&self, tick: u64) -> usize {
        (tick % self.spokes.len() as u64) as usize
    }

    /// First tick at or after `expiry`.
    #[inline(always)]
    fn due_tick(&self, origin: u64, expiry: u64) -> u64 {
        expiry.saturating_sub(origin).div_ceil(self.resolution)
    }

    fn place<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32, origin: u64) {
        let due = self.due_tick(origin, slots[index].expiry);
        let floor = self.floor();

        if due <= floor {
            slots[index].placement = Placement::Wheel {
                bucket: Bucket::Overdue,
                rotation: 0,
            };
            self.overdue.push_back(slots, index);
            return;
        }

        let spoke = self.spoke_for_tick(due);
        let rotation = (due - floor - 1) / self.spokes.len() as u64;
        slots[index].placement = Placement::Wheel {
            bucket: Bucket::Spoke(spoke),
            rotation,
        };
        self.spokes[spoke].push_back(slots, index);
        self.parked += 1;
    }

    fn detach<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        match slots[index].bucket() {
            Some(Bucket::Spoke(spoke)) => {
                self.spokes[spoke].unlink(slots, index);
                self.parked -= 1;
            }
            Some(Bucket::Sweep) => match self.sweep.as_mut() {
                Some(sweep) => sweep.batch.unlink(slots, index),
                None => unreachable!("entry {index} marked as swept with no sweep in flight"),
            },
            Some(Bucket::Overdue) => self.overdue.unlink(slots, index),
            None => unreachable!("entry {index} is not placed on the wheel"),
        }
    }

    /// Detach the spoke of `tick` as the in-flight batch.
    fn begin_tick<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, tick: u64) {
        let spoke = self.spoke_for_tick(tick);
        let batch = self.spokes[spoke].take();
        self.parked -= batch.len();

        batch.for_each_mut(slots, |entry| {
            if let Placement::Wheel { bucket, .. } = &mut entry.placement {
                *bucket = Bucket::Sweep;
            }
        });
        self.sweep = Some(Sweep { tick, spoke, batch });
    }
}

impl Driver for TimingWheel {
    fn name(&self) -> &'static str {
        "timing_wheel"
    }

    fn storage_bytes(&self) -> usize {
        self.spokes.len() * std::mem::size_of::<List>()
    }

    fn admit(&self, _expiry: u64) -> Result<(), TimerError> {
        Ok(())
    }

    fn link<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32, now: u64) {
        let origin = *self.origin.get_or_insert(now);
        self.place(slots, index, origin);
    }

    fn unlink<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, index: u32) {
        self.detach(slots, index);
    }

    fn relink<T>(
        &mut self,
        slots: &mut Slots<TimerEntry<T>>,
        index: u32,
        now: u64,
        timeout: u64,
    ) -> Result<(), TimerError> {
        if slots[index].placement != Placement::Firing {
            self.detach(slots, index);
        }

        let origin = *self.origin.get_or_insert(now);
        let virtual_now = origin.saturating_add(self.floor().saturating_mul(self.resolution));
        let mut expiry = now.saturating_add(timeout);
        if expiry <= virtual_now {
            expiry = virtual_now.saturating_add(self.resolution);
        }

        let entry = &mut slots[index];
        entry.expiry = expiry;
        entry.timeout = timeout;
        self.place(slots, index, origin);
        Ok(())
    }

    fn pop_due<T>(&mut self, slots: &mut Slots<TimerEntry<T>>, now: u64) -> Option<u32> {
        let origin = self.origin?;

        if let Some(index) = self.overdue.pop_front(slots) {
            return Some(index);
        }

        let target = now.saturating_sub(origin) / self.resolution;
        loop {
            if let Some(sweep) = self.sweep.as_mut() {
                while let Some(index) = sweep.batch.pop_front(slots) {
                    let entry = &mut slots[index];
                    match entry.placement {
                        Placement::Wheel { rotation, .. } if rotation > 0 => {
                            entry.placement = Placement::Wheel {
                                bucket: Bucket::Spoke(sweep.spoke),
                                rotation: rotation - 1,
                            };
                            self.spokes[sweep.spoke].push_back(slots, index);
                            self.parked += 1;
                        }
                        _ => return Some(index),
                    }
                }

                self.ticks_processed = sweep.tick;
                self.sweep = None;
            }

            if self.ticks_processed >= target {
                return None;
            }

            if self.parked == 0 {
                // Nothing can come due on the way, jump straight to now
                self.ticks_processed = target;
                return None;
            }

            self.begin_tick(slots, self.ticks_processed + 1);
        }
    }
}

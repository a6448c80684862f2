//! Tick wheel for sleeping tasks and bounded waits
//!
//! A task waiting until tick `t` is filed in slot `t % CFG_TICK_WHEEL_SIZE`.
//! Each tick only the slot of the current tick is walked; entries filed
//! there for a later lap of the wheel stay put.

use crate::arena::Idx;
use crate::config::{CFG_MAX_TASKS, CFG_TICK_WHEEL_SIZE};
use crate::list::{Link, List};
use crate::time::after;
use crate::types::OsTick;

pub(crate) struct TickWheel {
    slots: [List; CFG_TICK_WHEEL_SIZE],
    links: [Link; CFG_MAX_TASKS],
    wake_at: [OsTick; CFG_MAX_TASKS],
}

impl TickWheel {
    pub const fn new() -> Self {
        TickWheel {
            slots: [List::new(); CFG_TICK_WHEEL_SIZE],
            links: [Link::UNLINKED; CFG_MAX_TASKS],
            wake_at: [0; CFG_MAX_TASKS],
        }
    }

    #[inline(always)]
    fn slot(tick: OsTick) -> usize {
        (tick as usize) & (CFG_TICK_WHEEL_SIZE - 1)
    }

    /// File a task to expire at tick `wake_at`
    pub fn insert(&mut self, idx: Idx, wake_at: OsTick) {
        self.wake_at[idx as usize] = wake_at;
        self.slots[Self::slot(wake_at)].insert_tail(&mut self.links, idx);
    }

    /// Take a task off the wheel; no-op if it is not filed
    pub fn remove(&mut self, idx: Idx) {
        if self.links[idx as usize].is_linked() {
            let slot = Self::slot(self.wake_at[idx as usize]);
            self.slots[slot].remove(&mut self.links, idx);
        }
    }

    #[inline]
    pub fn contains(&self, idx: Idx) -> bool {
        self.links[idx as usize].is_linked()
    }

    /// Unfile every task of the current slot whose time has come and
    /// store them in `due`. Returns the number stored.
    pub fn take_due(&mut self, now: OsTick, due: &mut [Idx; CFG_MAX_TASKS]) -> usize {
        let slot = Self::slot(now);
        let mut n = 0;
        let mut cursor = self.slots[slot].head();
        while let Some(idx) = cursor {
            cursor = self.links[idx as usize].next();
            if after(now, self.wake_at[idx as usize]) {
                self.slots[slot].remove(&mut self.links, idx);
                due[n] = idx;
                n += 1;
            }
        }
        n
    }
}

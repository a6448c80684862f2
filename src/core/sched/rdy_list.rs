//! Ready queue - one FIFO list of task slots per priority level
//!
//! Tasks are added to the tail and scheduled from the head. The running
//! task stays at the head of its list until it blocks, yields or is
//! preempted by a higher level.

use crate::arena::Idx;
use crate::config::CFG_PRIO_LEVELS;
use crate::list::{Link, List};
use crate::prio::PrioTable;
use crate::types::OsPrio;

/// Ready lists for all priority levels
pub(crate) struct ReadyQueue {
    prio_tbl: PrioTable,
    lists: [List; CFG_PRIO_LEVELS],
}

impl ReadyQueue {
    pub const fn new() -> Self {
        ReadyQueue {
            prio_tbl: PrioTable::new(),
            lists: [List::new(); CFG_PRIO_LEVELS],
        }
    }

    /// Insert a task at the tail of its level
    pub fn insert_tail(&mut self, links: &mut [Link], idx: Idx, prio: OsPrio) {
        self.lists[prio as usize].insert_tail(links, idx);
        self.prio_tbl.insert(prio);
    }

    /// Insert a task at the head of its level
    pub fn insert_head(&mut self, links: &mut [Link], idx: Idx, prio: OsPrio) {
        self.lists[prio as usize].insert_head(links, idx);
        self.prio_tbl.insert(prio);
    }

    /// Remove a task from its level
    pub fn remove(&mut self, links: &mut [Link], idx: Idx, prio: OsPrio) {
        let list = &mut self.lists[prio as usize];
        list.remove(links, idx);
        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
    }

    /// Move `idx` to the tail of its level
    pub fn move_to_tail(&mut self, links: &mut [Link], idx: Idx, prio: OsPrio) {
        let list = &mut self.lists[prio as usize];
        if list.len() > 1 {
            list.remove(links, idx);
            list.insert_tail(links, idx);
        }
    }

    /// Head of the most urgent non-empty level
    #[inline]
    pub fn highest_head(&self) -> Option<Idx> {
        let prio = self.prio_tbl.get_highest()?;
        self.lists[prio as usize].head()
    }

    /// Number of ready tasks at a level
    #[inline]
    pub fn count(&self, prio: OsPrio) -> usize {
        self.lists[prio as usize].len()
    }
}

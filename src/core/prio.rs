//! Priority bitmap for O(1) highest-ready lookup
//!
//! One bit per priority level; a set bit means the level's ready list is not
//! empty. Higher priority numbers are more urgent, so the lookup scans from
//! the top word down and uses the leading-zero count (a single CLZ
//! instruction on Cortex-M).

use crate::config::CFG_PRIO_LEVELS;
use crate::types::OsPrio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = CFG_PRIO_LEVELS.div_ceil(32);

/// Priority bitmap table
///
/// Priority `p` lives in word `p / 32` at bit `p % 32`.
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    /// Mark a priority level as having ready tasks
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_LEVELS);
        self.bitmap[(prio / 32) as usize] |= 1 << (prio % 32);
    }

    /// Clear a priority level
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_LEVELS);
        self.bitmap[(prio / 32) as usize] &= !(1 << (prio % 32));
    }

    /// Most urgent priority with a ready task
    #[inline]
    pub fn get_highest(&self) -> Option<OsPrio> {
        for (word_idx, &word) in self.bitmap.iter().enumerate().rev() {
            if word != 0 {
                let bit = 31 - word.leading_zeros() as usize;
                return Some((word_idx * 32 + bit) as OsPrio);
            }
        }
        None
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        (self.bitmap[(prio / 32) as usize] & (1 << (prio % 32))) != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.insert(3);
        assert_eq!(table.get_highest(), Some(5));

        table.insert(7);
        assert_eq!(table.get_highest(), Some(7));

        table.remove(7);
        table.remove(5);
        assert_eq!(table.get_highest(), Some(3));

        table.remove(3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_idle_level() {
        let mut table = PrioTable::new();
        table.insert(0);
        assert_eq!(table.get_highest(), Some(0));
        table.insert(1);
        assert_eq!(table.get_highest(), Some(1));
    }

    #[test]
    fn test_top_level() {
        let top = (CFG_PRIO_LEVELS - 1) as OsPrio;
        let mut table = PrioTable::new();
        table.insert(1);
        table.insert(top);
        assert_eq!(table.get_highest(), Some(top));
        table.remove(top);
        assert_eq!(table.get_highest(), Some(1));
    }
}

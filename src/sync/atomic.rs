//! Atomic variables
//!
//! An integer shared between tasks and interrupt handlers without going
//! through the kernel. Backed by `portable-atomic`, which falls back to a
//! critical section on cores without native read-modify-write atomics.

use portable_atomic::{AtomicI32, Ordering};

/// Atomic integer variable
#[derive(Debug, Default)]
pub struct AtomicVar(AtomicI32);

impl AtomicVar {
    pub const fn new(value: i32) -> Self {
        AtomicVar(AtomicI32::new(value))
    }

    /// Store a new value
    #[inline]
    pub fn set(&self, value: i32) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Current value
    #[inline]
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::SeqCst)
    }

    /// Add `value` and return the previous value. Wraps on overflow.
    #[inline]
    pub fn add(&self, value: i32) -> i32 {
        self.0.fetch_add(value, Ordering::SeqCst)
    }

    /// Subtract `value` and return the previous value. Wraps on overflow.
    #[inline]
    pub fn sub(&self, value: i32) -> i32 {
        self.0.fetch_sub(value, Ordering::SeqCst)
    }
}

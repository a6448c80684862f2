//! Synchronization primitives
//!
//! Contains semaphores, mutexes, event flags and atomic variables.

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "flag")]
pub mod flag;

#[cfg(feature = "atomic")]
pub mod atomic;

//! Core type definitions
//!
//! These types provide strong typing for RTOS primitives.

/// Task priority (higher = more urgent, 0 = idle)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Semaphore counter type. Negative initial counts are allowed; the
/// semaphore only hands out units while the counter is above zero.
pub type OsSemCtr = i32;

/// Nesting counter
pub type OsNestingCtr = u8;

/// Flag bitmask. The top bit is reserved, so a flag object holds
/// `OsFlags::BITS - 1` flags.
pub type OsFlags = u32;

/// Stack element type
pub type OsStkElement = u32;

/// Highest usable flag number
pub const FLAG_MAX_BIT: u32 = OsFlags::BITS - 2;

/// Timeout value that never expires
pub const INFINITE: OsTick = OsTick::MAX;

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Task is ready to run
    Ready = 0,
    /// Task owns the CPU
    Running = 1,
    /// Task waits on a primitive or sleeps
    Blocked = 2,
    /// Task is suspended
    Suspended = 3,
    /// Task has exited and waits to be reaped
    Terminated = 4,
}

/// Wait mode for flag objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlagMode {
    /// Return and clear the lowest set flag; the result is its bit number
    GetSingle,
    /// Return and clear every set flag; the result is the mask
    GetMask,
    /// Wait until every bit of the mask is set, then return and clear them
    GetAll(OsFlags),
}

/// Wait length for blocking calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Do not wait
    Poll,
    /// Wait at most this many ticks
    Ticks(OsTick),
    /// Wait forever
    Infinite,
}

impl From<OsTick> for Timeout {
    fn from(ticks: OsTick) -> Self {
        match ticks {
            0 => Timeout::Poll,
            INFINITE => Timeout::Infinite,
            t => Timeout::Ticks(t),
        }
    }
}

/// Outcome of an operation that may wait.
///
/// Only `Ready` carries a value. `Blocked` means the calling task was moved to
/// a wait queue and another task was dispatched; the final outcome is
/// collected with the matching `*_result` call once the task runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Pend<T> {
    Ready(T),
    Blocked,
    Timeout,
    WouldBlock,
}

impl<T> Pend<T> {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Pend::Ready(_))
    }

    #[inline]
    pub fn ready(self) -> Option<T> {
        match self {
            Pend::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Pend<U> {
        match self {
            Pend::Ready(v) => Pend::Ready(f(v)),
            Pend::Blocked => Pend::Blocked,
            Pend::Timeout => Pend::Timeout,
            Pend::WouldBlock => Pend::WouldBlock,
        }
    }
}

/// Pend status stored in the TCB while and after waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsPendStatus {
    /// Still waiting
    Pending = 0,
    /// Pend succeeded
    Ok = 1,
    /// Object was deleted while pending
    Del = 2,
    /// Timeout occurred
    Timeout = 3,
}

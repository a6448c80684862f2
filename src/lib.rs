//! pico]OS-style real-time kernel in Rust
//!
//! A real-time operating system kernel providing:
//! - Priority-based preemptive scheduling with round robin within a level
//! - Semaphores, reentrant mutexes and event flags
//! - Tick-based delays, timeouts and software timers
//! - Per-task message boxes, element lists and software interrupts
//! - Context switching for ARM Cortex-M
//!
//! All kernel state lives in a [`Kernel`] value, usually placed in a
//! `static` [`KernelCell`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod ipc;
pub mod port;
pub mod sync;

// ============ Re-exports ============

pub use crate::core::arena;
pub use crate::core::arena::{kind, Handle};
pub use crate::core::cell;
pub use crate::core::cell::KernelCell;
pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::kernel;
pub use crate::core::kernel::Kernel;
pub use crate::core::list::End;
pub(crate) use crate::core::list;
pub use crate::core::prio;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::task::{Stack, StackAlloc, StackPool, TaskId};
pub use crate::core::time;
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "flag")]
pub use sync::flag;
#[cfg(feature = "atomic")]
pub use sync::atomic;
#[cfg(feature = "msgbox")]
pub use ipc::msg;
#[cfg(feature = "list")]
pub use ipc::lists;
#[cfg(feature = "softint")]
pub use ipc::softint;

pub use port::{Port, TaskFn};

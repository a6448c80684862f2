//! Critical section protected kernel cell
//!
//! Tasks and interrupt handlers reach the kernel through a `static`
//! [`KernelCell`]. Every access runs inside a critical section, which is the
//! kernel-wide lock.
//!
//! ```ignore
//! static KERNEL: KernelCell<CortexM4> = KernelCell::new(Kernel::new(CortexM4::new()));
//!
//! fn worker(_: usize) {
//!     loop {
//!         KERNEL.block_on(|k| k.sem_get(SEM), |k| k.sem_result()).ok();
//!     }
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::critical;
use crate::error::OsResult;
use crate::kernel::Kernel;
use crate::port::Port;
use crate::types::Pend;

/// A kernel that can only be accessed within a critical section
pub struct KernelCell<P: Port>(Mutex<RefCell<Kernel<P>>>);

impl<P: Port> KernelCell<P> {
    pub const fn new(kernel: Kernel<P>) -> Self {
        Self(Mutex::new(RefCell::new(kernel)))
    }

    /// Run `f` on the kernel with interrupts masked
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut Kernel<P>) -> R) -> R {
        critical::critical_section(|cs| f(&mut self.0.borrow_ref_mut(cs)))
    }

    /// Run `f` as an interrupt handler body, bracketed by `int_enter` and
    /// `int_exit`
    pub fn isr<R>(&self, f: impl FnOnce(&mut Kernel<P>) -> R) -> R {
        self.with(|k| {
            k.int_enter();
            let r = f(k);
            k.int_exit();
            r
        })
    }

    /// Run a blocking operation to completion from task context
    ///
    /// `op` is the wait call, `result` the matching `*_result` call. When
    /// `op` blocks, the critical section is left so the pending context
    /// switch can happen; `result` runs once the task is dispatched again.
    /// Only meaningful with a port that really switches stacks.
    pub fn block_on<T>(
        &self,
        op: impl FnOnce(&mut Kernel<P>) -> OsResult<Pend<T>>,
        result: impl FnOnce(&mut Kernel<P>) -> OsResult<Pend<T>>,
    ) -> OsResult<Pend<T>> {
        match self.with(op)? {
            Pend::Blocked => self.with(result),
            other => Ok(other),
        }
    }
}

//! Port layer - CPU-specific implementations
//!
//! The kernel makes every scheduling decision itself and only asks the port
//! to build initial task contexts and to carry out the context switches it
//! has decided on.

use crate::task::Stack;

/// Task entry point. A task that returns is terminated as if it had called
/// `task_exit`.
pub type TaskFn = fn(usize);

/// Hardware abstraction used by [`Kernel`](crate::kernel::Kernel)
pub trait Port {
    /// Saved execution context of one task
    type Context;

    /// Build the initial context so the first switch to it runs
    /// `entry(arg)` on `stack`.
    fn init_context(&mut self, stack: &mut Stack, entry: TaskFn, arg: usize) -> Self::Context;

    /// Dispatch the first task when multitasking starts
    fn start(&mut self, first: &mut Self::Context);

    /// Switch from the current task to `to`. `from` is `None` when the
    /// outgoing task has terminated and its context must not be saved.
    ///
    /// Ports may defer the actual switch (e.g. to PendSV); the kernel has
    /// already updated its bookkeeping when this is called.
    fn switch(&mut self, from: Option<&mut Self::Context>, to: &mut Self::Context);

    /// Idle action when no idle hook is installed
    fn idle(&mut self) {}
}

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::CortexM4;

// Simulated port for host testing
#[cfg(not(target_arch = "arm"))]
pub mod sim;

#[cfg(not(target_arch = "arm"))]
pub use sim::{SimContext, SimPort};

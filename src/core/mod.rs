//! Core RTOS modules
//!
//! Contains the kernel context, scheduler, task and time management and the
//! slot tables and lists they are built on.

pub mod arena;
pub mod cell;
pub mod config;
pub mod critical;
pub mod error;
pub mod kernel;
pub(crate) mod list;
pub mod prio;
pub mod types;
pub mod task;
pub mod sched;
pub mod time;

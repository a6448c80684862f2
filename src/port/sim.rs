//! Simulated port for host builds
//!
//! No code runs on the task stacks. Switches are recorded so tests can drive
//! the kernel from "the current task" and check what the scheduler did.

use super::{Port, TaskFn};
use crate::task::Stack;

/// Recorded task context
#[derive(Debug, Clone, Copy)]
pub struct SimContext {
    /// Sequence number of the context, in creation order
    pub id: u32,
    pub entry: TaskFn,
    pub arg: usize,
    /// Address one past the end of the stack
    pub stack_top: usize,
}

/// Port that records switches instead of performing them
#[derive(Debug, Default)]
pub struct SimPort {
    contexts: u32,
    switches: u32,
    idle_calls: u32,
    started: Option<u32>,
    last_switch: Option<(Option<u32>, u32)>,
}

impl SimPort {
    pub const fn new() -> Self {
        SimPort {
            contexts: 0,
            switches: 0,
            idle_calls: 0,
            started: None,
            last_switch: None,
        }
    }

    /// Number of context switches requested so far
    pub fn switches(&self) -> u32 {
        self.switches
    }

    /// Context id of the first task, once started
    pub fn started(&self) -> Option<u32> {
        self.started
    }

    /// `(from, to)` context ids of the latest switch
    pub fn last_switch(&self) -> Option<(Option<u32>, u32)> {
        self.last_switch
    }

    /// Number of idle actions taken
    pub fn idle_calls(&self) -> u32 {
        self.idle_calls
    }
}

impl Port for SimPort {
    type Context = SimContext;

    fn init_context(&mut self, stack: &mut Stack, entry: TaskFn, arg: usize) -> SimContext {
        let id = self.contexts;
        self.contexts += 1;
        let base = stack.as_mut_ptr() as usize;
        SimContext {
            id,
            entry,
            arg,
            stack_top: base + stack.len() * core::mem::size_of::<crate::types::OsStkElement>(),
        }
    }

    fn start(&mut self, first: &mut SimContext) {
        self.started = Some(first.id);
    }

    fn switch(&mut self, from: Option<&mut SimContext>, to: &mut SimContext) {
        self.switches += 1;
        self.last_switch = Some((from.map(|c| c.id), to.id));
    }

    fn idle(&mut self) {
        self.idle_calls += 1;
    }
}

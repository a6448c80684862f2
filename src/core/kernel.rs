//! Kernel context and lifecycle
//!
//! All kernel state lives in one [`Kernel`] value. Callers serialize access
//! to it themselves, normally through a [`KernelCell`](crate::cell::KernelCell)
//! which borrows it inside a critical section.

use crate::arena::{kind, Arena, Idx};
use crate::config::{CFG_MAX_TASKS, CFG_PRIO_IDLE, CFG_TICK_RATE_HZ};
use crate::error::{misuse, OsError, OsResult};
use crate::list::Link;
use crate::port::{Port, TaskFn};
use crate::sched::ReadyQueue;
use crate::task::{OsTcb, Stack, StackAlloc, TaskId};
use crate::time::TickWheel;
use crate::types::{OsNestingCtr, OsTaskState, OsTick};

#[cfg(feature = "flag")]
use crate::flag::OsFlag;
#[cfg(feature = "list")]
use crate::lists::ListTables;
#[cfg(feature = "msgbox")]
use crate::msg::MsgPool;
#[cfg(feature = "mutex")]
use crate::mutex::OsMutex;
#[cfg(feature = "sem")]
use crate::sem::OsSem;
#[cfg(feature = "softint")]
use crate::softint::SoftInts;
#[cfg(feature = "timer")]
use crate::time::timer::TimerTable;

/// Idle hook, called from [`Kernel::idle_step`]
pub type IdleHook = fn();

/// Installed stack allocator
pub type StackPoolRef = &'static mut (dyn StackAlloc + Send);

/// The kernel context
pub struct Kernel<P: Port> {
    pub(crate) port: P,

    // ============ Tasks & scheduling ============
    pub(crate) tasks: Arena<kind::Task, OsTcb<P::Context>, CFG_MAX_TASKS>,
    /// Ready queue and wait queue links; a task is in at most one of them
    pub(crate) qlinks: [Link; CFG_MAX_TASKS],
    pub(crate) rdy: ReadyQueue,
    pub(crate) wheel: TickWheel,
    pub(crate) cur: Option<Idx>,
    pub(crate) idle: Option<Idx>,
    pub(crate) stacks: Option<StackPoolRef>,
    pub(crate) idle_hook: Option<IdleHook>,

    // ============ Kernel status ============
    pub(crate) jiffies: OsTick,
    pub(crate) initialized: bool,
    pub(crate) running: bool,
    pub(crate) int_nesting: OsNestingCtr,
    pub(crate) sched_lock_nesting: OsNestingCtr,
    /// A scheduling decision was deferred by a lock or an ISR
    pub(crate) resched_pending: bool,

    // ============ Objects ============
    #[cfg(feature = "sem")]
    pub(crate) sems: Arena<kind::Sem, OsSem, { crate::config::CFG_MAX_SEMAS }>,
    #[cfg(feature = "mutex")]
    pub(crate) mutexes: Arena<kind::Mutex, OsMutex, { crate::config::CFG_MAX_MUTEXES }>,
    #[cfg(feature = "flag")]
    pub(crate) flags: Arena<kind::Flag, OsFlag, { crate::config::CFG_MAX_FLAGS }>,
    #[cfg(feature = "timer")]
    pub(crate) timers: TimerTable,
    #[cfg(feature = "msgbox")]
    pub(crate) msgs: MsgPool,
    #[cfg(feature = "list")]
    pub(crate) lists: ListTables,
    #[cfg(feature = "softint")]
    pub(crate) softints: SoftInts<P>,
}

impl<P: Port> Kernel<P> {
    /// Create an empty, uninitialized kernel
    pub const fn new(port: P) -> Self {
        Kernel {
            port,
            tasks: Arena::new(),
            qlinks: [Link::UNLINKED; CFG_MAX_TASKS],
            rdy: ReadyQueue::new(),
            wheel: TickWheel::new(),
            cur: None,
            idle: None,
            stacks: None,
            idle_hook: None,
            jiffies: 0,
            initialized: false,
            running: false,
            int_nesting: 0,
            sched_lock_nesting: 0,
            resched_pending: false,
            #[cfg(feature = "sem")]
            sems: Arena::new(),
            #[cfg(feature = "mutex")]
            mutexes: Arena::new(),
            #[cfg(feature = "flag")]
            flags: Arena::new(),
            #[cfg(feature = "timer")]
            timers: TimerTable::new(),
            #[cfg(feature = "msgbox")]
            msgs: MsgPool::new(),
            #[cfg(feature = "list")]
            lists: ListTables::new(),
            #[cfg(feature = "softint")]
            softints: SoftInts::new(),
        }
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Initialize the kernel and create the idle task
    ///
    /// `idle_entry` is the body of the idle task. It is expected to loop
    /// calling [`idle_step`](Self::idle_step).
    pub fn init(&mut self, idle_stack: Stack, idle_entry: TaskFn) -> OsResult<TaskId> {
        if self.running || self.initialized {
            return Err(OsError::OsRunning);
        }

        #[cfg(feature = "msgbox")]
        self.msgs.reset();

        let idle = self.create_task(idle_entry, 0, CFG_PRIO_IDLE, idle_stack, false)?;
        self.tasks.at_mut(idle.idx()).name = "idle";
        self.idle = Some(idle.idx());
        self.initialized = true;

        crate::info!("kernel initialized, {=u32} Hz tick", CFG_TICK_RATE_HZ);
        Ok(idle)
    }

    /// Start multitasking by dispatching the most urgent ready task
    ///
    /// With a hardware port this does not return.
    pub fn start(&mut self) -> OsResult<()> {
        if !self.initialized {
            return Err(OsError::OsNotInit);
        }
        if self.running {
            return Err(OsError::OsRunning);
        }

        let first = self.rdy.highest_head().ok_or(OsError::TaskNone)?;
        self.cur = Some(first);
        self.running = true;
        self.resched_pending = false;

        let tcb = self.tasks.at_mut(first);
        tcb.state = OsTaskState::Running;
        crate::info!("starting multitasking, first task prio {=u8}", tcb.prio);
        self.port.start(&mut tcb.ctx);
        Ok(())
    }

    /// Check if multitasking is running
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current interrupt nesting level
    #[inline]
    pub fn int_nesting(&self) -> OsNestingCtr {
        self.int_nesting
    }

    /// Current scheduler lock nesting level
    #[inline]
    pub fn sched_lock_nesting(&self) -> OsNestingCtr {
        self.sched_lock_nesting
    }

    /// Enter interrupt context. Must be paired with [`int_exit`](Self::int_exit).
    pub fn int_enter(&mut self) {
        debug_assert!(self.int_nesting < OsNestingCtr::MAX, "interrupt nesting overflow");
        self.int_nesting = self.int_nesting.saturating_add(1);
    }

    /// Leave interrupt context
    ///
    /// On the outermost exit, pending software interrupts run and a deferred
    /// scheduling decision is carried out.
    pub fn int_exit(&mut self) {
        if self.int_nesting == 0 {
            crate::warn!("int_exit without int_enter");
            return;
        }
        self.int_nesting -= 1;
        if self.int_nesting > 0 {
            return;
        }

        #[cfg(feature = "softint")]
        self.softint_check();

        if self.resched_pending && self.sched_lock_nesting == 0 {
            self.sched();
        }
    }

    /// Lock the scheduler. Nests.
    pub fn sched_lock(&mut self) -> OsResult<()> {
        // One level stays reserved for the kernel's own tick processing
        if self.sched_lock_nesting >= OsNestingCtr::MAX - 1 {
            return Err(OsError::LockNestingOvf);
        }
        self.sched_lock_nesting += 1;
        Ok(())
    }

    /// Unlock the scheduler. The outermost unlock carries out a scheduling
    /// decision deferred while locked.
    pub fn sched_unlock(&mut self) -> OsResult<()> {
        if self.sched_lock_nesting == 0 {
            return Err(OsError::SchedNotLocked);
        }
        self.sched_lock_nesting -= 1;
        if self.sched_lock_nesting == 0 && self.resched_pending {
            self.sched();
        }
        Ok(())
    }

    /// One pass of the idle task body
    ///
    /// Runs the idle hook (or the port's idle action) and hands the CPU to
    /// other tasks sharing the idle level.
    pub fn idle_step(&mut self) {
        match self.idle_hook {
            Some(hook) => hook(),
            None => self.port.idle(),
        }

        if self.cur.is_some() && self.cur == self.idle && self.rdy.count(CFG_PRIO_IDLE) > 1 {
            let _ = self.task_yield();
        }
    }

    /// Install a new idle hook, returning the previous one so the new hook
    /// can chain to it.
    pub fn install_idle_hook(&mut self, hook: Option<IdleHook>) -> Option<IdleHook> {
        core::mem::replace(&mut self.idle_hook, hook)
    }

    /// Install the allocator used by [`task_spawn`](Self::task_spawn).
    /// Returns the previously installed one.
    pub fn set_stack_pool(&mut self, pool: StackPoolRef) -> Option<StackPoolRef> {
        self.stacks.replace(pool)
    }

    // ============ Internal helpers ============

    /// Slot of the running task
    #[inline]
    pub(crate) fn cur_idx(&self) -> OsResult<Idx> {
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        self.cur.ok_or(OsError::TaskNone)
    }

    /// Reject calls that must not come from interrupt context
    #[inline]
    pub(crate) fn check_task_context(&self) -> OsResult<()> {
        let in_isr = self.int_nesting > 0 || crate::critical::is_isr_context();
        if cfg!(feature = "isr-check") && in_isr {
            return Err(OsError::PendIsr);
        }
        debug_assert!(!in_isr, "blocking call from interrupt context");
        Ok(())
    }

    /// Slot of a live task
    pub(crate) fn task_idx(&self, task: TaskId) -> OsResult<Idx> {
        match self.tasks.get(task) {
            Some(tcb) if tcb.state != OsTaskState::Terminated => Ok(task.idx()),
            Some(_) => Err(OsError::TaskTerminated),
            None => Err(OsError::ObjInvalid),
        }
    }

    /// Slot of a live task, reporting stale handles as misuse
    pub(crate) fn task_idx_checked(&self, task: TaskId) -> OsResult<Idx> {
        match self.task_idx(task) {
            Err(OsError::ObjInvalid) => misuse!(OsError::ObjInvalid, "stale task handle"),
            other => other,
        }
    }
}

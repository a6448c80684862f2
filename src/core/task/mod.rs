//! Task management module
//!
//! Provides task creation, termination, and control functions.

mod stack;
mod tcb;

pub use stack::{Stack, StackAlloc, StackPool};
pub use tcb::OsTcb;
pub(crate) use tcb::PendOn;

use crate::arena::{kind, Handle, Idx};
use crate::config::{CFG_PRIO_LEVELS, CFG_STK_SIZE_MIN, CFG_TASK_USERSPACE, CFG_TIME_QUANTA_DEFAULT};
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::port::{Port, TaskFn};
use crate::types::{OsPrio, OsTaskState};

/// Task handle
pub type TaskId = Handle<kind::Task>;

impl<P: Port> Kernel<P> {
    /// Create a task on a caller-provided stack
    ///
    /// The task becomes ready immediately and preempts the caller if it is
    /// more urgent.
    ///
    /// # Example
    /// ```ignore
    /// let stack = Stack::new(cortex_m::singleton!(: [u32; 256] = [0; 256]).unwrap());
    /// let id = kernel.task_create(worker, 0, 5, stack)?;
    /// ```
    pub fn task_create(&mut self, entry: TaskFn, arg: usize, prio: OsPrio, stack: Stack) -> OsResult<TaskId> {
        let id = self.create_task(entry, arg, prio, stack, false)?;
        self.sched();
        Ok(id)
    }

    /// Create a task on a stack taken from the installed stack pool
    pub fn task_spawn(&mut self, entry: TaskFn, arg: usize, prio: OsPrio, words: usize) -> OsResult<TaskId> {
        if words < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }
        if prio as usize >= CFG_PRIO_LEVELS {
            return Err(OsError::PrioInvalid);
        }
        if self.tasks.is_full() {
            return Err(OsError::TaskNoMoreTcb);
        }

        let pool = self.stacks.as_mut().ok_or(OsError::StkAlloc)?;
        let stack = pool.alloc(words).ok_or(OsError::StkAlloc)?;
        let id = self.create_task(entry, arg, prio, stack, true)?;
        self.sched();
        Ok(id)
    }

    pub(crate) fn create_task(
        &mut self,
        entry: TaskFn,
        arg: usize,
        prio: OsPrio,
        mut stack: Stack,
        pooled: bool,
    ) -> OsResult<TaskId> {
        if stack.len() < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }
        if prio as usize >= CFG_PRIO_LEVELS {
            return Err(OsError::PrioInvalid);
        }
        if self.tasks.is_full() {
            crate::warn!("no free TCB");
            return Err(OsError::TaskNoMoreTcb);
        }

        let ctx = self.port.init_context(&mut stack, entry, arg);
        let tcb = OsTcb::new(ctx, stack, pooled, prio, CFG_TIME_QUANTA_DEFAULT);
        let id = self.tasks.insert(tcb).ok_or(OsError::TaskNoMoreTcb)?;
        self.make_ready(id.idx());

        crate::debug!("task {=u16} created, prio {=u8}", id.index(), prio);
        Ok(id)
    }

    /// Free a terminated task's resources and retire its handle
    pub(crate) fn reap(&mut self, idx: Idx) {
        #[cfg(feature = "msgbox")]
        self.msg_drain_mailbox(idx);

        let Some(mut tcb) = self.tasks.remove_at(idx) else {
            return;
        };
        if tcb.stack_pooled {
            if let (Some(stack), Some(pool)) = (tcb.stack.take(), self.stacks.as_mut()) {
                pool.free(stack);
            }
        }
        crate::debug!("task {=u16} reaped", idx);
    }

    /// Terminate the running task
    ///
    /// Mutexes it still holds are passed on to their next waiter. Its stack
    /// and TCB are released once another task has been switched in.
    pub fn task_exit(&mut self) -> OsResult<()> {
        let cur = self.cur_idx()?;
        self.check_task_context()?;
        if self.idle == Some(cur) {
            misuse!(OsError::TaskIdle, "idle task must not exit");
        }
        if self.sched_lock_nesting > 0 {
            return Err(OsError::PendLocked);
        }

        #[cfg(feature = "mutex")]
        self.mutex_release_all(cur);

        let tcb = self.tasks.at_mut(cur);
        let prio = tcb.prio;
        tcb.state = OsTaskState::Terminated;
        self.rdy.remove(&mut self.qlinks, cur, prio);

        self.sched();
        Ok(())
    }

    /// Give up the CPU to the next ready task of the same priority
    pub fn task_yield(&mut self) -> OsResult<()> {
        let cur = self.cur_idx()?;

        #[cfg(feature = "softint")]
        self.softint_check();

        let tcb = self.tasks.at_mut(cur);
        if tcb.state == OsTaskState::Running {
            tcb.time_quanta_ctr = tcb.time_quanta;
            let prio = tcb.prio;
            self.rdy.move_to_tail(&mut self.qlinks, cur, prio);
        }
        self.sched();
        Ok(())
    }

    /// Handle of the running task
    #[inline]
    pub fn current(&self) -> Option<TaskId> {
        self.cur.map(|idx| self.tasks.handle_at(idx))
    }

    /// State of a task
    pub fn task_state(&self, task: TaskId) -> OsResult<OsTaskState> {
        self.tasks.get(task).map(|t| t.state).ok_or(OsError::ObjInvalid)
    }

    /// True once the task has terminated and its TCB has been released
    #[inline]
    pub fn task_unused(&self, task: TaskId) -> bool {
        !self.tasks.contains(task)
    }

    /// Change a task's priority
    ///
    /// A ready task moves to the tail of its new level; a waiting task is
    /// re-sorted in its wait queue.
    pub fn task_set_priority(&mut self, task: TaskId, prio: OsPrio) -> OsResult<()> {
        if prio as usize >= CFG_PRIO_LEVELS {
            return Err(OsError::PrioInvalid);
        }
        let idx = self.task_idx_checked(task)?;
        if self.idle == Some(idx) {
            return Err(OsError::TaskIdle);
        }

        let (old, state) = {
            let tcb = self.tasks.at(idx);
            (tcb.prio, tcb.state)
        };
        if old == prio {
            return Ok(());
        }

        match state {
            OsTaskState::Ready | OsTaskState::Running => {
                self.rdy.remove(&mut self.qlinks, idx, old);
                self.tasks.at_mut(idx).prio = prio;
                if self.cur == Some(idx) {
                    // The running task keeps the CPU until the scheduler
                    // finds a more urgent one
                    self.rdy.insert_head(&mut self.qlinks, idx, prio);
                } else {
                    self.rdy.insert_tail(&mut self.qlinks, idx, prio);
                }
            }
            OsTaskState::Blocked => {
                self.unlink_waiter(idx);
                self.tasks.at_mut(idx).prio = prio;
                self.enqueue_waiter(idx);
            }
            _ => self.tasks.at_mut(idx).prio = prio,
        }

        self.sched();
        Ok(())
    }

    /// Priority of a task
    pub fn task_get_priority(&self, task: TaskId) -> OsResult<OsPrio> {
        self.tasks.get(task).map(|t| t.prio).ok_or(OsError::ObjInvalid)
    }

    /// Attach a name to a task
    pub fn task_set_name(&mut self, task: TaskId, name: &'static str) -> OsResult<()> {
        let tcb = self.tasks.get_mut(task).ok_or(OsError::ObjInvalid)?;
        tcb.name = name;
        Ok(())
    }

    /// Name of a task, empty if none was set
    pub fn task_name(&self, task: TaskId) -> OsResult<&'static str> {
        self.tasks.get(task).map(|t| t.name).ok_or(OsError::ObjInvalid)
    }

    /// Per-task user data of the running task
    pub fn task_userspace(&mut self) -> OsResult<&mut [u8; CFG_TASK_USERSPACE]> {
        let cur = self.cur_idx()?;
        Ok(&mut self.tasks.at_mut(cur).userspace)
    }

    /// Suspend a task. Suspensions nest; a waiting task finishes its wait
    /// but stays off the ready list until fully resumed.
    pub fn task_suspend(&mut self, task: TaskId) -> OsResult<()> {
        let idx = self.task_idx_checked(task)?;
        if self.idle == Some(idx) {
            return Err(OsError::TaskIdle);
        }
        if self.cur == Some(idx) {
            self.check_task_context()?;
            if self.sched_lock_nesting > 0 {
                return Err(OsError::PendLocked);
            }
        }

        let tcb = self.tasks.at_mut(idx);
        tcb.suspend_ctr = tcb.suspend_ctr.saturating_add(1);

        if tcb.is_ready() {
            let prio = tcb.prio;
            tcb.state = OsTaskState::Suspended;
            self.rdy.remove(&mut self.qlinks, idx, prio);
        }

        if self.cur == Some(idx) {
            self.sched();
        }
        Ok(())
    }

    /// Resume a suspended task
    pub fn task_resume(&mut self, task: TaskId) -> OsResult<()> {
        let idx = self.task_idx_checked(task)?;

        let tcb = self.tasks.at_mut(idx);
        if tcb.suspend_ctr == 0 {
            return Err(OsError::TaskNotSuspended);
        }
        tcb.suspend_ctr -= 1;

        if tcb.suspend_ctr == 0 && tcb.state == OsTaskState::Suspended {
            self.make_ready(idx);
            self.sched();
        }
        Ok(())
    }
}

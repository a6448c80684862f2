//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.
//! The most urgent ready task always runs; equal priorities are served in
//! FIFO order.

mod rdy_list;

pub(crate) use rdy_list::ReadyQueue;

use crate::arena::Idx;
use crate::config::CFG_SCHED_ROUND_ROBIN_EN;
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::task::PendOn;
use crate::types::{OsPendStatus, OsTaskState, Timeout};

impl<P: Port> Kernel<P> {
    /// Main scheduling point
    ///
    /// Dispatches the head of the most urgent ready list if it is not the
    /// running task. While the scheduler is locked or an interrupt is being
    /// handled the decision is deferred to `sched_unlock` / `int_exit`.
    pub(crate) fn sched(&mut self) {
        if !self.running {
            return;
        }

        if self.int_nesting > 0 || self.sched_lock_nesting > 0 {
            self.resched_pending = true;
            return;
        }
        self.resched_pending = false;

        let Some(next) = self.rdy.highest_head() else {
            return;
        };

        if self.cur != Some(next) {
            self.switch_to(next);
        }
    }

    /// Hand the CPU to `next` and reap the outgoing task if it terminated
    fn switch_to(&mut self, next: Idx) {
        let prev = self.cur.replace(next);
        self.tasks.at_mut(next).state = OsTaskState::Running;

        let Some(prev) = prev else {
            let to = self.tasks.at_mut(next);
            self.port.switch(None, &mut to.ctx);
            return;
        };

        let terminated = {
            let tcb = self.tasks.at_mut(prev);
            if tcb.state == OsTaskState::Running {
                tcb.state = OsTaskState::Ready;
            }
            tcb.state == OsTaskState::Terminated
        };

        crate::trace!("switch {=u16} -> {=u16}", prev, next);

        let (from, to) = self.tasks.pair_mut(prev, next);
        let from = if terminated { None } else { Some(&mut from.ctx) };
        self.port.switch(from, &mut to.ctx);

        if terminated {
            self.reap(prev);
        }
    }

    /// Put a task on its ready list, or park it if it is suspended
    pub(crate) fn make_ready(&mut self, idx: Idx) {
        let tcb = self.tasks.at_mut(idx);
        if tcb.suspend_ctr > 0 {
            tcb.state = OsTaskState::Suspended;
            return;
        }
        tcb.state = OsTaskState::Ready;
        let prio = tcb.prio;
        self.rdy.insert_tail(&mut self.qlinks, idx, prio);
    }

    /// Finish a wait: take the task off the tick wheel, record the outcome
    /// and make it ready. The caller has already taken it off the wait queue.
    pub(crate) fn wake(&mut self, idx: Idx, status: OsPendStatus) {
        self.wheel.remove(idx);
        self.tasks.at_mut(idx).pend_status = status;
        self.make_ready(idx);
    }

    /// Move the running task from its ready list to the wait queue of `on`
    /// and, for a bounded wait, onto the tick wheel. The caller runs
    /// `sched()` afterwards.
    pub(crate) fn block_current(&mut self, on: PendOn, timeout: Timeout) -> OsResult<Idx> {
        if !self.running {
            return Err(OsError::OsNotRunning);
        }
        self.check_task_context()?;
        if self.sched_lock_nesting > 0 {
            return Err(OsError::PendLocked);
        }
        let cur = self.cur_idx()?;
        if self.idle == Some(cur) {
            misuse!(OsError::TaskIdle, "idle task must not block");
        }

        let tcb = self.tasks.at_mut(cur);
        let prio = tcb.prio;
        tcb.state = OsTaskState::Blocked;
        tcb.pend_on = on;
        tcb.pend_status = OsPendStatus::Pending;
        self.rdy.remove(&mut self.qlinks, cur, prio);

        if let Timeout::Ticks(ticks) = timeout {
            self.wheel.insert(cur, self.jiffies.wrapping_add(ticks));
        }

        self.enqueue_waiter(cur);
        Ok(cur)
    }

    /// Insert a blocked task into the wait queue of the object it pends on,
    /// ordered by priority with FIFO among equals
    pub(crate) fn enqueue_waiter(&mut self, idx: Idx) {
        let prio = self.tasks.at(idx).prio;
        let tasks = &self.tasks;
        let goes_before = |other: Idx| prio > tasks.at(other).prio;

        match self.tasks.at(idx).pend_on {
            #[cfg(feature = "sem")]
            PendOn::Sem(h) => {
                if let Some(sem) = self.sems.get_mut(h) {
                    sem.pend_list.insert_by(&mut self.qlinks, idx, goes_before);
                }
            }
            #[cfg(feature = "mutex")]
            PendOn::Mutex(h) => {
                if let Some(mutex) = self.mutexes.get_mut(h) {
                    mutex.pend_list.insert_by(&mut self.qlinks, idx, goes_before);
                }
            }
            #[cfg(feature = "flag")]
            PendOn::Flag(h, _) => {
                if let Some(flag) = self.flags.get_mut(h) {
                    flag.pend_list.insert_by(&mut self.qlinks, idx, goes_before);
                }
            }
            #[cfg(feature = "list")]
            PendOn::List(h, _) => {
                if let Some(list) = self.lists.heads.get_mut(h) {
                    list.pend_list.insert_by(&mut self.qlinks, idx, goes_before);
                }
            }
            _ => {}
        }
    }

    /// Take a blocked task off the wait queue of the object it pends on
    pub(crate) fn unlink_waiter(&mut self, idx: Idx) {
        match self.tasks.at(idx).pend_on {
            #[cfg(feature = "sem")]
            PendOn::Sem(h) => {
                if let Some(sem) = self.sems.get_mut(h) {
                    sem.pend_list.remove(&mut self.qlinks, idx);
                }
            }
            #[cfg(feature = "mutex")]
            PendOn::Mutex(h) => {
                if let Some(mutex) = self.mutexes.get_mut(h) {
                    mutex.pend_list.remove(&mut self.qlinks, idx);
                }
            }
            #[cfg(feature = "flag")]
            PendOn::Flag(h, _) => {
                if let Some(flag) = self.flags.get_mut(h) {
                    flag.pend_list.remove(&mut self.qlinks, idx);
                }
            }
            #[cfg(feature = "list")]
            PendOn::List(h, _) => {
                if let Some(list) = self.lists.heads.get_mut(h) {
                    list.pend_list.remove(&mut self.qlinks, idx);
                }
            }
            _ => {}
        }
    }

    /// Collect the outcome of the running task's last wait if it was on an
    /// object matching `on`
    pub(crate) fn take_pend(&mut self, on: impl Fn(&PendOn) -> bool) -> OsResult<(Idx, OsPendStatus)> {
        let cur = self.cur_idx()?;
        let tcb = self.tasks.at_mut(cur);
        if !on(&tcb.pend_on) {
            return Err(OsError::PendNone);
        }
        let status = tcb.pend_status;
        if status != OsPendStatus::Pending {
            tcb.pend_on = PendOn::Nothing;
        }
        Ok((cur, status))
    }

    /// Round-robin scheduling for tasks at the same priority
    pub(crate) fn sched_round_robin(&mut self) {
        if !CFG_SCHED_ROUND_ROBIN_EN || !self.running || self.sched_lock_nesting > 0 {
            return;
        }
        let Some(cur) = self.cur else {
            return;
        };

        let tcb = self.tasks.at_mut(cur);
        if tcb.state != OsTaskState::Running {
            return;
        }
        if tcb.time_quanta_ctr > 0 {
            tcb.time_quanta_ctr -= 1;
        }
        if tcb.time_quanta_ctr == 0 {
            tcb.time_quanta_ctr = tcb.time_quanta;
            let prio = tcb.prio;
            // Only rotate if more than one task at this priority
            if self.rdy.count(prio) > 1 {
                self.rdy.move_to_tail(&mut self.qlinks, cur, prio);
                self.resched_pending = true;
            }
        }
    }
}

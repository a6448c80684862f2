//! Semaphore implementation
//!
//! Counting semaphores for task synchronization and resource counting.

use crate::arena::{kind, Handle};
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::List;
use crate::port::Port;
use crate::task::PendOn;
use crate::time::check_timeout;
use crate::types::{OsPendStatus, OsSemCtr, Pend, Timeout};

/// Semaphore handle
pub type SemId = Handle<kind::Sem>;

/// Semaphore control block
pub(crate) struct OsSem {
    pub(crate) count: OsSemCtr,
    /// Waiting tasks, most urgent first
    pub(crate) pend_list: List,
}

impl<P: Port> Kernel<P> {
    /// Create a semaphore
    ///
    /// A negative initial count makes the first `-count` signals only
    /// raise the counter.
    pub fn sem_create(&mut self, count: OsSemCtr) -> OsResult<SemId> {
        let sem = OsSem { count, pend_list: List::new() };
        self.sems.insert(sem).ok_or(OsError::ObjPoolFull)
    }

    /// Destroy a semaphore. Tasks waiting on it wake up and get
    /// [`OsError::ObjDel`] from [`sem_result`](Self::sem_result).
    pub fn sem_destroy(&mut self, sem: SemId) -> OsResult<()> {
        let Some(mut s) = self.sems.remove(sem) else {
            misuse!(OsError::ObjInvalid, "semaphore destroyed twice or stale");
        };

        while let Some(idx) = s.pend_list.pop_head(&mut self.qlinks) {
            self.wake(idx, OsPendStatus::Del);
        }
        self.sched();
        Ok(())
    }

    /// Wait on a semaphore without a time limit
    pub fn sem_get(&mut self, sem: SemId) -> OsResult<Pend<()>> {
        self.sem_wait(sem, Timeout::Infinite)
    }

    /// Wait on a semaphore
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(()))` - A unit was taken
    /// * `Ok(Pend::Timeout)` - Polled and no unit was available
    /// * `Ok(Pend::Blocked)` - The caller now waits; collect the outcome
    ///   with [`sem_result`](Self::sem_result)
    /// * `Err(OsError::TimeoutInvalid)` - Bounded wait too long
    pub fn sem_wait(&mut self, sem: SemId, timeout: impl Into<Timeout>) -> OsResult<Pend<()>> {
        let timeout = check_timeout(timeout.into())?;

        let Some(s) = self.sems.get_mut(sem) else {
            misuse!(OsError::ObjInvalid, "wait on stale semaphore");
        };

        if s.count > 0 {
            s.count -= 1;
            return Ok(Pend::Ready(()));
        }
        if timeout == Timeout::Poll {
            return Ok(Pend::Timeout);
        }

        self.block_current(PendOn::Sem(sem), timeout)?;
        self.sched();
        Ok(Pend::Blocked)
    }

    /// Signal a semaphore, waking the most urgent waiter if a unit becomes
    /// available. May be called from interrupt context.
    pub fn sem_signal(&mut self, sem: SemId) -> OsResult<()> {
        if !self.sems.contains(sem) {
            misuse!(OsError::ObjInvalid, "signal on stale semaphore");
        }
        self.sem_post(sem)
    }

    /// Signal without misuse reporting, for holders of weak references
    pub(crate) fn sem_post(&mut self, sem: SemId) -> OsResult<()> {
        let s = self.sems.get_mut(sem).ok_or(OsError::ObjInvalid)?;
        if s.count == OsSemCtr::MAX {
            return Err(OsError::SemOvf);
        }
        s.count += 1;

        if s.count > 0 {
            if let Some(idx) = s.pend_list.pop_head(&mut self.qlinks) {
                s.count -= 1;
                self.wake(idx, OsPendStatus::Ok);
                self.sched();
            }
        }
        Ok(())
    }

    /// Current semaphore count
    pub fn sem_count(&self, sem: SemId) -> OsResult<OsSemCtr> {
        self.sems.get(sem).map(|s| s.count).ok_or(OsError::ObjInvalid)
    }

    /// Outcome of the running task's last blocking semaphore wait
    pub fn sem_result(&mut self) -> OsResult<Pend<()>> {
        let (_, status) = self.take_pend(|on| matches!(on, PendOn::Sem(_)))?;
        match status {
            OsPendStatus::Pending => Ok(Pend::Blocked),
            OsPendStatus::Ok => Ok(Pend::Ready(())),
            OsPendStatus::Timeout => Ok(Pend::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }
}

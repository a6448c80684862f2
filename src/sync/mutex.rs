//! Reentrant mutex implementation
//!
//! The owner may lock a mutex again without blocking; it has to unlock it
//! as many times as it locked it. On the final unlock ownership passes
//! directly to the most urgent waiter.

use crate::arena::{kind, Handle, Idx};
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::List;
use crate::port::Port;
use crate::task::{PendOn, TaskId};
use crate::types::{OsNestingCtr, OsPendStatus, Pend, Timeout};

/// Mutex handle
pub type MutexId = Handle<kind::Mutex>;

/// Mutex control block
pub(crate) struct OsMutex {
    /// Task that owns the mutex
    pub(crate) owner: Option<Idx>,
    /// Nesting counter
    pub(crate) nesting_ctr: OsNestingCtr,
    /// Waiting tasks, most urgent first
    pub(crate) pend_list: List,
}

enum Acquire {
    Taken,
    Held,
}

impl<P: Port> Kernel<P> {
    /// Create a mutex
    pub fn mutex_create(&mut self) -> OsResult<MutexId> {
        let mutex = OsMutex { owner: None, nesting_ctr: 0, pend_list: List::new() };
        self.mutexes.insert(mutex).ok_or(OsError::ObjPoolFull)
    }

    /// Destroy a mutex. Waiting tasks wake up and get
    /// [`OsError::ObjDel`] from [`mutex_result`](Self::mutex_result).
    pub fn mutex_destroy(&mut self, mutex: MutexId) -> OsResult<()> {
        let Some(mut m) = self.mutexes.remove(mutex) else {
            misuse!(OsError::ObjInvalid, "mutex destroyed twice or stale");
        };
        if m.owner.is_some() {
            crate::warn!("destroying a locked mutex");
        }

        while let Some(idx) = m.pend_list.pop_head(&mut self.qlinks) {
            self.wake(idx, OsPendStatus::Del);
        }
        self.sched();
        Ok(())
    }

    /// Try to take the mutex for the running task
    fn mutex_acquire(&mut self, mutex: MutexId) -> OsResult<Acquire> {
        let cur = self.cur_idx()?;
        let Some(m) = self.mutexes.get_mut(mutex) else {
            misuse!(OsError::ObjInvalid, "lock on stale mutex");
        };

        match m.owner {
            None => {
                m.owner = Some(cur);
                m.nesting_ctr = 1;
                Ok(Acquire::Taken)
            }
            Some(owner) if owner == cur => {
                if m.nesting_ctr == OsNestingCtr::MAX {
                    return Err(OsError::MutexOvf);
                }
                m.nesting_ctr += 1;
                Ok(Acquire::Taken)
            }
            Some(_) => Ok(Acquire::Held),
        }
    }

    /// Lock a mutex, waiting as long as it takes
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(()))` - The running task owns the mutex
    /// * `Ok(Pend::Blocked)` - The caller now waits; collect the outcome
    ///   with [`mutex_result`](Self::mutex_result)
    /// * `Err(OsError::MutexOvf)` - Nesting counter overflow
    pub fn mutex_lock(&mut self, mutex: MutexId) -> OsResult<Pend<()>> {
        match self.mutex_acquire(mutex)? {
            Acquire::Taken => Ok(Pend::Ready(())),
            Acquire::Held => {
                self.block_current(PendOn::Mutex(mutex), Timeout::Infinite)?;
                self.sched();
                Ok(Pend::Blocked)
            }
        }
    }

    /// Lock a mutex if that is possible without waiting
    ///
    /// Returns `Pend::WouldBlock` if another task holds it.
    pub fn mutex_try_lock(&mut self, mutex: MutexId) -> OsResult<Pend<()>> {
        match self.mutex_acquire(mutex)? {
            Acquire::Taken => Ok(Pend::Ready(())),
            Acquire::Held => Ok(Pend::WouldBlock),
        }
    }

    /// Unlock a mutex held by the running task
    pub fn mutex_unlock(&mut self, mutex: MutexId) -> OsResult<()> {
        let cur = self.cur_idx()?;
        let Some(m) = self.mutexes.get_mut(mutex) else {
            misuse!(OsError::ObjInvalid, "unlock on stale mutex");
        };
        if m.owner != Some(cur) {
            misuse!(OsError::MutexNotOwner, "mutex unlocked by a task that does not own it");
        }

        if m.nesting_ctr > 1 {
            m.nesting_ctr -= 1;
            return Ok(());
        }

        self.mutex_hand_over(mutex.idx());
        self.sched();
        Ok(())
    }

    /// Pass a fully released mutex to its most urgent waiter, or free it
    fn mutex_hand_over(&mut self, slot: Idx) {
        let Some(m) = self.mutexes.try_at_mut(slot) else {
            return;
        };
        match m.pend_list.pop_head(&mut self.qlinks) {
            Some(waiter) => {
                m.owner = Some(waiter);
                m.nesting_ctr = 1;
                self.wake(waiter, OsPendStatus::Ok);
            }
            None => {
                m.owner = None;
                m.nesting_ctr = 0;
            }
        }
    }

    /// Release every mutex held by a terminating task
    pub(crate) fn mutex_release_all(&mut self, task: Idx) {
        let mut held = [0 as Idx; crate::config::CFG_MAX_MUTEXES];
        let mut n = 0;
        for slot in self.mutexes.indices() {
            if self.mutexes.at(slot).owner == Some(task) {
                held[n] = slot;
                n += 1;
            }
        }
        for &slot in &held[..n] {
            crate::warn!("task {=u16} exits holding mutex {=u16}", task, slot);
            self.mutex_hand_over(slot);
        }
    }

    /// Current owner of a mutex
    pub fn mutex_owner(&self, mutex: MutexId) -> OsResult<Option<TaskId>> {
        let m = self.mutexes.get(mutex).ok_or(OsError::ObjInvalid)?;
        Ok(m.owner.map(|idx| self.tasks.handle_at(idx)))
    }

    /// Outcome of the running task's last blocking mutex lock
    pub fn mutex_result(&mut self) -> OsResult<Pend<()>> {
        let (_, status) = self.take_pend(|on| matches!(on, PendOn::Mutex(_)))?;
        match status {
            OsPendStatus::Pending => Ok(Pend::Blocked),
            OsPendStatus::Ok => Ok(Pend::Ready(())),
            OsPendStatus::Timeout => Ok(Pend::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }
}

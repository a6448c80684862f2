//! Event flag implementation
//!
//! A flag object is a set of event bits. Setters raise single bits; waiters
//! consume bits according to their [`FlagMode`]. Every raised bit is
//! delivered to at most one waiter.

use crate::arena::{kind, Handle, Idx};
use crate::config::CFG_MAX_TASKS;
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::List;
use crate::port::Port;
use crate::task::PendOn;
use crate::time::check_timeout;
use crate::types::{FlagMode, OsFlags, OsPendStatus, Pend, Timeout, FLAG_MAX_BIT};

/// Flag handle
pub type FlagId = Handle<kind::Flag>;

/// Bits a flag object can hold
const FLAG_VALID_MASK: OsFlags = OsFlags::MAX >> (OsFlags::BITS - 1 - FLAG_MAX_BIT);

/// Flag control block
pub(crate) struct OsFlag {
    pub(crate) flags: OsFlags,
    /// Waiting tasks, most urgent first
    pub(crate) pend_list: List,
}

/// Take the bits `mode` asks for out of `flags`
///
/// Returns the bit number for `GetSingle` and the consumed mask otherwise,
/// or `None` if the wait condition is not met.
fn consume(flags: &mut OsFlags, mode: FlagMode) -> Option<OsFlags> {
    match mode {
        FlagMode::GetSingle => {
            if *flags == 0 {
                return None;
            }
            let bit = flags.trailing_zeros();
            *flags &= !(1 << bit);
            Some(bit)
        }
        FlagMode::GetMask => {
            if *flags == 0 {
                return None;
            }
            Some(core::mem::take(flags))
        }
        FlagMode::GetAll(mask) => {
            if *flags & mask != mask {
                return None;
            }
            *flags &= !mask;
            Some(mask)
        }
    }
}

fn check_mode(mode: FlagMode) -> OsResult<()> {
    match mode {
        FlagMode::GetAll(mask) if mask == 0 || mask & !FLAG_VALID_MASK != 0 => Err(OsError::FlagInvalid),
        _ => Ok(()),
    }
}

impl<P: Port> Kernel<P> {
    /// Create a flag object with all bits clear
    pub fn flag_create(&mut self) -> OsResult<FlagId> {
        let flag = OsFlag { flags: 0, pend_list: List::new() };
        self.flags.insert(flag).ok_or(OsError::ObjPoolFull)
    }

    /// Destroy a flag object. Waiting tasks wake up and get
    /// [`OsError::ObjDel`] from [`flag_result`](Self::flag_result).
    pub fn flag_destroy(&mut self, flag: FlagId) -> OsResult<()> {
        let Some(mut f) = self.flags.remove(flag) else {
            misuse!(OsError::ObjInvalid, "flag destroyed twice or stale");
        };

        while let Some(idx) = f.pend_list.pop_head(&mut self.qlinks) {
            self.wake(idx, OsPendStatus::Del);
        }
        self.sched();
        Ok(())
    }

    /// Raise flag bit `bitnum` and hand bits to waiters, most urgent first.
    /// May be called from interrupt context.
    pub fn flag_set(&mut self, flag: FlagId, bitnum: u32) -> OsResult<()> {
        if bitnum > FLAG_MAX_BIT {
            return Err(OsError::FlagInvalid);
        }
        let Some(f) = self.flags.get_mut(flag) else {
            misuse!(OsError::ObjInvalid, "set on stale flag");
        };
        f.flags |= 1 << bitnum;

        let mut woken: [(Idx, OsFlags); CFG_MAX_TASKS] = [(0, 0); CFG_MAX_TASKS];
        let mut n = 0;

        let mut cursor = f.pend_list.head();
        while let Some(idx) = cursor {
            if f.flags == 0 {
                break;
            }
            cursor = self.qlinks[idx as usize].next();

            let PendOn::Flag(_, mode) = self.tasks.at(idx).pend_on else {
                continue;
            };
            if let Some(got) = consume(&mut f.flags, mode) {
                f.pend_list.remove(&mut self.qlinks, idx);
                woken[n] = (idx, got);
                n += 1;
            }
        }

        for &(idx, got) in &woken[..n] {
            self.tasks.at_mut(idx).flags_rdy = got;
            self.wake(idx, OsPendStatus::Ok);
        }
        if n > 0 {
            self.sched();
        }
        Ok(())
    }

    /// Wait on a flag object without a time limit
    pub fn flag_get(&mut self, flag: FlagId, mode: FlagMode) -> OsResult<Pend<OsFlags>> {
        self.flag_wait(flag, mode, Timeout::Infinite)
    }

    /// Wait on a flag object
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(v))` - Bits consumed; `v` is the bit number for
    ///   `GetSingle` and the consumed mask otherwise
    /// * `Ok(Pend::Timeout)` - Polled and the condition was not met
    /// * `Ok(Pend::Blocked)` - The caller now waits; collect the outcome
    ///   with [`flag_result`](Self::flag_result)
    pub fn flag_wait(&mut self, flag: FlagId, mode: FlagMode, timeout: impl Into<Timeout>) -> OsResult<Pend<OsFlags>> {
        let timeout = check_timeout(timeout.into())?;
        check_mode(mode)?;

        let Some(f) = self.flags.get_mut(flag) else {
            misuse!(OsError::ObjInvalid, "wait on stale flag");
        };

        if let Some(got) = consume(&mut f.flags, mode) {
            return Ok(Pend::Ready(got));
        }
        if timeout == Timeout::Poll {
            return Ok(Pend::Timeout);
        }

        self.block_current(PendOn::Flag(flag, mode), timeout)?;
        self.sched();
        Ok(Pend::Blocked)
    }

    /// Currently raised bits of a flag object
    pub fn flag_peek(&self, flag: FlagId) -> OsResult<OsFlags> {
        self.flags.get(flag).map(|f| f.flags).ok_or(OsError::ObjInvalid)
    }

    /// Outcome of the running task's last blocking flag wait
    pub fn flag_result(&mut self) -> OsResult<Pend<OsFlags>> {
        let (cur, status) = self.take_pend(|on| matches!(on, PendOn::Flag(..)))?;
        match status {
            OsPendStatus::Pending => Ok(Pend::Blocked),
            OsPendStatus::Ok => Ok(Pend::Ready(core::mem::take(&mut self.tasks.at_mut(cur).flags_rdy))),
            OsPendStatus::Timeout => Ok(Pend::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }
}

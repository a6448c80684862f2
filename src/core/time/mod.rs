//! Time management module
//!
//! Provides tick handling, task sleep, and timeout management.

mod wheel;

#[cfg(feature = "timer")]
pub mod timer;

pub(crate) use wheel::TickWheel;

use crate::arena::Idx;
use crate::config::{CFG_MAX_TASKS, CFG_TICK_RATE_HZ};
use crate::error::{OsError, OsResult};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::task::PendOn;
use crate::types::{OsPendStatus, OsTick, Timeout};

/// Wrap-safe "tick `a` is at or after tick `b`"
///
/// Valid while the two ticks are less than half the counter range apart.
#[inline]
pub fn after(a: OsTick, b: OsTick) -> bool {
    (a.wrapping_sub(b) as i32) >= 0
}

/// Convert milliseconds to ticks, rounding up so a non-zero delay never
/// becomes zero
#[inline]
pub const fn ms_to_ticks(ms: u32) -> OsTick {
    let ticks = ((ms as u64) * (CFG_TICK_RATE_HZ as u64)).div_ceil(1000);
    if ticks > OsTick::MAX as u64 {
        OsTick::MAX
    } else {
        ticks as OsTick
    }
}

/// Reject bounded waits too long for wrap-safe comparison. A bounded wait
/// of zero ticks is a poll.
#[inline]
pub(crate) fn check_timeout(timeout: Timeout) -> OsResult<Timeout> {
    match timeout {
        Timeout::Ticks(0) => Ok(Timeout::Poll),
        Timeout::Ticks(t) if t > i32::MAX as OsTick => Err(OsError::TimeoutInvalid),
        t => Ok(t),
    }
}

impl<P: Port> Kernel<P> {
    /// Ticks since start
    #[inline]
    pub fn jiffies(&self) -> OsTick {
        self.jiffies
    }

    /// Tick handler, called from the periodic timer interrupt
    ///
    /// Expires sleeps and bounded waits, runs timers and the round-robin
    /// policy, and dispatches pending software interrupts. Task switches
    /// caused by the tick happen once, at the end.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.jiffies = self.jiffies.wrapping_add(1);

        self.sched_lock_nesting += 1;
        self.expire_timeouts();
        #[cfg(feature = "timer")]
        self.timers_tick();
        self.sched_lock_nesting -= 1;

        self.sched_round_robin();

        #[cfg(feature = "softint")]
        self.softint_check();

        if self.resched_pending {
            self.sched();
        }
    }

    /// Wake every task whose sleep or bounded wait ends at this tick
    fn expire_timeouts(&mut self) {
        let mut due: [Idx; CFG_MAX_TASKS] = [0; CFG_MAX_TASKS];
        let n = self.wheel.take_due(self.jiffies, &mut due);

        for &idx in &due[..n] {
            let status = match self.tasks.at(idx).pend_on {
                PendOn::Sleep => {
                    self.tasks.at_mut(idx).pend_on = PendOn::Nothing;
                    OsPendStatus::Ok
                }
                _ => {
                    self.unlink_waiter(idx);
                    OsPendStatus::Timeout
                }
            };
            self.wake(idx, status);
            self.resched_pending = true;
        }
    }

    /// Put the running task to sleep for `ticks` ticks
    ///
    /// A sleep of zero ticks yields the CPU to other ready tasks of the same
    /// priority.
    pub fn task_sleep(&mut self, ticks: OsTick) -> OsResult<()> {
        if ticks == 0 {
            return self.task_yield();
        }
        let timeout = check_timeout(Timeout::Ticks(ticks))?;

        self.block_current(PendOn::Sleep, timeout)?;
        self.sched();
        Ok(())
    }
}

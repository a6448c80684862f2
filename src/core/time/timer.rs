//! Software timers
//!
//! A timer counts ticks down and signals a semaphore when it reaches zero,
//! then reloads with its period or stops if it is a one-shot timer. The
//! semaphore is only referenced: destroying it leaves the timer running and
//! later expiries are skipped.
//!
//! Only active timers are linked into the timer list, so each tick costs
//! O(active timers).

use crate::arena::{kind, Arena, Handle, Idx};
use crate::config::CFG_MAX_TIMERS;
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::{Link, List};
use crate::port::Port;
use crate::sem::SemId;
use crate::types::OsTick;

/// Timer handle
pub type TimerId = Handle<kind::Timer>;

/// Timer control block
#[derive(Clone, Copy)]
pub(crate) struct OsTimer {
    sem: Option<SemId>,
    wait: OsTick,
    /// Reload value, 0 for one-shot timers
    period: OsTick,
    remaining: OsTick,
    active: bool,
    fired: bool,
}

/// Timer slots plus the list of running timers
pub(crate) struct TimerTable {
    arena: Arena<kind::Timer, OsTimer, CFG_MAX_TIMERS>,
    links: [Link; CFG_MAX_TIMERS],
    active: List,
}

impl TimerTable {
    pub const fn new() -> Self {
        TimerTable {
            arena: Arena::new(),
            links: [Link::UNLINKED; CFG_MAX_TIMERS],
            active: List::new(),
        }
    }

    fn deactivate(&mut self, slot: Idx) {
        let t = self.arena.at_mut(slot);
        if t.active {
            t.active = false;
            self.active.remove(&mut self.links, slot);
        }
    }

    /// Count all running timers down by one tick. Timers reaching zero are
    /// reloaded or stopped, and their semaphores stored in `due`.
    fn advance(&mut self, due: &mut [Option<SemId>; CFG_MAX_TIMERS]) -> usize {
        let mut n = 0;
        let mut cursor = self.active.head();
        while let Some(slot) = cursor {
            cursor = self.links[slot as usize].next();

            let t = self.arena.at_mut(slot);
            t.remaining = t.remaining.saturating_sub(1);
            if t.remaining > 0 {
                continue;
            }

            t.fired = true;
            due[n] = t.sem;
            n += 1;

            if t.period > 0 {
                t.remaining = t.period;
            } else {
                self.deactivate(slot);
            }
        }
        n
    }
}

impl<P: Port> Kernel<P> {
    /// Create a stopped, unconfigured timer
    pub fn timer_create(&mut self) -> OsResult<TimerId> {
        let timer = OsTimer {
            sem: None,
            wait: 0,
            period: 0,
            remaining: 0,
            active: false,
            fired: false,
        };
        self.timers.arena.insert(timer).ok_or(OsError::ObjPoolFull)
    }

    /// Configure a timer. A running timer is stopped first.
    ///
    /// # Arguments
    /// * `sem` - Semaphore signalled on every expiry
    /// * `wait_ticks` - Ticks until the first expiry, at least 1
    /// * `period_ticks` - Ticks between later expiries, 0 for a one-shot timer
    pub fn timer_set(&mut self, timer: TimerId, sem: SemId, wait_ticks: OsTick, period_ticks: OsTick) -> OsResult<()> {
        if !self.timers.arena.contains(timer) {
            misuse!(OsError::ObjInvalid, "set on stale timer");
        }
        if wait_ticks == 0 {
            return Err(OsError::TimeoutInvalid);
        }

        self.timers.deactivate(timer.idx());
        let t = self.timers.arena.at_mut(timer.idx());
        t.sem = Some(sem);
        t.wait = wait_ticks;
        t.period = period_ticks;
        t.fired = false;
        Ok(())
    }

    /// Start (or restart) a configured timer
    pub fn timer_start(&mut self, timer: TimerId) -> OsResult<()> {
        let Some(t) = self.timers.arena.get_mut(timer) else {
            misuse!(OsError::ObjInvalid, "start on stale timer");
        };
        if t.sem.is_none() {
            return Err(OsError::TmrNotSet);
        }

        t.remaining = t.wait;
        if !t.active {
            t.active = true;
            self.timers.active.insert_tail(&mut self.timers.links, timer.idx());
        }
        Ok(())
    }

    /// Stop a timer. Stopping a stopped timer does nothing.
    pub fn timer_stop(&mut self, timer: TimerId) -> OsResult<()> {
        if !self.timers.arena.contains(timer) {
            misuse!(OsError::ObjInvalid, "stop on stale timer");
        }
        self.timers.deactivate(timer.idx());
        Ok(())
    }

    /// Stop and destroy a timer
    pub fn timer_destroy(&mut self, timer: TimerId) -> OsResult<()> {
        if !self.timers.arena.contains(timer) {
            misuse!(OsError::ObjInvalid, "timer destroyed twice or stale");
        }
        self.timers.deactivate(timer.idx());
        self.timers.arena.remove(timer);
        Ok(())
    }

    /// Whether the timer expired since the last call; clears the marker
    pub fn timer_fired(&mut self, timer: TimerId) -> OsResult<bool> {
        let t = self.timers.arena.get_mut(timer).ok_or(OsError::ObjInvalid)?;
        Ok(core::mem::take(&mut t.fired))
    }

    /// Whether the timer is running
    pub fn timer_active(&self, timer: TimerId) -> OsResult<bool> {
        self.timers.arena.get(timer).map(|t| t.active).ok_or(OsError::ObjInvalid)
    }

    /// Tick processing for timers
    pub(crate) fn timers_tick(&mut self) {
        let mut due = [None; CFG_MAX_TIMERS];
        let n = self.timers.advance(&mut due);

        for sem in due[..n].iter().flatten() {
            match self.sem_post(*sem) {
                Ok(()) => {}
                Err(OsError::ObjInvalid) => crate::trace!("timer semaphore gone"),
                Err(_) => crate::warn!("timer semaphore overflow"),
            }
        }
    }
}

//! Software interrupts
//!
//! Deferred handler invocations. `softint_raise` only queues a request, so it
//! is cheap enough for interrupt handlers; the handlers run later, in raise
//! order, at the next safe point (tick, yield, outermost `int_exit` or an
//! explicit `softint_check`) with the scheduler locked.

use heapless::Deque;

use crate::config::{CFG_SOFTINTS, CFG_SOFTINT_QUEUE_LEN};
use crate::error::{OsError, OsResult};
use crate::kernel::Kernel;
use crate::port::Port;

/// Software interrupt handler. Receives the kernel and the raise parameter.
pub type SoftIntHandler<P> = fn(&mut Kernel<P>, usize);

/// Handler table and pending request queue
pub(crate) struct SoftInts<P: Port> {
    handlers: [Option<SoftIntHandler<P>>; CFG_SOFTINTS],
    /// Raised numbers and parameters, oldest first
    queue: Deque<(u8, usize), CFG_SOFTINT_QUEUE_LEN>,
    /// Handlers are running; nested checks return at once
    busy: bool,
}

impl<P: Port> SoftInts<P> {
    pub const fn new() -> Self {
        SoftInts {
            handlers: [None; CFG_SOFTINTS],
            queue: Deque::new(),
            busy: false,
        }
    }

}

fn check_no(no: usize) -> OsResult<u8> {
    if no >= CFG_SOFTINTS {
        return Err(OsError::SoftIntInvalid);
    }
    Ok(no as u8)
}

impl<P: Port> Kernel<P> {
    /// Install the handler for software interrupt `no`, replacing any
    /// previous one
    pub fn softint_set_handler(&mut self, no: usize, handler: SoftIntHandler<P>) -> OsResult<()> {
        let no = check_no(no)?;
        self.softints.handlers[no as usize] = Some(handler);
        Ok(())
    }

    /// Remove the handler of software interrupt `no`. Raises still queued
    /// for it are dropped when they come up.
    pub fn softint_del_handler(&mut self, no: usize) -> OsResult<()> {
        let no = check_no(no)?;
        self.softints.handlers[no as usize] = None;
        Ok(())
    }

    /// Queue an invocation of software interrupt `no` with `param`
    pub fn softint_raise(&mut self, no: usize, param: usize) -> OsResult<()> {
        let no = check_no(no)?;
        if self.softints.queue.push_back((no, param)).is_err() {
            crate::warn!("software interrupt queue full");
            return Err(OsError::SoftIntQueueFull);
        }
        Ok(())
    }

    /// Run all queued software interrupts. Returns how many handlers ran.
    pub fn softint_check(&mut self) -> usize {
        if self.softints.busy || self.softints.queue.is_empty() {
            return 0;
        }

        self.softints.busy = true;
        self.sched_lock_nesting += 1;

        let mut ran = 0;
        while let Some((no, param)) = self.softints.queue.pop_front() {
            match self.softints.handlers[no as usize] {
                Some(handler) => {
                    handler(self, param);
                    ran += 1;
                }
                None => crate::debug!("software interrupt {=u8} has no handler", no),
            }
        }

        self.sched_lock_nesting -= 1;
        self.softints.busy = false;

        if self.sched_lock_nesting == 0 && self.resched_pending {
            self.sched();
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SimPort;

    #[test]
    fn test_queue_wraps_in_order() {
        let mut q: SoftInts<SimPort> = SoftInts::new();
        for round in 0..3 {
            for i in 0..CFG_SOFTINT_QUEUE_LEN {
                assert!(q.queue.push_back((1, round * 100 + i)).is_ok());
            }
            assert!(q.queue.is_full());
            assert_eq!(q.queue.push_back((1, 0)), Err((1, 0)));
            for i in 0..CFG_SOFTINT_QUEUE_LEN {
                assert_eq!(q.queue.pop_front(), Some((1, round * 100 + i)));
            }
            assert_eq!(q.queue.pop_front(), None);
        }
    }
}

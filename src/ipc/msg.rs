//! Message boxes
//!
//! Every task owns a message box: a FIFO of message buffers sent to it.
//! Buffers are fixed-size and come from a kernel-wide pool. A buffer has
//! exactly one owner at a time, expressed by the non-`Copy` [`MsgBuf`]
//! token: the sender allocates it, `msg_send` moves it into the kernel and
//! the receiver gets it back from `msg_get`/`msg_wait` and frees it.

use crate::arena::Idx;
use crate::config::{CFG_MAX_MESSAGES, CFG_MSGBOX_DEPTH, CFG_MSG_BUFSIZE};
use crate::error::{misuse, OsError, OsResult};
use crate::kernel::Kernel;
use crate::list::{End, Link, List};
use crate::port::Port;
use crate::task::{PendOn, TaskId};
use crate::time::check_timeout;
use crate::types::{OsPendStatus, OsTaskState, Pend, Timeout};

/// Message buffer payload
pub type MsgData = [u8; CFG_MSG_BUFSIZE];

/// Owned message buffer
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MsgBuf {
    slot: Idx,
    gen: u16,
}

impl MsgBuf {
    /// Pool slot of the buffer, for diagnostics
    #[inline]
    pub fn index(&self) -> u16 {
        self.slot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufState {
    Free,
    Owned,
    Queued,
}

/// Message buffer pool
pub(crate) struct MsgPool {
    data: [MsgData; CFG_MAX_MESSAGES],
    gens: [u16; CFG_MAX_MESSAGES],
    state: [BufState; CFG_MAX_MESSAGES],
    /// Free list and message box links
    pub(crate) links: [Link; CFG_MAX_MESSAGES],
    free: List,
}

impl MsgPool {
    pub const fn new() -> Self {
        MsgPool {
            data: [[0; CFG_MSG_BUFSIZE]; CFG_MAX_MESSAGES],
            gens: [0; CFG_MAX_MESSAGES],
            state: [BufState::Free; CFG_MAX_MESSAGES],
            links: [Link::UNLINKED; CFG_MAX_MESSAGES],
            free: List::new(),
        }
    }

    /// Put every buffer on the free list
    pub fn reset(&mut self) {
        self.links = [Link::UNLINKED; CFG_MAX_MESSAGES];
        self.free = List::new();
        for slot in 0..CFG_MAX_MESSAGES {
            self.state[slot] = BufState::Free;
            self.free.insert_tail(&mut self.links, slot as Idx);
        }
    }

    #[inline]
    fn is_owned(&self, buf: &MsgBuf) -> bool {
        let slot = buf.slot as usize;
        slot < CFG_MAX_MESSAGES && self.gens[slot] == buf.gen && self.state[slot] == BufState::Owned
    }

    fn take(&mut self) -> Option<MsgBuf> {
        let slot = self.free.pop_head(&mut self.links)?;
        self.state[slot as usize] = BufState::Owned;
        Some(MsgBuf { slot, gen: self.gens[slot as usize] })
    }

    /// Retire the buffer's token. The caller links the slot into a list.
    fn retire(&mut self, slot: Idx) {
        let slot = slot as usize;
        self.gens[slot] = self.gens[slot].wrapping_add(1);
        self.state[slot] = BufState::Free;
    }

    fn release(&mut self, slot: Idx) {
        self.retire(slot);
        self.free.insert_tail(&mut self.links, slot);
    }

    /// Number of free buffers
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl<P: Port> Kernel<P> {
    /// Allocate a message buffer
    pub fn msg_alloc(&mut self) -> OsResult<MsgBuf> {
        self.msgs.take().ok_or_else(|| {
            crate::warn!("message pool empty");
            OsError::MsgPoolEmpty
        })
    }

    /// Return a message buffer to the pool
    pub fn msg_free(&mut self, buf: MsgBuf) -> OsResult<()> {
        if !self.msgs.is_owned(&buf) {
            misuse!(OsError::MsgInvalid, "free of stale message buffer");
        }
        self.msgs.release(buf.slot);
        Ok(())
    }

    /// Payload of a message buffer
    pub fn msg_data(&self, buf: &MsgBuf) -> OsResult<&MsgData> {
        if !self.msgs.is_owned(buf) {
            misuse!(OsError::MsgInvalid, "access to stale message buffer");
        }
        Ok(&self.msgs.data[buf.slot as usize])
    }

    /// Mutable payload of a message buffer
    pub fn msg_data_mut(&mut self, buf: &MsgBuf) -> OsResult<&mut MsgData> {
        if !self.msgs.is_owned(buf) {
            misuse!(OsError::MsgInvalid, "access to stale message buffer");
        }
        Ok(&mut self.msgs.data[buf.slot as usize])
    }

    /// Number of free message buffers
    pub fn msg_pool_available(&self) -> usize {
        self.msgs.available()
    }

    /// Send a message to a task's message box
    ///
    /// If the task waits for a message it gets this one directly and is
    /// made ready. If the box is full or the task does not exist, the
    /// buffer goes back to the pool and the error is returned.
    /// May be called from interrupt context.
    pub fn msg_send(&mut self, buf: MsgBuf, task: TaskId) -> OsResult<()> {
        if !self.msgs.is_owned(&buf) {
            misuse!(OsError::MsgInvalid, "send of stale message buffer");
        }

        let idx = match self.task_idx(task) {
            Ok(idx) => idx,
            Err(_) => {
                self.msgs.release(buf.slot);
                return Err(OsError::ObjInvalid);
            }
        };

        let tcb = self.tasks.at_mut(idx);
        if tcb.state == OsTaskState::Blocked && tcb.pend_on == PendOn::Msg {
            tcb.msg = Some(buf);
            self.wake(idx, OsPendStatus::Ok);
            self.sched();
            return Ok(());
        }

        if tcb.mailbox.len() >= CFG_MSGBOX_DEPTH {
            crate::warn!("message box of task {=u16} full", idx);
            self.msgs.release(buf.slot);
            return Err(OsError::MsgBoxFull);
        }

        self.msgs.state[buf.slot as usize] = BufState::Queued;
        tcb.mailbox.insert_tail(&mut self.msgs.links, buf.slot);
        Ok(())
    }

    /// Wait for a message without a time limit
    pub fn msg_get(&mut self) -> OsResult<Pend<MsgBuf>> {
        self.msg_wait(Timeout::Infinite)
    }

    /// Take the oldest message from the running task's message box
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(buf))` - A message was taken
    /// * `Ok(Pend::Timeout)` - Polled and the box was empty
    /// * `Ok(Pend::Blocked)` - The caller now waits; collect the message
    ///   with [`msg_result`](Self::msg_result)
    pub fn msg_wait(&mut self, timeout: impl Into<Timeout>) -> OsResult<Pend<MsgBuf>> {
        let timeout = check_timeout(timeout.into())?;
        let cur = self.cur_idx()?;

        let tcb = self.tasks.at_mut(cur);
        if let Some(slot) = tcb.mailbox.pop_head(&mut self.msgs.links) {
            self.msgs.state[slot as usize] = BufState::Owned;
            let gen = self.msgs.gens[slot as usize];
            return Ok(Pend::Ready(MsgBuf { slot, gen }));
        }
        if timeout == Timeout::Poll {
            return Ok(Pend::Timeout);
        }

        self.block_current(PendOn::Msg, timeout)?;
        self.sched();
        Ok(Pend::Blocked)
    }

    /// Whether the running task has messages waiting
    pub fn msg_available(&self) -> OsResult<bool> {
        let cur = self.cur_idx()?;
        Ok(!self.tasks.at(cur).mailbox.is_empty())
    }

    /// Message delivered to the running task's last blocking wait
    pub fn msg_result(&mut self) -> OsResult<Pend<MsgBuf>> {
        let (cur, status) = self.take_pend(|on| *on == PendOn::Msg)?;
        match status {
            OsPendStatus::Pending => Ok(Pend::Blocked),
            OsPendStatus::Ok => self.tasks.at_mut(cur).msg.take().map(Pend::Ready).ok_or(OsError::PendNone),
            OsPendStatus::Timeout => Ok(Pend::Timeout),
            OsPendStatus::Del => Err(OsError::ObjDel),
        }
    }

    /// Return all messages still queued for a task to the pool
    pub(crate) fn msg_drain_mailbox(&mut self, idx: Idx) {
        let Some(tcb) = self.tasks.try_at_mut(idx) else {
            return;
        };

        if let Some(buf) = tcb.msg.take() {
            self.msgs.release(buf.slot);
        }

        let dropped = tcb.mailbox.len();
        for slot in tcb.mailbox.iter(&self.msgs.links) {
            let slot = slot as usize;
            self.msgs.gens[slot] = self.msgs.gens[slot].wrapping_add(1);
            self.msgs.state[slot] = BufState::Free;
        }
        self.msgs.free.join(&mut self.msgs.links, End::Tail, &mut tcb.mailbox);

        if dropped > 0 {
            crate::debug!("{=usize} undelivered messages freed", dropped);
        }
    }
}

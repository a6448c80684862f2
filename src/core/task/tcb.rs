//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task. Queue
//! membership is not stored here: ready and wait queue links live in the
//! kernel's link tables, indexed by the TCB's slot.

use crate::arena::Handle;
use crate::arena::kind;
use crate::config::CFG_TASK_USERSPACE;
use crate::list::{End, List};
use crate::task::Stack;
use crate::types::{FlagMode, OsFlags, OsNestingCtr, OsPendStatus, OsPrio, OsTaskState, OsTick};

#[cfg(feature = "list")]
use crate::lists::ElemId;
#[cfg(feature = "msgbox")]
use crate::msg::MsgBuf;

/// What a blocked task is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendOn {
    Nothing,
    Sleep,
    Sem(Handle<kind::Sem>),
    Mutex(Handle<kind::Mutex>),
    Flag(Handle<kind::Flag>, FlagMode),
    Msg,
    List(Handle<kind::List>, End),
}

/// Task Control Block
pub struct OsTcb<C> {
    // ============ Execution context ============
    /// Port-specific saved context
    pub(crate) ctx: C,
    /// Stack, owned until the task is reaped
    pub(crate) stack: Option<Stack>,
    /// Stack came from the kernel's stack pool
    pub(crate) stack_pooled: bool,

    // ============ Task identification ============
    /// Task name
    pub(crate) name: &'static str,

    // ============ Priority & state ============
    pub(crate) prio: OsPrio,
    pub(crate) state: OsTaskState,
    /// Suspend nesting counter
    pub(crate) suspend_ctr: OsNestingCtr,

    // ============ Time slicing ============
    pub(crate) time_quanta: OsTick,
    pub(crate) time_quanta_ctr: OsTick,

    // ============ Pending ============
    /// Object this task is (or was last) pending on
    pub(crate) pend_on: PendOn,
    /// Result of pend operation
    pub(crate) pend_status: OsPendStatus,
    /// Flags that made the task ready
    pub(crate) flags_rdy: OsFlags,

    // ============ Message box ============
    /// Message handed over directly to a waiting task
    #[cfg(feature = "msgbox")]
    pub(crate) msg: Option<MsgBuf>,
    /// Queued messages, linked through the message pool
    #[cfg(feature = "msgbox")]
    pub(crate) mailbox: List,

    // ============ Element lists ============
    /// Element handed over directly to a waiting task
    #[cfg(feature = "list")]
    pub(crate) list_elem: Option<ElemId>,

    // ============ User data ============
    pub(crate) userspace: [u8; CFG_TASK_USERSPACE],
}

impl<C> OsTcb<C> {
    pub(crate) fn new(ctx: C, stack: Stack, stack_pooled: bool, prio: OsPrio, time_quanta: OsTick) -> Self {
        OsTcb {
            ctx,
            stack: Some(stack),
            stack_pooled,
            name: "",
            prio,
            state: OsTaskState::Ready,
            suspend_ctr: 0,
            time_quanta,
            time_quanta_ctr: time_quanta,
            pend_on: PendOn::Nothing,
            pend_status: OsPendStatus::Ok,
            flags_rdy: 0,
            #[cfg(feature = "msgbox")]
            msg: None,
            #[cfg(feature = "msgbox")]
            mailbox: List::new(),
            #[cfg(feature = "list")]
            list_elem: None,
            userspace: [0; CFG_TASK_USERSPACE],
        }
    }

    /// Check if task is ready or running
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, OsTaskState::Ready | OsTaskState::Running)
    }

    /// Check if task is pending
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state == OsTaskState::Blocked
    }

    /// Check if task is suspended
    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.suspend_ctr > 0
    }

    #[inline]
    pub fn prio(&self) -> OsPrio {
        self.prio
    }

    #[inline]
    pub fn state(&self) -> OsTaskState {
        self.state
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

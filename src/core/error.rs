//! Error types for the kernel
//!
//! Uses Rust's Result pattern instead of C-style status codes. Timeouts and
//! would-block outcomes are not errors; they are reported through
//! [`Pend`](crate::types::Pend).

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ ISR errors ============
    /// Blocking call made from interrupt context
    PendIsr = 10001,

    // ============ Flag errors ============
    /// Flag number out of range
    FlagInvalid = 15101,

    // ============ Lock errors ============
    /// Lock nesting overflow
    LockNestingOvf = 21001,

    // ============ List errors ============
    /// Element is already in a list
    ListElemBusy = 22101,

    // ============ Message errors ============
    /// No free message buffers
    MsgPoolEmpty = 22210,
    /// Message buffer handle is stale or not owned by the caller
    MsgInvalid = 22211,
    /// Destination message box is full
    MsgBoxFull = 22212,

    // ============ Mutex errors ============
    /// Caller is not the mutex owner
    MutexNotOwner = 22401,
    /// Mutex nesting overflow
    MutexOvf = 22404,

    // ============ Object errors ============
    /// Object was deleted while the caller was pending on it
    ObjDel = 24002,
    /// Handle does not refer to a live object
    ObjInvalid = 24003,
    /// No free slot for a new object of this kind
    ObjPoolFull = 24005,

    // ============ OS state errors ============
    /// OS is not running
    OsNotRunning = 24201,
    /// OS is already running
    OsRunning = 24202,
    /// OS not initialized
    OsNotInit = 24203,

    // ============ Pend errors ============
    /// No finished wait to collect for the calling task
    PendNone = 25003,
    /// Scheduler is locked, cannot block
    PendLocked = 25007,

    // ============ Priority errors ============
    /// Invalid priority
    PrioInvalid = 25203,

    // ============ Scheduler errors ============
    /// Scheduler is not locked
    SchedNotLocked = 28004,

    // ============ Semaphore errors ============
    /// Semaphore overflow
    SemOvf = 28101,

    // ============ Stack errors ============
    /// Stack allocation failed
    StkAlloc = 28206,
    /// Invalid stack size
    StkSizeInvalid = 28208,

    // ============ Software interrupt errors ============
    /// Software interrupt number out of range
    SoftIntInvalid = 28501,
    /// Software interrupt queue is full
    SoftIntQueueFull = 28502,

    // ============ Task errors ============
    /// Operation not allowed on the idle task
    TaskIdle = 29004,
    /// No current task
    TaskNone = 29007,
    /// No more TCBs available
    TaskNoMoreTcb = 29008,
    /// Task is not suspended
    TaskNotSuspended = 29011,
    /// Task has terminated
    TaskTerminated = 29012,

    // ============ Time errors ============
    /// Timeout value longer than half the tick counter range
    TimeoutInvalid = 29310,

    // ============ Timer errors ============
    /// Timer has no semaphore or wait time set
    TmrNotSet = 29505,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric code, stable across releases
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Report kernel API misuse: panics in debug builds, returns the error in
/// release builds without touching any other object.
macro_rules! misuse {
    ($err:expr, $($msg:tt)+) => {{
        $crate::error!($($msg)+);
        debug_assert!(false, $($msg)+);
        return Err($err);
    }};
}

pub(crate) use misuse;

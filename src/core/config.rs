//! Compile-time configuration for the kernel
//!
//! These constants control the behavior and resource limits of the RTOS.
//! Optional primitives are switched on and off with cargo features
//! (`sem`, `mutex`, `flag`, `timer`, `msgbox`, `list`, `softint`, `atomic`).

/// Number of priority levels. Priority 0 is the lowest and belongs to the
/// idle task; `CFG_PRIO_LEVELS - 1` is the most urgent.
pub const CFG_PRIO_LEVELS: usize = 32;

/// Maximum number of task control blocks, idle task included
pub const CFG_MAX_TASKS: usize = 16;

/// Maximum number of semaphores
pub const CFG_MAX_SEMAS: usize = 16;

/// Maximum number of mutexes
pub const CFG_MAX_MUTEXES: usize = 8;

/// Maximum number of flag objects
pub const CFG_MAX_FLAGS: usize = 8;

/// Maximum number of timers
pub const CFG_MAX_TIMERS: usize = 8;

/// Number of message buffers in the message pool
pub const CFG_MAX_MESSAGES: usize = 16;

/// Size of one message buffer in bytes
pub const CFG_MSG_BUFSIZE: usize = 16;

/// Maximum number of pending messages in one task's message box
pub const CFG_MSGBOX_DEPTH: usize = 8;

/// Maximum number of element lists
pub const CFG_MAX_LISTS: usize = 8;

/// Maximum number of list elements, shared by all lists
pub const CFG_MAX_LIST_ELEMS: usize = 32;

/// Number of software interrupt numbers
pub const CFG_SOFTINTS: usize = 4;

/// Length of the pending software interrupt queue
pub const CFG_SOFTINT_QUEUE_LEN: usize = 8;

/// Size in bytes of the per-task user data region
pub const CFG_TASK_USERSPACE: usize = 8;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 100;

/// Number of entries in the sleep/timeout tick wheel. Must be a power of two.
pub const CFG_TICK_WHEEL_SIZE: usize = 16;

/// Enable round-robin scheduling for same-priority tasks. When disabled,
/// equal-priority tasks run FIFO and only switch on block or yield.
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Default time quanta for round-robin scheduling
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 4;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Idle task priority
pub const CFG_PRIO_IDLE: u8 = 0;

const _: () = assert!(CFG_PRIO_LEVELS >= 2 && CFG_PRIO_LEVELS <= 256);
const _: () = assert!(CFG_MAX_TASKS >= 2 && CFG_MAX_TASKS < u16::MAX as usize);
const _: () = assert!(CFG_TICK_WHEEL_SIZE.is_power_of_two());
const _: () = assert!(CFG_SOFTINTS <= u8::MAX as usize);
const _: () = assert!(CFG_MAX_MESSAGES < u16::MAX as usize);
const _: () = assert!(CFG_MAX_LIST_ELEMS < u16::MAX as usize);

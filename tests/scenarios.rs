//! Kernel scenarios on the simulated port
//!
//! The simulated port never runs task code. Each test acts as whichever task
//! the kernel currently considers running and checks the scheduling
//! decisions through `current()` and task states.

use std::cell::RefCell;

use picoos::config::*;
use picoos::flag::FlagId;
use picoos::port::SimPort;
use picoos::types::{FlagMode, OsTaskState, Pend, Timeout};
use picoos::{End, Kernel, OsError, Stack, StackPool, TaskId};

type K = Kernel<SimPort>;

fn stack() -> Stack {
    Stack::new(Box::leak(Box::new([0u32; CFG_STK_SIZE_MIN])))
}

fn noop(_: usize) {}

fn kernel() -> K {
    let mut k = Kernel::new(SimPort::new());
    k.init(stack(), noop).unwrap();
    k
}

fn task(k: &mut K, prio: u8) -> TaskId {
    k.task_create(noop, 0, prio, stack()).unwrap()
}

fn ticks(k: &mut K, n: u32) {
    for _ in 0..n {
        k.tick();
    }
}

/// Small deterministic generator for randomized inputs
struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}

// ============ Lifecycle ============

#[test]
fn test_start_requires_init() {
    let mut k = Kernel::new(SimPort::new());
    assert_eq!(k.start(), Err(OsError::OsNotInit));
}

#[test]
fn test_start_runs_most_urgent() {
    let mut k = kernel();
    let _low = task(&mut k, 1);
    let high = task(&mut k, 3);
    let _mid = task(&mut k, 2);

    k.start().unwrap();
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.task_state(high), Ok(OsTaskState::Running));
    assert!(k.port().started().is_some());
    assert_eq!(k.port().switches(), 0);
    assert_eq!(k.start(), Err(OsError::OsRunning));
}

#[test]
fn test_only_idle_runs_when_nothing_else_ready() {
    let mut k = Kernel::new(SimPort::new());
    let idle = k.init(stack(), noop).unwrap();
    k.start().unwrap();
    assert_eq!(k.current(), Some(idle));
    assert_eq!(k.task_name(idle), Ok("idle"));

    k.idle_step();
    assert_eq!(k.port().idle_calls(), 1);
}

#[test]
fn test_idle_hook_chains() {
    fn hook() {}
    let mut k = kernel();
    assert!(k.install_idle_hook(Some(hook)).is_none());
    assert!(k.install_idle_hook(None).is_some());
}

// ============ Scheduling ============

#[test]
fn test_most_urgent_ready_task_always_runs() {
    let mut k = kernel();
    let t1 = task(&mut k, 1);
    let t2 = task(&mut k, 2);
    let t3 = task(&mut k, 3);
    k.start().unwrap();

    assert_eq!(k.current(), Some(t3));
    k.task_sleep(10).unwrap();
    assert_eq!(k.current(), Some(t2));
    k.task_sleep(5).unwrap();
    assert_eq!(k.current(), Some(t1));

    ticks(&mut k, 5);
    assert_eq!(k.current(), Some(t2));
    assert_eq!(k.task_state(t1), Ok(OsTaskState::Ready));

    ticks(&mut k, 5);
    assert_eq!(k.current(), Some(t3));
    assert_eq!(k.task_state(t2), Ok(OsTaskState::Ready));
}

#[test]
fn test_created_task_preempts() {
    let mut k = kernel();
    let low = task(&mut k, 1);
    k.start().unwrap();
    assert_eq!(k.current(), Some(low));

    let high = task(&mut k, 4);
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.task_state(low), Ok(OsTaskState::Ready));
}

#[test]
fn test_round_robin_rotates_equal_priorities() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 5);
    k.start().unwrap();
    assert_eq!(k.current(), Some(a));

    ticks(&mut k, CFG_TIME_QUANTA_DEFAULT - 1);
    assert_eq!(k.current(), Some(a));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(b));
    ticks(&mut k, CFG_TIME_QUANTA_DEFAULT);
    assert_eq!(k.current(), Some(a));
}

#[test]
fn test_yield_passes_to_equal_priority() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 5);
    let _low = task(&mut k, 2);
    k.start().unwrap();

    k.task_yield().unwrap();
    assert_eq!(k.current(), Some(b));
    // Zero-tick sleep is a yield
    k.task_sleep(0).unwrap();
    assert_eq!(k.current(), Some(a));
}

#[test]
fn test_sched_lock_defers_preemption() {
    let mut k = kernel();
    let low = task(&mut k, 1);
    k.start().unwrap();

    k.sched_lock().unwrap();
    k.sched_lock().unwrap();
    let high = task(&mut k, 6);
    assert_eq!(k.current(), Some(low));

    k.sched_unlock().unwrap();
    assert_eq!(k.current(), Some(low));
    k.sched_unlock().unwrap();
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.sched_unlock(), Err(OsError::SchedNotLocked));
}

#[test]
fn test_cannot_block_while_locked() {
    let mut k = kernel();
    let a = task(&mut k, 3);
    k.start().unwrap();

    k.sched_lock().unwrap();
    assert_eq!(k.task_sleep(3), Err(OsError::PendLocked));
    assert_eq!(k.current(), Some(a));
    k.sched_unlock().unwrap();
}

#[test]
fn test_interrupt_defers_switch_to_exit() {
    let mut k = kernel();
    let low = task(&mut k, 1);
    let high = task(&mut k, 5);
    k.start().unwrap();
    k.task_sleep(2).unwrap();
    assert_eq!(k.current(), Some(low));

    k.int_enter();
    k.tick();
    k.tick();
    assert_eq!(k.current(), Some(low));
    k.int_exit();
    assert_eq!(k.current(), Some(high));
}

#[test]
fn test_set_priority_reorders() {
    let mut k = kernel();
    let a = task(&mut k, 4);
    let b = task(&mut k, 2);
    k.start().unwrap();
    assert_eq!(k.current(), Some(a));

    k.task_set_priority(b, 7).unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.task_get_priority(b), Ok(7));

    // Lowering the running task below another ready task hands over the CPU
    k.task_set_priority(b, 1).unwrap();
    assert_eq!(k.current(), Some(a));

    assert_eq!(k.task_set_priority(a, CFG_PRIO_LEVELS as u8), Err(OsError::PrioInvalid));
}

#[test]
fn test_suspend_and_resume() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    k.task_suspend(b).unwrap();
    k.task_suspend(b).unwrap();
    assert_eq!(k.task_state(b), Ok(OsTaskState::Suspended));

    k.task_sleep(4).unwrap();
    assert_ne!(k.current(), Some(b));

    k.task_resume(b).unwrap();
    assert_eq!(k.task_state(b), Ok(OsTaskState::Suspended));
    k.task_resume(b).unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.task_resume(b), Err(OsError::TaskNotSuspended));

    ticks(&mut k, 4);
    assert_eq!(k.current(), Some(a));

    // Suspending itself gives up the CPU
    k.task_suspend(a).unwrap();
    assert_eq!(k.current(), Some(b));
}

#[test]
fn test_suspended_waiter_stays_parked_after_wake() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    k.task_sleep(2).unwrap();
    assert_eq!(k.current(), Some(b));
    k.task_suspend(a).unwrap();

    ticks(&mut k, 2);
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.task_state(a), Ok(OsTaskState::Suspended));

    k.task_resume(a).unwrap();
    assert_eq!(k.current(), Some(a));
}

// ============ Task exit ============

#[test]
fn test_exit_reaps_task() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    assert!(!k.task_unused(a));
    k.task_exit().unwrap();
    assert_eq!(k.current(), Some(b));
    assert!(k.task_unused(a));
    assert_eq!(k.task_state(a), Err(OsError::ObjInvalid));
    assert_eq!(k.port().last_switch().map(|(from, _)| from), Some(None));
}

#[test]
fn test_exit_returns_pooled_stack() {
    let mut k = kernel();
    let mem: &'static mut [[u32; CFG_STK_SIZE_MIN]; 1] = Box::leak(Box::new([[0; CFG_STK_SIZE_MIN]; 1]));
    k.set_stack_pool(Box::leak(Box::new(StackPool::new(mem))));
    let base = task(&mut k, 1);
    k.start().unwrap();

    let a = k.task_spawn(noop, 7, 4, CFG_STK_SIZE_MIN).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.task_spawn(noop, 0, 2, CFG_STK_SIZE_MIN), Err(OsError::StkAlloc));

    k.task_exit().unwrap();
    assert_eq!(k.current(), Some(base));

    let again = k.task_spawn(noop, 0, 4, CFG_STK_SIZE_MIN).unwrap();
    assert_eq!(k.current(), Some(again));
}

#[test]
fn test_spawn_rejects_small_stack() {
    let mut k = kernel();
    assert_eq!(k.task_spawn(noop, 0, 3, CFG_STK_SIZE_MIN - 1), Err(OsError::StkSizeInvalid));
}

#[test]
fn test_tcb_table_exhaustion() {
    let mut k = kernel();
    for _ in 1..CFG_MAX_TASKS {
        task(&mut k, 1);
    }
    assert_eq!(k.task_create(noop, 0, 1, stack()), Err(OsError::TaskNoMoreTcb));
}

#[test]
fn test_userspace_per_task() {
    let mut k = kernel();
    let _a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    k.task_userspace().unwrap()[0] = 0xAA;
    k.task_sleep(1).unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.task_userspace().unwrap()[0], 0);
}

// ============ Semaphores ============

#[test]
fn test_semaphore_counts_then_blocks() {
    const N: usize = 5;
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();

    let sem = k.sem_create(0).unwrap();
    for _ in 0..N {
        k.sem_signal(sem).unwrap();
    }
    for _ in 0..N {
        assert_eq!(k.sem_get(sem), Ok(Pend::Ready(())));
    }
    assert_eq!(k.sem_wait(sem, Timeout::Poll), Ok(Pend::Timeout));

    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    assert_ne!(k.current(), Some(a));
    assert_eq!(k.task_state(a), Ok(OsTaskState::Blocked));

    k.sem_signal(sem).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.sem_result(), Ok(Pend::Ready(())));
    assert_eq!(k.sem_count(sem), Ok(0));
    assert_eq!(k.sem_result(), Err(OsError::PendNone));
}

#[test]
fn test_negative_initial_count() {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();

    let sem = k.sem_create(-2).unwrap();
    k.sem_signal(sem).unwrap();
    k.sem_signal(sem).unwrap();
    assert_eq!(k.sem_wait(sem, Timeout::Poll), Ok(Pend::Timeout));
    k.sem_signal(sem).unwrap();
    assert_eq!(k.sem_wait(sem, Timeout::Poll), Ok(Pend::Ready(())));
}

#[test]
fn test_semaphore_wait_times_out() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();

    let sem = k.sem_create(0).unwrap();
    assert_eq!(k.sem_wait(sem, 3u32), Ok(Pend::Blocked));
    ticks(&mut k, 2);
    assert_ne!(k.current(), Some(a));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.sem_result(), Ok(Pend::Timeout));

    // The timed-out waiter no longer consumes signals
    k.sem_signal(sem).unwrap();
    assert_eq!(k.sem_count(sem), Ok(1));
}

#[test]
fn test_zero_tick_wait_is_a_poll() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    let f = k.flag_create().unwrap();
    let list = k.list_create().unwrap();

    assert_eq!(k.sem_wait(sem, Timeout::Ticks(0)), Ok(Pend::Timeout));
    assert_eq!(k.flag_wait(f, FlagMode::GetSingle, Timeout::Ticks(0)), Ok(Pend::Timeout));
    assert_eq!(k.msg_wait(Timeout::Ticks(0)), Ok(Pend::Timeout));
    assert_eq!(k.list_wait(list, End::Head, Timeout::Ticks(0)), Ok(Pend::Timeout));
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.task_state(a), Ok(OsTaskState::Running));

    // A unit that is there is still taken
    k.sem_signal(sem).unwrap();
    assert_eq!(k.sem_wait(sem, Timeout::Ticks(0)), Ok(Pend::Ready(())));
}

#[test]
fn test_semaphore_wakes_most_urgent_waiter_first() {
    let mut k = kernel();
    let high = task(&mut k, 6);
    let mid = task(&mut k, 4);
    let low = task(&mut k, 2);
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();

    // low blocks first, then high, then mid
    k.task_sleep(1).unwrap();
    k.task_sleep(2).unwrap();
    assert_eq!(k.current(), Some(low));
    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(mid));
    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));

    k.sem_signal(sem).unwrap();
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.task_state(mid), Ok(OsTaskState::Blocked));
    assert_eq!(k.task_state(low), Ok(OsTaskState::Blocked));
}

#[test]
fn test_semaphore_destroy_wakes_waiters() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();

    let sem = k.sem_create(0).unwrap();
    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    k.sem_destroy(sem).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.sem_result(), Err(OsError::ObjDel));
}

#[test]
fn test_semaphore_pool_exhaustion() {
    let mut k = kernel();
    for _ in 0..CFG_MAX_SEMAS {
        k.sem_create(0).unwrap();
    }
    assert_eq!(k.sem_create(0), Err(OsError::ObjPoolFull));
}

#[test]
fn test_timeout_too_long() {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    assert_eq!(k.sem_wait(sem, 1u32 << 31), Err(OsError::TimeoutInvalid));
    assert_eq!(k.task_sleep(u32::MAX - 1), Err(OsError::TimeoutInvalid));
}

#[test]
fn test_signal_from_interrupt() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    assert_eq!(k.current(), Some(b));

    k.int_enter();
    k.sem_signal(sem).unwrap();
    assert_eq!(k.current(), Some(b));
    k.int_exit();
    assert_eq!(k.current(), Some(a));
}

#[test]
#[cfg_attr(debug_assertions, should_panic)]
fn test_semaphore_double_destroy_is_misuse() {
    let mut k = kernel();
    let sem = k.sem_create(1).unwrap();
    k.sem_destroy(sem).unwrap();
    assert_eq!(k.sem_destroy(sem), Err(OsError::ObjInvalid));
}

#[test]
#[cfg_attr(debug_assertions, should_panic)]
fn test_idle_task_must_not_block() {
    let mut k = kernel();
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    assert_eq!(k.sem_get(sem), Err(OsError::TaskIdle));
}

// ============ Mutexes ============

#[test]
fn test_mutex_is_reentrant() {
    const K_LOCKS: usize = 4;
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    let m = k.mutex_create().unwrap();
    for _ in 0..K_LOCKS {
        assert_eq!(k.mutex_lock(m), Ok(Pend::Ready(())));
    }
    assert_eq!(k.mutex_owner(m), Ok(Some(a)));

    k.task_sleep(3).unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.mutex_try_lock(m), Ok(Pend::WouldBlock));
    assert_eq!(k.mutex_lock(m), Ok(Pend::Blocked));

    ticks(&mut k, 3);
    assert_eq!(k.current(), Some(a));
    for _ in 0..K_LOCKS - 1 {
        k.mutex_unlock(m).unwrap();
        assert_eq!(k.mutex_owner(m), Ok(Some(a)));
    }

    // Final unlock hands the mutex to the waiter
    k.mutex_unlock(m).unwrap();
    assert_eq!(k.mutex_owner(m), Ok(Some(b)));
    assert_eq!(k.task_state(b), Ok(OsTaskState::Ready));

    k.task_sleep(1).unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.mutex_result(), Ok(Pend::Ready(())));
    k.mutex_unlock(m).unwrap();
    assert_eq!(k.mutex_owner(m), Ok(None));
}

#[test]
fn test_mutex_released_on_exit() {
    let mut k = kernel();
    let _a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();

    assert_eq!(k.mutex_lock(m), Ok(Pend::Ready(())));
    assert_eq!(k.mutex_lock(m), Ok(Pend::Ready(())));
    k.task_sleep(1).unwrap();
    assert_eq!(k.mutex_lock(m), Ok(Pend::Blocked));

    ticks(&mut k, 1);
    k.task_exit().unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.mutex_owner(m), Ok(Some(b)));
    assert_eq!(k.mutex_result(), Ok(Pend::Ready(())));
}

#[test]
#[cfg_attr(debug_assertions, should_panic)]
fn test_mutex_unlock_by_non_owner_is_misuse() {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();
    let m = k.mutex_create().unwrap();
    assert_eq!(k.mutex_unlock(m), Err(OsError::MutexNotOwner));
}

// ============ Flags ============

fn flag_kernel() -> (K, FlagId) {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();
    let f = k.flag_create().unwrap();
    (k, f)
}

#[test]
fn test_flag_single_returns_lowest_bits_in_order() {
    let mut rng = XorShift(0x2545_F491);
    let (mut k, f) = flag_kernel();

    for _ in 0..64 {
        let mask = rng.next() & (u32::MAX >> 1);
        for bit in 0..=picoos::FLAG_MAX_BIT {
            if mask & (1 << bit) != 0 {
                k.flag_set(f, bit).unwrap();
            }
        }

        let mut got = Vec::new();
        while let Pend::Ready(bit) = k.flag_wait(f, FlagMode::GetSingle, Timeout::Poll).unwrap() {
            got.push(bit);
        }
        let expected: Vec<u32> = (0..32).filter(|b| mask & (1 << b) != 0).collect();
        assert_eq!(got, expected);
        assert_eq!(k.flag_peek(f), Ok(0));
    }
}

#[test]
fn test_flag_mask_and_all_modes() {
    let (mut k, f) = flag_kernel();
    k.flag_set(f, 1).unwrap();
    k.flag_set(f, 4).unwrap();

    assert_eq!(k.flag_wait(f, FlagMode::GetAll(0b1_0110), Timeout::Poll), Ok(Pend::Timeout));
    k.flag_set(f, 2).unwrap();
    assert_eq!(k.flag_get(f, FlagMode::GetAll(0b0110)), Ok(Pend::Ready(0b0110)));
    assert_eq!(k.flag_get(f, FlagMode::GetMask), Ok(Pend::Ready(0b1_0000)));

    assert_eq!(k.flag_set(f, 31), Err(OsError::FlagInvalid));
    assert_eq!(k.flag_wait(f, FlagMode::GetAll(0), Timeout::Poll), Err(OsError::FlagInvalid));
    assert_eq!(k.flag_wait(f, FlagMode::GetAll(1 << 31), Timeout::Poll), Err(OsError::FlagInvalid));
}

#[test]
fn test_flag_set_wakes_waiter() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();
    let f = k.flag_create().unwrap();

    assert_eq!(k.flag_get(f, FlagMode::GetSingle), Ok(Pend::Blocked));
    assert_eq!(k.current(), Some(b));

    k.flag_set(f, 9).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.flag_result(), Ok(Pend::Ready(9)));
    assert_eq!(k.flag_peek(f), Ok(0));
}

#[test]
fn test_flag_bit_delivered_to_one_waiter() {
    let mut k = kernel();
    let high = task(&mut k, 6);
    let mid = task(&mut k, 4);
    let low = task(&mut k, 2);
    k.start().unwrap();
    let f = k.flag_create().unwrap();

    assert_eq!(k.flag_get(f, FlagMode::GetMask), Ok(Pend::Blocked));
    assert_eq!(k.flag_get(f, FlagMode::GetSingle), Ok(Pend::Blocked));
    assert_eq!(k.current(), Some(low));

    k.flag_set(f, 3).unwrap();
    assert_eq!(k.current(), Some(high));
    assert_eq!(k.task_state(mid), Ok(OsTaskState::Blocked));
    assert_eq!(k.flag_result(), Ok(Pend::Ready(0b1000)));
}

#[test]
fn test_flag_single_concurrent_setters_deliver_each_bit_once() {
    let mut rng = XorShift(0x9E37_79B9);
    let mut k = kernel();
    let setter = task(&mut k, 1);
    let waiters: Vec<TaskId> = (2..6).map(|prio| task(&mut k, prio)).collect();
    k.start().unwrap();
    let f = k.flag_create().unwrap();

    // Every waiter blocks once, most urgent first
    while k.current() != Some(setter) {
        assert_eq!(k.flag_get(f, FlagMode::GetSingle), Ok(Pend::Blocked));
    }

    let mut raised = Vec::new();
    let mut delivered = Vec::new();
    for _ in 0..200 {
        if rng.next() % 2 == 0 {
            // Several bits from one interrupt; switches wait for int_exit
            k.int_enter();
            for _ in 0..1 + rng.next() % 3 {
                let bit = rng.next() % (picoos::FLAG_MAX_BIT + 1);
                k.flag_set(f, bit).unwrap();
                raised.push(bit);
            }
            assert_eq!(k.current(), Some(setter));
            k.int_exit();
        } else {
            let bit = rng.next() % (picoos::FLAG_MAX_BIT + 1);
            k.flag_set(f, bit).unwrap();
            raised.push(bit);
        }

        // Woken waiters run in priority order, collect their bit and wait again
        while let Some(cur) = k.current().filter(|&t| t != setter) {
            assert!(waiters.contains(&cur));
            match k.flag_result() {
                Ok(Pend::Ready(bit)) => delivered.push(bit),
                other => panic!("waiter woke with {:?}", other),
            }
            assert_eq!(k.flag_get(f, FlagMode::GetSingle), Ok(Pend::Blocked));
        }
        assert_eq!(k.flag_peek(f), Ok(0));
    }

    raised.sort_unstable();
    delivered.sort_unstable();
    assert_eq!(delivered, raised);
}

// ============ Message boxes ============

fn write(k: &mut K, byte: u8) -> picoos::msg::MsgBuf {
    let buf = k.msg_alloc().unwrap();
    k.msg_data_mut(&buf).unwrap()[0] = byte;
    buf
}

#[test]
fn test_messages_arrive_in_send_order() {
    let mut k = kernel();
    let r = task(&mut k, 5);
    let _s = task(&mut k, 3);
    k.start().unwrap();

    // Receiver blocks, the sender hands the first message over directly
    assert_eq!(k.msg_get().map(|p| p.is_ready()), Ok(false));
    let a = write(&mut k, b'A');
    k.msg_send(a, r).unwrap();
    assert_eq!(k.current(), Some(r));
    let got = k.msg_result().unwrap().ready().unwrap();
    assert_eq!(k.msg_data(&got).unwrap()[0], b'A');
    k.msg_free(got).unwrap();

    // Later messages queue up while the receiver sleeps
    k.task_sleep(2).unwrap();
    for byte in [b'B', b'C'] {
        let buf = write(&mut k, byte);
        k.msg_send(buf, r).unwrap();
    }
    ticks(&mut k, 2);
    assert_eq!(k.current(), Some(r));
    assert_eq!(k.msg_available(), Ok(true));

    for byte in [b'B', b'C'] {
        let buf = k.msg_wait(Timeout::Poll).unwrap().ready().unwrap();
        assert_eq!(k.msg_data(&buf).unwrap()[0], byte);
        k.msg_free(buf).unwrap();
    }
    assert_eq!(k.msg_wait(Timeout::Poll), Ok(Pend::Timeout));
    assert_eq!(k.msg_pool_available(), CFG_MAX_MESSAGES);
}

#[test]
fn test_full_mailbox_returns_buffer_to_pool() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();

    for i in 0..CFG_MSGBOX_DEPTH {
        let buf = write(&mut k, i as u8);
        k.msg_send(buf, a).unwrap();
    }
    let extra = write(&mut k, 0xFF);
    assert_eq!(k.msg_send(extra, a), Err(OsError::MsgBoxFull));
    assert_eq!(k.msg_pool_available(), CFG_MAX_MESSAGES - CFG_MSGBOX_DEPTH);
}

#[test]
fn test_message_pool_exhaustion() {
    let mut k = kernel();
    let bufs: Vec<_> = (0..CFG_MAX_MESSAGES).map(|_| k.msg_alloc().unwrap()).collect();
    assert_eq!(k.msg_alloc(), Err(OsError::MsgPoolEmpty));
    for buf in bufs {
        k.msg_free(buf).unwrap();
    }
    assert_eq!(k.msg_pool_available(), CFG_MAX_MESSAGES);
}

#[test]
fn test_exit_frees_queued_messages() {
    let mut k = kernel();
    let _a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();

    let me = k.current().unwrap();
    for byte in [1, 2, 3] {
        let buf = write(&mut k, byte);
        k.msg_send(buf, me).unwrap();
    }
    k.task_exit().unwrap();
    assert_eq!(k.current(), Some(b));
    assert_eq!(k.msg_pool_available(), CFG_MAX_MESSAGES);
}

#[test]
fn test_send_to_dead_task_frees_buffer() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let _b = task(&mut k, 3);
    k.start().unwrap();
    k.task_exit().unwrap();

    let buf = write(&mut k, 7);
    assert_eq!(k.msg_send(buf, a), Err(OsError::ObjInvalid));
    assert_eq!(k.msg_pool_available(), CFG_MAX_MESSAGES);
}

// ============ Element lists ============

#[test]
fn test_list_add_and_get_at_both_ends() {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();
    let list = k.list_create().unwrap();
    let elems: Vec<_> = (0..3).map(|i| k.list_elem_create(i * 100).unwrap()).collect();

    k.list_add(list, End::Tail, elems[0]).unwrap();
    k.list_add(list, End::Tail, elems[1]).unwrap();
    k.list_add(list, End::Head, elems[2]).unwrap();
    assert_eq!(k.list_len(list), Ok(3));
    assert_eq!(k.list_add(list, End::Tail, elems[0]), Err(OsError::ListElemBusy));

    assert_eq!(k.list_wait(list, End::Head, Timeout::Poll), Ok(Pend::Ready(elems[2])));
    assert_eq!(k.list_wait(list, End::Tail, Timeout::Poll), Ok(Pend::Ready(elems[1])));
    assert_eq!(k.list_elem_data(elems[1]), Ok(100));
    assert_eq!(k.list_get(list, End::Tail), Ok(Pend::Ready(elems[0])));
    assert_eq!(k.list_wait(list, End::Head, Timeout::Poll), Ok(Pend::Timeout));
}

#[test]
fn test_list_add_from_interrupt_wakes_waiter() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();
    let list = k.list_create().unwrap();
    let elem = k.list_elem_create(0xBEEF).unwrap();

    assert_eq!(k.list_get(list, End::Head), Ok(Pend::Blocked));
    assert_eq!(k.current(), Some(b));

    k.int_enter();
    k.list_add(list, End::Tail, elem).unwrap();
    assert_eq!(k.current(), Some(b));
    k.int_exit();

    assert_eq!(k.current(), Some(a));
    assert_eq!(k.list_result(), Ok(Pend::Ready(elem)));
    assert_eq!(k.list_elem_data(elem), Ok(0xBEEF));
    assert_eq!(k.list_len(list), Ok(0));
    // The delivered element is free to be queued again
    k.list_add(list, End::Tail, elem).unwrap();
}

#[test]
fn test_list_wait_times_out() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();
    let list = k.list_create().unwrap();

    assert_eq!(k.list_wait(list, End::Head, 2u32), Ok(Pend::Blocked));
    ticks(&mut k, 1);
    assert_ne!(k.current(), Some(a));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.list_result(), Ok(Pend::Timeout));

    // Nobody is waiting any more, so the element stays queued
    let elem = k.list_elem_create(1).unwrap();
    k.list_add(list, End::Tail, elem).unwrap();
    assert_eq!(k.list_len(list), Ok(1));
}

#[test]
fn test_list_join_and_remove() {
    let mut k = kernel();
    task(&mut k, 5);
    k.start().unwrap();
    let base = k.list_create().unwrap();
    let other = k.list_create().unwrap();
    let e: Vec<_> = (0..4).map(|i| k.list_elem_create(i).unwrap()).collect();

    k.list_add(base, End::Tail, e[0]).unwrap();
    k.list_add(other, End::Tail, e[1]).unwrap();
    k.list_add(other, End::Tail, e[2]).unwrap();
    k.list_join(base, End::Head, other).unwrap();
    assert_eq!(k.list_len(base), Ok(3));
    assert_eq!(k.list_len(other), Ok(0));

    // Joined elements now belong to base
    assert_eq!(k.list_remove(e[2]), Ok(true));
    assert_eq!(k.list_remove(e[2]), Ok(false));
    assert_eq!(k.list_len(base), Ok(2));

    k.list_add(other, End::Tail, e[3]).unwrap();
    k.list_join(base, End::Tail, other).unwrap();
    let mut order = Vec::new();
    while let Pend::Ready(elem) = k.list_wait(base, End::Head, Timeout::Poll).unwrap() {
        order.push(k.list_elem_data(elem).unwrap());
    }
    assert_eq!(order, [1, 0, 3]);
}

#[test]
fn test_list_join_serves_waiter_from_requested_end() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();
    let base = k.list_create().unwrap();
    let other = k.list_create().unwrap();
    let first = k.list_elem_create(1).unwrap();
    let last = k.list_elem_create(2).unwrap();
    k.list_add(other, End::Tail, first).unwrap();
    k.list_add(other, End::Tail, last).unwrap();

    assert_eq!(k.list_get(base, End::Tail), Ok(Pend::Blocked));
    k.list_join(base, End::Tail, other).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.list_result(), Ok(Pend::Ready(last)));
    assert_eq!(k.list_len(base), Ok(1));
}

#[test]
fn test_list_destroy_wakes_waiters_and_frees_elements() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    let b = task(&mut k, 3);
    k.start().unwrap();
    let list = k.list_create().unwrap();
    let other = k.list_create().unwrap();
    let elem = k.list_elem_create(7).unwrap();
    k.list_add(other, End::Tail, elem).unwrap();

    assert_eq!(k.list_get(list, End::Head), Ok(Pend::Blocked));
    assert_eq!(k.current(), Some(b));
    k.list_destroy(list).unwrap();
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.list_result(), Err(OsError::ObjDel));

    k.list_destroy(other).unwrap();
    assert_eq!(k.list_remove(elem), Ok(false));
    k.list_elem_destroy(elem).unwrap();
    assert_eq!(k.list_elem_data(elem), Err(OsError::ObjInvalid));
}

#[test]
fn test_list_tables_exhaustion() {
    let mut k = kernel();
    for _ in 0..CFG_MAX_LISTS {
        k.list_create().unwrap();
    }
    assert_eq!(k.list_create(), Err(OsError::ObjPoolFull));
    for i in 0..CFG_MAX_LIST_ELEMS {
        k.list_elem_create(i).unwrap();
    }
    assert_eq!(k.list_elem_create(0), Err(OsError::ObjPoolFull));
}

// ============ Timers ============

#[test]
fn test_periodic_timer_signals_semaphore() {
    let mut k = kernel();
    let a = task(&mut k, 5);
    k.start().unwrap();

    let sem = k.sem_create(0).unwrap();
    let t = k.timer_create().unwrap();
    assert_eq!(k.timer_start(t), Err(OsError::TmrNotSet));
    k.timer_set(t, sem, 3, 2).unwrap();
    k.timer_start(t).unwrap();

    assert_eq!(k.sem_get(sem), Ok(Pend::Blocked));
    ticks(&mut k, 2);
    assert_ne!(k.current(), Some(a));
    ticks(&mut k, 1);
    assert_eq!(k.current(), Some(a));
    assert_eq!(k.sem_result(), Ok(Pend::Ready(())));
    assert_eq!(k.timer_fired(t), Ok(true));
    assert_eq!(k.timer_fired(t), Ok(false));

    ticks(&mut k, 4);
    assert_eq!(k.sem_count(sem), Ok(2));
    assert_eq!(k.timer_active(t), Ok(true));

    k.timer_stop(t).unwrap();
    ticks(&mut k, 4);
    assert_eq!(k.sem_count(sem), Ok(2));
}

#[test]
fn test_one_shot_timer_stops() {
    let mut k = kernel();
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    let t = k.timer_create().unwrap();
    k.timer_set(t, sem, 2, 0).unwrap();
    k.timer_start(t).unwrap();

    ticks(&mut k, 10);
    assert_eq!(k.sem_count(sem), Ok(1));
    assert_eq!(k.timer_active(t), Ok(false));
    assert_eq!(k.timer_set(t, sem, 0, 0), Err(OsError::TimeoutInvalid));
}

#[test]
fn test_timer_survives_destroyed_semaphore() {
    let mut k = kernel();
    k.start().unwrap();
    let sem = k.sem_create(0).unwrap();
    let t = k.timer_create().unwrap();
    k.timer_set(t, sem, 1, 1).unwrap();
    k.timer_start(t).unwrap();
    k.sem_destroy(sem).unwrap();

    ticks(&mut k, 3);
    assert_eq!(k.timer_fired(t), Ok(true));
    k.timer_destroy(t).unwrap();
    assert_eq!(k.timer_fired(t), Err(OsError::ObjInvalid));
}

// ============ Software interrupts ============

thread_local! {
    static SEEN: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

fn record0(_: &mut K, param: usize) {
    SEEN.with(|s| s.borrow_mut().push((0, param)));
}

fn record1(_: &mut K, param: usize) {
    SEEN.with(|s| s.borrow_mut().push((1, param)));
}

#[test]
fn test_softints_run_in_raise_order() {
    let mut k = kernel();
    k.softint_set_handler(0, record0).unwrap();
    k.softint_set_handler(1, record1).unwrap();

    k.softint_raise(1, 10).unwrap();
    k.softint_raise(0, 20).unwrap();
    k.softint_raise(1, 30).unwrap();
    assert_eq!(k.softint_check(), 3);
    assert_eq!(k.softint_check(), 0);

    SEEN.with(|s| assert_eq!(*s.borrow(), vec![(1, 10), (0, 20), (1, 30)]));
}

#[test]
fn test_softint_runs_at_interrupt_exit() {
    let mut k = kernel();
    k.softint_set_handler(2, record0).unwrap();

    k.int_enter();
    k.softint_raise(2, 5).unwrap();
    SEEN.with(|s| assert!(s.borrow().is_empty()));
    k.int_exit();
    SEEN.with(|s| assert_eq!(*s.borrow(), vec![(0, 5)]));
}

#[test]
fn test_softint_limits() {
    let mut k = kernel();
    assert_eq!(k.softint_raise(CFG_SOFTINTS, 0), Err(OsError::SoftIntInvalid));
    for i in 0..CFG_SOFTINT_QUEUE_LEN {
        k.softint_raise(0, i).unwrap();
    }
    assert_eq!(k.softint_raise(0, 0), Err(OsError::SoftIntQueueFull));

    // Raises without a handler are dropped
    assert_eq!(k.softint_check(), 0);
    k.softint_raise(0, 0).unwrap();
}

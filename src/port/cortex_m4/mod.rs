//! Cortex-M4 port implementation
//!
//! Context switches are carried out by the PendSV exception. The kernel
//! records which context to save and which to load in `OS_SWITCH` and
//! pends PendSV; the switch happens once interrupts are unmasked again.
//!
//! The [`Kernel`](crate::kernel::Kernel) holding the contexts must not move
//! after `start`, which is always the case for a `static` kernel cell.

#![allow(named_asm_labels)]

use core::arch::naked_asm;
use core::ptr::{addr_of_mut, null_mut};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use super::{Port, TaskFn};
use crate::task::Stack;

/// Called when a task function returns. Expected to terminate the task,
/// normally with `task_exit`.
pub type TaskExitFn = fn() -> !;

/// Saved context of a task: its process stack pointer
#[derive(Debug)]
pub struct ArmContext {
    sp: *mut u32,
}

// The stack pointer is only dereferenced by PendSV
unsafe impl Send for ArmContext {}

/// Pending context switch, read by PendSV
#[repr(C)]
struct SwitchRequest {
    /// Where to store the outgoing stack pointer, null to discard it
    save: *mut *mut u32,
    /// Where to load the incoming stack pointer from, null if nothing pends
    load: *mut *mut u32,
}

#[no_mangle]
static mut OS_SWITCH: SwitchRequest = SwitchRequest {
    save: null_mut(),
    load: null_mut(),
};

/// Cortex-M4 port
pub struct CortexM4 {
    on_return: TaskExitFn,
}

impl CortexM4 {
    pub const fn new(on_return: TaskExitFn) -> Self {
        CortexM4 { on_return }
    }

    /// Initialize SysTick timer for system tick generation
    ///
    /// # Arguments
    /// * `cnts` - Reload value
    ///
    /// # Example
    /// For 16MHz clock with 1000Hz tick rate: cnts = 16_000_000 / 1000 = 16_000
    pub fn systick_init(&mut self, cnts: u32) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        p.SYST.set_reload(cnts - 1);
        p.SYST.clear_current();
        p.SYST.set_clock_source(SystClkSource::Core);
        p.SYST.enable_interrupt();
        p.SYST.enable_counter();
    }
}

/// Exception frame plus the registers PendSV saves, lowest address first
#[repr(C, align(4))]
struct UcStk {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

/// First code a task runs: the entry function, then the exit hook
#[allow(improper_ctypes_definitions)]
extern "C" fn task_trampoline(arg: usize, entry: TaskFn, on_return: TaskExitFn) -> ! {
    entry(arg);
    on_return()
}

/// Last resort if the trampoline ever returns
fn task_return() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

impl Port for CortexM4 {
    type Context = ArmContext;

    fn init_context(&mut self, stack: &mut Stack, entry: TaskFn, arg: usize) -> ArmContext {
        let words = stack.len();
        let base = stack.as_mut_ptr();

        unsafe {
            let top = base.add(words);
            let aligned = ((top as usize) & !7) as *mut u32;
            let frame = aligned.sub(core::mem::size_of::<UcStk>() / 4) as *mut UcStk;

            frame.write(UcStk {
                r4: 0x04040404,
                r5: 0x05050505,
                r6: 0x06060606,
                r7: 0x07070707,
                r8: 0x08080808,
                r9: 0x09090909,
                r10: 0x10101010,
                r11: 0x11111111,
                // Thread mode, process stack, no FP frame
                exc_return: 0xFFFF_FFFD,
                r0: arg as u32,
                r1: entry as usize as u32,
                r2: self.on_return as usize as u32,
                r3: 0,
                r12: 0,
                lr: task_return as usize as u32,
                pc: (task_trampoline as usize as u32) | 1,
                xpsr: 0x0100_0000,
            });

            ArmContext { sp: frame as *mut u32 }
        }
    }

    fn start(&mut self, first: &mut ArmContext) {
        unsafe {
            let mut scb = cortex_m::Peripherals::steal().SCB;
            scb.set_priority(SystemHandler::PendSV, 0xF0);
            scb.set_priority(SystemHandler::SysTick, 0xF0);

            let req = addr_of_mut!(OS_SWITCH);
            (*req).save = null_mut();
            (*req).load = &mut first.sp;
        }
        // Taken as soon as the caller's critical section ends. From then on
        // thread mode runs on PSP and MSP serves interrupts only.
        SCB::set_pendsv();
    }

    fn switch(&mut self, from: Option<&mut ArmContext>, to: &mut ArmContext) {
        unsafe {
            let req = addr_of_mut!(OS_SWITCH);
            // A switch still pending keeps its save slot: the CPU is still
            // on the task that requested it.
            if (*req).load.is_null() {
                (*req).save = from.map_or(null_mut(), |c| &mut c.sp as *mut *mut u32);
            }
            (*req).load = &mut to.sp;
        }
        SCB::set_pendsv();
    }

    fn idle(&mut self) {
        cortex_m::asm::wfi();
    }
}

/// PendSV exception handler - performs full context switch
///
/// 1. Save R4-R11, LR to the outgoing task's PSP (skipped without save slot)
/// 2. Restore R4-R11, LR from the incoming task's stack
/// 3. Clear the request and return into the incoming task
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "ldr r2, ={switch}",
        "ldr r3, [r2, #4]",
        "cbz r3, 2f",

        "mrs r0, psp",
        "ldr r1, [r2]",
        "cbz r1, 1f",
        "stmdb r0!, {{r4-r11, lr}}",
        "str r0, [r1]",

        "1:",
        "ldr r0, [r3]",
        "ldmia r0!, {{r4-r11, lr}}",
        "msr psp, r0",

        "movs r1, #0",
        "str r1, [r2]",
        "str r1, [r2, #4]",

        "2:",
        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        switch = sym OS_SWITCH,
    );
}

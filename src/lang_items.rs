//! Panic handler and fault handler for ARM targets

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

// panic-probe prints the panic message over RTT and traps
#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::udf();
    }
}

/// A fault in a task is not recoverable; report where it happened and stop
#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::error!("hard fault at pc {=u32:#010x}, lr {=u32:#010x}", ef.pc(), ef.lr());
    loop {
        cortex_m::asm::udf();
    }
}

//! Critical section handling
//!
//! Interrupt masking goes through the `critical-section` crate. On ARM the
//! single-core implementation registered in `lib.rs` toggles PRIMASK; host
//! builds use whatever implementation the binary links (the `std` one in
//! tests).

pub use critical_section::CriticalSection;

/// Execute a closure with interrupts disabled
///
/// The closure receives the critical section token, which is needed to
/// borrow a [`KernelCell`](crate::cell::KernelCell).
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

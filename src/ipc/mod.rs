//! Inter-task communication
//!
//! Contains message boxes, element lists and software interrupts.

#[cfg(feature = "msgbox")]
pub mod msg;

#[cfg(feature = "list")]
pub mod lists;

#[cfg(feature = "softint")]
pub mod softint;

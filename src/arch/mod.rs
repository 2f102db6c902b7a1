//! # CPU Boundary
//!
//! Everything the core needs from the processor:
//!
//! - `irq`: interrupt-flag control used by the critical-section guard and the scheduler
//! - `context`: the saved register frame and the stack-switch routines
//!
//! On the bare-metal target (`target_os = "none"`) `irq` drives the real
//! interrupt flag through the `x86_64` crate. Hosted builds (unit tests) get a
//! software flag with the same semantics so the guard logic stays testable.

pub mod context;
pub mod irq;

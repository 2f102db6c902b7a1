//! # Critical-Section Guard
//!
//! One process-wide flag that keeps timer preemption away from code in the
//! middle of a protected update. Entering masks interrupts and raises the
//! flag; the timer handler and `task::schedule` both refuse to switch tasks
//! while it is raised.
//!
//! The raw [`enter`]/[`exit`] pair is not counted. A second `enter` while the
//! flag is up changes nothing, and the first `exit` drops it. Callers using the
//! raw functions must pair every `enter` with exactly one `exit`, or an inner
//! `exit` reopens preemption under the outer holder. [`CriticalSection`] only
//! exits when it was the outermost holder, so nesting guards is safe.
//!
//! `exit` re-enables interrupts only if they were enabled when the outermost
//! `enter` ran. Boot code that runs with interrupts masked stays masked.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::irq;

static IN_CRITICAL_SECTION: AtomicBool = AtomicBool::new(false);
static IRQ_ENABLED_BEFORE: AtomicBool = AtomicBool::new(false);

pub fn enter() {
    let were_enabled = irq::are_enabled();
    irq::disable();
    if !IN_CRITICAL_SECTION.swap(true, Ordering::SeqCst) {
        IRQ_ENABLED_BEFORE.store(were_enabled, Ordering::SeqCst);
    }
}

pub fn exit() {
    if IN_CRITICAL_SECTION.swap(false, Ordering::SeqCst)
        && IRQ_ENABLED_BEFORE.swap(false, Ordering::SeqCst)
    {
        irq::enable();
    }
}

pub fn is_active() -> bool {
    IN_CRITICAL_SECTION.load(Ordering::SeqCst)
}

/// Scoped hold on the critical section.
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct CriticalSection {
    outermost: bool,
}

impl CriticalSection {
    pub fn enter() -> Self {
        let outermost = !is_active();
        enter();
        Self { outermost }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        if self.outermost {
            exit();
        }
    }
}

/// Runs `f` inside a critical section.
pub fn critical<R>(f: impl FnOnce() -> R) -> R {
    let _section = CriticalSection::enter();
    f()
}

//! Interrupt flag control.

#[cfg(target_os = "none")]
mod imp {
    use x86_64::instructions::{hlt, interrupts};

    #[inline]
    pub fn enable() {
        interrupts::enable();
    }

    #[inline]
    pub fn disable() {
        interrupts::disable();
    }

    #[inline]
    pub fn are_enabled() -> bool {
        interrupts::are_enabled()
    }

    #[inline]
    pub fn wait() {
        hlt();
    }
}

#[cfg(not(target_os = "none"))]
mod imp {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ENABLED: AtomicBool = AtomicBool::new(false);

    pub fn enable() {
        ENABLED.store(true, Ordering::SeqCst);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::SeqCst);
    }

    pub fn are_enabled() -> bool {
        ENABLED.load(Ordering::SeqCst)
    }

    pub fn wait() {
        core::hint::spin_loop();
    }
}

pub use imp::{are_enabled, disable, enable};

/// Parks the CPU until the next interrupt arrives.
pub fn wait_for_interrupt() {
    imp::wait();
}

/// Runs `f` with interrupts masked, restoring the previous state afterwards.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let were_enabled = are_enabled();
    if were_enabled {
        disable();
    }

    let result = f();

    if were_enabled {
        enable();
    }
    result
}

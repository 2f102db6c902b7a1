use core::sync::atomic::{AtomicU64, Ordering};

use captain_kernel::sync::critical;
use captain_kernel::task;

use super::pic::{self, InterruptIndex};

static TICKS: AtomicU64 = AtomicU64::new(0);

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// IRQ0 body. EOI goes out before `schedule`, which may not return to this
/// frame until the interrupted task is picked again.
pub fn on_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    pic::end_of_interrupt(InterruptIndex::Timer);

    if !critical::is_active() {
        task::schedule();
    }
}

//! # Task Scheduling System
//!
//! Preemptive round-robin multitasking over a fixed table of kernel tasks.
//!
//! # Task Lifecycle
//! 1. `task_create(entry)` claims the next table slot and leaves a synthetic
//!    switch frame on the task's private stack
//! 2. `start_multitasking()` jumps into the first ready task
//! 3. Tasks give up the CPU with `task_yield`/`task_sleep`, or lose it when
//!    the timer interrupt calls `schedule()`
//! 4. When `entry` returns the task is blocked for good and its stack becomes
//!    an idle loop
//!
//! # Locking
//! The table lives behind a `spin::Mutex` that is only taken with interrupts
//! masked, so the timer handler can never spin on a lock held by the task it
//! interrupted. The lock is always released before the stack switch.

mod scheduler;
mod tcb;

use core::convert::Infallible;
use core::sync::atomic::AtomicUsize;

use spin::{Mutex, MutexGuard};

use crate::arch::{context, irq};
use crate::config::SLEEP_SPIN_ITERATIONS;
use crate::errors::TaskError;
use crate::sync::critical;

pub use scheduler::{Scheduler, Transition};
pub use tcb::{TaskEntry, TaskId, TaskState};

static SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());

/// Save slot for a context nobody will resume: the idle loop of a blocked
/// task, once the scheduler has cleared `current`.
static IDLE_CONTEXT: AtomicUsize = AtomicUsize::new(0);

pub fn task_init() {
    irq::without_interrupts(|| SCHEDULER.lock().init());
}

pub fn task_create(entry: TaskEntry) -> Result<TaskId, TaskError> {
    irq::without_interrupts(|| SCHEDULER.lock().create(entry))
}

/// Switches to the next ready task. Safe to call from the timer interrupt.
///
/// Does nothing while a critical section is held.
pub fn schedule() {
    if critical::is_active() {
        return;
    }

    irq::without_interrupts(|| {
        let mut scheduler = SCHEDULER.lock();
        let transition = scheduler.schedule();
        perform(scheduler, transition);
    });
}

pub fn task_yield() {
    if critical::is_active() {
        return;
    }

    irq::without_interrupts(|| {
        let mut scheduler = SCHEDULER.lock();
        let transition = scheduler.yield_now();
        perform(scheduler, transition);
    });
}

/// Yields `ticks` times with a fixed busy-wait in between.
///
/// Best effort only. The delay depends on how many other tasks are ready and
/// on CPU speed; it is not tied to the timer frequency.
pub fn task_sleep(ticks: u32) {
    for _ in 0..ticks {
        task_yield();
        for _ in 0..SLEEP_SPIN_ITERATIONS {
            core::hint::spin_loop();
        }
    }
}

/// Hands the CPU from boot code to the first ready task. Does not return on
/// success.
pub fn start_multitasking() -> Result<Infallible, TaskError> {
    let were_enabled = irq::are_enabled();
    irq::disable();

    let mut scheduler = SCHEDULER.lock();
    match scheduler.start() {
        Ok(id) => {
            let next = scheduler.context(id);
            drop(scheduler);
            log::info!("starting multitasking in task {}", id);
            // SAFETY: `next` is the synthetic frame built by `create`.
            unsafe { context::resume(next) }
        }
        Err(err) => {
            drop(scheduler);
            if were_enabled {
                irq::enable();
            }
            Err(err)
        }
    }
}

pub fn current_task() -> Option<TaskId> {
    irq::without_interrupts(|| SCHEDULER.lock().current())
}

pub fn task_count() -> usize {
    irq::without_interrupts(|| SCHEDULER.lock().task_count())
}

pub fn task_state(id: TaskId) -> Option<TaskState> {
    irq::without_interrupts(|| SCHEDULER.lock().state(id))
}

fn perform(mut scheduler: MutexGuard<'_, Scheduler>, transition: Transition) {
    match transition {
        Transition::Bootstrap(id) => {
            let next = scheduler.context(id);
            drop(scheduler);
            log::info!("bootstrapping task {}", id);
            // SAFETY: first selection; `next` is the frame built by `create`
            // and nothing was running on a task stack before.
            unsafe { context::resume(next) }
        }
        Transition::Switch { from, to } => {
            let save = match from {
                Some(id) => scheduler.context_slot(id),
                None => IDLE_CONTEXT.as_ptr(),
            };
            let next = scheduler.context(to);
            drop(scheduler);
            // SAFETY: interrupts are masked by the caller, `save` points into
            // a static, and `to` was suspended and is now marked running.
            unsafe { context::switch(save, next) }
        }
        Transition::Stay | Transition::Idle | Transition::Resume(_) => {}
    }
}

/// Reached through the trampoline the first time a task is resumed.
/// Arrives with interrupts masked.
extern "C" fn task_bootstrap(raw_id: usize) -> ! {
    let id = TaskId::new(raw_id);
    let entry = SCHEDULER.lock().entry(id);
    irq::enable();

    if let Some(entry) = entry {
        entry();
    }

    irq::without_interrupts(|| SCHEDULER.lock().block(id));
    log::debug!("task {} returned, blocked", id);

    loop {
        schedule();
        irq::wait_for_interrupt();
    }
}

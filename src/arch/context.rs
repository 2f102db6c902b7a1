//! # Context Switching
//!
//! A suspended task is nothing more than a stack pointer. The words at that
//! address are a [`SwitchFrame`]: the callee-saved registers pushed by
//! `captain_switch_context`, followed by the address it will `ret` to.
//!
//! ```text
//!   saved sp ─▶ ┌──────┐ low
//!               │ r15  │
//!               │ r14  │
//!               │ r13  │
//!               │ r12  │
//!               │ rbx  │
//!               │ rbp  │
//!               │ rip  │ ◀─ return address
//!   stack top ─▶└──────┘ high (16-byte aligned)
//! ```
//!
//! A new task gets the same frame written by [`build_initial_frame`], with
//! `rip` pointing at a trampoline that moves `r12` into the first argument
//! register and calls the function held in `r13`. Resuming a fresh task and
//! resuming a preempted one is therefore the same `pop`/`ret` sequence.
//!
//! Caller-saved registers are not part of the frame: a voluntary switch is an
//! ordinary function call, and a timer preemption has already spilled them in
//! the interrupt handler prologue.

use core::arch::global_asm;
use core::mem::size_of;

global_asm!(
    ".pushsection .text",
    ".globl captain_switch_context",
    "captain_switch_context:",
    "    push rbp",
    "    push rbx",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov [rdi], rsp",
    "    mov rsp, rsi",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop rbx",
    "    pop rbp",
    "    ret",
    "",
    ".globl captain_resume_context",
    "captain_resume_context:",
    "    mov rsp, rdi",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop rbx",
    "    pop rbp",
    "    ret",
    "",
    ".globl captain_task_trampoline",
    "captain_task_trampoline:",
    "    mov rdi, r12",
    "    call r13",
    "    ud2",
    ".popsection",
);

extern "C" {
    fn captain_switch_context(save: *mut usize, next: usize);
    fn captain_resume_context(next: usize) -> !;
    fn captain_task_trampoline();
}

/// First code a new task runs, with the argument stored in its frame.
pub type BootstrapFn = extern "C" fn(usize) -> !;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwitchFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rip: u64,
}

impl SwitchFrame {
    /// Frame that starts execution in `bootstrap(arg)` on the owning stack.
    pub fn bootstrap(bootstrap: BootstrapFn, arg: usize) -> Self {
        Self {
            r12: arg as u64,
            r13: bootstrap as usize as u64,
            rip: trampoline_address() as u64,
            ..Self::default()
        }
    }
}

pub fn trampoline_address() -> usize {
    captain_task_trampoline as usize
}

const fn align_down(value: usize, align: usize) -> usize {
    value & !(align - 1)
}

/// Writes `frame` just below the 16-byte aligned top of `stack` and returns
/// the stack pointer a later [`switch`] or [`resume`] must be given.
pub fn build_initial_frame(stack: &mut [u8], frame: SwitchFrame) -> usize {
    let base = stack.as_mut_ptr() as usize;
    let top = align_down(base + stack.len(), 16);
    let sp = top - size_of::<SwitchFrame>();
    assert!(sp >= base, "stack too small for a switch frame");

    // SAFETY: `sp..top` lies inside `stack` and is 8-byte aligned.
    unsafe {
        (sp as *mut SwitchFrame).write(frame);
    }
    sp
}

/// Reads back the frame a suspended stack pointer refers to.
///
/// # Safety
/// `sp` must come from [`build_initial_frame`] or a completed [`switch`], and
/// the stack it points into must still be alive.
pub unsafe fn read_frame(sp: usize) -> SwitchFrame {
    (sp as *const SwitchFrame).read()
}

/// Saves the running context into `*save` and resumes the one at `next`.
/// Returns when something switches back to the saved context.
///
/// # Safety
/// Interrupts must be masked, `save` must stay valid until this context is
/// resumed, and `next` must be a suspended stack pointer that nothing else
/// will resume concurrently.
pub unsafe fn switch(save: *mut usize, next: usize) {
    captain_switch_context(save, next);
}

/// Abandons the current stack and resumes the context at `next`.
///
/// # Safety
/// Same requirements on `next` as [`switch`].
pub unsafe fn resume(next: usize) -> ! {
    captain_resume_context(next)
}

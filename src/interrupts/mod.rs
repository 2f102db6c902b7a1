//! # Interrupt Handling
//!
//! - **GDT**: Global Descriptor Table with a TSS for the double fault stack
//! - **IDT**: exception handlers plus the timer
//! - **PIC**: 8259 remapping and end-of-interrupt
//! - **Timer**: tick counting and the preemption hook into the scheduler
//!
//! | Vector | Type           | Handler                 |
//! |--------|----------------|-------------------------|
//! | 0-31   | CPU Exceptions | divide, page fault, etc |
//! | 32     | Timer (IRQ0)   | timer_interrupt_handler |

pub mod gdt;
pub mod idt;
pub mod pic;
pub mod timer;

/// Loads the descriptor tables and remaps the PICs. Interrupts stay masked;
/// the first task enables them when it is bootstrapped.
pub fn init() {
    gdt::init();
    idt::init_idt();
    pic::init();
}

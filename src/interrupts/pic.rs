//! # Programmable Interrupt Controller (8259 PIC)
//!
//! The two chained PICs are remapped so their IRQs stop colliding with CPU
//! exception vectors:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! Only IRQ0, the timer, is unmasked. It is the one preemption source the
//! scheduler consumes.

use pic8259::ChainedPics;
use spin::Mutex;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = 40;

/// Every line masked except IRQ0
const PIC_1_MASK: u8 = !0x01;
const PIC_2_MASK: u8 = 0xFF;

pub static PICS: Mutex<ChainedPics> =
    Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

#[derive(Debug, Clone, Copy)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET, // 32 - IRQ0
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

pub fn init() {
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        pics.write_masks(PIC_1_MASK, PIC_2_MASK);
    }
}

pub fn end_of_interrupt(index: InterruptIndex) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(index.as_u8());
    }
}

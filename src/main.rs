#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

extern crate rlibc;

use bootloader_api::{entry_point, BootInfo};
use core::fmt::{self, Write};
use core::panic::PanicInfo;
use spin::Mutex;
use uart_16550::SerialPort;

use crate::kernel::init_kernel;

mod demo;
mod interrupts;
mod kernel;
mod logging;

entry_point!(kernel_main);

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        captain_kernel::arch::irq::without_interrupts(|| {
            let mut serial = $crate::SERIAL.lock();
            let _ = writeln!(serial, $($arg)*);
        });
    }};
}

/// Serial sink for `fmt::Write` consumers, taking the port per write.
pub struct Console;

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        captain_kernel::arch::irq::without_interrupts(|| SERIAL.lock().write_str(s))
    }
}

pub fn kernel_main(_boot_info: &'static mut BootInfo) -> ! {
    SERIAL.lock().init();
    logging::init();

    if let Err(e) = init_kernel() {
        println!("Kernel initialization failed: {}", e);
        loop_arch_mm();
    }

    demo::show_filesystem();

    if let Err(e) = demo::spawn_tasks() {
        log::error!("could not create demo tasks: {}", e);
        loop_arch_mm();
    }

    match captain_kernel::task::start_multitasking() {
        Ok(never) => match never {},
        Err(e) => {
            log::error!("multitasking did not start: {}", e);
            loop {
                captain_kernel::arch::irq::wait_for_interrupt();
            }
        }
    }
}

fn loop_arch_mm() -> ! {
    loop {
        unsafe {
            core::arch::x86_64::_mm_pause();
        }
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    // the panic may have struck while the port was held
    unsafe { SERIAL.force_unlock() };

    let msg = info.message();
    let loc = info.location();
    println!("PANIC : {} | {:?}", msg, loc);

    loop_arch_mm()
}

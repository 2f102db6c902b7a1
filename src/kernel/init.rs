//! Kernel initialization phases
use captain_kernel::{fs, task};

use crate::println;

const PHASES: &[(&str, fn() -> Result<(), &'static str>)] = &[
    ("Interrupt System", init_interrupts),
    ("Filesystem", init_filesystem),
    ("Task Scheduler", init_tasks),
];

/// Runs every phase in order, stopping at the first failure.
pub fn init_kernel() -> Result<(), &'static str> {
    println!("╔════════════════════════════════════════╗");
    println!("║     CAPTAIN-OS Kernel Initialization   ║");
    println!("╚════════════════════════════════════════╝\n");

    for (index, &(name, init_fn)) in PHASES.iter().enumerate() {
        init_phase(index + 1, name, init_fn)?;
    }

    println!("\n✅ Kernel initialization complete!\n");
    Ok(())
}

fn init_phase(
    number: usize,
    name: &'static str,
    init_fn: fn() -> Result<(), &'static str>,
) -> Result<(), &'static str> {
    println!("[{}/{}] Initializing {}...", number, PHASES.len(), name);

    match init_fn() {
        Ok(()) => {
            println!("    ✓ {} initialized successfully\n", name);
            Ok(())
        }
        Err(e) => {
            println!("    ✗ {} failed: {}\n", name, e);
            Err(e)
        }
    }
}

fn init_interrupts() -> Result<(), &'static str> {
    crate::interrupts::init();
    Ok(())
}

fn init_filesystem() -> Result<(), &'static str> {
    fs::fs_init().map_err(|_| "could not format the filesystem")?;
    fs::fs_install_welcome_files().map_err(|_| "could not seed the welcome files")?;
    fs::fs_verify().map_err(|_| "filesystem failed verification")
}

fn init_tasks() -> Result<(), &'static str> {
    task::task_init();
    Ok(())
}

//! Boot-time workload: a look at the seeded filesystem and a few tasks that
//! exercise yielding, sleeping, timer preemption and guarded filesystem use.

use core::fmt::Write;

use captain_kernel::fs;
use captain_kernel::task::{self, TaskEntry};
use captain_kernel::TaskError;

use crate::interrupts::timer;
use crate::{println, Console};

const TASKS: &[TaskEntry] = &[counter_task, journal_task, spinner_task];

const JOURNAL: &str = "/docs/journal";

pub fn show_filesystem() {
    if let Err(e) = fs::fs_list("/", &mut Console) {
        log::warn!("listing / failed: {}", e);
    }
    match fs::fs_stats() {
        Ok(stats) => println!("{}\n", stats),
        Err(e) => log::warn!("filesystem stats unavailable: {}", e),
    }
}

pub fn spawn_tasks() -> Result<(), TaskError> {
    for &entry in TASKS {
        task::task_create(entry)?;
    }
    log::info!("{} demo tasks ready", task::task_count());
    Ok(())
}

/// Cooperative: counts to ten, yielding after every step, then returns.
fn counter_task() {
    for i in 1..=10 {
        println!("[counter] step {}/10", i);
        task::task_yield();
    }
    println!("[counter] done");
}

/// Keeps rewriting a file and reading it back between naps.
fn journal_task() {
    if let Err(e) = fs::fs_create_file(JOURNAL) {
        log::error!("journal: cannot create {}: {}", JOURNAL, e);
        return;
    }

    let mut line = Line::new();
    let mut buf = [0u8; 64];
    for round in 1..=5u32 {
        line.clear();
        let _ = write!(line, "round {} at tick {}", round, timer::ticks());

        let result = fs::fs_write(JOURNAL, line.as_bytes())
            .and_then(|()| fs::fs_read(JOURNAL, &mut buf));
        match result {
            Ok(len) => println!(
                "[journal] {}",
                core::str::from_utf8(&buf[..len]).unwrap_or("<binary>")
            ),
            Err(e) => log::warn!("journal: round {} failed: {}", round, e),
        }
        task::task_sleep(3);
    }

    match fs::fs_verify() {
        Ok(()) => println!("[journal] filesystem consistent"),
        Err(e) => log::error!("journal: {}", e),
    }
}

/// Never yields. Only the timer interrupt takes the CPU away from it.
fn spinner_task() {
    let mut last = timer::ticks();
    let mut reports = 0;
    while reports < 5 {
        let now = timer::ticks();
        if now >= last + 18 {
            reports += 1;
            last = now;
            println!("[spinner] still running at tick {}", now);
        }
        core::hint::spin_loop();
    }
}

/// Small stack buffer for formatting one journal line.
struct Line {
    len: usize,
    bytes: [u8; 48],
}

impl Line {
    fn new() -> Self {
        Self { len: 0, bytes: [0; 48] }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let end = self.len + s.len();
        if end > self.bytes.len() {
            return Err(core::fmt::Error);
        }
        self.bytes[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

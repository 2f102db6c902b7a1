//! # Captain Kernel Core
//!
//! The two subsystems the rest of the kernel drives:
//!
//! - `task`: fixed table of task control blocks, round-robin scheduler and
//!   the stack-switching engine behind cooperative and timer preemption
//! - `fs`: in-memory block filesystem with a chain table ("FAT") and a
//!   hierarchical directory tree
//!
//! Both are serialised against timer preemption by `sync::critical`.
//!
//! The crate is `no_std` on the kernel target. Under `cargo test` it links
//! `std` so the scheduler decisions and the filesystem can be exercised on the
//! host; everything that touches the CPU goes through `arch`.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod errors;
pub mod fs;
pub mod sync;
pub mod task;

pub use errors::{FsError, FsResult, TaskError};

/// Serialises tests that touch the global task table, filesystem or guard flag.
#[cfg(test)]
pub(crate) static GLOBAL_STATE_LOCK: spin::Mutex<()> = spin::Mutex::new(());

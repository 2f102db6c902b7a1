//! Synchronisation primitives shared by the scheduler and the filesystem.

pub mod critical;

pub use critical::CriticalSection;

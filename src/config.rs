//! Compile-time sizing of the kernel core.

/// Total size of the filesystem backing store in bytes
pub const FS_SIZE: usize = 64 * 1024;
/// Size of one data block
pub const BLOCK_SIZE: usize = 512;
/// Number of blocks, and of chain table links. Block 0 is reserved
pub const BLOCK_COUNT: usize = FS_SIZE / BLOCK_SIZE;
/// Entry slots in the superblock, root included
pub const MAX_ENTRIES: usize = 32;
/// Longest file or directory name in bytes
pub const NAME_MAX: usize = 11;
/// Child slots held by one directory block
pub const DIR_SLOTS_PER_BLOCK: usize = 16;
/// Bytes per directory child slot (little-endian entry index)
pub const DIR_SLOT_SIZE: usize = 2;
/// Longest normalised path handled by `fs::path::PathBuf`
pub const PATH_MAX: usize = 256;
/// Superblock tag written by `fs_init`
pub const FS_MAGIC: u32 = 0xCAFE;

pub const MAX_TASKS: usize = 10;
pub const TASK_STACK_SIZE: usize = 16 * 1024;
/// Busy-wait iterations between the yields of `task_sleep`
pub const SLEEP_SPIN_ITERATIONS: usize = 10_000;

const _: () = assert!(DIR_SLOTS_PER_BLOCK * DIR_SLOT_SIZE <= BLOCK_SIZE);
const _: () = assert!(BLOCK_COUNT < u16::MAX as usize);
const _: () = assert!(MAX_ENTRIES < u16::MAX as usize);
const _: () = assert!(TASK_STACK_SIZE % 16 == 0);

//! # In-memory Filesystem
//!
//! A single fixed-size store laid out as `[superblock][chain table][data]`:
//!
//! - the superblock holds the magic tag and a flat table of entries
//! - the chain table holds one [`Link`] per data block, FAT style
//! - the data area holds file bytes and directory child slots
//!
//! Entries form a tree rooted at the one entry without a parent. Files and
//! directories each own a single chain of blocks.
//!
//! The `fs_*` functions operate on the kernel's global instance. Every one of
//! them, reads included, runs inside a [`CriticalSection`] so a timer tick
//! cannot switch tasks halfway through a chain update.

use core::fmt;

use spin::Mutex;

use crate::config::{BLOCK_COUNT, BLOCK_SIZE};
use crate::errors::{FsError, FsResult};
use crate::sync::CriticalSection;

mod chain;
mod directory;
mod entry;
mod file;
mod listing;
pub mod path;
mod superblock;

pub use chain::{BlockId, ChainTable, Link};
pub use directory::Lookup;
pub use entry::{Entry, EntryId, EntryKind, Name};
pub use listing::FsStats;
pub use path::PathBuf;

use superblock::Superblock;

const WELCOME_FILES: &[(&str, &str)] = &[
    (
        "/welcome.txt",
        "Welcome to CAPTAIN-OS!\nIn-memory filesystem with directories and preemptive tasks.",
    ),
    (
        "/readme.txt",
        "CAPTAIN-OS\nFeatures: round-robin multitasking, FAT style filesystem\nType 'help' for commands.",
    ),
    (
        "/docs/manual.txt",
        "CAPTAIN-OS Manual\n\nBasic Commands:\nls - list files\ncat - read file\nhelp - show help\nstatus - system info",
    ),
];

pub struct Filesystem {
    superblock: Superblock,
    chain: ChainTable,
    data: [[u8; BLOCK_SIZE]; BLOCK_COUNT],
}

impl Filesystem {
    /// An unformatted store. Everything but [`Filesystem::format`] fails
    /// with `NotInitialized` until it is formatted.
    pub const fn new() -> Self {
        Self {
            superblock: Superblock::new(),
            chain: ChainTable::new(),
            data: [[0; BLOCK_SIZE]; BLOCK_COUNT],
        }
    }

    /// Wipes the store and creates an empty root directory.
    pub fn format(&mut self) -> FsResult<()> {
        self.superblock.format();
        self.chain.reset();
        for block in self.data.iter_mut() {
            block.fill(0);
        }

        let root_block = self.chain.allocate()?;
        self.clear_slots(root_block);
        let root = EntryId::new(0).ok_or(FsError::Corrupted)?;
        self.superblock.insert(
            root,
            Entry {
                name: Name::new("root")?,
                parent: None,
                kind: EntryKind::Directory {
                    children: Some(root_block),
                },
            },
        );

        log::info!(
            "fs: formatted {} blocks of {} bytes, {} free",
            BLOCK_COUNT,
            BLOCK_SIZE,
            self.chain.free_blocks()
        );
        Ok(())
    }

    pub fn is_formatted(&self) -> bool {
        self.superblock.is_formatted()
    }

    /// Seeds the files the boot console shows on first start.
    pub fn install_welcome_files(&mut self) -> FsResult<()> {
        for (path, contents) in WELCOME_FILES {
            if let Some((parent, _)) = path::split_last(path) {
                if !parent.is_empty() {
                    self.create_directory(parent)?;
                }
            }
            self.create_file(path)?;
            self.write(path, contents.as_bytes())?;
        }
        Ok(())
    }

    /// Full scan of the store, failing on the first structural violation.
    pub fn verify(&self) -> FsResult<()> {
        self.ensure_formatted()?;

        if !self.chain.links()[0].is_free() {
            return Err(corrupted("reserved block 0 is allocated"));
        }

        let mut roots = 0;
        let mut owners: [Option<EntryId>; BLOCK_COUNT] = [None; BLOCK_COUNT];
        let mut owned_blocks = 0;
        for (id, entry) in self.superblock.iter() {
            if let Some(first) = entry.first_block() {
                owned_blocks += self.claim_chain(id, first, &mut owners)?;
            }

            let Some(parent) = entry.parent else {
                roots += 1;
                continue;
            };
            let parent_chain = match self.superblock.get(parent).map(|dir| dir.kind) {
                Some(EntryKind::Directory { children }) => children,
                _ => return Err(corrupted("parent is not a live directory")),
            };
            if self.children(parent_chain).filter(|&child| child == id).count() != 1 {
                return Err(corrupted("entry is not listed exactly once in its parent"));
            }
        }
        if roots != 1 {
            return Err(corrupted("root directory is missing or duplicated"));
        }

        for (id, entry) in self.superblock.iter() {
            if let EntryKind::Directory { children } = entry.kind {
                let orphan = self.children(children).any(|child| {
                    self.superblock
                        .get(child)
                        .map_or(true, |listed| listed.parent != Some(id))
                });
                if orphan {
                    return Err(corrupted("directory lists an entry that is not its child"));
                }
            }
        }

        if self.superblock.iter().count() != self.superblock.entry_count as usize {
            return Err(corrupted("entry count out of sync"));
        }
        let scanned = self.chain.scan_used();
        if scanned != self.chain.used_blocks() || scanned != owned_blocks {
            return Err(corrupted("used block count out of sync"));
        }
        Ok(())
    }

    /// Marks every block of a chain as owned by `owner`. A block claimed
    /// twice means two owners or a cycle.
    fn claim_chain(
        &self,
        owner: EntryId,
        first: BlockId,
        owners: &mut [Option<EntryId>; BLOCK_COUNT],
    ) -> FsResult<usize> {
        let mut block = first;
        let mut claimed = 0;
        loop {
            let slot = &mut owners[block.as_usize()];
            if slot.is_some() {
                return Err(corrupted("block shared between chains"));
            }
            *slot = Some(owner);
            claimed += 1;

            match self.chain.get(block) {
                Link::Free => return Err(corrupted("chain runs into a free block")),
                Link::Terminal => return Ok(claimed),
                Link::Next(next) => block = next,
            }
        }
    }

    fn ensure_formatted(&self) -> FsResult<()> {
        if self.superblock.is_formatted() {
            Ok(())
        } else {
            Err(FsError::NotInitialized)
        }
    }

    fn entry(&self, id: EntryId) -> FsResult<&Entry> {
        self.superblock.get(id).ok_or(FsError::Corrupted)
    }
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

fn corrupted(reason: &str) -> FsError {
    log::error!("fs: verify failed: {}", reason);
    FsError::Corrupted
}

static FILESYSTEM: Mutex<Filesystem> = Mutex::new(Filesystem::new());

fn with_filesystem<R>(f: impl FnOnce(&mut Filesystem) -> FsResult<R>) -> FsResult<R> {
    let _section = CriticalSection::enter();
    let mut fs = FILESYSTEM.lock();
    f(&mut fs)
}

/// Formats the global filesystem, leaving only an empty root.
pub fn fs_init() -> FsResult<()> {
    with_filesystem(Filesystem::format)
}

pub fn fs_install_welcome_files() -> FsResult<()> {
    with_filesystem(Filesystem::install_welcome_files)
}

/// Creates an empty file. An existing entry at `path` counts as success.
pub fn fs_create_file(path: &str) -> FsResult<()> {
    with_filesystem(|fs| fs.create_file(path).map(drop))
}

/// Creates a directory. An existing entry at `path` counts as success.
pub fn fs_create_directory(path: &str) -> FsResult<()> {
    with_filesystem(|fs| fs.create_directory(path).map(drop))
}

/// Removes a file or an empty directory.
pub fn fs_delete(path: &str) -> FsResult<()> {
    with_filesystem(|fs| fs.delete(path))
}

pub fn fs_write(path: &str, data: &[u8]) -> FsResult<()> {
    with_filesystem(|fs| fs.write(path, data))
}

/// Reads into `buf` and NUL-terminates; returns the number of data bytes.
pub fn fs_read(path: &str, buf: &mut [u8]) -> FsResult<usize> {
    with_filesystem(|fs| fs.read(path, buf))
}

pub fn fs_list(path: &str, out: &mut impl fmt::Write) -> FsResult<()> {
    with_filesystem(|fs| fs.list(path, out))
}

pub fn fs_stats() -> FsResult<FsStats> {
    with_filesystem(|fs| fs.stats())
}

pub fn fs_verify() -> FsResult<()> {
    with_filesystem(|fs| fs.verify())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_ENTRIES, NAME_MAX};
    use crate::GLOBAL_STATE_LOCK;
    use proptest::prelude::*;

    fn formatted() -> Box<Filesystem> {
        let mut fs = Box::new(Filesystem::new());
        fs.format().unwrap();
        fs
    }

    fn read_string(fs: &Filesystem, path: &str) -> String {
        let mut buf = [0u8; 1024];
        let len = fs.read(path, &mut buf).unwrap();
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_unformatted_store_is_rejected() {
        let mut fs = Box::new(Filesystem::new());
        assert_eq!(fs.create_file("/a"), Err(FsError::NotInitialized));
        assert_eq!(fs.stats(), Err(FsError::NotInitialized));
        assert_eq!(fs.verify(), Err(FsError::NotInitialized));
    }

    #[test]
    fn test_format_leaves_empty_root() {
        let fs = formatted();
        let stats = fs.stats().unwrap();
        assert_eq!(stats.directory_count, 1);
        assert_eq!(stats.file_count, 0);
        assert_eq!(stats.used_blocks, 1);
        assert_eq!(stats.free_blocks, BLOCK_COUNT - 2);
        assert_eq!(fs.resolve("/"), Ok(Lookup::Found { entry: EntryId::new(0).unwrap(), parent: None }));
        assert_eq!(fs.resolve(""), fs.resolve("/"));
        fs.verify().unwrap();
    }

    #[test]
    fn test_docs_scenario() {
        let _lock = GLOBAL_STATE_LOCK.lock();

        fs_init().unwrap();
        fs_create_directory("/docs").unwrap();
        fs_create_file("/docs/a.txt").unwrap();
        fs_write("/docs/a.txt", b"hi").unwrap();

        let mut buf = [0xAAu8; 16];
        assert_eq!(fs_read("/docs/a.txt", &mut buf), Ok(2));
        assert_eq!(&buf[..3], b"hi\0");

        assert_eq!(fs_delete("/docs"), Err(FsError::DirectoryNotEmpty));
        fs_delete("/docs/a.txt").unwrap();
        fs_delete("/docs").unwrap();

        assert_eq!(fs_read("/docs/a.txt", &mut buf), Err(FsError::NotFound));
        fs_verify().unwrap();
        assert!(!crate::sync::critical::is_active());
    }

    /// Sink that records whether every write happened under the guard with
    /// interrupts masked.
    struct GuardedSink {
        writes: usize,
        unguarded: usize,
    }

    impl fmt::Write for GuardedSink {
        fn write_str(&mut self, _s: &str) -> fmt::Result {
            self.writes += 1;
            if !crate::sync::critical::is_active() || crate::arch::irq::are_enabled() {
                self.unguarded += 1;
            }
            Ok(())
        }
    }

    #[test]
    fn test_global_calls_hold_the_guard() {
        let _lock = GLOBAL_STATE_LOCK.lock();
        crate::arch::irq::enable();

        fs_init().unwrap();
        fs_create_file("/a.txt").unwrap();

        let mut sink = GuardedSink { writes: 0, unguarded: 0 };
        fs_list("/", &mut sink).unwrap();
        assert!(sink.writes > 0);
        assert_eq!(sink.unguarded, 0);

        let masked = with_filesystem(|fs| {
            let masked = crate::sync::critical::is_active() && !crate::arch::irq::are_enabled();
            fs.write("/a.txt", b"guarded").map(|()| masked)
        });
        assert_eq!(masked, Ok(true));

        assert!(!crate::sync::critical::is_active());
        assert!(crate::arch::irq::are_enabled());
        crate::arch::irq::disable();
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut fs = formatted();
        let first = fs.create_file("/notes").unwrap();
        assert_eq!(fs.create_file("/notes"), Ok(first));
        assert_eq!(fs.create_directory("//notes/"), Ok(first));
        assert_eq!(fs.stats().unwrap().file_count, 1);
    }

    #[test]
    fn test_create_validates_parent_and_name() {
        let mut fs = formatted();
        fs.create_file("/plain").unwrap();

        assert_eq!(fs.create_file("/missing/a"), Err(FsError::NotFound));
        assert_eq!(fs.create_file("/plain/a"), Err(FsError::NotADirectory));
        let long = "n".repeat(NAME_MAX + 1);
        assert_eq!(fs.create_file(&format!("/{}", long)), Err(FsError::NameTooLong));
        assert_eq!(fs.create_directory("/."), Err(FsError::InvalidName));
        fs.verify().unwrap();
    }

    #[test]
    fn test_descending_through_a_file_fails() {
        let mut fs = formatted();
        fs.create_file("/plain").unwrap();
        assert_eq!(fs.resolve("/plain/deeper/still"), Err(FsError::NotADirectory));
    }

    #[test]
    fn test_entry_table_fills_up() {
        let mut fs = formatted();
        for i in 0..MAX_ENTRIES - 1 {
            fs.create_file(&format!("/f{}", i)).unwrap();
        }
        assert_eq!(fs.create_file("/one_more"), Err(FsError::TableFull));
        assert_eq!(fs.stats().unwrap().file_count, MAX_ENTRIES - 1);
        fs.verify().unwrap();
    }

    #[test]
    fn test_delete_rules() {
        let mut fs = formatted();
        assert_eq!(fs.delete("/"), Err(FsError::IsRoot));
        assert_eq!(fs.delete("/nothing"), Err(FsError::NotFound));

        fs.create_directory("/docs").unwrap();
        fs.create_file("/docs/a.txt").unwrap();
        fs.write("/docs/a.txt", &[1; 700]).unwrap();

        let before = fs.stats().unwrap();
        assert_eq!(fs.delete("/docs"), Err(FsError::DirectoryNotEmpty));
        assert_eq!(fs.stats().unwrap(), before);
        assert_eq!(fs.read("/docs/a.txt", &mut [0; 701]), Ok(700));

        fs.delete("/docs/a.txt").unwrap();
        fs.delete("/docs").unwrap();
        assert_eq!(fs.stats().unwrap().used_blocks, 1);
        fs.verify().unwrap();
    }

    #[test]
    fn test_read_edge_cases() {
        let mut fs = formatted();
        fs.create_directory("/dir").unwrap();
        fs.create_file("/f").unwrap();
        fs.write("/f", b"abcdef").unwrap();

        assert_eq!(fs.read("/f", &mut []), Err(FsError::InvalidArgument));
        assert_eq!(fs.read("/dir", &mut [0; 8]), Err(FsError::IsADirectory));
        assert_eq!(fs.write("/dir", b"x"), Err(FsError::IsADirectory));

        let mut small = [0xFFu8; 4];
        assert_eq!(fs.read("/f", &mut small), Ok(3));
        assert_eq!(&small, b"abc\0");

        fs.write("/f", b"").unwrap();
        assert_eq!(fs.read("/f", &mut small), Ok(0));
        assert_eq!(small[0], 0);
        assert_eq!(fs.stats().unwrap().used_blocks, 2);
    }

    #[test]
    fn test_write_replaces_and_spans_blocks() {
        let mut fs = formatted();
        fs.create_file("/f").unwrap();

        let data: Vec<u8> = (0..3 * BLOCK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        fs.write("/f", &data).unwrap();
        assert_eq!(fs.stats().unwrap().used_blocks, 1 + 4);

        fs.write("/f", b"short").unwrap();
        assert_eq!(fs.stats().unwrap().used_blocks, 1 + 1);
        assert_eq!(read_string(&fs, "/f"), "short");
        fs.verify().unwrap();
    }

    #[test]
    fn test_write_rolls_back_when_out_of_space() {
        let mut fs = formatted();
        fs.create_file("/keep").unwrap();
        fs.write("/keep", b"kept").unwrap();
        fs.create_file("/big").unwrap();
        fs.write("/big", b"old contents").unwrap();

        let free_before = fs.stats().unwrap().free_blocks;
        let too_big = vec![7u8; (free_before + 2) * BLOCK_SIZE];
        assert_eq!(fs.write("/big", &too_big), Err(FsError::NoSpace));

        let stats = fs.stats().unwrap();
        // the old contents were released before the attempt
        assert_eq!(stats.free_blocks, free_before + 1);
        assert_eq!(fs.read("/big", &mut [0; 8]), Ok(0));
        assert_eq!(read_string(&fs, "/keep"), "kept");
        fs.verify().unwrap();

        let mut reacquired = 0;
        while fs.chain.allocate().is_ok() {
            reacquired += 1;
        }
        assert_eq!(reacquired, stats.free_blocks);
    }

    #[test]
    fn test_directory_grows_past_one_block() {
        let mut fs = formatted();
        let count = crate::config::DIR_SLOTS_PER_BLOCK + 4;
        for i in 0..count {
            fs.create_file(&format!("/f{}", i)).unwrap();
        }

        let root = fs.directory_chain(fs.find("/").unwrap()).unwrap();
        assert_eq!(fs.chain.chain(root).count(), 2);
        assert_eq!(fs.children(root).count(), count);

        for i in 0..count {
            fs.delete(&format!("/f{}", i)).unwrap();
        }
        assert_eq!(fs.children(root).count(), 0);
        // slot blocks stay with the directory
        assert_eq!(fs.chain.chain(root).count(), 2);
        fs.verify().unwrap();
    }

    #[test]
    fn test_listing_format() {
        let mut fs = formatted();
        let mut out = String::new();
        fs.list("/", &mut out).unwrap();
        assert_eq!(out, "Directory listing for /:\n  (empty)\nTotal: 0 entries\n");

        fs.create_directory("/docs").unwrap();
        fs.create_file("/a.txt").unwrap();
        fs.write("/a.txt", b"hello").unwrap();

        out.clear();
        fs.list("", &mut out).unwrap();
        assert_eq!(
            out,
            "Directory listing for /:\n  docs/ (DIR)\n  a.txt (5 bytes)\nTotal: 2 entries\n"
        );
        assert_eq!(fs.list("/a.txt", &mut out), Err(FsError::NotADirectory));
    }

    #[test]
    fn test_welcome_files() {
        let mut fs = formatted();
        fs.install_welcome_files().unwrap();

        let stats = fs.stats().unwrap();
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.directory_count, 2);
        assert!(read_string(&fs, "/docs/manual.txt").starts_with("CAPTAIN-OS Manual"));
        fs.verify().unwrap();
    }

    #[test]
    fn test_verify_catches_shared_blocks() {
        let mut fs = formatted();
        fs.create_file("/a").unwrap();
        fs.create_file("/b").unwrap();
        fs.write("/a", b"a").unwrap();
        fs.write("/b", b"b").unwrap();
        fs.verify().unwrap();

        let a = fs.entry(fs.find("/a").unwrap()).unwrap().first_block().unwrap();
        let b = fs.entry(fs.find("/b").unwrap()).unwrap().first_block().unwrap();
        fs.chain.link(a, b);
        assert_eq!(fs.verify(), Err(FsError::Corrupted));
    }

    #[derive(Clone, Debug)]
    enum Op {
        File(String),
        Directory(String),
        Delete(String),
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 1..=3)
            .prop_map(|parts| format!("/{}", parts.join("/")))
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            path_strategy().prop_map(Op::File),
            path_strategy().prop_map(Op::Directory),
            path_strategy().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn prop_entries_stay_a_tree(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut fs = formatted();
            for op in &ops {
                let _ = match op {
                    Op::File(path) => fs.create_file(path).map(drop),
                    Op::Directory(path) => fs.create_directory(path).map(drop),
                    Op::Delete(path) => fs.delete(path),
                };
                prop_assert_eq!(fs.verify(), Ok(()));
            }

            let stats = fs.stats().unwrap();
            prop_assert_eq!(stats.used_blocks + stats.free_blocks, BLOCK_COUNT - 1);
        }

        #[test]
        fn prop_write_then_read_returns_data(
            data in prop::collection::vec(any::<u8>(), 0..=(BLOCK_COUNT - 2) * BLOCK_SIZE)
        ) {
            let mut fs = formatted();
            fs.create_file("/data").unwrap();
            fs.write("/data", &data).unwrap();

            let mut buf = vec![0u8; data.len() + 1];
            prop_assert_eq!(fs.read("/data", &mut buf), Ok(data.len()));
            prop_assert_eq!(&buf[..data.len()], &data[..]);
            prop_assert_eq!(buf[data.len()], 0);
            prop_assert_eq!(fs.verify(), Ok(()));
        }
    }
}

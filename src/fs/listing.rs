use core::fmt;

use crate::errors::{FsError, FsResult};

use super::chain::BlockId;
use super::entry::EntryKind;
use super::Filesystem;

/// Usage snapshot of the whole filesystem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FsStats {
    pub file_count: usize,
    pub directory_count: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    /// Sum of file sizes in bytes
    pub total_bytes: usize,
}

impl fmt::Display for FsStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files: {}", self.file_count)?;
        writeln!(f, "Directories: {}", self.directory_count)?;
        writeln!(f, "Used blocks: {}", self.used_blocks)?;
        writeln!(f, "Free blocks: {}", self.free_blocks)?;
        write!(f, "Total size: {} bytes", self.total_bytes)
    }
}

impl Filesystem {
    /// Writes a listing of the directory at `path` to `out`.
    pub fn list(&self, path: &str, out: &mut impl fmt::Write) -> FsResult<()> {
        let dir = self.find(path)?;
        let first = self.directory_chain(dir)?;

        let shown = if path.is_empty() { "/" } else { path };
        self.write_listing(shown, first, out)
            .map_err(|_| FsError::InvalidArgument)
    }

    fn write_listing(&self, shown: &str, first: Option<BlockId>, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "Directory listing for {}:", shown)?;

        let mut count = 0;
        for child in self.children(first) {
            let Some(entry) = self.superblock.get(child) else {
                continue;
            };
            match entry.kind {
                EntryKind::Directory { .. } => writeln!(out, "  {}/ (DIR)", entry.name)?,
                EntryKind::File { size, .. } => writeln!(out, "  {} ({} bytes)", entry.name, size)?,
            }
            count += 1;
        }
        if count == 0 {
            writeln!(out, "  (empty)")?;
        }
        writeln!(out, "Total: {} entries", count)
    }

    pub fn stats(&self) -> FsResult<FsStats> {
        self.ensure_formatted()?;

        let mut stats = FsStats {
            used_blocks: self.chain.used_blocks(),
            free_blocks: self.chain.free_blocks(),
            ..FsStats::default()
        };
        for (_, entry) in self.superblock.iter() {
            match entry.kind {
                EntryKind::Directory { .. } => stats.directory_count += 1,
                EntryKind::File { size, .. } => {
                    stats.file_count += 1;
                    stats.total_bytes += size as usize;
                }
            }
        }
        Ok(stats)
    }
}

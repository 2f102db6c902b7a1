use crate::config::BLOCK_SIZE;
use crate::errors::{FsError, FsResult};

use super::chain::BlockId;
use super::entry::{EntryId, EntryKind};
use super::Filesystem;

impl Filesystem {
    /// Replaces the contents of the file at `path` with `data`.
    ///
    /// On `NoSpace` every block taken for the new contents is released and
    /// the file is left empty.
    pub fn write(&mut self, path: &str, data: &[u8]) -> FsResult<()> {
        let id = self.find(path)?;
        let old = self.file_chain(id)?;

        if let Some(first) = old {
            self.chain.free_chain(first);
        }
        self.set_contents(id, 0, None)?;
        if data.is_empty() {
            return Ok(());
        }

        let mut head: Option<BlockId> = None;
        let mut tail: Option<BlockId> = None;
        for segment in data.chunks(BLOCK_SIZE) {
            let block = match self.chain.allocate() {
                Ok(block) => block,
                Err(err) => {
                    let freed = head.map_or(0, |first| self.chain.free_chain(first));
                    log::warn!("fs: write of {} bytes to {} failed, released {} blocks", data.len(), path, freed);
                    return Err(err);
                }
            };

            match tail {
                Some(prev) => self.chain.link(prev, block),
                None => head = Some(block),
            }
            tail = Some(block);

            let dst = &mut self.data[block.as_usize()];
            dst[..segment.len()].copy_from_slice(segment);
            dst[segment.len()..].fill(0);
        }

        self.set_contents(id, data.len() as u32, head)
    }

    /// Copies the file into `buf` and appends a NUL terminator, so at most
    /// `buf.len() - 1` bytes of data are returned.
    pub fn read(&self, path: &str, buf: &mut [u8]) -> FsResult<usize> {
        let id = self.find(path)?;
        if buf.is_empty() {
            return Err(FsError::InvalidArgument);
        }

        let (size, first) = match self.entry(id)?.kind {
            EntryKind::File { size, chain } => (size as usize, chain),
            EntryKind::Directory { .. } => return Err(FsError::IsADirectory),
        };

        let wanted = size.min(buf.len() - 1);
        let mut copied = 0;
        for block in self.chain.chain(first) {
            if copied == wanted {
                break;
            }
            let count = (wanted - copied).min(BLOCK_SIZE);
            buf[copied..copied + count].copy_from_slice(&self.data[block.as_usize()][..count]);
            copied += count;
        }

        buf[copied] = 0;
        Ok(copied)
    }

    fn file_chain(&self, id: EntryId) -> FsResult<Option<BlockId>> {
        match self.entry(id)?.kind {
            EntryKind::File { chain, .. } => Ok(chain),
            EntryKind::Directory { .. } => Err(FsError::IsADirectory),
        }
    }

    fn set_contents(&mut self, id: EntryId, size: u32, chain: Option<BlockId>) -> FsResult<()> {
        let entry = self.superblock.get_mut(id).ok_or(FsError::Corrupted)?;
        entry.kind = EntryKind::File { size, chain };
        Ok(())
    }
}

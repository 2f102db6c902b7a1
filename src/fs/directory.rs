//! Directory tree: path resolution and child-slot bookkeeping.
//!
//! A directory's chain holds `DIR_SLOTS_PER_BLOCK` little-endian `u16` slots
//! per block, each naming a child entry or `EMPTY_SLOT`. Slot blocks are
//! appended when every slot is taken and never given back while the
//! directory lives.

use crate::config::{DIR_SLOTS_PER_BLOCK, DIR_SLOT_SIZE};
use crate::errors::{FsError, FsResult};

use super::chain::BlockId;
use super::entry::{Entry, EntryId, EntryKind, Name};
use super::path;
use super::Filesystem;

const EMPTY_SLOT: u16 = 0xFFFF;

/// Outcome of walking a path from root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Found {
        entry: EntryId,
        /// `None` when `entry` is root
        parent: Option<EntryId>,
    },
    /// A component did not exist; `parent` is the last directory reached.
    Missing { parent: EntryId },
}

impl Filesystem {
    pub fn resolve(&self, path: &str) -> FsResult<Lookup> {
        self.ensure_formatted()?;

        let mut current = self.superblock.root()?;
        let mut parent = None;
        for component in path::components(path) {
            match self.find_child(current, component)? {
                Some(child) => {
                    parent = Some(current);
                    current = child;
                }
                None => return Ok(Lookup::Missing { parent: current }),
            }
        }
        Ok(Lookup::Found { entry: current, parent })
    }

    /// Resolves `path` to an existing entry.
    pub fn find(&self, path: &str) -> FsResult<EntryId> {
        match self.resolve(path)? {
            Lookup::Found { entry, .. } => Ok(entry),
            Lookup::Missing { .. } => Err(FsError::NotFound),
        }
    }

    pub fn create_file(&mut self, path: &str) -> FsResult<EntryId> {
        self.create_entry(path, false)
    }

    pub fn create_directory(&mut self, path: &str) -> FsResult<EntryId> {
        self.create_entry(path, true)
    }

    fn create_entry(&mut self, path: &str, directory: bool) -> FsResult<EntryId> {
        self.ensure_formatted()?;
        if self.superblock.is_full() {
            return Err(FsError::TableFull);
        }
        if let Lookup::Found { entry, .. } = self.resolve(path)? {
            return Ok(entry);
        }

        let (parent_path, name) = path::split_last(path).ok_or(FsError::InvalidName)?;
        let name = Name::new(name)?;
        let parent = self.find(parent_path)?;
        if !self.entry(parent)?.is_directory() {
            return Err(FsError::NotADirectory);
        }

        let id = self.superblock.free_slot()?;
        let kind = if directory {
            let block = self.chain.allocate()?;
            self.clear_slots(block);
            EntryKind::Directory { children: Some(block) }
        } else {
            EntryKind::File { size: 0, chain: None }
        };
        let entry = Entry {
            name,
            parent: Some(parent),
            kind,
        };
        self.superblock.insert(id, entry);

        if let Err(err) = self.add_child(parent, id) {
            self.superblock.remove(id);
            if let Some(first) = entry.first_block() {
                self.chain.free_chain(first);
            }
            log::warn!("fs: could not link {} into its parent: {}", path, err);
            return Err(err);
        }

        log::debug!("fs: created {} {} as entry {}", if directory { "directory" } else { "file" }, path, id);
        Ok(id)
    }

    pub fn delete(&mut self, path: &str) -> FsResult<()> {
        let (id, parent) = match self.resolve(path)? {
            Lookup::Found { entry, parent } => (entry, parent),
            Lookup::Missing { .. } => return Err(FsError::NotFound),
        };
        let parent = parent.ok_or(FsError::IsRoot)?;

        let entry = *self.entry(id)?;
        if let EntryKind::Directory { children } = entry.kind {
            if self.children(children).next().is_some() {
                return Err(FsError::DirectoryNotEmpty);
            }
        }

        self.remove_child(parent, id)?;
        if let Some(first) = entry.first_block() {
            self.chain.free_chain(first);
        }
        self.superblock.remove(id);
        log::debug!("fs: deleted {}", path);
        Ok(())
    }

    /// Live children of a directory chain, in slot order.
    pub(super) fn children(&self, first: Option<BlockId>) -> impl Iterator<Item = EntryId> + '_ {
        self.slots(first).filter_map(|(_, _, child)| child)
    }

    /// First block of a directory's slot chain.
    pub(super) fn directory_chain(&self, dir: EntryId) -> FsResult<Option<BlockId>> {
        match self.entry(dir)?.kind {
            EntryKind::Directory { children } => Ok(children),
            EntryKind::File { .. } => Err(FsError::NotADirectory),
        }
    }

    fn find_child(&self, dir: EntryId, name: &str) -> FsResult<Option<EntryId>> {
        let first = self.directory_chain(dir)?;
        Ok(self.children(first).find(|&child| {
            self.superblock
                .get(child)
                .is_some_and(|entry| entry.name == *name)
        }))
    }

    fn add_child(&mut self, dir: EntryId, child: EntryId) -> FsResult<()> {
        let first = self.directory_chain(dir)?;

        let free = self
            .slots(first)
            .find(|(_, _, occupant)| occupant.is_none())
            .map(|(block, slot, _)| (block, slot));
        if let Some((block, slot)) = free {
            self.write_slot(block, slot, Some(child));
            return Ok(());
        }

        let block = self.chain.allocate()?;
        self.clear_slots(block);
        self.write_slot(block, 0, Some(child));
        match first {
            Some(first) => {
                let tail = self.chain.last(first);
                self.chain.link(tail, block);
            }
            None => {
                if let Some(entry) = self.superblock.get_mut(dir) {
                    entry.kind = EntryKind::Directory { children: Some(block) };
                }
            }
        }
        Ok(())
    }

    fn remove_child(&mut self, dir: EntryId, child: EntryId) -> FsResult<()> {
        let first = self.directory_chain(dir)?;
        let (block, slot, _) = self
            .slots(first)
            .find(|&(_, _, occupant)| occupant == Some(child))
            .ok_or(FsError::Corrupted)?;
        self.write_slot(block, slot, None);
        Ok(())
    }

    /// Every slot of a directory chain as `(block, slot, occupant)`.
    pub(super) fn slots(
        &self,
        first: Option<BlockId>,
    ) -> impl Iterator<Item = (BlockId, usize, Option<EntryId>)> + '_ {
        self.chain.chain(first).flat_map(move |block| {
            (0..DIR_SLOTS_PER_BLOCK).map(move |slot| (block, slot, self.read_slot(block, slot)))
        })
    }

    fn read_slot(&self, block: BlockId, slot: usize) -> Option<EntryId> {
        let offset = slot * DIR_SLOT_SIZE;
        let bytes = &self.data[block.as_usize()][offset..offset + DIR_SLOT_SIZE];
        match u16::from_le_bytes([bytes[0], bytes[1]]) {
            EMPTY_SLOT => None,
            raw => EntryId::new(raw as usize),
        }
    }

    fn write_slot(&mut self, block: BlockId, slot: usize, child: Option<EntryId>) {
        let raw = child.map_or(EMPTY_SLOT, EntryId::raw);
        let offset = slot * DIR_SLOT_SIZE;
        self.data[block.as_usize()][offset..offset + DIR_SLOT_SIZE].copy_from_slice(&raw.to_le_bytes());
    }

    pub(super) fn clear_slots(&mut self, block: BlockId) {
        for slot in 0..DIR_SLOTS_PER_BLOCK {
            self.write_slot(block, slot, None);
        }
    }
}

use crate::config::{FS_MAGIC, FS_SIZE, MAX_ENTRIES};
use crate::errors::{FsError, FsResult};

use super::entry::{Entry, EntryId};

/// Head of the store: identification plus the flat entry table.
pub struct Superblock {
    pub magic: u32,
    pub total_size: u32,
    /// Live entries, maintained incrementally
    pub entry_count: u32,
    entries: [Option<Entry>; MAX_ENTRIES],
}

impl Superblock {
    pub const fn new() -> Self {
        Self {
            magic: 0,
            total_size: 0,
            entry_count: 0,
            entries: [None; MAX_ENTRIES],
        }
    }

    pub fn format(&mut self) {
        self.magic = FS_MAGIC;
        self.total_size = FS_SIZE as u32;
        self.entry_count = 0;
        self.entries = [None; MAX_ENTRIES];
    }

    pub fn is_formatted(&self) -> bool {
        self.magic == FS_MAGIC
    }

    pub fn is_full(&self) -> bool {
        self.entry_count as usize >= MAX_ENTRIES
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries[id.as_usize()].as_ref()
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries[id.as_usize()].as_mut()
    }

    /// Lowest free slot.
    pub fn free_slot(&self) -> FsResult<EntryId> {
        self.entries
            .iter()
            .position(Option::is_none)
            .and_then(EntryId::new)
            .ok_or(FsError::TableFull)
    }

    pub fn insert(&mut self, id: EntryId, entry: Entry) {
        if self.entries[id.as_usize()].replace(entry).is_none() {
            self.entry_count += 1;
        }
    }

    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let removed = self.entries[id.as_usize()].take();
        if removed.is_some() {
            self.entry_count -= 1;
        }
        removed
    }

    /// The unique entry without a parent.
    pub fn root(&self) -> FsResult<EntryId> {
        self.iter()
            .find(|(_, entry)| entry.is_root())
            .map(|(id, _)| id)
            .ok_or(FsError::Corrupted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &Entry)> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, slot)| {
            let entry = slot.as_ref()?;
            Some((EntryId::new(index)?, entry))
        })
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}

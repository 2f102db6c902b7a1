use core::fmt;

use crate::config::{MAX_ENTRIES, NAME_MAX};
use crate::errors::{FsError, FsResult};

use super::chain::BlockId;

/// Slot index of an entry in the superblock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u16);

impl EntryId {
    pub const fn new(index: usize) -> Option<Self> {
        if index < MAX_ENTRIES {
            Some(Self(index as u16))
        } else {
            None
        }
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub(super) const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry name of at most `NAME_MAX` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Name {
    len: u8,
    bytes: [u8; NAME_MAX],
}

impl Name {
    pub fn new(name: &str) -> FsResult<Self> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
            return Err(FsError::InvalidName);
        }
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }

        let mut bytes = [0; NAME_MAX];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            len: name.len() as u8,
            bytes,
        })
    }

    pub fn as_str(&self) -> &str {
        // only ever filled from a `&str` in `new`
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u32, chain: Option<BlockId> },
    /// `children` is the first block of the child-slot chain
    Directory { children: Option<BlockId> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: Name,
    /// `None` only for the root directory
    pub parent: Option<EntryId>,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory { .. })
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Bytes of file data; 0 for directories.
    pub fn size(&self) -> u32 {
        match self.kind {
            EntryKind::File { size, .. } => size,
            EntryKind::Directory { .. } => 0,
        }
    }

    /// First block of whatever chain the entry owns.
    pub fn first_block(&self) -> Option<BlockId> {
        match self.kind {
            EntryKind::File { chain, .. } => chain,
            EntryKind::Directory { children } => children,
        }
    }
}

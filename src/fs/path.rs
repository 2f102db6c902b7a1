//! Path helpers.
//!
//! Paths are `/`-separated. Empty components are skipped, so `"//docs/"`,
//! `"/docs"` and `"docs"` all name the same entry, and the empty path is
//! root. Lookups always start at root; there is no working directory inside
//! the filesystem itself. [`PathBuf::resolve`] is what a shell uses to turn
//! a relative path into an absolute one first.

use core::fmt;

use crate::config::PATH_MAX;
use crate::errors::{FsError, FsResult};

pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|component| !component.is_empty())
}

/// Splits `path` into its parent path and final component.
/// Returns `None` when the path names root.
pub fn split_last(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.rfind('/') {
        Some(index) => Some((&trimmed[..index], &trimmed[index + 1..])),
        None => Some(("", trimmed)),
    }
}

/// Normalized absolute path with fixed capacity.
///
/// Always starts with `/`, never ends with one (except root itself), and
/// holds no `.` or `..` components.
#[derive(Clone, Copy)]
pub struct PathBuf {
    len: usize,
    bytes: [u8; PATH_MAX],
}

impl PathBuf {
    pub const fn root() -> Self {
        let mut bytes = [0; PATH_MAX];
        bytes[0] = b'/';
        Self { len: 1, bytes }
    }

    /// Joins `path` onto `cwd` unless it is already absolute, then folds
    /// `.` and `..`. `..` at root stays at root.
    pub fn resolve(cwd: &str, path: &str) -> FsResult<Self> {
        let mut resolved = Self::root();
        if !path.starts_with('/') {
            for component in components(cwd) {
                resolved.push(component)?;
            }
        }
        for component in components(path) {
            resolved.push(component)?;
        }
        Ok(resolved)
    }

    pub fn push(&mut self, component: &str) -> FsResult<()> {
        match component {
            "" | "." => return Ok(()),
            ".." => {
                self.pop();
                return Ok(());
            }
            _ => {}
        }

        let separator = usize::from(!self.is_root());
        let needed = self.len + separator + component.len();
        if needed > PATH_MAX {
            return Err(FsError::PathTooLong);
        }

        if separator == 1 {
            self.bytes[self.len] = b'/';
            self.len += 1;
        }
        self.bytes[self.len..needed].copy_from_slice(component.as_bytes());
        self.len = needed;
        Ok(())
    }

    /// Drops the last component. Returns `false` at root.
    pub fn pop(&mut self) -> bool {
        if self.is_root() {
            return false;
        }
        let cut = self.as_str().rfind('/').unwrap_or(0);
        self.len = cut.max(1);
        true
    }

    pub fn is_root(&self) -> bool {
        self.len == 1
    }

    pub fn as_str(&self) -> &str {
        // built from `&str` pieces joined on ASCII `/`
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or("/")
    }
}

impl Default for PathBuf {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

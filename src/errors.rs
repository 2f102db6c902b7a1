use core::fmt;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsError {
    NotInitialized,

    // Lookup
    NotFound,
    NotADirectory,
    IsADirectory,
    InvalidName,
    NameTooLong,
    PathTooLong,

    // Capacity
    TableFull,
    NoSpace,

    // Operation
    IsRoot,
    DirectoryNotEmpty,
    InvalidArgument,

    Corrupted,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NotInitialized => "filesystem not initialized",
            FsError::NotFound => "no such file or directory",
            FsError::NotADirectory => "not a directory",
            FsError::IsADirectory => "is a directory",
            FsError::InvalidName => "invalid name",
            FsError::NameTooLong => "name too long",
            FsError::PathTooLong => "path too long",
            FsError::TableFull => "entry table full",
            FsError::NoSpace => "no space left on filesystem",
            FsError::IsRoot => "cannot remove the root directory",
            FsError::DirectoryNotEmpty => "directory not empty",
            FsError::InvalidArgument => "invalid argument",
            FsError::Corrupted => "filesystem structure corrupted",
        };
        f.write_str(msg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskError {
    TableFull,
    NoReadyTask,
    AlreadyStarted,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::TableFull => write!(f, "max tasks reached ({})", crate::config::MAX_TASKS),
            TaskError::NoReadyTask => write!(f, "no ready task to run"),
            TaskError::AlreadyStarted => write!(f, "multitasking already started"),
        }
    }
}

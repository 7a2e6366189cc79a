//! The current/next log file pair.
//!
//! Exactly two file slots exist at any time: `current`, the file the flusher is draining the ring
//! into, and `next`, populated only during a dual-write rotation window. Both slots track the
//! number of bytes successfully written and whether an fsync is in flight against them, so that
//! [`crate::durability::log_file_sync`] can tell whether a file it just fsynced has since been
//! retired out from under it.

use std::fs::File;
use std::path::PathBuf;

/// One of the two file slots (`current` or `next`).
#[derive(Debug, Default)]
pub struct FileSlot {
    file: Option<File>,
    pub(crate) fsync_ongoing: bool,
    pub(crate) size: u64,
    /// Bumped every time a new file is installed into this slot. Lets a caller that released the
    /// flush lock mid-fsync tell, on reacquiring it, whether this slot still refers to the same
    /// file it started fsyncing -- the Rust stand-in for the reference implementation's fd-pointer
    /// identity check.
    pub(crate) generation: u64,
}

impl FileSlot {
    pub fn is_empty(&self) -> bool {
        self.file.is_none()
    }

    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    pub(crate) fn install(&mut self, file: File) {
        self.file = Some(file);
        self.fsync_ongoing = false;
        self.size = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Clears the slot, returning the file handle so the caller can close it outside of any lock.
    pub(crate) fn retire(&mut self) -> Option<File> {
        self.fsync_ongoing = false;
        self.size = 0;
        self.file.take()
    }
}

/// Holds the current and (optionally) next log file, plus the directory they live in.
#[derive(Debug, Default)]
pub struct LogFile {
    pub(crate) data_dir: PathBuf,
    pub(crate) current: FileSlot,
    pub(crate) next: FileSlot,
}

impl LogFile {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            current: FileSlot::default(),
            next: FileSlot::default(),
        }
    }
}

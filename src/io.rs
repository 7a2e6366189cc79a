//! Disk I/O shim.
//!
//! Thin, retry-on-interrupt wrappers around the handful of filesystem operations the rest of this
//! crate needs: opening the current/next log files, writing byte ranges to them, and fsyncing
//! them. `std::io::Write::write_all` already retries on `ErrorKind::Interrupted` internally, but
//! `fsync` does not get that treatment from the standard library on all platforms, so we add our
//! own retry loop here rather than leaning on an assumption that may not hold everywhere.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::Path;

/// Opens `path` for reading and appending, creating it if it does not exist.
///
/// Retries on `ErrorKind::Interrupted`, matching the reference implementation's EINTR-retrying
/// `open` wrapper.
pub fn open_rw_create(path: &Path) -> io::Result<File> {
    loop {
        match OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
        {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Writes `buf` to `file` in full, retrying on interruption and failing on any other short write
/// or error.
///
/// Unlike a raw `write(2)` loop, `Write::write_all` already retries on `Interrupted` for us; this
/// wrapper exists so that every write in this crate goes through one named call site that mirrors
/// the reference implementation's `disk_byte_write`.
pub fn write_all(file: &mut File, buf: &[u8]) -> io::Result<()> {
    file.write_all(buf)
}

/// Synchronizes both data and metadata of `file` to the storage medium, retrying on interruption.
///
/// Per this crate's error handling design, a failure here is never returned to a producer: the
/// caller is expected to treat it as fatal.
pub fn fsync(file: &File) -> io::Result<()> {
    loop {
        match file.sync_all() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

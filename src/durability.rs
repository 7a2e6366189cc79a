//! Fsyncing the current/next log files.
//!
//! `log_file_sync` never holds the flush lock while the actual `fsync(2)` call is in flight: disk
//! sync latency must never block producers or the flusher from making progress on the in-memory
//! side. Instead it snapshots what needs syncing under the flush lock, releases it, does the I/O,
//! then reacquires the lock only long enough to reconcile bookkeeping -- because a rotation may
//! have retired the file it was syncing while the lock was released.

use std::fs::File;
use std::io;

use crate::engine::CmdLog;
use crate::file_pair::LogFile;
use crate::io as diskio;
use crate::lsn::LogSn;
use crate::record::RecordCodec;

/// A file handle snapshotted under the flush lock, to be fsynced without holding it.
#[derive(Debug)]
pub struct FsyncTarget {
    file: File,
    is_next: bool,
    generation: u64,
}

/// Step 1, run under the flush lock: for every occupied slot not already mid-fsync, clones its
/// file handle and marks it `fsync_ongoing`.
pub fn begin_fsync(log_file: &mut LogFile) -> Vec<FsyncTarget> {
    let mut targets = Vec::with_capacity(2);

    if !log_file.current.is_empty() && !log_file.current.fsync_ongoing {
        if let Some(cloned) = log_file.current.file().and_then(|f| f.try_clone().ok()) {
            log_file.current.fsync_ongoing = true;
            targets.push(FsyncTarget {
                file: cloned,
                is_next: false,
                generation: log_file.current.generation,
            });
        }
    }

    if !log_file.next.is_empty() && !log_file.next.fsync_ongoing {
        if let Some(cloned) = log_file.next.file().and_then(|f| f.try_clone().ok()) {
            log_file.next.fsync_ongoing = true;
            targets.push(FsyncTarget {
                file: cloned,
                is_next: true,
                generation: log_file.next.generation,
            });
        }
    }

    targets
}

/// Step 2, run with no lock held: the actual `fsync(2)` call.
pub fn do_fsync(target: &FsyncTarget) -> io::Result<()> {
    diskio::fsync(&target.file)
}

/// Step 3, run under the flush lock again: clears `fsync_ongoing`, but only if the slot still
/// refers to the same file `begin_fsync` snapshotted -- if a rotation retired it in the meantime,
/// there is nothing left to reconcile for this target.
pub fn end_fsync(log_file: &mut LogFile, target: &FsyncTarget) {
    let slot = if target.is_next {
        &mut log_file.next
    } else {
        &mut log_file.current
    };
    if slot.generation == target.generation {
        slot.fsync_ongoing = false;
    }
}

impl<C: RecordCodec> CmdLog<C> {
    /// Durably persists everything the flusher has written so far.
    ///
    /// Snapshots the current flush LSN before releasing the flush lock to do the actual
    /// `fsync(2)` calls, then advances `fsync_lsn` to that snapshot -- never past it, even if more
    /// bytes were flushed while this call was in flight, so a concurrent caller never observes an
    /// `fsync_lsn` ahead of data it didn't itself wait for.
    pub fn log_file_sync(&self) -> LogSn {
        let target_lsn = self.flush_lsn();

        let targets = begin_fsync(&mut self.flush.lock().log_file);
        for target in &targets {
            do_fsync(target).expect("fsync of log file failed; the process must abort");
        }
        if !targets.is_empty() {
            let mut flush_guard = self.flush.lock();
            for target in &targets {
                end_fsync(&mut flush_guard.log_file, target);
            }
        }

        let result = {
            let mut fsync_lsn = self.fsync_lsn.lock();
            if target_lsn > *fsync_lsn {
                *fsync_lsn = target_lsn;
            }
            *fsync_lsn
        };

        crate::usage::report_watermarks(
            self.write_lsn(),
            self.flush_lsn(),
            result,
            self.config.buffer_size(),
        );
        self.flush_cv.notify_all();
        result
    }
}

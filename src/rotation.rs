//! Dual-write file rotation.
//!
//! Rotating to a new log file happens without ever blocking producers or the flusher on disk I/O:
//! a caller first calls [`prepare`] to create the `next` file while `current` keeps accepting
//! writes; every record appended from then on is tagged `dual_write` (see
//! [`crate::ring::FlushQueue::append`]) until [`CmdLog::cmdlog_complete_dual_write`] marks the
//! boundary with [`crate::ring::FlushQueue::mark_dual_write_end`]. The physical swap itself --
//! [`commit`] -- only happens once the flusher's drain actually reaches that boundary, since bytes
//! queued before it must still reach both files. If the caller instead aborts, [`abort`] discards
//! `next` immediately and clears the `dual_write` flags already queued so the flusher stops
//! double-writing them.

use std::io;
use std::path::Path;
use std::sync::atomic::Ordering;

use snafu::{ResultExt, Snafu};

use crate::engine::CmdLog;
use crate::file_pair::LogFile;
use crate::io::open_rw_create;
use crate::record::RecordCodec;
use crate::ring::FlushQueue;

/// Errors preparing the `next` file for a dual-write rotation.
#[derive(Debug, Snafu)]
pub enum PrepareError {
    /// A rotation is already in progress; `commit` or `abort` must be called before another one
    /// can start.
    #[snafu(display("a dual-write rotation is already in progress"))]
    AlreadyInProgress,

    /// Creating or opening the `next` file failed.
    #[snafu(display("failed to open next log file {}: {}", path.display(), source))]
    Open { path: std::path::PathBuf, source: io::Error },
}

/// Opens `path` as the `next` log file, beginning a dual-write rotation window.
///
/// Every record appended to the ring from this point on is tagged for dual-write until the caller
/// calls [`crate::ring::FlushQueue::mark_dual_write_end`] (done by
/// [`CmdLog::cmdlog_complete_dual_write`] on success).
pub fn prepare(log_file: &mut LogFile, path: &Path) -> Result<(), PrepareError> {
    if !log_file.next.is_empty() {
        return AlreadyInProgressSnafu.fail();
    }

    let file = open_rw_create(path).with_context(|_| OpenSnafu { path: path.to_path_buf() })?;
    log_file.next.install(file);
    Ok(())
}

/// Commits a dual-write rotation: `next` becomes `current`.
///
/// Called by the flusher once it drains the flush-request slot at the dual-write boundary (see
/// [`crate::ring::WriteState::begin_drain`]'s `next_file_lsn_bump`). Returns the old `current`
/// file handle so the caller can close it outside of any lock.
pub fn commit(log_file: &mut LogFile) -> Option<std::fs::File> {
    let retired_current = log_file.current.retire();
    if let Some(file) = log_file.next.retire() {
        log_file.current.install(file);
    }
    retired_current
}

/// Aborts a dual-write rotation: discards `next` and clears every already-queued `dual_write`
/// flag so the flusher stops writing those bytes twice.
pub fn abort(log_file: &mut LogFile, fq: &mut FlushQueue) -> Option<std::fs::File> {
    fq.clear_dual_write_flags();
    log_file.next.retire()
}

/// The size, in bytes, of the current log file: the number of bytes actually handed to
/// `write(2)` so far, as tracked on the file slot itself.
pub fn current_file_size(log_file: &LogFile) -> u64 {
    log_file.current.size
}

impl<C: RecordCodec> CmdLog<C> {
    /// Begins a dual-write rotation to a new file at `path`.
    ///
    /// From this call until [`CmdLog::cmdlog_complete_dual_write`], every record appended is
    /// written to both the current and the new file.
    pub fn cmdlog_file_prepare(&self, path: &Path) -> Result<(), PrepareError> {
        let mut flush_guard = self.flush.lock();
        prepare(&mut flush_guard.log_file, path)?;
        self.dual_write_active.store(true, Ordering::Release);
        Ok(())
    }

    /// Resolves a dual-write rotation started by [`CmdLog::cmdlog_file_prepare`].
    ///
    /// On `success`, the current queue position becomes the dual-write boundary: every record
    /// already queued up to here is still written to both files when the flusher drains it, every
    /// one appended from here on (since `dual_write_active` is now clear) is written only to
    /// `current`, and `next` is promoted to `current` the moment the flusher's drain reaches that
    /// boundary (see [`crate::ring::WriteState::begin_drain`]'s `next_file_lsn_bump`). On failure,
    /// the rotation is cancelled immediately: `next` is discarded and already-queued dual-write
    /// tags are cleared so the flusher never writes to the now-closed file.
    ///
    /// A no-op if `next` is empty, i.e. no rotation is currently in progress -- mirroring the
    /// reference implementation's single guard at the top of the function, which covers both the
    /// success and failure paths. Without it, a stray `success = true` call with nothing prepared
    /// would still seal the dual-write boundary and bump `write_lsn`'s file number, and the
    /// flusher would later try to promote an empty `next` into `current`.
    ///
    /// Takes the flush lock first and the write lock nested inside it, matching the drain
    /// protocol's lock order (`flush_lock` -> `write_lock`) exactly -- taking them in the opposite
    /// order here would let this call and a concurrent [`CmdLog::drain_step`] deadlock on each
    /// other's held lock.
    pub fn cmdlog_complete_dual_write(&self, success: bool) {
        let mut flush_guard = self.flush.lock();
        if flush_guard.log_file.next.is_empty() {
            return;
        }
        if success {
            let mut guard = self.write.lock();
            guard.state.fq.mark_dual_write_end();
            guard.write_lsn.bump_file();
            drop(guard);
            self.dual_write_active.store(false, Ordering::Release);
            return;
        }
        self.dual_write_active.store(false, Ordering::Release);
        let retired = {
            let mut guard = self.write.lock();
            abort(&mut flush_guard.log_file, &mut guard.state.fq)
        };
        drop(flush_guard);
        drop(retired);
    }

    /// The size, in bytes, of the current log file.
    pub fn cmdlog_file_getsize(&self) -> u64 {
        current_file_size(&self.flush.lock().log_file)
    }
}

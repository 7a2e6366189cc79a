//! The consumer side: draining the flush-request queue to disk, on a background thread or
//! on demand.
//!
//! [`CmdLog::drain_step`] is the single place that performs the drain protocol described in
//! [`crate::ring::WriteState::begin_drain`]: pick the next contiguous run under the write lock,
//! write it to disk under the flush lock (never both at once), then retake the write lock to
//! advance `head` past what was just written. The background flusher thread, an on-demand
//! [`CmdLog::log_buffer_flush`] call, and a backpressured producer all drive this same step --
//! they differ only in whether they pass `flush_all` and in how long they're willing to wait.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use tracing::{debug, info};

use crate::engine::CmdLog;
use crate::record::RecordCodec;
use crate::rotation;

impl<C: RecordCodec> CmdLog<C> {
    /// Drains at most one flush-request slot to disk. Returns the number of bytes drained (zero
    /// if there was nothing to drain).
    ///
    /// With `flush_all` set, an unsealed (still accepting writes) slot at the tail of the queue
    /// is also eligible, so that a caller asking for a complete flush doesn't have to wait for the
    /// auto-flush threshold to seal it first.
    ///
    /// The whole protocol runs under the flush lock, held for the duration of this call: steps 1
    /// and 5 additionally take the write lock, nested inside it (lock order `flush_lock` ->
    /// `write_lock`, never the other way around), purely to synchronize the ring cursors with
    /// producers -- the disk I/O itself runs with only the flush lock held. Without the flush lock
    /// spanning the whole call, two concurrent drainers (the background flusher thread and a
    /// backpressured producer calling this directly) could both read the same un-advanced flush
    /// slot before either advanced `fbgn`, double-writing it to disk.
    #[instrument(skip(self), level = "trace")]
    pub(crate) fn drain_step(&self, flush_all: bool) -> u16 {
        let mut flush_guard = self.flush.lock();

        let (drain, bytes) = {
            let mut guard = self.write.lock();
            let drain = guard.state.begin_drain(flush_all);
            let bytes = if drain.nflush > 0 {
                Some(Bytes::copy_from_slice(guard.state.ring.drain_slice(drain.nflush)))
            } else {
                None
            };
            (drain, bytes)
        };

        if drain.nflush == 0 && !drain.next_file_lsn_bump {
            return 0;
        }

        // The swap must happen before this run is written: it and every run after it belong to
        // the file that is becoming `current`, not the one being retired.
        let retired_file = if drain.next_file_lsn_bump {
            rotation::commit(&mut flush_guard.log_file)
        } else {
            None
        };

        if let Some(bytes) = &bytes {
            let current = flush_guard
                .log_file
                .current
                .file_mut()
                .expect("current log file is always open while the buffer is live");
            crate::io::write_all(current, bytes)
                .expect("write to current log file failed; the process must abort");
            flush_guard.log_file.current.size += bytes.len() as u64;

            if drain.dual_write {
                if let Some(next) = flush_guard.log_file.next.file_mut() {
                    crate::io::write_all(next, bytes)
                        .expect("write to next log file failed; the process must abort");
                    flush_guard.log_file.next.size += bytes.len() as u64;
                }
            }
        }
        drop(retired_file);

        let flush_lsn_now = {
            let mut flush_lsn = self.flush_lsn.load();
            if drain.next_file_lsn_bump {
                flush_lsn.bump_file();
            }
            flush_lsn.advance(drain.nflush as u64);
            self.flush_lsn.store(flush_lsn);
            flush_lsn
        };

        let occupancy = {
            let mut guard = self.write.lock();
            if drain.nflush > 0 {
                guard.state.finish_drain(drain.nflush);
            }
            guard.state.ring.occupied_bytes()
        };

        drop(flush_guard);

        crate::usage::report_watermarks(
            self.write_lsn(),
            flush_lsn_now,
            self.fsync_lsn(),
            self.config.buffer_size(),
        );
        crate::usage::report_ring_occupancy(occupancy);

        self.flush_cv.notify_all();
        drain.nflush
    }

    /// Drains every currently pending slot. Used by the flusher loop and by on-demand flush
    /// callers; returns the total number of bytes drained.
    pub(crate) fn drain_all_pending(&self, flush_all: bool) -> u64 {
        let mut total = 0u64;
        loop {
            let n = self.drain_step(flush_all);
            if n == 0 {
                break;
            }
            total += n as u64;
        }
        total
    }

    /// Drains the ring buffer until `flush_lsn` reaches at least `upto`, flushing the open slot
    /// if needed to get there.
    ///
    /// Also keeps draining past that point if a dual-write rotation has been completed but not
    /// yet promoted: the promotion itself advances no LSN, so stopping as soon as `upto` is
    /// reached could otherwise leave `next` un-promoted indefinitely.
    pub fn log_buffer_flush(&self, upto: crate::lsn::LogSn) {
        loop {
            let pending_rotation = self.write.lock().state.has_pending_rotation();
            if self.flush_lsn() >= upto && !pending_rotation {
                return;
            }
            if self.drain_step(true) == 0 {
                return;
            }
        }
    }

    /// Starts the background flusher thread. A no-op if it is already running.
    ///
    /// Requires the buffer to be held behind an `Arc` so the thread can hold its own strong
    /// reference for as long as it runs.
    pub fn flush_thread_start(self: &Arc<Self>)
    where
        C: Send + Sync + 'static,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop_requested.store(false, Ordering::Release);

        let engine = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("cmdlog-flusher".to_string())
            .spawn(move || engine.flush_thread_main())
            .expect("failed to spawn flusher thread");

        *self.thread.lock() = Some(handle);
        info!("flusher thread started");
    }

    fn flush_thread_main(self: Arc<Self>) {
        let poll_interval = self.config.flusher_poll_interval();
        loop {
            self.drain_all_pending(false);

            let mut guard = self.write.lock();
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }
            if guard.state.fq.is_empty() {
                self.write_cv.wait_for(&mut guard, poll_interval);
            }
        }
        debug!("flusher thread exiting");
        self.running.store(false, Ordering::Release);
    }

    /// Requests the flusher thread stop and waits for it to exit. A no-op if it is not running.
    pub fn flush_thread_stop(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        self.stop_requested.store(true, Ordering::Release);
        self.write_cv.notify_all();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

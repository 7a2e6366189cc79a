//! The producer protocol: `log_record_write`.
//!
//! A write first tries to reserve space in the ring buffer under the write lock alone. If the
//! buffer is full, the caller releases the write lock, helps the flusher along by draining one
//! sealed slot itself, then retries -- rather than blocking on the background flusher thread,
//! which may be asleep on its poll interval. This keeps the common case (space available) free of
//! any flush-lock contention at all.

use snafu::Snafu;

use crate::engine::CmdLog;
use crate::lsn::LogSn;
use crate::record::{RecordCodec, RECORD_HEADER_LEN};
use std::sync::atomic::Ordering;

/// Errors rejecting a record before it ever touches the ring buffer.
#[derive(Debug, Snafu)]
pub enum WriteError {
    #[snafu(display(
        "record of {} bytes exceeds the maximum allowed size of {} bytes",
        total_size,
        max
    ))]
    RecordTooLarge { total_size: usize, max: usize },
}

impl<C: RecordCodec> CmdLog<C> {
    /// Appends `record` to the log buffer, returning the LSN it was written at.
    ///
    /// Blocks (by helping the flusher drain) if the ring buffer has no room; never blocks on disk
    /// I/O directly, since a sealed slot's bytes are already resident in memory when drained.
    #[instrument(skip(self, record), level = "trace")]
    pub fn log_record_write(&self, record: &impl RecordCodec) -> Result<LogSn, WriteError> {
        let total_size = RECORD_HEADER_LEN + record.body_length() as usize;
        // A record must also fit the ring outright: `try_reserve` can never succeed for one that
        // doesn't, since the buffer is never considered "full" except as back-pressure on a
        // record that could eventually fit once drained.
        let max = C::MAX_LOG_RECORD_SIZE
            .min(self.config.max_record_size() as usize)
            .min(self.config.buffer_size() as usize - 1);
        if total_size > max {
            return RecordTooLargeSnafu { total_size, max }.fail();
        }

        let dual_write = self.dual_write_active.load(Ordering::Acquire);

        loop {
            let mut guard = self.write.lock();
            if let Some(position) = guard.state.try_reserve(total_size as u64) {
                let mut scratch = vec![0u8; total_size];
                record.write_to_buffer(&mut scratch);
                guard.state.ring.write_at(position, &scratch);
                guard.state.commit_write(total_size as u64, dual_write);

                let lsn = guard.write_lsn;
                guard.write_lsn.advance(total_size as u64);
                let occupancy = guard.state.ring.occupied_bytes();
                drop(guard);

                crate::usage::report_ring_occupancy(occupancy);
                self.write_cv.notify_one();
                return Ok(lsn);
            }
            drop(guard);

            if self.drain_step(true) == 0 {
                // Ring genuinely has no pending bytes at all (shouldn't happen if try_reserve just
                // failed), avoid a hot spin while another thread makes progress.
                std::thread::yield_now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::test_support::new_engine;
    use crate::record::test_support::OpaqueRecord;

    #[test]
    fn write_returns_monotonically_increasing_lsns() {
        let (_dir, engine) = new_engine(1 << 16);
        let a = engine.log_record_write(&OpaqueRecord::new(8)).unwrap();
        let b = engine.log_record_write(&OpaqueRecord::new(8)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let (_dir, engine) = new_engine(1 << 16);
        let huge = OpaqueRecord::new(32 * 1024 * 1024);
        let err = engine.log_record_write(&huge).unwrap_err();
        assert!(matches!(err, super::WriteError::RecordTooLarge { .. }));
    }

    #[test]
    fn writes_wrap_and_backpressure_without_deadlock() {
        let (_dir, engine) = new_engine(4096);
        for _ in 0..200 {
            engine.log_record_write(&OpaqueRecord::new(64)).unwrap();
        }
    }

    #[test]
    fn record_that_could_never_fit_the_buffer_is_rejected_instead_of_spinning_forever() {
        let (_dir, engine) = new_engine(4096);
        // Well under MAX_LOG_RECORD_SIZE and the configured max_record_size, but no ring this
        // small could ever hold it, flushed or not.
        let record = OpaqueRecord::new(4096);
        let err = engine.log_record_write(&record).unwrap_err();
        assert!(matches!(err, super::WriteError::RecordTooLarge { .. }));
    }
}

//! Crash recovery replay.
//!
//! Replays a log file sequentially from its start, redoing each complete record it finds through
//! the configured [`RecordCodec`]. A trailing partial record -- the expected shape of whatever was
//! in flight when the process died -- is silently discarded rather than treated as corruption: the
//! last fsync point is always before it, so nothing durable is lost by dropping it. An oversized
//! body, a short read in the middle of the file, or a redo that runs out of memory are all treated
//! as unrecoverable instead, since none of those can happen from a clean crash of a well-behaved
//! writer.

use std::io::{self, Read};

use snafu::Snafu;
use tracing::{info, warn};

use crate::engine::CmdLog;
use crate::record::{RecordCodec, RecordHeader, RedoError, RECORD_HEADER_LEN};

/// Errors that abort recovery outright.
#[derive(Debug, Snafu)]
pub enum ApplyError {
    #[snafu(display("failed to read log file during recovery: {}", source))]
    #[snafu(context(false))]
    Io { source: io::Error },

    #[snafu(display(
        "record body length {} exceeds the configured maximum of {} bytes",
        body_length,
        max
    ))]
    RecordTooLarge { body_length: u32, max: usize },

    #[snafu(display("codec ran out of memory redoing a record during recovery"))]
    OutOfMemory,

    #[snafu(display("codec rejected a record during recovery: {}", reason))]
    Rejected { reason: String },
}

/// The result of a successful (possibly torn-tail-truncated) replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub records_applied: u64,
    /// Bytes consumed by complete records only; a torn tail past this point was discarded.
    pub bytes_consumed: u64,
}

/// Replays every complete record in `reader` through `C`, in order.
pub fn apply<C, R>(mut reader: R, max_record_size: usize) -> Result<ApplyOutcome, ApplyError>
where
    C: RecordCodec,
    R: Read,
{
    let mut records_applied = 0u64;
    let mut bytes_consumed = 0u64;
    let mut header_buf = [0u8; RECORD_HEADER_LEN];

    loop {
        let header_read = read_fully(&mut reader, &mut header_buf)?;
        if header_read == 0 {
            break;
        }
        if header_read < RECORD_HEADER_LEN {
            warn!(
                bytes_read = header_read,
                "log file ends with a torn record header; discarding tail"
            );
            break;
        }

        let header = RecordHeader::from_bytes(&header_buf);
        if header.body_length as usize > max_record_size {
            return RecordTooLargeSnafu {
                body_length: header.body_length,
                max: max_record_size,
            }
            .fail();
        }

        let mut body = vec![0u8; header.body_length as usize];
        let body_read = read_fully(&mut reader, &mut body)?;
        if body_read < body.len() {
            warn!(
                expected = body.len(),
                got = body_read,
                "log file ends with a torn record body; discarding tail"
            );
            break;
        }

        let record = C::decode(header, &body).map_err(to_apply_error)?;
        record.redo_from_record().map_err(to_apply_error)?;

        records_applied += 1;
        bytes_consumed += header.total_size() as u64;
    }

    info!(
        records_applied,
        bytes_consumed, "recovery replay of log file complete"
    );

    Ok(ApplyOutcome {
        records_applied,
        bytes_consumed,
    })
}

fn to_apply_error(err: RedoError) -> ApplyError {
    match err {
        RedoError::OutOfMemory => ApplyError::OutOfMemory,
        RedoError::Other { reason } => ApplyError::Rejected { reason },
    }
}

/// Reads until `buf` is full or the underlying reader reaches EOF, retrying on interruption.
/// Returns the number of bytes actually read, which is less than `buf.len()` only at EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

impl<C: RecordCodec> CmdLog<C> {
    /// Replays the current log file, redoing every complete record through `C`, and advances all
    /// three watermarks past what it found.
    ///
    /// Meant to be called once, right after [`CmdLog::init`] and before
    /// [`CmdLog::flush_thread_start`]: recovery assumes nothing has been written to the buffer
    /// yet.
    pub fn cmdlog_file_apply(&self) -> Result<ApplyOutcome, ApplyError> {
        let path = self.config.current_file_path();
        let file = std::fs::File::open(&path)?;
        let outcome = apply::<C, _>(file, self.config.max_record_size() as usize)?;

        self.flush.lock().log_file.current.size = outcome.bytes_consumed;
        let mut flush_lsn = self.flush_lsn.load();
        flush_lsn.advance(outcome.bytes_consumed);
        self.flush_lsn.store(flush_lsn);
        self.fsync_lsn.lock().advance(outcome.bytes_consumed);
        self.write.lock().write_lsn.advance(outcome.bytes_consumed);

        Ok(outcome)
    }
}

//! The record codec contract.
//!
//! This core never interprets the bytes of a log record beyond its 8-byte header: it copies
//! records into the ring buffer, flushes contiguous ranges of bytes to disk, and -- during
//! recovery -- walks the header/body framing to find record boundaries. What a record *means*,
//! how it's serialized, and how it's redone against the engine is entirely the job of the
//! collaborator implementing [`RecordCodec`].
//!
//! # On-disk format
//!
//! A raw concatenation of records, each `8-byte header || body_length bytes of body`. No framing,
//! no magic, no checksum (see the crate's non-goals). A partial trailing record left by a crash is
//! discarded on replay.

use snafu::Snafu;

/// The size of a record's header, in bytes: a 4-byte reserved field followed by the `u32`
/// `body_length`.
pub const RECORD_HEADER_LEN: usize = 8;

/// Smallest possible record: an 8-byte header plus an 8-byte body.
pub const MIN_RECORD_TOTAL_SIZE: usize = 16;

/// Errors a [`RecordCodec`] can report while redoing a record during recovery.
#[derive(Debug, Snafu)]
pub enum RedoError {
    /// The codec ran out of memory applying the record's effect.
    ///
    /// This is fatal to recovery: per the crate's error handling design, an out-of-memory
    /// condition during redo cannot be locally repaired, so the caller must abort recovery.
    #[snafu(display("codec ran out of memory redoing record"))]
    OutOfMemory,

    /// The codec rejected the record for some other, implementation-specific reason.
    #[snafu(display("codec failed to redo record: {}", reason))]
    Other { reason: String },
}

/// A decoded log record header, as found during recovery replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub body_length: u32,
}

impl RecordHeader {
    /// Parses a header from its on-disk 8-byte representation.
    ///
    /// The first 4 bytes are reserved for the codec's own use (record kind, flags, and so on);
    /// this core only reads the trailing `body_length` field.
    pub fn from_bytes(bytes: &[u8; RECORD_HEADER_LEN]) -> Self {
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[4..8]);
        RecordHeader {
            body_length: u32::from_le_bytes(len_bytes),
        }
    }

    /// Total encoded size of the record this header describes: header plus body.
    pub fn total_size(&self) -> usize {
        RECORD_HEADER_LEN + self.body_length as usize
    }
}

/// The external collaborator contract for individual log records.
///
/// Implementors own the serialization format and the redo semantics of a record; this core only
/// needs to know how large the encoded form is, how to copy it into a destination buffer, and how
/// to turn a replayed body back into a value during recovery.
pub trait RecordCodec: Sized {
    /// The constant upper bound on an encoded record's total size (header + body). Records larger
    /// than this are rejected by the producer before ever touching the ring buffer.
    const MAX_LOG_RECORD_SIZE: usize;

    /// Encoded size of the body, in bytes. Total on-wire size is always
    /// `RECORD_HEADER_LEN + body_length()`.
    fn body_length(&self) -> u32;

    /// Copies the header and body contiguously into `dst`, writing exactly
    /// `RECORD_HEADER_LEN + body_length()` bytes.
    fn write_to_buffer(&self, dst: &mut [u8]);

    /// Decodes a record from its on-disk body, as found during recovery replay.
    ///
    /// `body` is exactly `header.body_length` bytes, already known to be fully present (recovery
    /// never calls this with a torn body).
    fn decode(header: RecordHeader, body: &[u8]) -> Result<Self, RedoError>;

    /// Applies this record's effect against the engine, as part of crash recovery replay.
    ///
    /// # Errors
    ///
    /// Returns [`RedoError::OutOfMemory`] if applying the record exhausted memory, which is fatal
    /// to recovery.
    fn redo_from_record(&self) -> Result<(), RedoError>;
}

//! An in-memory write-ahead log staging buffer.
//!
//! This crate sits between transactional client threads and a durable log file on disk. Producers
//! call [`engine::CmdLog::log_record_write`] to append a record to an in-memory ring buffer; a
//! background flusher thread (or an on-demand [`engine::CmdLog::log_buffer_flush`] call) drains
//! sealed ranges of that ring to disk via a parallel flush-request queue; [`engine::CmdLog::log_file_sync`]
//! durably fsyncs what has been drained. Three monotonic LSN watermarks -- write, flush, and
//! fsync -- let callers reason about exactly how durable any given record is at any moment.
//!
//! Rotating to a new log file is a dual-write protocol: [`engine::CmdLog::cmdlog_file_prepare`] opens
//! the next file and begins tagging new writes for both files, and
//! [`engine::CmdLog::cmdlog_complete_dual_write`] resolves the rotation once the caller has decided
//! whether it succeeded.
//!
//! What a record actually *is* -- its wire format and what redoing it means -- is left to the
//! caller's [`record::RecordCodec`] implementation; this crate only ever copies bytes and walks
//! header/body framing.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod durability;
pub mod engine;
pub mod file_pair;
pub mod io;
pub mod lsn;
pub mod record;
pub mod recovery;
pub mod rotation;
pub mod ring;

mod flusher;
mod producer;
mod usage;

pub use config::{CmdLogConfig, CmdLogConfigBuilder};
pub use engine::{CmdLog, InitError};
pub use lsn::LogSn;
pub use producer::WriteError;
pub use record::{RecordCodec, RecordHeader, RedoError, MIN_RECORD_TOTAL_SIZE, RECORD_HEADER_LEN};
pub use recovery::{ApplyError, ApplyOutcome};
pub use rotation::PrepareError;

//! The top-level command-log buffer: wires the ring buffer, flush-request queue, file pair, and
//! the three LSN watermarks together behind the lock hierarchy the rest of this crate assumes.
//!
//! # Lock ordering
//!
//! `flush` is always acquired before `write`, never the other way around. The drain protocol in
//! [`crate::flusher`] holds `flush` for its entire call and briefly nests `write` inside it twice
//! (to read a flush-request slot and, afterwards, to advance past it), so disk I/O itself runs
//! with only `flush` held. [`crate::rotation::CmdLog::cmdlog_complete_dual_write`] follows the same
//! `flush` -> `write` order. [`crate::durability`]'s `log_file_sync` is the one deliberate
//! exception to "disk I/O only under `flush`": it drops `flush` entirely around the slow `fsync`
//! call, since syncing a file must never block producers or the flusher. `flush_lsn` and `fsync_lsn` are
//! leaf locks: taken only briefly, never held while waiting on `write` or `flush`, and never
//! acquired together.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use crossbeam_utils::atomic::AtomicCell;
use parking_lot::{Condvar, Mutex};
use snafu::{ResultExt, Snafu};
use tracing::info;

use crate::config::CmdLogConfig;
use crate::file_pair::LogFile;
use crate::io::open_rw_create;
use crate::lsn::LogSn;
use crate::record::RecordCodec;
use crate::ring::WriteState;

/// Errors initializing a [`CmdLog`].
#[derive(Debug, Snafu)]
pub enum InitError {
    #[snafu(display("failed to create data directory {}: {}", path.display(), source))]
    CreateDataDir { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to open current log file {}: {}", path.display(), source))]
    OpenCurrent { path: PathBuf, source: std::io::Error },
}

/// State guarded by the write lock: the ring buffer, flush-request queue, and the next LSN a
/// producer will hand out.
pub(crate) struct WriteGuarded {
    pub(crate) state: WriteState,
    pub(crate) write_lsn: LogSn,
}

/// State guarded by the flush lock: the current/next file pair.
pub(crate) struct FlushGuarded {
    pub(crate) log_file: LogFile,
}

/// An in-memory write-ahead log staging buffer.
///
/// Producers append records via [`CmdLog::log_record_write`]; a background flusher thread (or an
/// on-demand call to [`CmdLog::log_buffer_flush`]) drains them to disk; [`CmdLog::log_file_sync`]
/// durably persists what has been drained. `C` is the caller's [`RecordCodec`] implementation,
/// used both to size and copy records on the write path and to redo them during
/// [`crate::recovery::apply`].
pub struct CmdLog<C: RecordCodec> {
    pub(crate) config: CmdLogConfig,
    pub(crate) write: Mutex<WriteGuarded>,
    pub(crate) write_cv: Condvar,
    pub(crate) flush: Mutex<FlushGuarded>,
    pub(crate) flush_cv: Condvar,
    /// Only ever written by whichever thread currently holds `flush` (drain or recovery replay
    /// before the flusher starts), so a plain atomic cell is enough -- no compare-and-swap needed.
    pub(crate) flush_lsn: AtomicCell<LogSn>,
    /// Unlike `flush_lsn`, concurrent [`CmdLog::log_file_sync`] callers race to advance this past
    /// each other without holding `flush` for the whole call, so it keeps a real lock.
    pub(crate) fsync_lsn: Mutex<LogSn>,
    pub(crate) thread: Mutex<Option<JoinHandle<()>>>,
    pub(crate) running: AtomicBool,
    pub(crate) stop_requested: AtomicBool,
    /// Mirrors whether a dual-write rotation is in progress, so producers can tag new records
    /// without taking the flush lock on every write.
    pub(crate) dual_write_active: AtomicBool,
    pub(crate) _codec: PhantomData<fn() -> C>,
}

impl<C: RecordCodec> CmdLog<C> {
    /// Creates the data directory if needed, opens the current log file for appending, and
    /// returns a buffer ready to accept writes. Does not start the flusher thread; call
    /// [`CmdLog::flush_thread_start`] separately once recovery (if any) has run.
    pub fn init(config: CmdLogConfig) -> Result<Self, InitError> {
        std::fs::create_dir_all(config.data_dir())
            .with_context(|_| CreateDataDirSnafu { path: config.data_dir().to_path_buf() })?;

        let current_path = config.current_file_path();
        let file = open_rw_create(&current_path)
            .with_context(|_| OpenCurrentSnafu { path: current_path.clone() })?;

        let mut log_file = LogFile::new(config.data_dir().to_path_buf());
        log_file.current.install(file);

        let flush_queue_len = config.flush_queue_len();
        let auto_flush_size = config.auto_flush_size();
        let buffer_size = config.buffer_size();

        info!(
            data_dir = %config.data_dir().display(),
            buffer_size,
            flush_queue_len,
            "command log buffer initialized"
        );

        Ok(Self {
            config,
            write: Mutex::new(WriteGuarded {
                state: WriteState::new(buffer_size, flush_queue_len, auto_flush_size),
                write_lsn: LogSn::INITIAL,
            }),
            write_cv: Condvar::new(),
            flush: Mutex::new(FlushGuarded { log_file }),
            flush_cv: Condvar::new(),
            flush_lsn: AtomicCell::new(LogSn::INITIAL),
            fsync_lsn: Mutex::new(LogSn::INITIAL),
            thread: Mutex::new(None),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            dual_write_active: AtomicBool::new(false),
            _codec: PhantomData,
        })
    }

    pub fn config(&self) -> &CmdLogConfig {
        &self.config
    }

    /// The next position a producer will write to.
    pub fn write_lsn(&self) -> LogSn {
        self.write.lock().write_lsn
    }

    /// The next position already handed to `write(2)` but not necessarily fsynced.
    pub fn flush_lsn(&self) -> LogSn {
        self.flush_lsn.load()
    }

    /// The next position durably fsynced to disk.
    pub fn fsync_lsn(&self) -> LogSn {
        *self.fsync_lsn.lock()
    }

    /// Tears the buffer down: stops the flusher thread if running and drains any thread panic.
    ///
    /// Any records still sitting in the ring buffer that were never flushed are lost; callers
    /// that need a clean shutdown should call [`CmdLog::log_buffer_flush`] with the current write
    /// LSN first.
    pub fn shutdown(&self) {
        self.flush_thread_stop();
    }
}

impl<C: RecordCodec> Drop for CmdLog<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

//! Buffer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

// 100 MiB is the default ring buffer size used by the reference implementation this core is
// modeled on; it comfortably holds a burst of commands between flusher wakeups.
pub const DEFAULT_BUFFER_SIZE: u64 = 100 * 1024 * 1024;

// Auto-flush threshold for a single flush-request slot. Chosen to keep individual write(2) calls
// large without letting any one producer hog the queue while filling a slot.
pub const DEFAULT_AUTO_FLUSH_SIZE: u32 = 32 * 1024;

// 8-byte header + 8-byte minimum body is the smallest record this core will ever see.
pub const DEFAULT_MIN_RECORD_SIZE: u32 = 16;

// Records larger than this are rejected outright; this bounds both producer memcpy size and the
// amount of memory the recovery replay path will allocate for a single body.
pub const DEFAULT_MAX_RECORD_SIZE: u32 = 16 * 1024 * 1024;

// The flusher's backstop poll interval: how long it sleeps on its condition variable when the
// flush-request queue is empty, so that a missed wakeup never stalls flushing for more than this.
pub const DEFAULT_FLUSHER_POLL_INTERVAL: Duration = Duration::from_millis(10);

const DEFAULT_CURRENT_FILE_NAME: &str = "commandlog";
const DEFAULT_NEXT_FILE_NAME: &str = "commandlog.next";

/// Buffer configuration.
///
/// Controls the size of the in-memory ring buffer, the auto-flush threshold for individual flush
/// slots, the bounds on an individual record, the flusher's poll interval, and where on disk the
/// current/next log files live.
#[derive(Clone, Debug)]
pub struct CmdLogConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) buffer_size: u64,
    pub(crate) auto_flush_size: u32,
    pub(crate) min_record_size: u32,
    pub(crate) max_record_size: u32,
    pub(crate) flusher_poll_interval: Duration,
}

impl CmdLogConfig {
    /// Starts building a configuration rooted at `data_dir`, where the current and next log files
    /// will be created.
    pub fn from_path<P>(data_dir: P) -> CmdLogConfigBuilder
    where
        P: AsRef<Path>,
    {
        CmdLogConfigBuilder {
            data_dir: data_dir.as_ref().to_path_buf(),
            buffer_size: None,
            auto_flush_size: None,
            min_record_size: None,
            max_record_size: None,
            flusher_poll_interval: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn auto_flush_size(&self) -> u32 {
        self.auto_flush_size
    }

    pub fn min_record_size(&self) -> u32 {
        self.min_record_size
    }

    pub fn max_record_size(&self) -> u32 {
        self.max_record_size
    }

    pub fn flusher_poll_interval(&self) -> Duration {
        self.flusher_poll_interval
    }

    /// Number of flush-request-queue slots: `buffer_size / min_record_size`, the worst case of
    /// one slot per minimum-sized record, so the queue can never itself become the bottleneck.
    pub(crate) fn flush_queue_len(&self) -> usize {
        (self.buffer_size / self.min_record_size as u64) as usize
    }

    pub(crate) fn current_file_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_CURRENT_FILE_NAME)
    }

    /// The default path a caller should pass to [`crate::engine::CmdLog::cmdlog_file_prepare`]
    /// when rotating, absent some other naming scheme (e.g. checkpoint-numbered files).
    pub fn next_file_path(&self) -> PathBuf {
        self.data_dir.join(DEFAULT_NEXT_FILE_NAME)
    }
}

/// Builder for [`CmdLogConfig`].
pub struct CmdLogConfigBuilder {
    data_dir: PathBuf,
    buffer_size: Option<u64>,
    auto_flush_size: Option<u32>,
    min_record_size: Option<u32>,
    max_record_size: Option<u32>,
    flusher_poll_interval: Option<Duration>,
}

impl CmdLogConfigBuilder {
    /// Sets the ring buffer size, in bytes.
    ///
    /// Defaults to 100 MiB.
    pub fn buffer_size(mut self, amount: u64) -> Self {
        self.buffer_size = Some(amount);
        self
    }

    /// Sets the auto-flush threshold, in bytes, for a single flush-request slot.
    ///
    /// Defaults to 32 KiB.
    pub fn auto_flush_size(mut self, amount: u32) -> Self {
        self.auto_flush_size = Some(amount);
        self
    }

    /// Sets the minimum record size, used to size the flush-request queue.
    ///
    /// Defaults to 16 bytes (the 8-byte header plus an 8-byte minimum body).
    pub fn min_record_size(mut self, amount: u32) -> Self {
        self.min_record_size = Some(amount);
        self
    }

    /// Sets the maximum allowed encoded record size.
    ///
    /// Defaults to 16 MiB.
    pub fn max_record_size(mut self, amount: u32) -> Self {
        self.max_record_size = Some(amount);
        self
    }

    /// Sets how long the flusher sleeps on its condition variable when there is nothing to
    /// flush, as a safety net against missed wakeups.
    ///
    /// Defaults to 10 milliseconds.
    pub fn flusher_poll_interval(mut self, interval: Duration) -> Self {
        self.flusher_poll_interval = Some(interval);
        self
    }

    /// Builds the configuration, applying defaults for any unset fields.
    pub fn build(self) -> CmdLogConfig {
        CmdLogConfig {
            data_dir: self.data_dir,
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            auto_flush_size: self.auto_flush_size.unwrap_or(DEFAULT_AUTO_FLUSH_SIZE),
            min_record_size: self.min_record_size.unwrap_or(DEFAULT_MIN_RECORD_SIZE),
            max_record_size: self.max_record_size.unwrap_or(DEFAULT_MAX_RECORD_SIZE),
            flusher_poll_interval: self
                .flusher_poll_interval
                .unwrap_or(DEFAULT_FLUSHER_POLL_INTERVAL),
        }
    }
}

//! Watermark and ring-occupancy gauges.
//!
//! Three numbers matter for operating this buffer: how far ahead the write watermark is of the
//! flush watermark (producer work not yet handed to `write(2)`), how far ahead flush is of fsync
//! (data on disk but not yet durable), and how full the ring buffer itself is. All three are
//! exposed as [`metrics`] gauges rather than counters, since each is a point-in-time level, not an
//! accumulating total.

use metrics::gauge;

use crate::lsn::LogSn;

const WRITE_LSN_GAUGE: &str = "cmdlogbuf_write_lsn_bytes";
const FLUSH_LSN_GAUGE: &str = "cmdlogbuf_flush_lsn_bytes";
const FSYNC_LSN_GAUGE: &str = "cmdlogbuf_fsync_lsn_bytes";
const RING_OCCUPANCY_GAUGE: &str = "cmdlogbuf_ring_occupancy_bytes";

/// A single LSN's logical byte position, collapsed across file boundaries, for use as a gauge
/// value: `file_number` dominates so the gauge still trends upward across a rotation.
fn as_gauge_value(lsn: LogSn, buffer_size: u64) -> f64 {
    (lsn.file_number as u64 as f64) * (buffer_size.max(1) as f64) + lsn.byte_offset as f64
}

/// Reports the three LSN watermarks and the current ring occupancy.
pub(crate) fn report_watermarks(write_lsn: LogSn, flush_lsn: LogSn, fsync_lsn: LogSn, buffer_size: u64) {
    gauge!(WRITE_LSN_GAUGE).set(as_gauge_value(write_lsn, buffer_size));
    gauge!(FLUSH_LSN_GAUGE).set(as_gauge_value(flush_lsn, buffer_size));
    gauge!(FSYNC_LSN_GAUGE).set(as_gauge_value(fsync_lsn, buffer_size));
}

/// Reports how many bytes of the ring buffer are currently occupied by unflushed records.
pub(crate) fn report_ring_occupancy(occupied_bytes: u64) {
    gauge!(RING_OCCUPANCY_GAUGE).set(occupied_bytes as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_value_trends_upward_across_a_file_rotation() {
        let before = as_gauge_value(LogSn::new(1, 900), 1000);
        let after = as_gauge_value(LogSn::new(2, 10), 1000);
        assert!(after > before);
    }
}

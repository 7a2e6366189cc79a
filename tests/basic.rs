mod common;

use std::sync::Arc;
use std::time::Duration;

use cmdlogbuf::{CmdLog, CmdLogConfig, LogSn};
use common::TestRecord;

fn engine(buffer_size: u64) -> (tempfile::TempDir, Arc<CmdLog<TestRecord>>) {
    let dir = tempfile::tempdir().unwrap();
    let config = CmdLogConfig::from_path(dir.path())
        .buffer_size(buffer_size)
        .auto_flush_size(512)
        .min_record_size(16)
        .flusher_poll_interval(Duration::from_millis(5))
        .build();
    let engine = Arc::new(CmdLog::init(config).unwrap());
    (dir, engine)
}

#[test]
fn a_single_small_record_reaches_disk_once_flushed() {
    let (dir, engine) = engine(1 << 20);
    let record = TestRecord::new(32);
    let lsn = engine.log_record_write(&record).unwrap();
    assert_eq!(lsn, LogSn::INITIAL);

    engine.log_buffer_flush(engine.write_lsn());
    assert!(engine.flush_lsn() >= LogSn::new(1, record.total_size() as u64));

    let on_disk = std::fs::read(dir.path().join("commandlog")).unwrap();
    assert_eq!(on_disk.len(), record.total_size());
}

#[test]
fn background_flusher_thread_drains_without_explicit_flush_calls() {
    let (_dir, engine) = engine(1 << 20);
    engine.flush_thread_start();

    let mut last_lsn = LogSn::INITIAL;
    for _ in 0..50 {
        last_lsn = engine.log_record_write(&TestRecord::new(64)).unwrap();
    }

    // Give the background thread a chance to catch up; its poll interval is 5ms.
    for _ in 0..200 {
        if engine.flush_lsn() > last_lsn {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(engine.flush_lsn() > last_lsn);

    engine.flush_thread_stop();
}

#[test]
fn ring_buffer_wraps_and_keeps_accepting_writes() {
    let (_dir, engine) = engine(4096);
    for _ in 0..500 {
        engine.log_record_write(&TestRecord::new(32)).unwrap();
    }
    // 500 * 48 bytes is well past 4096, so this only succeeds if wrapping worked.
    assert!(engine.write_lsn().byte_offset > 4096);
}

#[test]
fn backpressure_is_resolved_by_the_producer_itself() {
    let (_dir, engine) = engine(1024);
    // No flusher thread running: every write past the first handful must drain space itself.
    for _ in 0..100 {
        engine.log_record_write(&TestRecord::new(16)).unwrap();
    }
}

#[test]
fn log_file_sync_advances_fsync_lsn_up_to_what_was_flushed() {
    let (_dir, engine) = engine(1 << 20);
    engine.log_record_write(&TestRecord::new(16)).unwrap();
    engine.log_buffer_flush(engine.write_lsn());

    let flushed = engine.flush_lsn();
    let synced = engine.log_file_sync();
    assert_eq!(synced, flushed);
    assert_eq!(engine.fsync_lsn(), flushed);
}

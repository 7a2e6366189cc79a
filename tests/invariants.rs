//! Property tests for the watermark and on-disk invariants that must hold no matter how writes,
//! flushes, and fsyncs are interleaved: LSN ordering, LSN-equals-cumulative-size, and round-
//! tripping what actually landed on disk against what was written.

mod common;

use std::sync::Arc;

use proptest::{
    collection::vec as arb_vec,
    prop_assert, prop_assert_eq, prop_oneof,
    strategy::{Just, Strategy},
    proptest,
};

use cmdlogbuf::{CmdLog, CmdLogConfig, LogSn};
use common::TestRecord;

fn engine(buffer_size: u64) -> (tempfile::TempDir, Arc<CmdLog<TestRecord>>) {
    let dir = tempfile::tempdir().unwrap();
    let config = CmdLogConfig::from_path(dir.path())
        .buffer_size(buffer_size)
        .auto_flush_size(64)
        .min_record_size(16)
        .build();
    let engine = Arc::new(CmdLog::init(config).unwrap());
    (dir, engine)
}

/// An interleaved sequence of writes (record body length) and on-demand flushes-to-some-prior-LSN.
#[derive(Debug, Clone)]
enum Op {
    Write(usize),
    FlushToLatest,
    Sync,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        (0usize..200).prop_map(Op::Write),
        Just(Op::FlushToLatest),
        Just(Op::Sync),
    ];
    arb_vec(op, 1..200)
}

proptest! {
    /// At every observation point, `fsync_lsn <= flush_lsn <= write_lsn`, and the bytes on disk
    /// never exceed what flush claims to have handed to `write(2)`.
    #[test]
    fn watermarks_stay_ordered_and_disk_never_outpaces_flush_lsn(ops in arb_ops()) {
        let (dir, engine) = engine(8192);
        let mut expected = Vec::new();

        for op in ops {
            match op {
                Op::Write(len) => {
                    let record = TestRecord::new(len);
                    engine.log_record_write(&record).unwrap();
                    expected.extend(encode(&record));
                }
                Op::FlushToLatest => {
                    engine.log_buffer_flush(engine.write_lsn());
                }
                Op::Sync => {
                    engine.log_file_sync();
                }
            }

            let write_lsn = engine.write_lsn();
            let flush_lsn = engine.flush_lsn();
            let fsync_lsn = engine.fsync_lsn();
            prop_assert!(fsync_lsn <= flush_lsn);
            prop_assert!(flush_lsn <= write_lsn);

            let on_disk_len = std::fs::metadata(dir.path().join("commandlog")).unwrap().len();
            prop_assert!(on_disk_len <= flush_lsn.byte_offset);
        }

        // Final flush brings everything to disk; since this test never rotates, file_number stays 1
        // and byte_offset is exactly the cumulative size of every record written.
        engine.log_buffer_flush(engine.write_lsn());
        prop_assert_eq!(engine.write_lsn(), LogSn::new(1, expected.len() as u64));
        prop_assert_eq!(engine.flush_lsn(), LogSn::new(1, expected.len() as u64));

        let on_disk = std::fs::read(dir.path().join("commandlog")).unwrap();
        prop_assert_eq!(on_disk, expected);
    }

    /// Calling `log_file_sync` twice with no intervening write is a no-op the second time: the
    /// fsync watermark does not move.
    #[test]
    fn fsync_is_idempotent_with_no_intervening_write(lens in arb_vec(0usize..128, 0..20)) {
        let (_dir, engine) = engine(8192);
        for len in lens {
            engine.log_record_write(&TestRecord::new(len)).unwrap();
        }
        engine.log_buffer_flush(engine.write_lsn());

        let first = engine.log_file_sync();
        let second = engine.log_file_sync();
        prop_assert_eq!(first, second);
    }
}

fn encode(record: &TestRecord) -> Vec<u8> {
    let mut buf = vec![0u8; record.total_size()];
    cmdlogbuf::RecordCodec::write_to_buffer(record, &mut buf);
    buf
}

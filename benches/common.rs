//! Shared benchmark helpers: a disposable per-iteration data directory, and a minimal
//! [`RecordCodec`] whose body is just padding of the requested width.

use std::path::PathBuf;

use cmdlogbuf::{RecordCodec, RecordHeader, RedoError};

/// Hands out a fresh subdirectory per benchmark iteration so successive runs never reuse (and
/// thereby cross-pollute) a prior iteration's log file, and removes the whole tree on drop.
pub struct TempDataDir {
    index: usize,
    base: PathBuf,
}

impl TempDataDir {
    pub fn new(name: &str) -> Self {
        let mut base = std::env::temp_dir();
        base.push(name);
        std::fs::create_dir_all(&base).expect("could not create benchmark base dir");
        Self { index: 0, base }
    }

    pub fn next(&mut self) -> PathBuf {
        let dir = self.base.join(self.index.to_string());
        self.index += 1;
        std::fs::create_dir_all(&dir).expect("could not create benchmark iteration dir");
        dir
    }
}

impl Drop for TempDataDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.base);
    }
}

/// A benchmark record with a fixed-width, otherwise meaningless payload.
#[derive(Debug, Clone)]
pub struct BenchRecord {
    payload: Vec<u8>,
}

impl BenchRecord {
    pub fn new(body_len: usize) -> Self {
        Self {
            payload: vec![0xCD; body_len],
        }
    }
}

impl RecordCodec for BenchRecord {
    const MAX_LOG_RECORD_SIZE: usize = 16 * 1024 * 1024;

    fn body_length(&self) -> u32 {
        self.payload.len() as u32
    }

    fn write_to_buffer(&self, dst: &mut [u8]) {
        dst[0..4].copy_from_slice(&[0, 0, 0, 0]);
        dst[4..8].copy_from_slice(&(self.payload.len() as u32).to_le_bytes());
        dst[8..8 + self.payload.len()].copy_from_slice(&self.payload);
    }

    fn decode(header: RecordHeader, body: &[u8]) -> Result<Self, RedoError> {
        debug_assert_eq!(body.len(), header.body_length as usize);
        Ok(BenchRecord {
            payload: body.to_vec(),
        })
    }

    fn redo_from_record(&self) -> Result<(), RedoError> {
        Ok(())
    }
}

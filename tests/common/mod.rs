use cmdlogbuf::{RecordCodec, RecordHeader, RedoError, RECORD_HEADER_LEN};

/// A record whose body is `len` arbitrary bytes. Redo always succeeds; this crate doesn't attempt
/// to model an actual downstream engine, just the framing this library owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub payload: Vec<u8>,
}

impl TestRecord {
    pub fn new(len: usize) -> Self {
        Self {
            payload: (0..len).map(|i| (i % 251) as u8).collect(),
        }
    }

    pub fn total_size(&self) -> usize {
        RECORD_HEADER_LEN + self.payload.len()
    }
}

impl RecordCodec for TestRecord {
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
        Ok(TestRecord {
            payload: body.to_vec(),
        })
    }

    fn redo_from_record(&self) -> Result<(), RedoError> {
        Ok(())
    }
}

use crate::acquisition::interfaces::EventSource;
use crate::error::TuneError;
use crate::types::EventRecord;
use crate::utils::read_raw_records;
use std::collections::VecDeque;
use std::path::Path;

/// Replays a recorded raw dump, handing out at most `chunk_size` records per
/// drain.
pub struct RawFileSource {
    pending: VecDeque<EventRecord>,
    chunk_size: usize,
}

impl RawFileSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, TuneError> {
        Ok(Self::from_records(read_raw_records(path)?, chunk_size))
    }

    pub fn from_records(records: Vec<EventRecord>, chunk_size: usize) -> Self {
        Self {
            pending: records.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl EventSource for RawFileSource {
    fn take_available(&mut self) -> Vec<EventRecord> {
        let n = self.chunk_size.min(self.pending.len());
        self.pending.drain(..n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{data_header_word, trigger_word};
    use crate::utils::write_raw_words;

    #[test]
    fn replays_dump_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        let words: Vec<u32> = (0..5)
            .map(|bcid| data_header_word(4, bcid))
            .chain([trigger_word(9)])
            .collect();
        write_raw_words(&path, &words).unwrap();

        let mut source = RawFileSource::open(&path, 4).unwrap();
        assert_eq!(source.remaining(), 6);
        assert_eq!(source.take_available().len(), 4);
        let tail = source.take_available();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].kind(), "trigger");
        assert!(source.take_available().is_empty());
    }

    #[test]
    fn truncated_dump_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5]).unwrap();
        assert!(matches!(
            RawFileSource::open(&path, 16),
            Err(TuneError::Decode(_))
        ));
    }
}

//! Destinations for demultiplexed raw data

use crate::error::Result;
use crate::processing::table::RecordColumns;
use crate::types::{EventRecord, SessionTag};
use polars::prelude::DataFrame;
use polars_io::prelude::ParquetWriter;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Receives every batch a session forwards, tagged with its destination and
/// scan parameter. Appends are synchronous.
pub trait RawDataSink {
    fn append(&mut self, destination: &str, records: &[EventRecord], tag: &SessionTag)
    -> Result<()>;
}

impl<T: RawDataSink + ?Sized> RawDataSink for &mut T {
    fn append(
        &mut self,
        destination: &str,
        records: &[EventRecord],
        tag: &SessionTag,
    ) -> Result<()> {
        (**self).append(destination, records, tag)
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RawDataSink for DiscardSink {
    fn append(&mut self, _: &str, _: &[EventRecord], _: &SessionTag) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinkBatch {
    pub destination: String,
    pub tag: SessionTag,
    pub records: Vec<EventRecord>,
}

/// Keeps every appended batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Vec<SinkBatch>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[SinkBatch] {
        &self.batches
    }

    /// All records of one destination in append order.
    pub fn records_for(&self, destination: &str) -> Vec<EventRecord> {
        self.batches
            .iter()
            .filter(|batch| batch.destination == destination)
            .flat_map(|batch| batch.records.iter().copied())
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.records.len()).sum()
    }
}

impl RawDataSink for MemorySink {
    fn append(
        &mut self,
        destination: &str,
        records: &[EventRecord],
        tag: &SessionTag,
    ) -> Result<()> {
        self.batches.push(SinkBatch {
            destination: destination.to_string(),
            tag: tag.clone(),
            records: records.to_vec(),
        });
        Ok(())
    }
}

/// Collects the records of one destination for the current session while
/// passing every batch on to `downstream`.
pub struct CollectingSink<'a, K: RawDataSink + ?Sized> {
    destination: String,
    collected: Vec<EventRecord>,
    downstream: &'a mut K,
}

impl<'a, K: RawDataSink + ?Sized> CollectingSink<'a, K> {
    pub fn new(destination: impl Into<String>, downstream: &'a mut K) -> Self {
        Self {
            destination: destination.into(),
            collected: Vec::new(),
            downstream,
        }
    }

    pub fn into_records(self) -> Vec<EventRecord> {
        self.collected
    }
}

impl<K: RawDataSink + ?Sized> RawDataSink for CollectingSink<'_, K> {
    fn append(
        &mut self,
        destination: &str,
        records: &[EventRecord],
        tag: &SessionTag,
    ) -> Result<()> {
        if destination == self.destination {
            self.collected.extend_from_slice(records);
        }
        self.downstream.append(destination, records, tag)
    }
}

/// Buffers all records with their destination and scan parameter and writes
/// them as one parquet file on [`ParquetSink::finish`].
pub struct ParquetSink {
    path: PathBuf,
    columns: RecordColumns,
}

impl ParquetSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns: RecordColumns::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the buffered rows and returns the table that was written.
    pub fn finish(self) -> Result<DataFrame> {
        let mut df = self.columns.into_dataframe(true)?;
        let mut file = File::create(&self.path)?;
        ParquetWriter::new(&mut file).finish(&mut df)?;
        tracing::debug!(rows = df.height(), path = %self.path.display(), "Raw data written");
        Ok(df)
    }
}

impl RawDataSink for ParquetSink {
    fn append(
        &mut self,
        destination: &str,
        records: &[EventRecord],
        tag: &SessionTag,
    ) -> Result<()> {
        for record in records {
            self.columns.push(
                Some(destination),
                Some((tag.parameter.as_str(), tag.value)),
                record,
            );
        }
        Ok(())
    }
}

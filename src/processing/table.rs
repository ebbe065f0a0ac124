use crate::types::{EventRecord, Payload};
use polars::prelude::*;

/// Flat table of records, one row per record. Hit-only columns are null for
/// other record kinds.
pub fn records_to_dataframe(records: &[EventRecord]) -> Result<DataFrame, PolarsError> {
    let mut table = RecordColumns::default();
    for record in records {
        table.push(None, None, record);
    }
    table.into_dataframe(false)
}

/// Column buffers shared by the record table and the parquet sink.
#[derive(Default)]
pub(crate) struct RecordColumns {
    scan_parameters: Vec<String>,
    scan_values: Vec<i64>,
    destinations: Vec<String>,
    channels: Vec<u32>,
    kinds: Vec<String>,
    columns: Vec<Option<u32>>,
    rows: Vec<Option<u32>>,
    tots: Vec<Option<u32>>,
    values: Vec<Option<u32>>,
}

impl RecordColumns {
    pub(crate) fn len(&self) -> usize {
        self.kinds.len()
    }

    pub(crate) fn push(
        &mut self,
        destination: Option<&str>,
        tag: Option<(&str, i64)>,
        record: &EventRecord,
    ) {
        let (parameter, value) = tag.unwrap_or(("", 0));
        self.scan_parameters.push(parameter.to_string());
        self.scan_values.push(value);
        self.destinations.push(destination.unwrap_or("").to_string());
        self.channels.push(record.channel as u32);
        self.kinds.push(record.kind().to_string());

        let (column, row, tot, value) = match record.payload {
            Payload::Hit(hit) => (
                Some(hit.column as u32),
                Some(hit.row as u32),
                Some(hit.tot as u32),
                None,
            ),
            Payload::DataHeader { bcid } => (None, None, None, Some(bcid as u32)),
            Payload::Trigger { number } => (None, None, None, Some(number)),
            Payload::Other(word) => (None, None, None, Some(word)),
        };
        self.columns.push(column);
        self.rows.push(row);
        self.tots.push(tot);
        self.values.push(value);
    }

    pub(crate) fn into_dataframe(self, with_session: bool) -> Result<DataFrame, PolarsError> {
        let mut columns: Vec<Column> = Vec::with_capacity(9);
        if with_session {
            columns.push(Series::new("scan_parameter".into(), &self.scan_parameters).into());
            columns.push(Series::new("scan_value".into(), &self.scan_values).into());
            columns.push(Series::new("destination".into(), &self.destinations).into());
        }
        let record_columns: [Column; 6] = [
            Series::new("channel".into(), &self.channels).into(),
            Series::new("kind".into(), &self.kinds).into(),
            Series::new("column".into(), &self.columns).into(),
            Series::new("row".into(), &self.rows).into(),
            Series::new("tot".into(), &self.tots).into(),
            Series::new("value".into(), &self.values).into(),
        ];
        columns.extend(record_columns);
        DataFrame::new(columns)
    }
}

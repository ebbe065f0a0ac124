//! Python bindings for offline analysis of recorded raw data.

use crate::error::TuneError;
use crate::processing::{records_to_dataframe, reduce};
use crate::types::{ChannelId, EventRecord, Geometry, PixelMask};
use crate::utils::{bits_set, read_raw_records};
use pyo3::{
    Bound, PyErr, PyResult, pyfunction, pymodule, types::PyModule, types::PyModuleMethods,
    wrap_pyfunction,
};
use pyo3_polars::PyDataFrame;
use std::path::{Path, PathBuf};

impl From<TuneError> for PyErr {
    fn from(err: TuneError) -> PyErr {
        match err {
            TuneError::Io(e) => pyo3::exceptions::PyFileNotFoundError::new_err(e.to_string()),
            other => pyo3::exceptions::PyValueError::new_err(other.to_string()),
        }
    }
}

fn channel_records(file_path: &Path, channel: Option<ChannelId>) -> PyResult<Vec<EventRecord>> {
    let records = read_raw_records(file_path)?;
    Ok(match channel {
        Some(channel) => records.into_iter().filter(|r| r.channel == channel).collect(),
        None => records,
    })
}

/// Decodes a raw word dump into a Polars DataFrame, one row per record.
///
/// Args:
///     file_path (str): Path to the raw dump (little-endian 32-bit words).
///     channel (int, optional): Keep only records of this readout channel.
///
/// Returns:
///     polars.DataFrame: channel, kind, column, row, tot and value columns.
///
/// Raises:
///     FileNotFoundError: If the file cannot be opened.
///     ValueError: If the dump is truncated.
#[pyfunction]
#[pyo3(signature = (file_path, channel = None))]
fn hit_table(file_path: PathBuf, channel: Option<ChannelId>) -> PyResult<PyDataFrame> {
    let records = channel_records(&file_path, channel)?;
    let df = records_to_dataframe(&records).map_err(TuneError::from)?;
    Ok(PyDataFrame(df))
}

/// Median occupancy of the selected FE-I4 pixels in a raw dump.
///
/// The selection is built like the tuning mask: union of the enabled mask
/// steps, minus the columns set in `disable_column_config`.
#[pyfunction]
#[pyo3(signature = (
    file_path,
    channel = 4,
    mask_steps = 3,
    enable_mask_steps = vec![0],
    disable_column_config = 0
))]
fn median_occupancy(
    file_path: PathBuf,
    channel: ChannelId,
    mask_steps: usize,
    enable_mask_steps: Vec<usize>,
    disable_column_config: u64,
) -> PyResult<f64> {
    let mask = PixelMask::builder()
        .geometry(Geometry::FE_I4)
        .mask_steps(mask_steps)
        .enable_mask_steps(enable_mask_steps)
        .disabled_columns(bits_set(disable_column_config))
        .build()
        .map_err(TuneError::from)?;
    let records = channel_records(&file_path, Some(channel))?;
    let (_, median) = reduce(&records, &mask);
    Ok(median)
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn gdactune(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(hit_table, m)?)?;
    m.add_function(wrap_pyfunction!(median_occupancy, m)?)?;
    Ok(())
}

//! Error types shared by the acquisition and tuning layers

use thiserror::Error;

/// Problems with the requested tuning setup. Always raised before the first
/// session is started.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("pixel selection mask is empty")]
    EmptyPixelMask,

    #[error("no GDAC bits to tune")]
    EmptyBitPositions,

    #[error("GDAC bit positions must be strictly decreasing, got {bits:?}")]
    NonMonotonicBits { bits: Vec<u8> },

    #[error("GDAC bit {bit} is outside the 16-bit coarse/fine register")]
    BitOutOfRange { bit: u8 },

    #[error("number of mask steps must be at least 1")]
    InvalidMaskSteps,

    #[error("mask step {step} is out of range for {steps} mask steps")]
    MaskStepOutOfRange { step: usize, steps: usize },

    #[error("column {column} is out of range for {columns} columns")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("pixel mask shape {found:?} does not match geometry {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("number of injections must be at least 1")]
    ZeroInjections,

    #[error("poll interval must be at least 1 ms")]
    ZeroPollInterval,

    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("front-end error: {0}")]
    FrontEnd(String),

    #[error("raw data sink error: {0}")]
    Sink(String),

    #[error("tuning cancelled during trial at GDAC {gdac}")]
    Cancelled { gdac: u16 },

    #[error("failed to decode raw data: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, TuneError>;

//! Global threshold (GDAC) tuning for pixel front-ends.
//!
//! An acquisition session arms the front-end trigger and polls the readout
//! buffer until a stop condition; the occupancy of each session is reduced to
//! a median over the selected pixels, and a binary search over the threshold
//! register bits drives the median to half the number of injections.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod logging;
pub mod parser;
pub mod processing;
#[cfg(feature = "python")]
pub mod python;
pub mod sink;
pub mod tuning;
pub mod types;
pub mod utils;

pub use acquisition::{
    CancellationToken, Clock, Demultiplexer, EventSource, FrontEnd, SessionController,
    SessionObserver, SystemClock,
};
pub use config::{SessionConfig, TuningConfig};
pub use error::{ConfigurationError, Result, TuneError};
pub use logging::init_logging;
pub use sink::{MemorySink, ParquetSink, RawDataSink};
pub use tuning::{BinarySearchTuner, GdacTuning, OccupancyProbe};
pub use types::{
    EventRecord, OccupancyHistogram, PixelMask, SessionReport, StopCondition, TuningOutcome,
    TuningRegisterValue,
};

//! Threshold tuning on top of acquisition sessions

pub mod probe;
pub mod run;
pub mod tuner;

pub use probe::{SCAN_PARAMETER, SessionProbe};
pub use run::GdacTuning;
pub use tuner::{BinarySearchTuner, OccupancyProbe};

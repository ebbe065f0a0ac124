//! Type definitions for records, masks, histograms and tuning results

pub mod event;
pub mod histogram;
pub mod outcome;
pub mod pixel_mask;
pub mod register;
pub mod session;

// Re-export the main types for convenience
pub use event::{ChannelId, EventRecord, Hit, Payload, TRIGGER_CHANNEL};
pub use histogram::OccupancyHistogram;
pub use outcome::{BestTrial, TrialRecord, TuningOutcome, TuningWarning};
pub use pixel_mask::{Geometry, PixelMask};
pub use register::{MAX_GDAC_BIT, TuningRegisterValue};
pub use session::{SessionEvent, SessionReport, SessionTag, StopCondition};

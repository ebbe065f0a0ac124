//! Acquisition sessions: front-end access, record buffering, demultiplexing
//! and the polling loop that ties them together

pub mod clock;
pub mod demux;
pub mod interfaces;
pub mod queue;
pub mod replay;
pub mod session;
pub mod simulation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use demux::Demultiplexer;
pub use interfaces::{EventSource, FrontEnd, LogObserver, SessionObserver};
pub use queue::{CancellationToken, RecordConsumer, RecordProducer, record_queue};
pub use replay::RawFileSource;
pub use session::SessionController;
pub use simulation::{PixelResponse, SimulatedFrontEnd};

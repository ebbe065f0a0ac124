//! Collaborators of the acquisition loop

use crate::error::Result;
use crate::types::{EventRecord, SessionEvent, TuningRegisterValue};
use tracing::info;

/// Trigger and register access of the hardware front-end.
///
/// The trigger counter may wrap around; the session only compares readings
/// modulo its reporting interval.
pub trait FrontEnd {
    fn arm_trigger(&mut self) -> Result<()>;
    fn disarm_trigger(&mut self) -> Result<()>;
    fn trigger_counter(&mut self) -> Result<u64>;
    fn set_threshold_register(&mut self, value: TuningRegisterValue) -> Result<()>;
    fn threshold_register(&mut self) -> Result<TuningRegisterValue>;
}

/// Stream of records, drained without blocking.
pub trait EventSource {
    /// Everything buffered right now; empty when nothing arrived.
    fn take_available(&mut self) -> Vec<EventRecord>;
}

/// One-way progress notifications of a session.
pub trait SessionObserver {
    fn notify(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent),
{
    fn notify(&self, event: &SessionEvent) {
        self(event)
    }
}

/// Reports session events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn notify(&self, event: &SessionEvent) {
        match event {
            SessionEvent::TriggerProgress { triggers } => {
                info!("Collected triggers: {}", triggers)
            }
            SessionEvent::DataConfirmed => info!("Taking data..."),
            SessionEvent::Stopped { stop, triggers } => {
                info!(%stop, "Total amount of triggers collected: {}", triggers)
            }
        }
    }
}

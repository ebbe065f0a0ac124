//! Types describing one acquisition session

use std::fmt;
use std::time::Duration;

/// Why a session ended. Every session ends with exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopCondition {
    MaxTriggersReached,
    ScanTimeoutReached,
    NoDataTimeoutReached,
    ExternallyCancelled,
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopCondition::MaxTriggersReached => "reached maximum triggers",
            StopCondition::ScanTimeoutReached => "reached maximum scan time",
            StopCondition::NoDataTimeoutReached => "reached no data timeout",
            StopCondition::ExternallyCancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

/// Scan parameter attached to every raw-data append of a session, e.g. `GDAC = 140`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionTag {
    pub parameter: String,
    pub value: i64,
}

impl SessionTag {
    pub fn new(parameter: impl Into<String>, value: i64) -> Self {
        Self {
            parameter: parameter.into(),
            value,
        }
    }
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.parameter, self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub stop: StopCondition,
    /// Trigger counter read after disarming.
    pub triggers: u64,
    /// Records handed to the sink, residual flush included.
    pub records: usize,
    pub elapsed: Duration,
}

/// Notifications emitted while a session runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TriggerProgress { triggers: u64 },
    DataConfirmed,
    Stopped { stop: StopCondition, triggers: u64 },
}

//! Polling loop of one acquisition session.
//!
//! A session arms the front-end trigger, drains the record source once per
//! poll interval, forwards every batch through the demultiplexer to the sink
//! and stops on the first of: trigger limit, scan timeout, no-data timeout or
//! cancellation. After disarming it flushes whatever is still buffered.

use crate::acquisition::clock::Clock;
use crate::acquisition::demux::Demultiplexer;
use crate::acquisition::interfaces::{EventSource, FrontEnd, LogObserver, SessionObserver};
use crate::acquisition::queue::CancellationToken;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::sink::RawDataSink;
use crate::types::{EventRecord, SessionEvent, SessionReport, SessionTag, StopCondition};
use crate::utils::reporting_threshold;
use std::time::Duration;
use tracing::{debug, info, warn};

static LOG_OBSERVER: LogObserver = LogObserver;

pub struct SessionController<'a> {
    config: &'a SessionConfig,
    clock: &'a dyn Clock,
    cancel: &'a CancellationToken,
    observer: &'a dyn SessionObserver,
}

/// Timestamps and counters carried from one tick to the next.
struct PollState {
    show_trigger_at: u64,
    last_trigger: u64,
    scan_deadline: Duration,
    last_iteration: Duration,
    saw_data_at: Duration,
    saw_no_data_at: Duration,
    waiting_for_first_trigger: bool,
    forwarded: usize,
}

impl PollState {
    fn new(config: &SessionConfig, start: Duration) -> Self {
        Self {
            show_trigger_at: reporting_threshold(config.max_triggers),
            last_trigger: 0,
            scan_deadline: start.saturating_add(config.scan_timeout()),
            last_iteration: start,
            saw_data_at: start,
            saw_no_data_at: start,
            waiting_for_first_trigger: config.wait_for_first_trigger,
            forwarded: 0,
        }
    }
}

impl<'a> SessionController<'a> {
    /// Controller reporting progress through the log.
    pub fn new(
        config: &'a SessionConfig,
        clock: &'a dyn Clock,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            clock,
            cancel,
            observer: &LOG_OBSERVER,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn SessionObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Runs one session to completion.
    ///
    /// Invalid timing settings are rejected before the trigger is armed. Once
    /// armed, the trigger is disarmed on every exit path, errors included.
    /// Records still buffered after disarming are forwarded before returning.
    pub fn run<F, S, K>(
        &self,
        front_end: &mut F,
        source: &mut S,
        demux: &Demultiplexer,
        sink: &mut K,
        tag: &SessionTag,
    ) -> Result<SessionReport>
    where
        F: FrontEnd + ?Sized,
        S: EventSource + ?Sized,
        K: RawDataSink + ?Sized,
    {
        self.config.validate()?;
        let start = self.clock.now();
        debug!(%tag, "Starting acquisition session");
        front_end.arm_trigger()?;

        let mut state = PollState::new(self.config, start);
        let polled = self.poll(&mut state, front_end, source, demux, sink, tag);
        let disarmed = front_end.disarm_trigger();

        let stop = match polled {
            Ok(stop) => stop,
            Err(e) => {
                if let Err(disarm_error) = disarmed {
                    warn!("Failed to disarm trigger after error: {}", disarm_error);
                }
                return Err(e);
            }
        };
        disarmed?;

        let residual = source.take_available();
        if !residual.is_empty() {
            debug!(records = residual.len(), "Flushing residual records");
            state.forwarded += forward(residual, demux, sink, tag)?;
        }

        let triggers = front_end.trigger_counter()?;
        self.observer
            .notify(&SessionEvent::Stopped { stop, triggers });

        Ok(SessionReport {
            stop,
            triggers,
            records: state.forwarded,
            elapsed: self.clock.now().saturating_sub(start),
        })
    }

    fn poll<F, S, K>(
        &self,
        state: &mut PollState,
        front_end: &mut F,
        source: &mut S,
        demux: &Demultiplexer,
        sink: &mut K,
        tag: &SessionTag,
    ) -> Result<StopCondition>
    where
        F: FrontEnd + ?Sized,
        S: EventSource + ?Sized,
        K: RawDataSink + ?Sized,
    {
        let config = self.config;
        let poll_interval = config.poll_interval();
        let no_data_timeout = config.no_data_timeout();
        let silence_grace = config.silence_grace();

        loop {
            if self.clock.wait(poll_interval, self.cancel) {
                info!("Stopping scan on request...");
                return Ok(StopCondition::ExternallyCancelled);
            }

            // several conditions can trip in one tick; the first one set wins
            let mut stop = None;

            let triggers = front_end.trigger_counter()?;
            if triggers % state.show_trigger_at < state.last_trigger % state.show_trigger_at {
                self.observer
                    .notify(&SessionEvent::TriggerProgress { triggers });
            }
            state.last_trigger = triggers;
            if config.max_triggers.is_some_and(|max| triggers >= max) {
                info!("Reached maximum triggers. Stopping scan...");
                stop.get_or_insert(StopCondition::MaxTriggersReached);
            }

            let now = self.clock.now();
            if now > state.scan_deadline {
                info!("Reached maximum scan time. Stopping scan...");
                stop.get_or_insert(StopCondition::ScanTimeoutReached);
            }
            let tick = now.saturating_sub(state.last_iteration);
            state.last_iteration = now;

            let records = source.take_available();
            if records.is_empty() {
                if !state.waiting_for_first_trigger
                    && state.saw_no_data_at > state.saw_data_at.saturating_add(no_data_timeout)
                {
                    info!("Reached no data timeout. Stopping scan...");
                    stop.get_or_insert(StopCondition::NoDataTimeoutReached);
                } else if !state.waiting_for_first_trigger {
                    state.saw_no_data_at = now;
                }
                // silent time does not count against the scan timeout
                if now > state.saw_data_at.saturating_add(silence_grace) {
                    state.scan_deadline = state.scan_deadline.saturating_add(tick);
                }
            } else {
                state.forwarded += forward(records, demux, sink, tag)?;
                state.saw_data_at = now;
                if state.waiting_for_first_trigger {
                    state.waiting_for_first_trigger = false;
                    self.observer.notify(&SessionEvent::DataConfirmed);
                }
            }

            if let Some(stop) = stop {
                return Ok(stop);
            }
        }
    }
}

/// Hands one drained batch to the sink, split per destination. Returns the
/// number of records forwarded.
fn forward<K>(
    records: Vec<EventRecord>,
    demux: &Demultiplexer,
    sink: &mut K,
    tag: &SessionTag,
) -> Result<usize>
where
    K: RawDataSink + ?Sized,
{
    let mut forwarded = 0;
    for (destination, batch) in demux.split(records) {
        sink.append(destination, &batch, tag)?;
        forwarded += batch.len();
    }
    Ok(forwarded)
}

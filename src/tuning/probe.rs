use crate::acquisition::{Demultiplexer, EventSource, FrontEnd, SessionController};
use crate::error::{Result, TuneError};
use crate::processing::reduce;
use crate::sink::{CollectingSink, RawDataSink};
use crate::tuning::tuner::OccupancyProbe;
use crate::types::{
    OccupancyHistogram, PixelMask, SessionReport, SessionTag, StopCondition, TuningRegisterValue,
};
use bon::bon;
use tracing::{debug, warn};

/// Scan parameter name attached to every trial's raw data.
pub const SCAN_PARAMETER: &str = "GDAC";

/// Measures occupancy by running one acquisition session per trial.
///
/// Every batch of a trial goes to the downstream sink under a `GDAC` tag; the
/// records of the tuned destination are also kept for the occupancy
/// reduction.
pub struct SessionProbe<'a, F, S, K> {
    controller: SessionController<'a>,
    front_end: &'a mut F,
    source: &'a mut S,
    sink: &'a mut K,
    demux: &'a Demultiplexer,
    mask: &'a PixelMask,
    destination: String,
    last_histogram: Option<OccupancyHistogram>,
    last_report: Option<SessionReport>,
}

#[bon]
impl<'a, F, S, K> SessionProbe<'a, F, S, K>
where
    F: FrontEnd,
    S: EventSource,
    K: RawDataSink,
{
    #[builder]
    pub fn new(
        controller: SessionController<'a>,
        front_end: &'a mut F,
        source: &'a mut S,
        sink: &'a mut K,
        demux: &'a Demultiplexer,
        mask: &'a PixelMask,
        #[builder(into)] destination: String,
    ) -> Self {
        Self {
            controller,
            front_end,
            source,
            sink,
            demux,
            mask,
            destination,
            last_histogram: None,
            last_report: None,
        }
    }

    /// Occupancy of the most recent trial.
    pub fn last_histogram(&self) -> Option<&OccupancyHistogram> {
        self.last_histogram.as_ref()
    }

    pub fn last_report(&self) -> Option<&SessionReport> {
        self.last_report.as_ref()
    }
}

impl<F, S, K> OccupancyProbe for SessionProbe<'_, F, S, K>
where
    F: FrontEnd,
    S: EventSource,
    K: RawDataSink,
{
    fn measure(&mut self, value: TuningRegisterValue, bit: u8) -> Result<f64> {
        let gdac = value.combined();
        self.front_end.set_threshold_register(value)?;

        let tag = SessionTag::new(SCAN_PARAMETER, gdac as i64);
        let mut sink = CollectingSink::new(self.destination.as_str(), &mut *self.sink);
        let report = self.controller.run(
            &mut *self.front_end,
            &mut *self.source,
            self.demux,
            &mut sink,
            &tag,
        )?;
        let records = sink.into_records();

        match report.stop {
            StopCondition::ExternallyCancelled => return Err(TuneError::Cancelled { gdac }),
            StopCondition::MaxTriggersReached => {}
            stop => warn!("Trial at GDAC {} ended early: {}", gdac, stop),
        }

        let (histogram, median) = reduce(&records, self.mask);
        debug!(
            gdac,
            bit,
            records = records.len(),
            triggers = report.triggers,
            median,
            "Trial finished"
        );
        self.last_histogram = Some(histogram);
        self.last_report = Some(report);
        Ok(median)
    }
}

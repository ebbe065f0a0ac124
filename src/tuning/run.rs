//! Global threshold (GDAC) tuning run.

use crate::acquisition::{
    CancellationToken, Clock, Demultiplexer, EventSource, FrontEnd, SessionController,
};
use crate::config::TuningConfig;
use crate::error::{ConfigurationError, Result};
use crate::sink::RawDataSink;
use crate::tuning::probe::SessionProbe;
use crate::tuning::tuner::BinarySearchTuner;
use crate::types::{PixelMask, TuningOutcome};
use tracing::info;

/// Tunes the global threshold of one front-end to the injection charge, so
/// that the median selected pixel fires on half of the injections.
pub struct GdacTuning {
    config: TuningConfig,
    mask: PixelMask,
    tuner: BinarySearchTuner,
}

impl GdacTuning {
    /// Validates the configuration and builds the pixel selection. Nothing
    /// touches the front-end until [`GdacTuning::run`].
    pub fn new(config: TuningConfig) -> std::result::Result<Self, ConfigurationError> {
        config.validate()?;
        let mask = config.pixel_mask()?;
        let tuner = config.tuner();
        info!(
            selected = mask.selected_count(),
            bits = ?tuner.bit_positions(),
            "GDAC tuning configured"
        );
        Ok(Self {
            config,
            mask,
            tuner,
        })
    }

    pub fn config(&self) -> &TuningConfig {
        &self.config
    }

    pub fn mask(&self) -> &PixelMask {
        &self.mask
    }

    /// Routes the tuned channel to the configured destination and, if set,
    /// the trigger channel to `trigger_<destination>`.
    pub fn demultiplexer(&self) -> Demultiplexer {
        let demux = Demultiplexer::new().with_channel(&self.config.destination, self.config.channel);
        match self.config.trigger_channel {
            Some(channel) => {
                demux.with_channel(format!("trigger_{}", self.config.destination), channel)
            }
            None => demux,
        }
    }

    /// Runs the binary search against the front-end and writes the tuned
    /// value back to it.
    pub fn run<F, S, K>(
        &self,
        front_end: &mut F,
        source: &mut S,
        sink: &mut K,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> Result<TuningOutcome>
    where
        F: FrontEnd,
        S: EventSource,
        K: RawDataSink,
    {
        let session = self.config.trial_session();
        let demux = self.demultiplexer();
        let initial = front_end.threshold_register()?;
        info!("Initial Vthin_AltCoarse / Vthin_AltFine = {}", initial);

        let outcome = {
            let controller = SessionController::new(&session, clock, cancel);
            let mut probe = SessionProbe::builder()
                .controller(controller)
                .front_end(&mut *front_end)
                .source(source)
                .sink(sink)
                .demux(&demux)
                .mask(&self.mask)
                .destination(self.config.destination.as_str())
                .build();
            self.tuner.tune(initial, &mut probe)?
        };

        front_end.set_threshold_register(outcome.value)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{PixelResponse, SimulatedFrontEnd, SystemClock, record_queue};
    use crate::config::SessionConfig;
    use crate::error::TuneError;
    use crate::sink::MemorySink;
    use crate::types::{Geometry, TuningRegisterValue, TuningWarning};

    fn small_config() -> TuningConfig {
        TuningConfig {
            n_injections_gdac: 20,
            geometry: Geometry::new(8, 12),
            session: SessionConfig::builder()
                .poll_interval_ms(1)
                .scan_timeout_secs(30.0)
                .no_data_timeout_secs(10.0)
                .build(),
            ..TuningConfig::default()
        }
    }

    #[test]
    fn empty_selection_fails_before_any_session() {
        let config = TuningConfig {
            geometry: Geometry::new(2, 6),
            disable_column_config: 0b11,
            ..small_config()
        };
        assert!(matches!(
            GdacTuning::new(config),
            Err(ConfigurationError::EmptyPixelMask)
        ));
    }

    #[test]
    fn bad_bit_order_fails_before_any_session() {
        let config = TuningConfig {
            gdac_tune_bits: vec![0, 1, 2],
            ..small_config()
        };
        assert!(matches!(
            GdacTuning::new(config),
            Err(ConfigurationError::NonMonotonicBits { .. })
        ));
    }

    #[test]
    fn trigger_channel_gets_its_own_destination() {
        let tuning = GdacTuning::new(TuningConfig {
            trigger_channel: Some(3),
            ..small_config()
        })
        .unwrap();
        let demux = tuning.demultiplexer();
        assert_eq!(demux.tags().collect::<Vec<_>>(), vec!["fe", "trigger_fe"]);
    }

    #[test]
    fn tunes_simulated_front_end_to_its_threshold() {
        let config = small_config();
        let tuning = GdacTuning::new(config.clone()).unwrap();
        let (producer, mut consumer) = record_queue();
        let response = PixelResponse::builder().center(140.0).width(20.0).build();
        let mut front_end = SimulatedFrontEnd::for_config(&config, response, producer).unwrap();
        let mut sink = MemorySink::new();

        let outcome = tuning
            .run(
                &mut front_end,
                &mut consumer,
                &mut sink,
                &SystemClock::new(),
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(outcome.value.combined(), 140);
        assert_eq!(outcome.median, 10.0);
        assert!(outcome.converged());
        assert!(!outcome
            .warnings
            .iter()
            .any(|w| matches!(w, TuningWarning::NotConverged { .. })));
        assert_eq!(
            front_end.threshold_register().unwrap(),
            TuningRegisterValue::from_combined(140)
        );
        // one tagged session per trial
        let mut tags: Vec<i64> = sink.batches().iter().map(|b| b.tag.value).collect();
        tags.dedup();
        assert_eq!(tags, vec![128, 192, 160, 144, 136, 140]);
        assert!(sink.batches().iter().all(|b| b.tag.parameter == "GDAC"));

        let table = outcome.trial_table().unwrap();
        assert_eq!(table.height(), 6);
        let medians = table.column("median_occupancy").unwrap().f64().unwrap();
        assert_eq!(medians.get(0), Some(20.0));
        assert_eq!(medians.get(5), Some(10.0));
    }

    #[test]
    fn cancellation_aborts_the_first_trial() {
        let config = small_config();
        let tuning = GdacTuning::new(config.clone()).unwrap();
        let (producer, mut consumer) = record_queue();
        let mut front_end =
            SimulatedFrontEnd::for_config(&config, PixelResponse::default(), producer).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tuning.run(
            &mut front_end,
            &mut consumer,
            &mut MemorySink::new(),
            &SystemClock::new(),
            &cancel,
        );
        assert!(matches!(result, Err(TuneError::Cancelled { gdac: 128 })));
    }
}

//! Binary search of the global threshold register.
//!
//! Bits are tried from most to least significant. A bit is kept when the
//! median occupancy with it set is still at or above half the injections
//! (the threshold is too low), cleared otherwise. Bit 0 is measured in both
//! states and the better one kept; if the search still ends worse than the
//! best trial seen, the best trial wins.

use crate::error::{ConfigurationError, Result};
use crate::types::{
    BestTrial, MAX_GDAC_BIT, TrialRecord, TuningOutcome, TuningRegisterValue, TuningWarning,
};
use bon::Builder;
use tracing::{info, warn};

/// Runs one acquisition trial at a register value and reports the median
/// occupancy of the selected pixels.
pub trait OccupancyProbe {
    fn measure(&mut self, value: TuningRegisterValue, bit: u8) -> Result<f64>;
}

impl<F> OccupancyProbe for F
where
    F: FnMut(TuningRegisterValue) -> Result<f64>,
{
    fn measure(&mut self, value: TuningRegisterValue, _bit: u8) -> Result<f64> {
        self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct BinarySearchTuner {
    /// Bits to tune, strictly decreasing.
    bit_positions: Vec<u8>,
    #[builder(default = 50)]
    injections: u32,
    /// Accepted distance between median occupancy and target.
    #[builder(default = 2.0)]
    tolerance: f64,
}

impl BinarySearchTuner {
    pub fn bit_positions(&self) -> &[u8] {
        &self.bit_positions
    }

    pub fn injections(&self) -> u32 {
        self.injections
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Half the injections: the occupancy of a pixel sitting at threshold.
    pub fn target(&self) -> f64 {
        self.injections as f64 / 2.0
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.bit_positions.is_empty() {
            return Err(ConfigurationError::EmptyBitPositions);
        }
        if let Some(&bit) = self.bit_positions.iter().find(|&&b| b > MAX_GDAC_BIT) {
            return Err(ConfigurationError::BitOutOfRange { bit });
        }
        if self.bit_positions.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(ConfigurationError::NonMonotonicBits {
                bits: self.bit_positions.clone(),
            });
        }
        if self.injections == 0 {
            return Err(ConfigurationError::ZeroInjections);
        }
        Ok(())
    }

    fn deviation(&self, median: f64) -> f64 {
        (median - self.target()).abs()
    }

    /// Tunes the bits of `initial`, leaving all other bits untouched. The
    /// caller writes the returned value to the front-end.
    pub fn tune<P>(&self, initial: TuningRegisterValue, probe: &mut P) -> Result<TuningOutcome>
    where
        P: OccupancyProbe + ?Sized,
    {
        self.validate()?;
        let target = self.target();

        let mut value = self
            .bit_positions
            .iter()
            .fold(initial, |value, &bit| value.with_bit(bit, false));
        let mut best = BestTrial {
            value,
            median: 0.0,
            deviation: self.deviation(0.0),
        };
        let mut trials = Vec::with_capacity(self.bit_positions.len() + 1);
        let mut median = 0.0;
        let mut fell_back = false;
        // both only feed the noisy front-end diagnostic
        let mut decreased_threshold = false;
        let mut all_bits_zero = true;

        for &bit in &self.bit_positions {
            value = value.with_bit(bit, true);
            info!("GDAC setting: {}, bit {} = 1", value.combined(), bit);
            median = self.trial(probe, value, bit, &mut trials, &mut best)?;

            if self.deviation(median) < self.tolerance && bit > 0 {
                info!(
                    "Median = {}, good result already achieved (median - Ninj/2 < {}), skipping not varied bits",
                    median, self.tolerance
                );
                break;
            }
            if median == 0.0 && decreased_threshold && all_bits_zero {
                info!("FE noisy?");
            }

            if bit > 0 {
                if median < target {
                    info!("Median = {} < {}, set bit {} = 0", median, target, bit);
                    value = value.with_bit(bit, false);
                    decreased_threshold = true;
                } else {
                    info!("Median = {} > {}, leave bit {} = 1", median, target, bit);
                    decreased_threshold = false;
                    all_bits_zero = false;
                }
                continue;
            }

            // bit 0: measure the cleared setting as well and keep the closer one
            let cleared = value.with_bit(0, false);
            info!("GDAC setting: {}, bit 0 = 0", cleared.combined());
            let cleared_median = self.trial(probe, cleared, 0, &mut trials, &mut best)?;
            if cleared_median == 0.0 && decreased_threshold && all_bits_zero {
                info!("FE noisy?");
            }
            info!(
                "Scanned bit 0 = 0 with {} instead of {}",
                cleared_median, median
            );
            if self.deviation(cleared_median) > self.deviation(median) {
                info!("Set bit 0 = 1");
            } else {
                info!("Set bit 0 = 0");
                value = cleared;
                median = cleared_median;
            }

            if best.deviation < self.deviation(median) {
                info!("Binary search converged to non optimal value, take best measured value instead");
                value = best.value;
                median = best.median;
                fell_back = true;
            }
        }

        let deviation = self.deviation(median);
        let mut warnings = Vec::new();
        if value.is_saturated() {
            warn!("GDAC reached minimum/maximum value");
            warnings.push(TuningWarning::Saturated { value });
        }
        let limit = 2.0 * self.tolerance;
        if deviation > limit {
            warn!(
                "Global threshold tuning failed. Delta threshold = {} > {}. Vthin_AltCoarse / Vthin_AltFine = {}",
                deviation, self.tolerance, value
            );
            warnings.push(TuningWarning::NotConverged { deviation, limit });
        } else {
            info!("Tuned GDAC to Vthin_AltCoarse / Vthin_AltFine = {}", value);
        }

        Ok(TuningOutcome {
            value,
            median,
            deviation,
            best,
            fell_back,
            trials,
            warnings,
        })
    }

    fn trial<P>(
        &self,
        probe: &mut P,
        value: TuningRegisterValue,
        bit: u8,
        trials: &mut Vec<TrialRecord>,
        best: &mut BestTrial,
    ) -> Result<f64>
    where
        P: OccupancyProbe + ?Sized,
    {
        let median = probe.measure(value, bit)?;
        let deviation = self.deviation(median);
        if deviation < best.deviation {
            *best = BestTrial {
                value,
                median,
                deviation,
            };
        }
        trials.push(TrialRecord {
            bit,
            value,
            median,
            deviation,
        });
        Ok(median)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TuneError;
    use std::collections::VecDeque;

    fn tuner(bits: &[u8], tolerance: f64) -> BinarySearchTuner {
        BinarySearchTuner::builder()
            .bit_positions(bits.to_vec())
            .injections(50)
            .tolerance(tolerance)
            .build()
    }

    /// Probe answering from a fixed list of medians, recording what it saw.
    struct ScriptedProbe {
        medians: VecDeque<f64>,
        seen: Vec<(u16, u8)>,
    }

    impl ScriptedProbe {
        fn new(medians: &[f64]) -> Self {
            Self {
                medians: medians.iter().copied().collect(),
                seen: Vec::new(),
            }
        }
    }

    impl OccupancyProbe for ScriptedProbe {
        fn measure(&mut self, value: TuningRegisterValue, bit: u8) -> Result<f64> {
            self.seen.push((value.combined(), bit));
            self.medians
                .pop_front()
                .ok_or_else(|| TuneError::FrontEnd("no more scripted medians".into()))
        }
    }

    #[test]
    fn monotonic_response_takes_one_trial_per_bit_plus_one() {
        let mut probe = |value: TuningRegisterValue| -> Result<f64> {
            Ok((60.0 - 4.0 * value.combined() as f64).max(0.0))
        };
        let outcome = tuner(&[3, 2, 1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(outcome.trials.len(), 5);
        assert_eq!(outcome.value.combined(), 9);
        assert_eq!(outcome.median, 24.0);
        assert!(outcome.converged());
        assert!(!outcome.fell_back);
    }

    #[test]
    fn bit_zero_retest_keeps_closer_setting() {
        let mut probe = ScriptedProbe::new(&[40.0, 30.0, 26.0]);
        let outcome = tuner(&[1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(probe.seen, vec![(2, 1), (3, 0), (2, 0)]);
        assert_eq!(outcome.value.combined(), 2);
        assert_eq!(outcome.median, 26.0);
        assert!(!outcome.fell_back);
    }

    #[test]
    fn worse_final_setting_falls_back_to_best_trial() {
        let mut probe = ScriptedProbe::new(&[27.0, 40.0, 10.0, 45.0]);
        let outcome = tuner(&[2, 1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(probe.seen, vec![(4, 2), (6, 1), (7, 0), (6, 0)]);
        assert!(outcome.fell_back);
        assert_eq!(outcome.value.combined(), 4);
        assert_eq!(outcome.median, 27.0);
        assert_eq!(outcome.best.value.combined(), 4);
        assert!(outcome.converged());
    }

    #[test]
    fn step_response_lands_below_the_edge() {
        // full occupancy up to 6, silent above
        let mut probe = |value: TuningRegisterValue| -> Result<f64> {
            Ok(if value.combined() <= 6 { 50.0 } else { 0.0 })
        };
        let outcome = tuner(&[2, 1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(outcome.value.combined(), 6);
        assert_eq!(outcome.deviation, 25.0);
        assert!(!outcome.converged());
        assert!(outcome.warnings.contains(&TuningWarning::NotConverged {
            deviation: 25.0,
            limit: 4.0
        }));
    }

    #[test]
    fn early_stop_skips_remaining_bits() {
        let mut probe = ScriptedProbe::new(&[24.0]);
        let outcome = tuner(&[7, 6, 5, 4, 3, 2, 1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(outcome.trials.len(), 1);
        assert_eq!(outcome.value.combined(), 128);
    }

    #[test]
    fn silent_front_end_saturates_at_zero() {
        let mut probe = |_: TuningRegisterValue| -> Result<f64> { Ok(0.0) };
        let outcome = tuner(&[1, 0], 2.0)
            .tune(TuningRegisterValue::ZERO, &mut probe)
            .unwrap();

        assert_eq!(outcome.value, TuningRegisterValue::ZERO);
        assert!(outcome.warnings.contains(&TuningWarning::Saturated {
            value: TuningRegisterValue::ZERO
        }));
    }

    #[test]
    fn untuned_bits_are_preserved() {
        let mut probe = |value: TuningRegisterValue| -> Result<f64> {
            Ok(if value.fine & 0x03 == 0x02 { 25.0 } else { 0.0 })
        };
        let initial = TuningRegisterValue::new(3, 0xF3);
        let outcome = tuner(&[1, 0], 2.0).tune(initial, &mut probe).unwrap();

        assert_eq!(outcome.value, TuningRegisterValue::new(3, 0xF2));
    }

    #[test]
    fn invalid_bits_fail_before_any_trial() {
        for bits in [vec![], vec![1, 2, 0], vec![3, 3], vec![16, 0]] {
            let mut probe = ScriptedProbe::new(&[]);
            let result = tuner(&bits, 2.0).tune(TuningRegisterValue::ZERO, &mut probe);
            assert!(matches!(result, Err(TuneError::Configuration(_))));
            assert!(probe.seen.is_empty());
        }
    }

    #[test]
    fn probe_errors_abort_the_search() {
        let mut probe = ScriptedProbe::new(&[30.0]);
        let result = tuner(&[2, 1, 0], 2.0).tune(TuningRegisterValue::ZERO, &mut probe);
        assert!(matches!(result, Err(TuneError::FrontEnd(_))));
    }
}

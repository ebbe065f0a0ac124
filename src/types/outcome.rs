use crate::types::register::TuningRegisterValue;
use polars::prelude::*;

/// One acquisition trial of the binary search.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub bit: u8,
    pub value: TuningRegisterValue,
    pub median: f64,
    pub deviation: f64,
}

/// Best trial seen so far; the fallback when the search ends somewhere worse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestTrial {
    pub value: TuningRegisterValue,
    pub median: f64,
    pub deviation: f64,
}

/// Non-fatal findings of a tuning run.
#[derive(Debug, Clone, PartialEq)]
pub enum TuningWarning {
    /// The final value sits on a register limit.
    Saturated { value: TuningRegisterValue },
    /// The final deviation exceeds twice the tolerance.
    NotConverged { deviation: f64, limit: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuningOutcome {
    pub value: TuningRegisterValue,
    pub median: f64,
    pub deviation: f64,
    pub best: BestTrial,
    /// The search result was replaced by `best`.
    pub fell_back: bool,
    pub trials: Vec<TrialRecord>,
    pub warnings: Vec<TuningWarning>,
}

impl TuningOutcome {
    pub fn converged(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, TuningWarning::NotConverged { .. }))
    }

    /// Trial history as a DataFrame with one row per acquisition.
    pub fn trial_table(&self) -> Result<DataFrame, PolarsError> {
        let bits: Vec<u32> = self.trials.iter().map(|t| t.bit as u32).collect();
        let gdac: Vec<u32> = self.trials.iter().map(|t| t.value.combined() as u32).collect();
        let coarse: Vec<u32> = self.trials.iter().map(|t| t.value.coarse as u32).collect();
        let fine: Vec<u32> = self.trials.iter().map(|t| t.value.fine as u32).collect();
        let medians: Vec<f64> = self.trials.iter().map(|t| t.median).collect();
        let deviations: Vec<f64> = self.trials.iter().map(|t| t.deviation).collect();

        DataFrame::new(vec![
            Series::new("bit".into(), &bits).into(),
            Series::new("gdac".into(), &gdac).into(),
            Series::new("vthin_alt_coarse".into(), &coarse).into(),
            Series::new("vthin_alt_fine".into(), &fine).into(),
            Series::new("median_occupancy".into(), &medians).into(),
            Series::new("deviation".into(), &deviations).into(),
        ])
    }
}

//! Run configuration for acquisition sessions and GDAC tuning.
//!
//! Loaded from JSON; every field has a default so partial files are valid.

use crate::error::{ConfigurationError, Result};
use crate::tuning::BinarySearchTuner;
use crate::types::{ChannelId, Geometry, PixelMask};
use crate::utils::bits_set;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Timing and stop thresholds of one acquisition session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct SessionConfig {
    #[builder(default = 50)]
    pub poll_interval_ms: u64,
    /// Stop once the trigger counter reaches this value.
    pub max_triggers: Option<u64>,
    #[builder(default = 100.0)]
    pub scan_timeout_secs: f64,
    #[builder(default = 60.0)]
    pub no_data_timeout_secs: f64,
    /// Suspend the no-data timeout until the first record arrives.
    #[builder(default = true)]
    pub wait_for_first_trigger: bool,
    /// Silence after which the scan deadline starts sliding with each tick.
    #[builder(default = 10.0)]
    pub silence_grace_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        seconds(self.scan_timeout_secs)
    }

    pub fn no_data_timeout(&self) -> Duration {
        seconds(self.no_data_timeout_secs)
    }

    pub fn silence_grace(&self) -> Duration {
        seconds(self.silence_grace_secs)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigurationError::ZeroPollInterval);
        }
        for (field, value) in [
            ("scan_timeout_secs", self.scan_timeout_secs),
            ("no_data_timeout_secs", self.no_data_timeout_secs),
            ("silence_grace_secs", self.silence_grace_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigurationError::InvalidDuration { field, value });
            }
        }
        Ok(())
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

/// GDAC tuning settings. Field names and defaults follow the front-end run
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// GDAC bits to change during tuning, most significant first.
    pub gdac_tune_bits: Vec<u8>,
    /// Injections per GDAC bit setting.
    pub n_injections_gdac: u32,
    /// Accepted distance of the median occupancy from half the injections.
    pub max_delta_threshold: f64,
    pub mask_steps_gdac: usize,
    /// Mask steps injected per GDAC setting; empty means all.
    pub enable_mask_steps_gdac: Vec<usize>,
    /// DisableColumnCnfg bit field; set bits deselect that column.
    pub disable_column_config: u64,
    pub geometry: Geometry,
    /// Readout channel of the tuned front-end.
    pub channel: ChannelId,
    pub destination: String,
    /// Readout channel of an additional triggering front-end, if any.
    pub trigger_channel: Option<ChannelId>,
    pub session: SessionConfig,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            gdac_tune_bits: (0..=7).rev().collect(),
            n_injections_gdac: 50,
            max_delta_threshold: 2.0,
            mask_steps_gdac: 3,
            enable_mask_steps_gdac: vec![0],
            disable_column_config: 0,
            geometry: Geometry::FE_I4,
            channel: 4,
            destination: "fe".to_string(),
            trigger_channel: None,
            session: SessionConfig::default(),
        }
    }
}

impl TuningConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        self.session.validate()?;
        self.tuner().validate()?;
        Ok(())
    }

    pub fn disabled_columns(&self) -> Vec<usize> {
        bits_set(self.disable_column_config)
    }

    pub fn pixel_mask(&self) -> std::result::Result<PixelMask, ConfigurationError> {
        PixelMask::builder()
            .geometry(self.geometry)
            .mask_steps(self.mask_steps_gdac)
            .enable_mask_steps(self.enable_mask_steps_gdac.clone())
            .disabled_columns(self.disabled_columns())
            .build()
    }

    pub fn tuner(&self) -> BinarySearchTuner {
        BinarySearchTuner::builder()
            .bit_positions(self.gdac_tune_bits.clone())
            .injections(self.n_injections_gdac)
            .tolerance(self.max_delta_threshold)
            .build()
    }

    /// Session settings of one trial: the session ends once every enabled
    /// mask step has received its injections.
    pub fn trial_session(&self) -> SessionConfig {
        let steps = if self.enable_mask_steps_gdac.is_empty() {
            self.mask_steps_gdac
        } else {
            self.enable_mask_steps_gdac.len()
        };
        SessionConfig {
            max_triggers: Some(self.n_injections_gdac as u64 * steps as u64),
            ..self.session.clone()
        }
    }
}

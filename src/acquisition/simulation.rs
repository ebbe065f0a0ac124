//! Software front-end with a deterministic pixel response.
//!
//! Arming starts an injection thread that, for every injection mask, sends
//! `injections` rounds of data header, pixel hits and trigger word through the
//! record queue. The trigger counter is bumped after each round is queued, so
//! every counted trigger already has its records buffered.

use crate::acquisition::interfaces::FrontEnd;
use crate::acquisition::queue::RecordProducer;
use crate::config::TuningConfig;
use crate::error::{ConfigurationError, Result, TuneError};
use crate::parser::{data_header_word, data_record_word, trigger_word};
use crate::types::{ChannelId, Hit, PixelMask, TuningRegisterValue};
use bon::{Builder, bon};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Occupancy response of the simulated pixels to the threshold register.
///
/// A pixel responds with efficiency `0.5 + (center + offset - gdac) / width`,
/// clamped to [0, 1], where `offset` is a fixed per-pixel spread of up to
/// `dispersion` in either direction. Higher register values lower occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct PixelResponse {
    #[builder(default = 140.0)]
    pub center: f64,
    #[builder(default = 20.0)]
    pub width: f64,
    #[builder(default = 0.0)]
    pub dispersion: f64,
}

impl Default for PixelResponse {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PixelResponse {
    pub fn efficiency(&self, value: TuningRegisterValue, column: u16, row: u16) -> f64 {
        let offset = pixel_offset(column, row) * self.dispersion;
        let width = self.width.max(f64::EPSILON);
        (0.5 + (self.center + offset - value.combined() as f64) / width).clamp(0.0, 1.0)
    }

    /// Whether the pixel answers injection number `injection` out of
    /// `injections`. Exactly round(efficiency * injections) injections fire.
    pub fn fires(
        &self,
        value: TuningRegisterValue,
        column: u16,
        row: u16,
        injection: u32,
        injections: u32,
    ) -> bool {
        (injection as f64 + 0.5) < self.efficiency(value, column, row) * injections as f64
    }
}

/// Fixed per-pixel spread in [-1, 1].
fn pixel_offset(column: u16, row: u16) -> f64 {
    let hash = (column as u32 * 7 + row as u32 * 13) % 21;
    hash as f64 / 10.0 - 1.0
}

pub struct SimulatedFrontEnd {
    channel: ChannelId,
    injection_masks: Arc<Vec<PixelMask>>,
    injections: u32,
    response: PixelResponse,
    trigger_period: Duration,
    register: TuningRegisterValue,
    producer: RecordProducer,
    counter: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

#[bon]
impl SimulatedFrontEnd {
    #[builder]
    pub fn new(
        producer: RecordProducer,
        injection_masks: Vec<PixelMask>,
        #[builder(default = 4)] channel: ChannelId,
        #[builder(default = 50)] injections: u32,
        #[builder(default)] response: PixelResponse,
        #[builder(default)] trigger_period: Duration,
        #[builder(default)] register: TuningRegisterValue,
    ) -> Self {
        Self {
            channel,
            injection_masks: Arc::new(injection_masks),
            injections,
            response,
            trigger_period,
            register,
            producer,
            counter: Arc::new(AtomicU64::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Front-end injecting the enabled mask steps of `config`, one mask per
    /// step, `n_injections_gdac` times each.
    pub fn for_config(
        config: &TuningConfig,
        response: PixelResponse,
        producer: RecordProducer,
    ) -> std::result::Result<Self, ConfigurationError> {
        let steps: Vec<usize> = if config.enable_mask_steps_gdac.is_empty() {
            (0..config.mask_steps_gdac).collect()
        } else {
            config.enable_mask_steps_gdac.clone()
        };
        let injection_masks = steps
            .into_iter()
            .map(|step| {
                PixelMask::builder()
                    .geometry(config.geometry)
                    .mask_steps(config.mask_steps_gdac)
                    .enable_mask_steps(vec![step])
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::builder()
            .producer(producer)
            .injection_masks(injection_masks)
            .channel(config.channel)
            .injections(config.n_injections_gdac)
            .response(response)
            .build())
    }

    pub fn is_armed(&self) -> bool {
        self.worker.is_some()
    }

    fn stop_worker(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| TuneError::FrontEnd("injection thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

struct InjectionRun {
    channel: ChannelId,
    masks: Arc<Vec<PixelMask>>,
    injections: u32,
    response: PixelResponse,
    value: TuningRegisterValue,
    period: Duration,
    producer: RecordProducer,
    counter: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
}

impl InjectionRun {
    fn run(self) {
        let mut trigger_number: u32 = 0;
        for mask in self.masks.iter() {
            for injection in 0..self.injections {
                if self.stop.load(Ordering::Acquire) {
                    return;
                }
                let mut words = vec![data_header_word(self.channel, (trigger_number & 0x3FF) as u16)];
                words.extend(
                    mask.selected_pixels()
                        .filter(|&(column, row)| {
                            self.response
                                .fires(self.value, column, row, injection, self.injections)
                        })
                        .map(|(column, row)| {
                            data_record_word(self.channel, &Hit { column, row, tot: 5 })
                        }),
                );
                words.push(trigger_word(trigger_number));
                self.producer.push_words(&words);
                self.counter.fetch_add(1, Ordering::AcqRel);
                trigger_number = trigger_number.wrapping_add(1);

                if !self.period.is_zero() {
                    thread::sleep(self.period);
                }
            }
        }
    }
}

impl FrontEnd for SimulatedFrontEnd {
    fn arm_trigger(&mut self) -> Result<()> {
        self.stop_worker()?;
        self.counter.store(0, Ordering::Release);
        self.stop.store(false, Ordering::Release);

        let run = InjectionRun {
            channel: self.channel,
            masks: Arc::clone(&self.injection_masks),
            injections: self.injections,
            response: self.response,
            value: self.register,
            period: self.trigger_period,
            producer: self.producer.clone(),
            counter: Arc::clone(&self.counter),
            stop: Arc::clone(&self.stop),
        };
        debug!(gdac = self.register.combined(), "Simulated injection armed");
        self.worker = Some(thread::spawn(move || run.run()));
        Ok(())
    }

    fn disarm_trigger(&mut self) -> Result<()> {
        self.stop_worker()
    }

    fn trigger_counter(&mut self) -> Result<u64> {
        Ok(self.counter.load(Ordering::Acquire))
    }

    fn set_threshold_register(&mut self, value: TuningRegisterValue) -> Result<()> {
        self.register = value;
        Ok(())
    }

    fn threshold_register(&mut self) -> Result<TuningRegisterValue> {
        Ok(self.register)
    }
}

impl Drop for SimulatedFrontEnd {
    fn drop(&mut self) {
        let _ = self.stop_worker();
    }
}

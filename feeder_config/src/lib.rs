#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and validation for the feeder firmware.
//!
//! `Config` and sub-structs are deserialized from TOML and validated.
//! Every field has a default matching the reference device, so an empty
//! config file yields a fully working setup. The core crate converts
//! these into its runtime configuration structs.

use eyre::{WrapErr, bail};
use serde::Deserialize;
use std::path::Path;

/// ADC gain / channel selection, serialized as "a128" / "a64" / "b32".
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdcGain {
    A128,
    A64,
    B32,
}

/// Load cell sampling and calibration settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Sensor {
    /// Readings averaged per measurement. Trades noise rejection against
    /// measurement latency.
    pub sample_count: usize,
    /// Accept a measurement once its standard deviation is below this (g).
    pub noise_limit_g: f32,
    /// Give up on a sampling session after this much in-state time (ms).
    pub read_timeout_ms: u32,
    /// Raw-count-to-grams factor for the reservoir cell.
    pub gain_reservoir_g_per_count: f32,
    /// Raw-count-to-grams factor for the bowl cell.
    pub gain_bowl_g_per_count: f32,
    /// Frontend gain used while the reservoir cell is selected.
    pub adc_gain_reservoir: AdcGain,
    /// Frontend gain used while the bowl cell is selected.
    pub adc_gain_bowl: AdcGain,
    /// Raw zero-offset preset for the reservoir; re-taring overrides it.
    pub tare_reservoir_raw: Option<i32>,
    /// Raw zero-offset preset for the bowl; re-taring overrides it.
    pub tare_bowl_raw: Option<i32>,
}

impl Default for Sensor {
    fn default() -> Self {
        Self {
            sample_count: 32,
            noise_limit_g: 1.0,
            read_timeout_ms: 10_000,
            gain_reservoir_g_per_count: -0.002_053_032_8,
            gain_bowl_g_per_count: 0.003_227_107,
            adc_gain_reservoir: AdcGain::A128,
            adc_gain_bowl: AdcGain::B32,
            tare_reservoir_raw: Some(-754_589),
            tare_bowl_raw: Some(31_485),
        }
    }
}

/// Feed cycle timing, tolerances and retry bounds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Feed {
    /// Weight assumed for one dispense cycle when sensors are untrusted (g).
    pub assumed_weight_g: f32,
    /// Maximum allowed disagreement between the two sensor deltas (g).
    pub max_disagree_g: f32,
    /// A feed dispensing at or below this fraction of nominal counts as a
    /// suspected jam.
    pub jam_fraction: f32,
    /// Consecutive bad outcomes (noisy sensors / suspected jams) tolerated
    /// before escalating.
    pub max_feed_retries: u16,
    /// In-state re-measurement attempts before the whole measurement is
    /// retried.
    pub max_state_retries: u16,
    /// Minimum time between feed attempts, auto or manual (ms).
    pub cooldown_ms: u32,
    /// Vibration settle time before the pre-feed measurements (ms).
    pub pre_settle_ms: u32,
    /// Settle time between motor stop and post-feed measurements (ms).
    pub post_settle_ms: u32,
    /// Absolute timeout for each motor run phase (ms).
    pub run_timeout_ms: u32,
    /// Open-loop motor run time once the limit switch is untrusted (ms).
    pub run_limp_ms: u32,
    /// Trailing motor run time past limit switch release (ms).
    pub run_post_ms: u32,
    /// Limit switch debounce window (ms).
    pub debounce_ms: u32,
    /// Idle background sensor refresh interval; 0 while in maintenance (ms).
    pub idle_refresh_ms: u32,
    /// How long the idle display keeps showing the last feed outcome (ms).
    pub recent_feed_ms: u32,
    /// Reservoir weight below which a low warning is reported (g).
    pub reservoir_low_g: f32,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            assumed_weight_g: 9.0,
            max_disagree_g: 5.0,
            jam_fraction: 0.3,
            max_feed_retries: 3,
            max_state_retries: 5,
            cooldown_ms: 5 * 60 * 1000,
            pre_settle_ms: 2_000,
            post_settle_ms: 800,
            run_timeout_ms: 3_000,
            run_limp_ms: 2_000,
            run_post_ms: 10,
            debounce_ms: 50,
            idle_refresh_ms: 5 * 60 * 1000,
            recent_feed_ms: 10_000,
            reservoir_low_g: 250.0,
        }
    }
}

/// Daily ration schedule.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Schedule {
    /// Grams of food owed per day.
    pub grams_per_day: i32,
    /// Auto-feed once the deficit reaches this many milligrams.
    pub deficit_threshold_mg: i32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            grams_per_day: 60,
            deficit_threshold_mg: 0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

/// GPIO assignments for the real hardware build.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    pub motor_en: u8,
    pub limit_in: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            hx711_dt: 5,
            hx711_sck: 6,
            motor_en: 13,
            limit_in: 19,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub sensor: Sensor,
    pub feed: Feed,
    pub schedule: Schedule,
    pub logging: Logging,
    pub pins: Pins,
}

impl Config {
    /// Parse a TOML document. Does not validate; call `validate`.
    pub fn from_toml_str(text: &str) -> eyre::Result<Self> {
        toml::from_str(text).wrap_err("parsing feeder config TOML")
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations the controller cannot operate with.
    pub fn validate(&self) -> eyre::Result<()> {
        let s = &self.sensor;
        if s.sample_count < 2 {
            bail!("sensor.sample_count must be >= 2");
        }
        if !(s.noise_limit_g.is_finite() && s.noise_limit_g > 0.0) {
            bail!("sensor.noise_limit_g must be > 0");
        }
        if s.read_timeout_ms == 0 {
            bail!("sensor.read_timeout_ms must be >= 1");
        }
        if !s.gain_reservoir_g_per_count.is_finite() || s.gain_reservoir_g_per_count == 0.0 {
            bail!("sensor.gain_reservoir_g_per_count must be finite and nonzero");
        }
        if !s.gain_bowl_g_per_count.is_finite() || s.gain_bowl_g_per_count == 0.0 {
            bail!("sensor.gain_bowl_g_per_count must be finite and nonzero");
        }

        let f = &self.feed;
        if !(f.assumed_weight_g.is_finite() && f.assumed_weight_g > 0.0) {
            bail!("feed.assumed_weight_g must be > 0");
        }
        if !(f.max_disagree_g.is_finite() && f.max_disagree_g >= 0.0) {
            bail!("feed.max_disagree_g must be >= 0");
        }
        if !(f.jam_fraction.is_finite() && f.jam_fraction > 0.0 && f.jam_fraction < 1.0) {
            bail!("feed.jam_fraction must be in (0, 1)");
        }
        if f.max_feed_retries == 0 || f.max_state_retries == 0 {
            bail!("feed retry bounds must be >= 1");
        }
        if f.run_timeout_ms == 0 {
            bail!("feed.run_timeout_ms must be >= 1");
        }
        if f.debounce_ms >= f.run_timeout_ms {
            bail!("feed.debounce_ms must be below feed.run_timeout_ms");
        }
        if !(f.reservoir_low_g.is_finite()) {
            bail!("feed.reservoir_low_g must be finite");
        }

        if self.schedule.grams_per_day < 1 {
            bail!("schedule.grams_per_day must be >= 1");
        }
        Ok(())
    }
}

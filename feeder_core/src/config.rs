//! Runtime configuration for the sampler and the feeding controller.
//!
//! These are the plain structs the controller is built from. They carry
//! the reference device's constants as defaults and can be populated from
//! the TOML-deserialized `feeder_config::Config`.

use crate::sampler::SensorChannel;
use feeder_traits::AdcGain;

/// Load cell sampling and calibration settings.
#[derive(Debug, Clone)]
pub struct SensorCfg {
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
    /// Raw zero-offset preset for the reservoir; None auto-captures on the
    /// first measurement.
    pub tare_reservoir_raw: Option<i32>,
    /// Raw zero-offset preset for the bowl; None auto-captures on the
    /// first measurement.
    pub tare_bowl_raw: Option<i32>,
}

impl SensorCfg {
    /// Grams-per-raw-count factor for a channel.
    pub fn gain_for(&self, channel: SensorChannel) -> f32 {
        match channel {
            SensorChannel::Reservoir => self.gain_reservoir_g_per_count,
            SensorChannel::Bowl => self.gain_bowl_g_per_count,
        }
    }

    /// Frontend gain selection for a channel.
    pub fn adc_gain_for(&self, channel: SensorChannel) -> AdcGain {
        match channel {
            SensorChannel::Reservoir => self.adc_gain_reservoir,
            SensorChannel::Bowl => self.adc_gain_bowl,
        }
    }
}

impl Default for SensorCfg {
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
#[derive(Debug, Clone)]
pub struct FeedCfg {
    /// Weight assumed for one dispense cycle when sensors are untrusted (g).
    pub assumed_weight_g: f32,
    /// Maximum allowed disagreement between the two sensor deltas (g).
    pub max_disagree_g: f32,
    /// A feed dispensing at or below this fraction of nominal counts as a
    /// suspected jam.
    pub jam_fraction: f32,
    /// Consecutive bad outcomes tolerated before escalating.
    pub max_feed_retries: u16,
    /// In-state re-measurement attempts before retrying the whole
    /// measurement state.
    pub max_state_retries: u16,
    /// Minimum time between feed attempts, auto or manual (ms).
    pub cooldown_ms: u32,
    /// Vibration settle time before the pre-feed measurements (ms).
    pub pre_settle_ms: u32,
    /// Settle time between motor stop and post-feed measurements (ms).
    pub post_settle_ms: u32,
    /// Absolute timeout for each motor run phase (ms). One mechanical
    /// cycle takes about two seconds.
    pub run_timeout_ms: u32,
    /// Open-loop motor run time once the limit switch is untrusted (ms).
    pub run_limp_ms: u32,
    /// Trailing motor run time past limit switch release (ms).
    pub run_post_ms: u32,
    /// Limit switch debounce window (ms).
    pub debounce_ms: u32,
    /// Idle background sensor refresh interval; forced to 0 while in
    /// maintenance mode (ms).
    pub idle_refresh_ms: u32,
    /// How long the idle state report keeps showing the last feed
    /// outcome (ms).
    pub recent_feed_ms: u32,
    /// Reservoir weight below which a low warning is reported (g).
    pub reservoir_low_g: f32,
}

impl Default for FeedCfg {
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
#[derive(Debug, Clone)]
pub struct ScheduleCfg {
    /// Grams of food owed per day.
    pub grams_per_day: i32,
    /// Auto-feed once the deficit reaches this many milligrams.
    pub deficit_threshold_mg: i32,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            grams_per_day: 60,
            deficit_threshold_mg: 0,
        }
    }
}

/// Both gain enums are foreign here, so the mapping is a plain function
/// rather than a `From` impl.
fn adc_gain(g: feeder_config::AdcGain) -> AdcGain {
    match g {
        feeder_config::AdcGain::A128 => AdcGain::A128,
        feeder_config::AdcGain::A64 => AdcGain::A64,
        feeder_config::AdcGain::B32 => AdcGain::B32,
    }
}

impl From<feeder_config::Sensor> for SensorCfg {
    fn from(s: feeder_config::Sensor) -> Self {
        Self {
            sample_count: s.sample_count,
            noise_limit_g: s.noise_limit_g,
            read_timeout_ms: s.read_timeout_ms,
            gain_reservoir_g_per_count: s.gain_reservoir_g_per_count,
            gain_bowl_g_per_count: s.gain_bowl_g_per_count,
            adc_gain_reservoir: adc_gain(s.adc_gain_reservoir),
            adc_gain_bowl: adc_gain(s.adc_gain_bowl),
            tare_reservoir_raw: s.tare_reservoir_raw,
            tare_bowl_raw: s.tare_bowl_raw,
        }
    }
}

impl From<feeder_config::Feed> for FeedCfg {
    fn from(f: feeder_config::Feed) -> Self {
        Self {
            assumed_weight_g: f.assumed_weight_g,
            max_disagree_g: f.max_disagree_g,
            jam_fraction: f.jam_fraction,
            max_feed_retries: f.max_feed_retries,
            max_state_retries: f.max_state_retries,
            cooldown_ms: f.cooldown_ms,
            pre_settle_ms: f.pre_settle_ms,
            post_settle_ms: f.post_settle_ms,
            run_timeout_ms: f.run_timeout_ms,
            run_limp_ms: f.run_limp_ms,
            run_post_ms: f.run_post_ms,
            debounce_ms: f.debounce_ms,
            idle_refresh_ms: f.idle_refresh_ms,
            recent_feed_ms: f.recent_feed_ms,
            reservoir_low_g: f.reservoir_low_g,
        }
    }
}

impl From<feeder_config::Schedule> for ScheduleCfg {
    fn from(s: feeder_config::Schedule) -> Self {
        Self {
            grams_per_day: s.grams_per_day,
            deficit_threshold_mg: s.deficit_threshold_mg,
        }
    }
}

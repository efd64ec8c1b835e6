//! Strain-gauge sampling, averaging and calibration.
//!
//! One physical ADC frontend is multiplexed between the reservoir and the
//! bowl load cell. A session collects a fixed number of raw readings, one
//! per tick as the hardware signals readiness, then resolves them into a
//! calibrated mean and standard deviation in grams.

use crate::config::SensorCfg;
use feeder_traits::LoadcellAdc;

/// One of the two physical weight sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Reservoir,
    Bowl,
}

/// Calibrated outcome of one completed sample set.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub channel: SensorChannel,
    pub mean_g: f32,
    pub stddev_g: f32,
    pub mean_raw: i32,
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            channel: SensorChannel::Reservoir,
            mean_g: 0.0,
            stddev_g: 0.0,
            mean_raw: 0,
        }
    }
}

/// Tick-driven sampler owning the shared ADC frontend.
///
/// Exactly one channel session is active at a time; starting a new
/// session discards any incomplete previous one. While `is_busy()` the
/// last measurement is stale.
pub struct Sampler<A: LoadcellAdc> {
    adc: A,
    cfg: SensorCfg,
    channel: SensorChannel,
    apply_tare: bool,
    samples: Vec<i32>,
    remaining: usize,
    tare_reservoir: Option<i32>,
    tare_bowl: Option<i32>,
    last: Measurement,
}

impl<A: LoadcellAdc> Sampler<A> {
    pub fn new(adc: A, cfg: SensorCfg) -> Self {
        let samples = Vec::with_capacity(cfg.sample_count);
        Self {
            adc,
            tare_reservoir: cfg.tare_reservoir_raw,
            tare_bowl: cfg.tare_bowl_raw,
            cfg,
            channel: SensorChannel::Reservoir,
            apply_tare: false,
            samples,
            remaining: 0,
            last: Measurement::default(),
        }
    }

    /// Begin a fresh sampling session for `channel`, discarding any
    /// session in progress. With `apply_tare`, the completed mean becomes
    /// the channel's new zero offset.
    pub fn start(&mut self, channel: SensorChannel, apply_tare: bool) {
        if let Err(e) = self.adc.set_gain(self.cfg.adc_gain_for(channel)) {
            tracing::warn!(error = %e, ?channel, "adc gain select failed");
        }
        self.channel = channel;
        self.apply_tare = apply_tare;
        self.samples.clear();
        self.remaining = self.cfg.sample_count;
    }

    /// Non-blocking advance: consumes at most one raw reading per call.
    pub fn update(&mut self) {
        if self.remaining == 0 {
            return;
        }
        if !self.adc.is_ready() {
            return;
        }
        match self.adc.read() {
            Ok(raw) => {
                self.samples.push(raw);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.finish();
                }
            }
            Err(e) => {
                // Skip the reading; the controller's readout timeout
                // covers a persistently failing frontend.
                tracing::warn!(error = %e, channel = ?self.channel, "adc read failed");
            }
        }
    }

    /// True while the current session has samples remaining.
    pub fn is_busy(&self) -> bool {
        self.remaining > 0
    }

    /// Last completed measurement. Stale while `is_busy()`.
    pub fn last(&self) -> Measurement {
        self.last
    }

    /// Explicit calibration override, independent of sampling.
    pub fn set_tare_raw(&mut self, channel: SensorChannel, raw: i32) {
        match channel {
            SensorChannel::Reservoir => self.tare_reservoir = Some(raw),
            SensorChannel::Bowl => self.tare_bowl = Some(raw),
        }
    }

    pub fn tare_raw(&self, channel: SensorChannel) -> Option<i32> {
        match channel {
            SensorChannel::Reservoir => self.tare_reservoir,
            SensorChannel::Bowl => self.tare_bowl,
        }
    }

    /// Resolve the full sample buffer into a calibrated measurement.
    fn finish(&mut self) {
        let n = self.samples.len() as i64;

        // Mean in raw units. The half-count bias turns the integer
        // division into round-to-nearest.
        let mut accum: i64 = n / 2;
        for &s in &self.samples {
            accum += i64::from(s);
        }
        let mean_raw = (accum / n) as i32;

        // Variance in raw units, same rounding bias.
        let mut accum: i64 = n / 2;
        for &s in &self.samples {
            let diff = i64::from(s) - i64::from(mean_raw);
            accum += diff * diff;
        }
        let variance = accum as f32 / n as f32;

        // Resolve tare: capture from this measurement when requested or
        // when the channel has never been tared.
        let slot = match self.channel {
            SensorChannel::Reservoir => &mut self.tare_reservoir,
            SensorChannel::Bowl => &mut self.tare_bowl,
        };
        if self.apply_tare || slot.is_none() {
            *slot = Some(mean_raw);
        }
        let tare = slot.unwrap_or(mean_raw);

        let gain = self.cfg.gain_for(self.channel);
        let mean_g = (i64::from(mean_raw) - i64::from(tare)) as f32 * gain;
        let stddev_g = variance.sqrt() * gain.abs();

        self.last = Measurement {
            channel: self.channel,
            mean_g,
            stddev_g,
            mean_raw,
        };
        tracing::debug!(
            channel = ?self.channel,
            mean_raw,
            mean_g,
            stddev_g,
            "measurement complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedAdc;

    fn cfg(sample_count: usize) -> SensorCfg {
        SensorCfg {
            sample_count,
            gain_reservoir_g_per_count: 0.5,
            gain_bowl_g_per_count: -0.25,
            tare_reservoir_raw: Some(100),
            tare_bowl_raw: None,
            ..SensorCfg::default()
        }
    }

    fn run_to_completion<A: LoadcellAdc>(s: &mut Sampler<A>) {
        for _ in 0..10_000 {
            if !s.is_busy() {
                return;
            }
            s.update();
        }
        panic!("sampler never completed");
    }

    #[test]
    fn constant_signal_measures_exactly() {
        let adc = ScriptedAdc::new();
        adc.set_level(SensorChannel::Reservoir, 300);
        let mut s = Sampler::new(adc, cfg(8));
        s.start(SensorChannel::Reservoir, false);
        assert!(s.is_busy());
        run_to_completion(&mut s);

        let m = s.last();
        assert_eq!(m.channel, SensorChannel::Reservoir);
        assert_eq!(m.mean_raw, 300);
        // (300 - 100) * 0.5
        assert_eq!(m.mean_g, 100.0);
        // The rounding bias leaves a floor of half a count of variance
        // even on a noise-free signal.
        assert_eq!(m.stddev_g, 0.5f32.sqrt() * 0.5);
    }

    #[test]
    fn first_measurement_auto_captures_tare() {
        let adc = ScriptedAdc::new();
        adc.set_level(SensorChannel::Bowl, 4_000);
        let mut s = Sampler::new(adc, cfg(4));
        assert_eq!(s.tare_raw(SensorChannel::Bowl), None);

        s.start(SensorChannel::Bowl, false);
        run_to_completion(&mut s);
        assert_eq!(s.tare_raw(SensorChannel::Bowl), Some(4_000));
        assert_eq!(s.last().mean_g, 0.0);
    }

    #[test]
    fn apply_tare_rebaselines_the_channel() {
        let adc = ScriptedAdc::new();
        let handle = adc.clone();
        adc.set_level(SensorChannel::Reservoir, 500);
        let mut s = Sampler::new(adc, cfg(4));
        s.start(SensorChannel::Reservoir, true);
        run_to_completion(&mut s);
        assert_eq!(s.tare_raw(SensorChannel::Reservoir), Some(500));
        assert_eq!(s.last().mean_g, 0.0);

        handle.set_level(SensorChannel::Reservoir, 520);
        s.start(SensorChannel::Reservoir, false);
        run_to_completion(&mut s);
        assert_eq!(s.last().mean_g, 10.0);
    }

    #[test]
    fn restart_discards_incomplete_session() {
        let adc = ScriptedAdc::new();
        adc.set_level(SensorChannel::Reservoir, 1_000);
        adc.set_level(SensorChannel::Bowl, 2_000);
        let mut s = Sampler::new(adc, cfg(4));

        s.start(SensorChannel::Reservoir, false);
        s.update();
        s.update();
        assert!(s.is_busy());

        // Abandon the reservoir session mid-way.
        s.start(SensorChannel::Bowl, false);
        run_to_completion(&mut s);
        assert_eq!(s.last().channel, SensorChannel::Bowl);
        assert_eq!(s.last().mean_raw, 2_000);
    }

    #[test]
    fn noisy_signal_reports_spread() {
        let adc = ScriptedAdc::new();
        adc.push(SensorChannel::Reservoir, [90, 110, 90, 110]);
        adc.set_level(SensorChannel::Reservoir, 110);
        let mut s = Sampler::new(adc, cfg(4));
        s.start(SensorChannel::Reservoir, false);
        run_to_completion(&mut s);

        let m = s.last();
        assert_eq!(m.mean_raw, 100);
        // variance = (4 * 10^2 + 2) / 4, stddev in grams scaled by |gain|
        assert_eq!(m.stddev_g, 100.5f32.sqrt() * 0.5);
    }

    #[test]
    fn not_ready_hardware_makes_no_progress() {
        let adc = ScriptedAdc::new();
        adc.set_ready(false);
        let mut s = Sampler::new(adc, cfg(4));
        s.start(SensorChannel::Reservoir, false);
        for _ in 0..100 {
            s.update();
        }
        assert!(s.is_busy());
    }
}

//! The feeding state machine.
//!
//! [`FeedingController`] is ticked from the outer loop; each `update()`
//! advances the sampler, accrues the deficit, evaluates timers and the
//! limit switch, performs at most one state transition and drives the
//! motor output. Decision logic that does not need hardware access lives
//! in free functions so it can be tested in isolation.

use std::sync::Arc;

use feeder_traits::{Clock, LimitSwitch, LoadcellAdc, MotorDrive};

use crate::config::{FeedCfg, ScheduleCfg, SensorCfg};
use crate::deficit::DeficitAccumulator;
use crate::error::BuildError;
use crate::flags::ErrorFlags;
use crate::report::{
    cooldown_text, feed_delta_line, fit_line, progress_bar, weight_line, ErrorReport,
    ErrorSeverity, FeedBlockReason, FeedReport, FeedResult, StateReport,
};
use crate::sampler::{Sampler, SensorChannel};
use crate::util::{advance_timer, elapsed_ms};

/// Main sequencer state. Exactly one variant is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedingState {
    /// Waiting for a command or the next automatic feed.
    Idle,
    /// Settle delay before taring the reservoir, absorbing the vibration
    /// of the operator interaction that requested it.
    IdleTareReservoirWait,
    /// Empty-reservoir measurement captured as the new tare.
    IdleTareReservoir,
    /// Empty-bowl measurement captured as the new tare.
    IdleTareBowl,
    /// Background reservoir measurement to refresh telemetry.
    IdleMeasureReservoir,
    /// Background bowl measurement to refresh telemetry.
    IdleMeasureBowl,
    /// Settle delay before the pre-feed measurements.
    FeedPreMeasureWait,
    /// Pre-feed reservoir weight sample.
    FeedPreMeasureReservoir,
    /// Pre-feed bowl weight sample.
    FeedPreMeasureBowl,
    /// Motor running, waiting for limit switch release in case the
    /// mechanism stopped mid-cycle last time.
    FeedRunSync,
    /// Motor running, waiting for the limit switch to assert.
    FeedRunA,
    /// Motor running, waiting for the limit switch to release.
    FeedRunB,
    /// Motor running for a short trailing time past release.
    FeedRunC,
    /// Settle delay before the post-feed measurements.
    FeedPostWait,
    /// Post-feed bowl weight sample.
    FeedPostMeasureBowl,
    /// Post-feed reservoir weight sample, then feed completion.
    FeedPostMeasureReservoir,
}

/// Operational mode, orthogonal to [`FeedingState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceMode {
    /// Feeding normally.
    Operational,
    /// Operator-requested maintenance. No automatic feeding, and idle
    /// sensor refresh runs continuously for operator feedback.
    Maintenance,
    /// The hopper appears jammed or empty. Feeding stays blocked until an
    /// operator resets.
    Jammed,
}

/// Sampler session implied by entering a state, if any.
///
/// The bool is the apply-tare request for that session.
pub fn session_on_entry(state: FeedingState) -> Option<(SensorChannel, bool)> {
    match state {
        FeedingState::IdleTareReservoir => Some((SensorChannel::Reservoir, true)),
        FeedingState::IdleTareBowl => Some((SensorChannel::Bowl, true)),
        FeedingState::IdleMeasureReservoir
        | FeedingState::FeedPreMeasureReservoir
        | FeedingState::FeedPostMeasureReservoir => Some((SensorChannel::Reservoir, false)),
        FeedingState::IdleMeasureBowl
        | FeedingState::FeedPreMeasureBowl
        | FeedingState::FeedPostMeasureBowl => Some((SensorChannel::Bowl, false)),
        _ => None,
    }
}

/// Whether the motor output is driven while in `state`.
pub fn motor_engaged(state: FeedingState) -> bool {
    matches!(
        state,
        FeedingState::FeedRunSync
            | FeedingState::FeedRunA
            | FeedingState::FeedRunB
            | FeedingState::FeedRunC
    )
}

/// Whether a dispense cycle is in progress in `state`.
pub fn feeding_in_progress(state: FeedingState) -> bool {
    !matches!(
        state,
        FeedingState::Idle
            | FeedingState::IdleTareReservoirWait
            | FeedingState::IdleTareReservoir
            | FeedingState::IdleTareBowl
            | FeedingState::IdleMeasureReservoir
            | FeedingState::IdleMeasureBowl
    )
}

/// Evaluate whether an automatic feed may start, first blocking reason
/// wins.
pub fn evaluate_feed_gate(
    mode: MaintenanceMode,
    deficit: &DeficitAccumulator,
    ms_since_feed_attempt: u32,
    cooldown_ms: u32,
) -> FeedBlockReason {
    match mode {
        MaintenanceMode::Operational => {}
        MaintenanceMode::Maintenance => return FeedBlockReason::Maintenance,
        MaintenanceMode::Jammed => return FeedBlockReason::Jammed,
    }
    if deficit.below_threshold() {
        return FeedBlockReason::Deficit;
    }
    if ms_since_feed_attempt < cooldown_ms {
        return FeedBlockReason::Cooldown;
    }
    FeedBlockReason::NotBlocked
}

/// Dispensed-weight estimate with the sanity verdicts that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightEstimate {
    pub grams: f32,
    pub disagree: bool,
    pub unreasonable: bool,
}

/// Estimate the dispensed weight from the pre/post measurements.
///
/// With untrusted sensors the nominal portion weight is assumed outright.
/// Otherwise the two sensor deltas must agree within tolerance and the
/// averaged result must land in a sane range; failing either falls back
/// to the nominal weight with the corresponding verdict set.
pub fn estimate_dispensed(
    cfg: &FeedCfg,
    flags: &ErrorFlags,
    reservoir_pre_g: f32,
    reservoir_post_g: f32,
    bowl_pre_g: f32,
    bowl_post_g: f32,
) -> WeightEstimate {
    let nominal = WeightEstimate {
        grams: cfg.assumed_weight_g,
        disagree: false,
        unreasonable: false,
    };

    if flags.limp() {
        return nominal;
    }

    let dispensed_reservoir = reservoir_pre_g - reservoir_post_g;
    let dispensed_bowl = bowl_post_g - bowl_pre_g;

    if (dispensed_reservoir - dispensed_bowl).abs() > cfg.max_disagree_g {
        return WeightEstimate {
            disagree: true,
            ..nominal
        };
    }

    let dispensed = (dispensed_reservoir + dispensed_bowl) / 2.0;
    if dispensed < -2.0 || dispensed > cfg.assumed_weight_g * 3.0 {
        return WeightEstimate {
            unreasonable: true,
            ..nominal
        };
    }

    WeightEstimate {
        grams: dispensed,
        ..nominal
    }
}

/// The feeding controller: state machine, deficit accounting, error
/// latching and reporting, all advanced by tick-driven `update()` calls.
pub struct FeedingController<A: LoadcellAdc, L: LimitSwitch, M: MotorDrive> {
    sampler: Sampler<A>,
    limit: L,
    motor: M,
    clock: Arc<dyn Clock + Send + Sync>,

    sensor_cfg: SensorCfg,
    feed_cfg: FeedCfg,

    state: FeedingState,
    mode: MaintenanceMode,
    flags: ErrorFlags,
    deficit: DeficitAccumulator,

    prev_ms: u32,
    ms_since_reservoir_read: u32,
    ms_since_bowl_read: u32,
    ms_since_feed_attempt: u32,
    ms_since_transition: u32,

    state_retries: u16,
    feed_sensor_retries: u16,
    feed_jammed_retries: u16,

    reservoir_mean_g: f32,
    reservoir_stddev_g: f32,
    bowl_mean_g: f32,
    bowl_stddev_g: f32,

    feed_reservoir_pre_g: f32,
    feed_reservoir_post_g: f32,
    feed_bowl_pre_g: f32,
    feed_bowl_post_g: f32,
    last_feed_g: f32,

    feed_report: FeedReport,
}

impl<A: LoadcellAdc, L: LimitSwitch, M: MotorDrive> FeedingController<A, L, M> {
    pub fn new(
        adc: A,
        limit: L,
        motor: M,
        clock: Arc<dyn Clock + Send + Sync>,
        sensor_cfg: SensorCfg,
        feed_cfg: FeedCfg,
        schedule_cfg: ScheduleCfg,
    ) -> Result<Self, BuildError> {
        if sensor_cfg.sample_count < 2 {
            return Err(BuildError::InvalidConfig("sample_count must be at least 2"));
        }
        if !(sensor_cfg.noise_limit_g > 0.0) {
            return Err(BuildError::InvalidConfig("noise_limit_g must be positive"));
        }
        if !(feed_cfg.assumed_weight_g > 0.0) {
            return Err(BuildError::InvalidConfig(
                "assumed_weight_g must be positive",
            ));
        }
        if !(feed_cfg.jam_fraction > 0.0 && feed_cfg.jam_fraction < 1.0) {
            return Err(BuildError::InvalidConfig(
                "jam_fraction must be between 0 and 1",
            ));
        }
        if feed_cfg.debounce_ms >= feed_cfg.run_timeout_ms {
            return Err(BuildError::InvalidConfig(
                "debounce_ms must be below run_timeout_ms",
            ));
        }

        let prev_ms = clock.now_ms();
        Ok(Self {
            sampler: Sampler::new(adc, sensor_cfg.clone()),
            limit,
            motor,
            clock,
            sensor_cfg,
            feed_cfg,
            state: FeedingState::Idle,
            mode: MaintenanceMode::Operational,
            flags: ErrorFlags::at_boot(),
            deficit: DeficitAccumulator::new(&schedule_cfg),
            prev_ms,
            // Both sensors start "very stale" so the first idle ticks
            // refresh them without waiting a full interval.
            ms_since_reservoir_read: u32::MAX / 2,
            ms_since_bowl_read: u32::MAX / 2,
            ms_since_feed_attempt: 0,
            ms_since_transition: 0,
            state_retries: 0,
            feed_sensor_retries: 0,
            feed_jammed_retries: 0,
            reservoir_mean_g: 0.0,
            reservoir_stddev_g: 0.0,
            bowl_mean_g: 0.0,
            bowl_stddev_g: 0.0,
            feed_reservoir_pre_g: 0.0,
            feed_reservoir_post_g: 0.0,
            feed_bowl_pre_g: 0.0,
            feed_bowl_post_g: 0.0,
            last_feed_g: 0.0,
            feed_report: FeedReport::default(),
        })
    }

    /// Advance the controller by one tick.
    ///
    /// Hardware faults never abort the loop; they are logged and the
    /// affected path degrades per its limp-mode rules.
    pub fn update(&mut self) {
        self.sampler.update();

        let now = self.clock.now_ms();
        let delta = elapsed_ms(self.prev_ms, now);
        self.prev_ms = now;

        self.deficit.advance(delta);

        advance_timer(&mut self.ms_since_reservoir_read, delta);
        advance_timer(&mut self.ms_since_bowl_read, delta);
        advance_timer(&mut self.ms_since_feed_attempt, delta);
        advance_timer(&mut self.ms_since_transition, delta);

        let limit = match self.limit.is_asserted() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "limit switch read failed");
                false
            }
        };

        // Motor is on for the whole tick in which a run state executes,
        // including the tick that exits it.
        let motor = motor_engaged(self.state);

        match self.state {
            FeedingState::Idle => self.idle_tick(),

            FeedingState::IdleTareReservoirWait => {
                if self.ms_since_transition > self.feed_cfg.pre_settle_ms {
                    self.transition(FeedingState::IdleTareReservoir);
                }
            }

            FeedingState::IdleTareReservoir
            | FeedingState::IdleTareBowl
            | FeedingState::IdleMeasureReservoir
            | FeedingState::IdleMeasureBowl => {
                if self.handle_sampler_readout() {
                    self.transition(FeedingState::Idle);
                }
            }

            FeedingState::FeedPreMeasureWait => {
                if self.ms_since_transition > self.feed_cfg.pre_settle_ms {
                    self.transition(FeedingState::FeedPreMeasureReservoir);
                }
            }

            FeedingState::FeedPreMeasureReservoir => self.pre_measure_tick(
                SensorChannel::Reservoir,
                FeedingState::FeedPreMeasureBowl,
            ),

            FeedingState::FeedPreMeasureBowl => {
                self.pre_measure_tick(SensorChannel::Bowl, FeedingState::FeedRunSync)
            }

            FeedingState::FeedRunSync => {
                if !self.flags.limit_switch {
                    if !limit {
                        self.transition(FeedingState::FeedRunA);
                    } else if self.ms_since_transition >= self.feed_cfg.run_timeout_ms {
                        // Assume the motor already moved plenty; proceed
                        // with an uncertain estimate rather than stall.
                        self.flags.limit_switch = true;
                        self.transition(FeedingState::FeedPostWait);
                    }
                } else if self.ms_since_transition > self.feed_cfg.run_limp_ms {
                    self.transition(FeedingState::FeedPostWait);
                }
            }

            FeedingState::FeedRunA => {
                if limit && self.ms_since_transition > self.feed_cfg.debounce_ms {
                    self.transition(FeedingState::FeedRunB);
                } else if self.ms_since_transition >= self.feed_cfg.run_timeout_ms {
                    self.flags.limit_switch = true;
                    self.transition(FeedingState::FeedPostWait);
                }
            }

            FeedingState::FeedRunB => {
                if !limit && self.ms_since_transition > self.feed_cfg.debounce_ms {
                    self.transition(FeedingState::FeedRunC);
                } else if self.ms_since_transition >= self.feed_cfg.run_timeout_ms {
                    self.flags.limit_switch = true;
                    self.transition(FeedingState::FeedPostWait);
                }
            }

            FeedingState::FeedRunC => {
                if self.ms_since_transition > self.feed_cfg.run_post_ms {
                    self.transition(FeedingState::FeedPostWait);
                }
            }

            FeedingState::FeedPostWait => {
                if self.ms_since_transition > self.feed_cfg.post_settle_ms {
                    self.transition(FeedingState::FeedPostMeasureBowl);
                }
            }

            FeedingState::FeedPostMeasureBowl => self.post_measure_tick(
                SensorChannel::Bowl,
                Some(FeedingState::FeedPostMeasureReservoir),
            ),

            FeedingState::FeedPostMeasureReservoir => {
                self.post_measure_tick(SensorChannel::Reservoir, None)
            }
        }

        if let Err(e) = self.motor.set_enabled(motor) {
            tracing::warn!(error = %e, motor, "motor drive update failed");
        }
    }

    fn idle_tick(&mut self) {
        if self.need_to_feed() == FeedBlockReason::NotBlocked {
            self.feed();
            return;
        }

        // Refresh whichever sensor has gone longer without a reading.
        // Maintenance mode reads continuously for operator feedback.
        let refresh_ms = if self.mode == MaintenanceMode::Maintenance {
            0
        } else {
            self.feed_cfg.idle_refresh_ms
        };
        if self.ms_since_reservoir_read > self.ms_since_bowl_read {
            if self.ms_since_reservoir_read > refresh_ms {
                self.transition(FeedingState::IdleMeasureReservoir);
            }
        } else if self.ms_since_bowl_read > refresh_ms {
            self.transition(FeedingState::IdleMeasureBowl);
        }
    }

    /// One tick of a pre-feed measurement state. Unlike the post-feed
    /// variant this can abort the whole attempt back to idle once the
    /// sensor-retry budget is spent.
    fn pre_measure_tick(&mut self, channel: SensorChannel, next: FeedingState) {
        if !self.flags.limp() {
            if !self.handle_sampler_readout() {
                return;
            }
            let m = self.sampler.last();
            if m.stddev_g < self.sensor_cfg.noise_limit_g {
                match channel {
                    SensorChannel::Reservoir => self.feed_reservoir_pre_g = m.mean_g,
                    SensorChannel::Bowl => self.feed_bowl_pre_g = m.mean_g,
                }
                self.transition(next);
                return;
            }
            if self.state_retries < self.feed_cfg.max_state_retries {
                self.transition(self.state);
                return;
            }
            if self.feed_sensor_retries <= self.feed_cfg.max_feed_retries {
                // Abort the attempt; it still counts for cooldown.
                self.ms_since_feed_attempt = 0;
                self.feed_sensor_retries += 1;
                self.feed_report = FeedReport {
                    result: FeedResult::SensorRetry,
                    arg: i32::from(self.feed_sensor_retries),
                    at_ms: self.clock.now_ms(),
                };
                self.transition(FeedingState::Idle);
                return;
            }
        }

        // Out of retries or already limp: flag the channel noisy and feed
        // by assumed weight.
        self.set_noisy(channel);
        self.transition(next);
    }

    /// One tick of a post-feed measurement state. Measurement failure here
    /// still completes the feed with best-effort data.
    fn post_measure_tick(&mut self, channel: SensorChannel, next: Option<FeedingState>) {
        if !self.flags.limp() {
            if !self.handle_sampler_readout() {
                return;
            }
            let m = self.sampler.last();
            if m.stddev_g < self.sensor_cfg.noise_limit_g {
                match channel {
                    SensorChannel::Reservoir => self.feed_reservoir_post_g = m.mean_g,
                    SensorChannel::Bowl => self.feed_bowl_post_g = m.mean_g,
                }
                match next {
                    Some(next) => self.transition(next),
                    None => self.complete_feed(),
                }
                return;
            }
            if self.state_retries < self.feed_cfg.max_state_retries {
                self.transition(self.state);
                return;
            }
        }

        self.set_noisy(channel);
        match next {
            Some(next) => self.transition(next),
            None => self.complete_feed(),
        }
    }

    fn set_noisy(&mut self, channel: SensorChannel) {
        match channel {
            SensorChannel::Reservoir => self.flags.reservoir_noisy = true,
            SensorChannel::Bowl => self.flags.bowl_noisy = true,
        }
    }

    /// Latch sampler results into telemetry. Returns true once the readout
    /// is over, either completed or timed out.
    fn handle_sampler_readout(&mut self) -> bool {
        if self.flags.sensor_timeout
            || self.ms_since_transition > self.sensor_cfg.read_timeout_ms
        {
            self.flags.sensor_timeout = true;
            return true;
        }
        if self.sampler.is_busy() {
            return false;
        }
        let m = self.sampler.last();
        match m.channel {
            SensorChannel::Reservoir => {
                self.reservoir_mean_g = m.mean_g;
                self.reservoir_stddev_g = m.stddev_g;
                self.ms_since_reservoir_read = 0;
            }
            SensorChannel::Bowl => {
                self.bowl_mean_g = m.mean_g;
                self.bowl_stddev_g = m.stddev_g;
                self.ms_since_bowl_read = 0;
            }
        }
        true
    }

    /// Finalize a dispense cycle: estimate the weight, run jam
    /// escalation or recovery, settle the deficit and report.
    fn complete_feed(&mut self) {
        let estimate = estimate_dispensed(
            &self.feed_cfg,
            &self.flags,
            self.feed_reservoir_pre_g,
            self.feed_reservoir_post_g,
            self.feed_bowl_pre_g,
            self.feed_bowl_post_g,
        );
        if estimate.disagree {
            self.flags.sensor_disagree = true;
        }
        if estimate.unreasonable {
            self.flags.sensor_unreasonable = true;
        }

        // An implausibly light feed suggests a jam or empty hopper.
        if estimate.grams > self.feed_cfg.assumed_weight_g * self.feed_cfg.jam_fraction {
            self.feed_jammed_retries = 0;
            if self.mode == MaintenanceMode::Jammed {
                self.mode = MaintenanceMode::Operational;
            }
        } else {
            self.feed_jammed_retries += 1;
            if self.feed_jammed_retries >= self.feed_cfg.max_feed_retries {
                self.mode = MaintenanceMode::Jammed;
            }
        }

        let dispensed_mg = (estimate.grams * 1000.0) as i32;
        self.deficit.record_dispensed_mg(dispensed_mg);

        self.ms_since_feed_attempt = 0;
        self.feed_sensor_retries = 0;
        self.last_feed_g = estimate.grams;
        self.feed_report = FeedReport {
            result: FeedResult::Success,
            arg: dispensed_mg,
            at_ms: self.clock.now_ms(),
        };
        tracing::info!(
            dispensed_mg,
            jammed_retries = self.feed_jammed_retries,
            mode = ?self.mode,
            "feed complete"
        );
        self.transition(FeedingState::Idle);
    }

    fn transition(&mut self, new_state: FeedingState) {
        if new_state == self.state {
            self.state_retries += 1;
        } else {
            self.state_retries = 0;
        }
        tracing::debug!(
            from = ?self.state,
            to = ?new_state,
            after_ms = self.ms_since_transition,
            retries = self.state_retries,
            mode = ?self.mode,
            "state transition"
        );
        if let Some((channel, apply_tare)) = session_on_entry(new_state) {
            self.sampler.start(channel, apply_tare);
        }
        self.ms_since_transition = 0;
        self.state = new_state;
    }

    fn need_to_feed(&self) -> FeedBlockReason {
        evaluate_feed_gate(
            self.mode,
            &self.deficit,
            self.ms_since_feed_attempt,
            self.feed_cfg.cooldown_ms,
        )
    }

    // --- command surface ---

    /// Start a dispense cycle immediately, bypassing the feed gate.
    pub fn feed(&mut self) {
        self.transition(FeedingState::FeedPreMeasureWait);
    }

    /// Clear all error state and return to normal operation.
    pub fn reset(&mut self) {
        self.flags.clear();
        self.mode = MaintenanceMode::Operational;
        self.transition(FeedingState::Idle);
        self.state_retries = 0;
        self.feed_jammed_retries = 0;
        self.feed_sensor_retries = 0;
    }

    /// Clear error state and enter maintenance mode.
    pub fn enter_maintenance(&mut self) {
        self.flags.clear();
        self.mode = MaintenanceMode::Maintenance;
        self.transition(FeedingState::Idle);
    }

    pub fn maintenance(&self) -> bool {
        self.mode == MaintenanceMode::Maintenance
    }

    /// Enter maintenance mode and tare the empty reservoir after a settle
    /// delay.
    pub fn tare_reservoir(&mut self) {
        self.mode = MaintenanceMode::Maintenance;
        self.transition(FeedingState::IdleTareReservoirWait);
    }

    /// Enter maintenance mode and tare the empty bowl.
    pub fn tare_bowl(&mut self) {
        self.mode = MaintenanceMode::Maintenance;
        self.transition(FeedingState::IdleTareBowl);
    }

    pub fn deficit_mg(&self) -> i32 {
        self.deficit.deficit_mg()
    }

    /// Adjust the deficit balance. Positive brings automatic feeding
    /// forward, negative accounts for food given by hand.
    pub fn adjust_deficit_mg(&mut self, milligrams: i32) {
        self.deficit.adjust_mg(milligrams);
    }

    pub fn grams_per_day(&self) -> i32 {
        self.deficit.grams_per_day()
    }

    pub fn set_grams_per_day(&mut self, grams_per_day: i32) {
        self.deficit.set_grams_per_day(grams_per_day);
    }

    // --- telemetry ---

    pub fn state(&self) -> FeedingState {
        self.state
    }

    pub fn mode(&self) -> MaintenanceMode {
        self.mode
    }

    pub fn flags(&self) -> ErrorFlags {
        self.flags
    }

    pub fn feeding(&self) -> bool {
        feeding_in_progress(self.state)
    }

    pub fn reservoir_weight_g(&self) -> f32 {
        self.reservoir_mean_g
    }

    pub fn reservoir_stddev_g(&self) -> f32 {
        self.reservoir_stddev_g
    }

    pub fn bowl_weight_g(&self) -> f32 {
        self.bowl_mean_g
    }

    pub fn bowl_stddev_g(&self) -> f32 {
        self.bowl_stddev_g
    }

    pub fn deficit_grams(&self) -> f32 {
        self.deficit.deficit_mg() as f32 / 1000.0
    }

    pub fn last_feed_grams(&self) -> f32 {
        self.last_feed_g
    }

    // --- report surface ---

    /// Human-readable status snapshot for the display.
    pub fn state_report(&self) -> StateReport {
        match self.state {
            FeedingState::Idle
            | FeedingState::IdleMeasureReservoir
            | FeedingState::IdleMeasureBowl => {
                let recent_feed = self.feed_report.result == FeedResult::Success
                    && elapsed_ms(self.feed_report.at_ms, self.clock.now_ms())
                        < self.feed_cfg.recent_feed_ms;
                if recent_feed {
                    return StateReport {
                        header: "Feed result".to_owned(),
                        detail1: feed_delta_line(
                            'R',
                            self.feed_reservoir_pre_g,
                            self.feed_reservoir_post_g - self.feed_reservoir_pre_g,
                        ),
                        detail2: feed_delta_line(
                            'B',
                            self.feed_bowl_pre_g,
                            self.feed_bowl_post_g - self.feed_bowl_pre_g,
                        ),
                        large: false,
                    };
                }
                match self.need_to_feed() {
                    FeedBlockReason::Maintenance => {
                        self.sensor_detail_report("Maintenance")
                    }
                    FeedBlockReason::Jammed => StateReport {
                        detail1: "JAMMED".to_owned(),
                        large: true,
                        ..StateReport::default()
                    },
                    FeedBlockReason::Cooldown => {
                        let mut detail1 = String::new();
                        if let Some(remain) = self
                            .feed_cfg
                            .cooldown_ms
                            .checked_sub(self.ms_since_feed_attempt)
                        {
                            detail1 = cooldown_text(remain);
                        }
                        StateReport {
                            header: "Cooldown".to_owned(),
                            detail1,
                            large: true,
                            ..StateReport::default()
                        }
                    }
                    FeedBlockReason::Deficit => {
                        let owed = self.deficit.deficit_mg() - self.deficit.threshold_mg();
                        StateReport {
                            header: "Deficit".to_owned(),
                            detail1: fit_line(format!("{owed}mg")),
                            large: true,
                            ..StateReport::default()
                        }
                    }
                    FeedBlockReason::NotBlocked => self.feeding_report(0),
                }
            }

            FeedingState::IdleTareReservoirWait | FeedingState::IdleTareReservoir => {
                self.sensor_detail_report("Tare reservoir")
            }
            FeedingState::IdleTareBowl => self.sensor_detail_report("Tare bowl"),

            FeedingState::FeedPreMeasureWait => self.feeding_report(0),
            FeedingState::FeedPreMeasureReservoir => self.feeding_report(1),
            FeedingState::FeedPreMeasureBowl => self.feeding_report(2),
            FeedingState::FeedRunSync => self.feeding_report(3),
            FeedingState::FeedRunA => self.feeding_report(4),
            FeedingState::FeedRunB => self.feeding_report(5),
            FeedingState::FeedRunC => self.feeding_report(6),
            FeedingState::FeedPostWait => self.feeding_report(7),
            FeedingState::FeedPostMeasureBowl => self.feeding_report(8),
            FeedingState::FeedPostMeasureReservoir => self.feeding_report(9),
        }
    }

    fn sensor_detail_report(&self, header: &str) -> StateReport {
        StateReport {
            header: header.to_owned(),
            detail1: weight_line(self.reservoir_mean_g, self.reservoir_stddev_g),
            detail2: weight_line(self.bowl_mean_g, self.bowl_stddev_g),
            large: false,
        }
    }

    fn feeding_report(&self, progress: usize) -> StateReport {
        StateReport {
            header: "Feeding".to_owned(),
            detail1: progress_bar(progress),
            large: true,
            ..StateReport::default()
        }
    }

    /// Outcome of the most recent feed attempt.
    pub fn feed_report(&self) -> FeedReport {
        self.feed_report
    }

    /// The single most severe currently-true condition, first match wins.
    pub fn error_report(&self) -> ErrorReport {
        if self.flags.limit_switch {
            return ErrorReport::of("Motor timeout", ErrorSeverity::Error);
        }
        if let Some(reason) = self.flags.limp_reason() {
            return ErrorReport::of(reason, ErrorSeverity::Error);
        }
        if self.flags.power_loss {
            return ErrorReport::of("Power loss", ErrorSeverity::Error);
        }
        if self.mode == MaintenanceMode::Jammed {
            return ErrorReport::of("Jammed/empty", ErrorSeverity::Error);
        }
        if self.feed_jammed_retries > 0 {
            return ErrorReport::of("Jammed/empty?", ErrorSeverity::Warning);
        }
        if self.reservoir_mean_g < self.feed_cfg.reservoir_low_g {
            return ErrorReport::of("Reservoir low", ErrorSeverity::Warning);
        }
        ErrorReport::okay()
    }
}

//! Test and simulation doubles for the controller's hardware seams.
//!
//! These are deliberately simple: scripted values, shared handles and a
//! manually advanced clock, so state machine behavior can be driven
//! tick-by-tick with no real hardware and no real time.

use crate::sampler::SensorChannel;
use feeder_traits::{AdcGain, Clock, LimitSwitch, LoadcellAdc, MotorDrive};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Deterministic clock advanced manually (or by `sleep`) in tests.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    ms: Arc<AtomicU32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the counter; wraps at u32::MAX like the real tick counter.
    pub fn advance(&self, ms: u32) {
        self.ms.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        self.ms.load(Ordering::Relaxed)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d.as_millis() as u32);
    }
}

#[derive(Debug)]
struct AdcState {
    gain: AdcGain,
    ready: bool,
    fail_reads: bool,
    level: [i32; 2],
    queued: [VecDeque<i32>; 2],
}

impl Default for AdcState {
    fn default() -> Self {
        Self {
            gain: AdcGain::A128,
            ready: true,
            fail_reads: false,
            level: [0; 2],
            queued: [VecDeque::new(), VecDeque::new()],
        }
    }
}

fn channel_index(channel: SensorChannel) -> usize {
    match channel {
        SensorChannel::Reservoir => 0,
        SensorChannel::Bowl => 1,
    }
}

/// ADC double returning scripted raw values per channel.
///
/// Clones share state, so keep a clone as a handle to adjust levels
/// after moving the original into a `Sampler`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    state: Rc<RefCell<AdcState>>,
}

impl ScriptedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Steady-state raw value returned once any queued readings run out.
    pub fn set_level(&self, channel: SensorChannel, raw: i32) {
        self.state.borrow_mut().level[channel_index(channel)] = raw;
    }

    /// Queue raw readings consumed before the steady level.
    pub fn push(&self, channel: SensorChannel, values: impl IntoIterator<Item = i32>) {
        self.state.borrow_mut().queued[channel_index(channel)].extend(values);
    }

    /// Gate conversion readiness; false simulates a hung frontend.
    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Make every read return an error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Channel implied by the most recent gain selection.
    pub fn selected_channel(&self) -> SensorChannel {
        match self.state.borrow().gain {
            AdcGain::B32 => SensorChannel::Bowl,
            _ => SensorChannel::Reservoir,
        }
    }
}

impl LoadcellAdc for ScriptedAdc {
    fn set_gain(
        &mut self,
        gain: AdcGain,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.borrow_mut().gain = gain;
        Ok(())
    }

    fn is_ready(&mut self) -> bool {
        self.state.borrow().ready
    }

    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let channel = self.selected_channel();
        let mut state = self.state.borrow_mut();
        if state.fail_reads {
            return Err(Box::new(std::io::Error::other("scripted adc failure")));
        }
        let idx = channel_index(channel);
        Ok(state.queued[idx]
            .pop_front()
            .unwrap_or(state.level[idx]))
    }
}

/// Limit switch backed by a shared flag the test flips between ticks.
#[derive(Debug, Clone, Default)]
pub struct SharedSwitch {
    asserted: Rc<Cell<bool>>,
}

impl SharedSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, asserted: bool) {
        self.asserted.set(asserted);
    }

    pub fn get(&self) -> bool {
        self.asserted.get()
    }
}

impl LimitSwitch for SharedSwitch {
    fn is_asserted(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.asserted.get())
    }
}

/// Motor output spy; clones share state.
#[derive(Debug, Clone, Default)]
pub struct SharedMotor {
    enabled: Rc<Cell<bool>>,
    engagements: Rc<Cell<u32>>,
}

impl SharedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Number of off-to-on transitions commanded so far.
    pub fn engagements(&self) -> u32 {
        self.engagements.get()
    }
}

impl MotorDrive for SharedMotor {
    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if enabled && !self.enabled.get() {
            self.engagements.set(self.engagements.get() + 1);
        }
        self.enabled.set(enabled);
        Ok(())
    }
}

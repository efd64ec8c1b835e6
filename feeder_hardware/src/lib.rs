//! Hardware backends for the feeder: a fully simulated rig for host-side
//! runs and tests, and the HX711/GPIO drivers behind the `hardware`
//! feature for the real device.

pub mod error;
#[cfg(feature = "hardware")]
pub mod hx711;

use std::cell::RefCell;
use std::rc::Rc;

use feeder_traits::{AdcGain, LimitSwitch, LoadcellAdc, MotorDrive};

/// Mechanical model behind the simulated rig.
///
/// The dispense cam is a free-running position in milliseconds of motor
/// run time. The limit switch is asserted over a fixed arc of the cycle,
/// and one portion drops from reservoir to bowl as the cam passes the
/// release edge.
#[derive(Debug)]
struct RigState {
    reservoir_g: f32,
    bowl_g: f32,
    portion_g: f32,
    cycle_ms: u32,
    assert_from_ms: u32,
    release_at_ms: u32,
    cam_pos_ms: u32,
    motor_on: bool,
    jammed: bool,
    noise_counts: i32,
    rng: u32,
    gain: AdcGain,
    gain_reservoir_g_per_count: f32,
    gain_bowl_g_per_count: f32,
    tare_reservoir_raw: i32,
    tare_bowl_raw: i32,
}

impl RigState {
    fn limit_asserted(&self) -> bool {
        self.cam_pos_ms >= self.assert_from_ms && self.cam_pos_ms < self.release_at_ms
    }

    fn dispense(&mut self) {
        if self.jammed {
            return;
        }
        let amount = self.portion_g.min(self.reservoir_g.max(0.0));
        self.reservoir_g -= amount;
        self.bowl_g += amount;
        tracing::debug!(
            amount,
            reservoir = self.reservoir_g,
            bowl = self.bowl_g,
            "sim rig dispensed"
        );
    }

    /// Symmetric raw-count noise in `[-noise_counts, +noise_counts]`,
    /// xorshift-driven so runs are deterministic per rig.
    fn next_noise(&mut self) -> i32 {
        if self.noise_counts == 0 {
            return 0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = 2 * self.noise_counts + 1;
        (x % span as u32) as i32 - self.noise_counts
    }

    fn advance_cam(&mut self, mut delta_ms: u32) {
        while delta_ms > 0 {
            let to_wrap = self.cycle_ms - self.cam_pos_ms;
            let step = delta_ms.min(to_wrap);
            let old = self.cam_pos_ms;
            self.cam_pos_ms = (self.cam_pos_ms + step) % self.cycle_ms;
            if old < self.release_at_ms && old + step >= self.release_at_ms {
                self.dispense();
            }
            delta_ms -= step;
        }
    }
}

/// A coupled simulation of the feeder mechanics: ADC, limit switch and
/// motor handles all share one mechanical state, so the control loop sees
/// consistent physics.
///
/// Single-threaded by design; handles are `Rc`-shared.
#[derive(Debug, Clone)]
pub struct SimRig {
    state: Rc<RefCell<RigState>>,
}

impl SimRig {
    /// Rig with `reservoir_g` of food in the hopper and `bowl_g` in the
    /// bowl, calibrated with the reference device's gains and tares.
    pub fn new(reservoir_g: f32, bowl_g: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                reservoir_g,
                bowl_g,
                portion_g: 9.0,
                cycle_ms: 2_000,
                assert_from_ms: 1_200,
                release_at_ms: 1_900,
                cam_pos_ms: 0,
                motor_on: false,
                jammed: false,
                noise_counts: 0,
                rng: 0x2F00D,
                gain: AdcGain::A128,
                gain_reservoir_g_per_count: -0.002_053_032_8,
                gain_bowl_g_per_count: 0.003_227_107,
                tare_reservoir_raw: -754_589,
                tare_bowl_raw: 31_485,
            })),
        }
    }

    /// Advance the mechanics by `delta_ms` of wall time. The cam only
    /// turns while the motor is energized.
    pub fn tick(&self, delta_ms: u32) {
        let mut state = self.state.borrow_mut();
        if state.motor_on {
            state.advance_cam(delta_ms);
        }
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc {
            state: Rc::clone(&self.state),
        }
    }

    pub fn switch(&self) -> SimSwitch {
        SimSwitch {
            state: Rc::clone(&self.state),
        }
    }

    pub fn motor(&self) -> SimMotor {
        SimMotor {
            state: Rc::clone(&self.state),
        }
    }

    pub fn reservoir_grams(&self) -> f32 {
        self.state.borrow().reservoir_g
    }

    pub fn bowl_grams(&self) -> f32 {
        self.state.borrow().bowl_g
    }

    pub fn set_reservoir_grams(&self, grams: f32) {
        self.state.borrow_mut().reservoir_g = grams;
    }

    pub fn set_bowl_grams(&self, grams: f32) {
        self.state.borrow_mut().bowl_g = grams;
    }

    /// Jam the mechanism: the cam still turns but no food moves.
    pub fn set_jammed(&self, jammed: bool) {
        self.state.borrow_mut().jammed = jammed;
    }

    /// Add uniform raw-count noise to every ADC reading.
    pub fn set_noise_counts(&self, counts: i32) {
        self.state.borrow_mut().noise_counts = counts.max(0);
    }

    pub fn motor_on(&self) -> bool {
        self.state.borrow().motor_on
    }
}

/// ADC view of the rig. Raw counts are derived from the rig's weights
/// through the reference calibration, so the control loop's gains invert
/// them back to grams.
#[derive(Debug, Clone)]
pub struct SimAdc {
    state: Rc<RefCell<RigState>>,
}

impl LoadcellAdc for SimAdc {
    fn set_gain(&mut self, gain: AdcGain) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.borrow_mut().gain = gain;
        Ok(())
    }

    fn is_ready(&mut self) -> bool {
        true
    }

    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut state = self.state.borrow_mut();
        let raw = match state.gain {
            // Channel B reads the bowl cell; channel A the reservoir.
            AdcGain::B32 => {
                state.tare_bowl_raw + (state.bowl_g / state.gain_bowl_g_per_count) as i32
            }
            AdcGain::A128 | AdcGain::A64 => {
                state.tare_reservoir_raw
                    + (state.reservoir_g / state.gain_reservoir_g_per_count) as i32
            }
        };
        let noise = state.next_noise();
        Ok(raw + noise)
    }
}

/// Limit switch view of the rig, derived from the cam position.
#[derive(Debug, Clone)]
pub struct SimSwitch {
    state: Rc<RefCell<RigState>>,
}

impl LimitSwitch for SimSwitch {
    fn is_asserted(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.state.borrow().limit_asserted())
    }
}

/// Motor drive view of the rig.
#[derive(Debug, Clone)]
pub struct SimMotor {
    state: Rc<RefCell<RigState>>,
}

impl MotorDrive for SimMotor {
    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.state.borrow_mut().motor_on = enabled;
        Ok(())
    }
}

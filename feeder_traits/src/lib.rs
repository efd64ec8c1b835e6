pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// ADC gain / channel selection for the shared strain-gauge frontend.
///
/// Matches the HX711 gain options: channel A at 128x or 64x, channel B
/// at a fixed 32x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcGain {
    A128,
    A64,
    B32,
}

/// Raw strain-gauge ADC shared by both weight sensors.
///
/// One physical frontend is multiplexed between the reservoir and bowl
/// cells; the sampler selects a channel via `set_gain` and then polls
/// `is_ready` before each `read`.
pub trait LoadcellAdc {
    /// Select the gain/channel used by subsequent conversions. Takes
    /// effect from the next completed conversion.
    fn set_gain(
        &mut self,
        gain: AdcGain,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// True when a new conversion is available to read without blocking.
    fn is_ready(&mut self) -> bool;

    /// Read one raw signed conversion result.
    fn read(&mut self) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Digital input tracking the dispenser cam position.
pub trait LimitSwitch {
    fn is_asserted(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Digital output enabling the dispenser motor.
pub trait MotorDrive {
    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

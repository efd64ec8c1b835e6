//! HX711 frontend and GPIO bindings for the real device.

use std::time::{Duration, Instant};

use feeder_traits::{AdcGain, LimitSwitch, LoadcellAdc, MotorDrive};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};

/// Extra clock pulses after the 24 data bits select the gain and channel
/// of the next conversion.
fn gain_pulses(gain: AdcGain) -> u8 {
    match gain {
        AdcGain::A128 => 25,
        AdcGain::B32 => 26,
        AdcGain::A64 => 27,
    }
}

/// Bit-banged HX711 driver. Clock idles low; a conversion is ready when
/// the data line drops.
pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    pulses: u8,
    ready_timeout: Duration,
}

impl Hx711 {
    pub fn new(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        sck.set_low();
        Ok(Self {
            dt,
            sck,
            pulses: gain_pulses(AdcGain::A128),
            ready_timeout: Duration::from_millis(150),
        })
    }

    fn clock_bit(&mut self) -> u32 {
        self.sck.set_high();
        spin_delay();
        let bit = u32::from(self.dt.is_high());
        self.sck.set_low();
        spin_delay();
        bit
    }
}

impl LoadcellAdc for Hx711 {
    /// Takes effect on the conversion after the next read; the HX711
    /// latches gain from the trailing pulses of each readout.
    fn set_gain(&mut self, gain: AdcGain) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pulses = gain_pulses(gain);
        Ok(())
    }

    fn is_ready(&mut self) -> bool {
        self.dt.is_low()
    }

    fn read(&mut self) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let deadline = Instant::now() + self.ready_timeout;
        while self.dt.is_high() {
            if Instant::now() >= deadline {
                return Err(Box::new(HwError::DataReadyTimeout));
            }
            std::thread::sleep(Duration::from_micros(200));
        }

        let mut value: u32 = 0;
        for _ in 0..24 {
            value = (value << 1) | self.clock_bit();
        }
        for _ in 0..self.pulses.saturating_sub(24) {
            self.sck.set_high();
            spin_delay();
            self.sck.set_low();
            spin_delay();
        }

        // Sign extend the 24-bit two's-complement result.
        let mut value = value as i32;
        if value & 0x80_0000 != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

/// Limit switch on a pulled-up GPIO input; asserted while the pin reads
/// high.
pub struct GpioLimitSwitch {
    pin: InputPin,
}

impl GpioLimitSwitch {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();
        Ok(Self { pin })
    }
}

impl LimitSwitch for GpioLimitSwitch {
    fn is_asserted(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.pin.is_high())
    }
}

/// Motor enable line on a GPIO output, driven low at startup.
pub struct GpioMotor {
    pin: OutputPin,
}

impl GpioMotor {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl MotorDrive for GpioMotor {
    fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if enabled {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

#[inline(always)]
fn spin_delay() {
    std::hint::spin_loop();
}

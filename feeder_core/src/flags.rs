//! Sticky error conditions owned by the feeding controller.

/// Independent error conditions, latched by the flow that detects them and
/// cleared only by `reset()` or `enter_maintenance()`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFlags {
    /// Excessive standard deviation in reservoir weight readout.
    pub reservoir_noisy: bool,
    /// Excessive standard deviation in bowl weight readout.
    pub bowl_noisy: bool,
    /// A sampling session failed to complete within the readout timeout.
    pub sensor_timeout: bool,
    /// Pre/post weight deltas of the two sensors disagreed.
    pub sensor_disagree: bool,
    /// Estimated dispensed weight fell outside the sane range.
    pub sensor_unreasonable: bool,
    /// A motor run phase timed out waiting on the limit switch.
    pub limit_switch: bool,
    /// Power has been lost since the last operator reset.
    pub power_loss: bool,
}

impl ErrorFlags {
    /// Flags as they stand right after power-up: nothing latched except
    /// the power-loss marker, which an operator reset clears.
    pub fn at_boot() -> Self {
        Self {
            power_loss: true,
            ..Self::default()
        }
    }

    /// Clear every latched condition.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Why the load cells are currently untrusted, if they are.
    ///
    /// While any of these is latched the controller substitutes the
    /// nominal portion weight instead of measuring. First match wins.
    pub fn limp_reason(&self) -> Option<&'static str> {
        if self.sensor_timeout {
            return Some("Sensor timeout");
        }
        if self.reservoir_noisy {
            return Some("Reservoir noisy");
        }
        if self.bowl_noisy {
            return Some("Bowl noisy");
        }
        if self.sensor_disagree {
            return Some("Sensor disagree");
        }
        if self.sensor_unreasonable {
            return Some("Sensor sanity");
        }
        None
    }

    /// True while weight measurements are skipped in favor of the nominal
    /// portion weight.
    pub fn limp(&self) -> bool {
        self.limp_reason().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_flags_only_mark_power_loss() {
        let f = ErrorFlags::at_boot();
        assert!(f.power_loss);
        assert!(!f.limp());
    }

    #[test]
    fn limp_reason_priority() {
        let mut f = ErrorFlags {
            bowl_noisy: true,
            sensor_disagree: true,
            ..ErrorFlags::default()
        };
        assert_eq!(f.limp_reason(), Some("Bowl noisy"));
        f.sensor_timeout = true;
        assert_eq!(f.limp_reason(), Some("Sensor timeout"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut f = ErrorFlags::at_boot();
        f.limit_switch = true;
        f.reservoir_noisy = true;
        f.clear();
        assert_eq!(f, ErrorFlags::default());
        assert!(!f.power_loss);
    }
}

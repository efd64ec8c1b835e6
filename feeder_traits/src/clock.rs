use std::thread;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock abstraction for control and timing.
///
/// - now_ms(): free-running millisecond counter that wraps at u32::MAX
/// - sleep(): sleeps for the provided duration (implementations may simulate)
///
/// Elapsed time between two readings must be computed with wrapping
/// subtraction (`later.wrapping_sub(earlier)`); absolute comparison of
/// counter values is meaningless across the wrap.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn sleep(&self, d: Duration);
}

/// Default, real-time monotonic clock backed by std::time::Instant.
///
/// The counter truncates to u32 and therefore wraps roughly every 49.7
/// days of uptime, matching the behavior of a bare-metal millis() tick.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

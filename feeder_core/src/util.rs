//! Wraparound-safe millisecond arithmetic for the tick-driven controller.
//!
//! The clock is a free-running u32 millisecond counter that wraps roughly
//! every 49.7 days. All elapsed-time math must go through these helpers
//! rather than comparing counter values directly.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u32 = 1_000;
/// Number of milliseconds in one day.
pub const MILLIS_PER_DAY: u32 = 86_400_000;

/// Elapsed milliseconds between two wrapping counter readings.
///
/// Correct across a single counter wrap between `earlier` and `later`.
#[inline]
pub fn elapsed_ms(earlier: u32, later: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Accumulate a tick delta into an elapsed-time counter, saturating at
/// u32::MAX so long-idle timers stay "very old" instead of wrapping back
/// to "just now".
#[inline]
pub fn advance_timer(timer: &mut u32, delta_ms: u32) {
    *timer = timer.saturating_add(delta_ms);
}

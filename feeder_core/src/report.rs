//! Read-only report snapshots handed to the display and telemetry
//! adapters, plus the shared text formatting they use.
//!
//! Reports are copied out by value; collaborators never get a mutable
//! view of controller state.

/// Display line width of the target character LCD.
pub const REPORT_WIDTH: usize = 20;
/// Width of the `large` single-line detail rendering.
pub const REPORT_LARGE_WIDTH: usize = 10;

/// Outcome kind of the most recent feed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedResult {
    /// No feed has been performed yet.
    #[default]
    None,
    /// Successful feed; arg is the dispensed amount in milligrams.
    Success,
    /// Feed aborted because sensors stayed noisy; arg is the number of
    /// consecutively failed attempts.
    SensorRetry,
}

/// Result of the previous feed attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedReport {
    pub result: FeedResult,
    pub arg: i32,
    /// Clock reading when the report was recorded (wrapping ms).
    pub at_ms: u32,
}

/// Severity level for an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Okay,
    Warning,
    Error,
}

/// Single most severe currently-true condition, computed on demand.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport {
    pub message: Option<&'static str>,
    pub severity: ErrorSeverity,
}

impl ErrorReport {
    pub const fn okay() -> Self {
        Self {
            message: None,
            severity: ErrorSeverity::Okay,
        }
    }

    pub const fn of(message: &'static str, severity: ErrorSeverity) -> Self {
        Self {
            message: Some(message),
            severity,
        }
    }
}

/// Human-readable status snapshot.
///
/// If `large` is set, only up to ten characters of `detail1` are used and
/// `detail2` is unused, allowing that text to be drawn at double scale
/// where the two detail lines would normally be.
#[derive(Debug, Clone, Default)]
pub struct StateReport {
    pub header: String,
    pub detail1: String,
    pub detail2: String,
    pub large: bool,
}

/// Reasons why feeding might be blocked from the idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedBlockReason {
    NotBlocked,
    Maintenance,
    Jammed,
    Cooldown,
    Deficit,
}

/// Truncate a line to the display width on a character boundary.
pub(crate) fn fit_line(s: String) -> String {
    if s.chars().count() <= REPORT_WIDTH {
        return s;
    }
    s.chars().take(REPORT_WIDTH).collect()
}

/// `mean +/- stddev` line shared by the maintenance and tare views.
pub(crate) fn weight_line(mean_g: f32, stddev_g: f32) -> String {
    fit_line(format!("{mean_g:+7.1}g +/-{stddev_g:6.1}g"))
}

/// `R/B pre delta` line shown after a completed feed.
pub(crate) fn feed_delta_line(tag: char, pre_g: f32, delta_g: f32) -> String {
    fit_line(format!("{tag} {pre_g:+7.1}g {delta_g:+7.1}g"))
}

/// Ten-step `#`/`-` feeding progress bar.
pub(crate) fn progress_bar(progress: usize) -> String {
    (0..REPORT_LARGE_WIDTH)
        .map(|i| if i < progress { '#' } else { '-' })
        .collect()
}

/// Remaining cooldown rendered as `M:SS`.
pub(crate) fn cooldown_text(remain_ms: u32) -> String {
    let seconds = remain_ms / 1000;
    let minutes = seconds / 60;
    format!("{}:{:02}", minutes, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn lines_fit_the_display() {
        assert!(weight_line(-1234.5, 9999.9).chars().count() <= REPORT_WIDTH);
        assert!(
            feed_delta_line('R', 512.3, -9.1).chars().count() <= REPORT_WIDTH
        );
        assert_eq!(fit_line("x".repeat(40)).chars().count(), REPORT_WIDTH);
    }

    #[test]
    fn weight_line_format() {
        assert_eq!(weight_line(500.0, 0.4), " +500.0g +/-   0.4g");
        assert_eq!(weight_line(-3.2, 12.0), "   -3.2g +/-  12.0g");
    }

    #[rstest]
    #[case(0, "----------")]
    #[case(3, "###-------")]
    #[case(10, "##########")]
    #[case(99, "##########")]
    fn progress_bar_fills_left_to_right(#[case] progress: usize, #[case] expected: &str) {
        assert_eq!(progress_bar(progress), expected);
    }

    #[rstest]
    #[case(0, "0:00")]
    #[case(61_000, "1:01")]
    #[case(299_999, "4:59")]
    #[case(300_000, "5:00")]
    fn cooldown_minutes_and_seconds(#[case] remain_ms: u32, #[case] expected: &str) {
        assert_eq!(cooldown_text(remain_ms), expected);
    }
}

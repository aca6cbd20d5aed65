//! Timeline second conversion utilities.
//!
//! Lyric timestamps are real seconds (`f64`) on the media timeline. This module
//! provides rounding for clock captures and safe conversions to [`Duration`],
//! with explicit saturation instead of panics on negative or non-finite input.

use std::time::Duration;

/// Extension trait for timeline seconds.
pub trait SecondsExt {
    /// Round to `places` decimal places.
    ///
    /// Clock captures are stored at two decimal places by default, so a reading
    /// of `12.3456` becomes `12.35`.
    fn round_to(self, places: u8) -> f64;

    /// Convert to a [`Duration`], saturating negative or non-finite values to zero.
    fn to_duration(self) -> Duration;

    /// Format as `mm:ss.xx` for display and logs.
    fn format_clock(self) -> String;
}

impl SecondsExt for f64 {
    fn round_to(self, places: u8) -> f64 {
        let factor = 10_f64.powi(i32::from(places));
        (self * factor).round() / factor
    }

    fn to_duration(self) -> Duration {
        if self.is_finite() && self > 0.0 {
            Duration::try_from_secs_f64(self).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    fn format_clock(self) -> String {
        // Half a hundredth so the truncating millis below round to nearest
        let duration = (self + 0.005).to_duration();
        let total_secs = duration.as_secs();
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;
        let hundredths = duration.subsec_millis() / 10;

        format!("{minutes:02}:{seconds:02}.{hundredths:02}")
    }
}

/// Parse a seconds cell, falling back to `0.0` for anything that is not a
/// finite, non-negative number.
///
/// Used wherever operator-typed or imported numbers must never abort the
/// surrounding operation.
#[must_use]
pub fn parse_seconds_or_zero(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .unwrap_or(0.0)
}

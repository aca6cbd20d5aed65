//! Mapping a playback time to the active lyric line.

use crate::line::LyricLine;
use crate::validate::is_valid_interval;

/// Tracks which line is active for a moving playback clock.
///
/// The index is rebuilt whenever the line set changes and updated on every
/// clock tick. Lookups return the first line (lowest `line_number`) whose
/// interval contains the time, both ends inclusive. When no interval contains
/// the time, the previously active line is kept so gaps between lines do not
/// flicker to "nothing".
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    intervals: Vec<Option<(f64, f64)>>,
    /// Every line is timed, valid, and starts at or after its predecessor's end
    monotonic: bool,
    active: Option<usize>,
}

impl IntervalIndex {
    /// Build an index over the given lines with nothing active
    #[must_use]
    pub fn new(lines: &[LyricLine]) -> Self {
        let mut index = Self::default();
        index.rebuild(lines);
        index
    }

    /// Re-read the line intervals after an edit.
    ///
    /// The active line is kept if it still exists.
    pub fn rebuild(&mut self, lines: &[LyricLine]) {
        self.intervals = lines.iter().map(LyricLine::interval).collect();
        self.monotonic = is_monotonic(&self.intervals);
        if self.active.is_some_and(|i| i >= self.intervals.len()) {
            self.active = None;
        }
    }

    /// Currently active line
    #[must_use]
    pub const fn active(&self) -> Option<usize> {
        self.active
    }

    /// Force the active line, used when an operator picks a line directly
    /// or a repeat loop pins one.
    pub fn set_active(&mut self, index: Option<usize>) {
        self.active = index.filter(|i| *i < self.intervals.len());
    }

    /// Recompute the active line for `time` and return it.
    pub fn update(&mut self, time: f64) -> Option<usize> {
        if let Some(found) = self.locate(time) {
            self.active = Some(found);
        }
        self.active
    }

    /// Find the first line containing `time` without touching the active line.
    #[must_use]
    pub fn locate(&self, time: f64) -> Option<usize> {
        if self.monotonic {
            self.locate_sorted(time)
        } else {
            self.locate_linear(time)
        }
    }

    fn locate_linear(&self, time: f64) -> Option<usize> {
        self.intervals
            .iter()
            .position(|iv| iv.is_some_and(|(start, end)| time >= start && time <= end))
    }

    /// Binary search over monotonic intervals.
    ///
    /// Adjacent intervals may touch (`end == next start`); the earlier line wins.
    fn locate_sorted(&self, time: f64) -> Option<usize> {
        let starts_at_or_before =
            self.intervals
                .partition_point(|iv| iv.is_some_and(|(start, _)| start <= time));
        let candidate = starts_at_or_before.checked_sub(1)?;

        let contains = |i: usize| {
            self.intervals[i].is_some_and(|(start, end)| time >= start && time <= end)
        };

        if candidate > 0 && contains(candidate - 1) {
            return Some(candidate - 1);
        }
        contains(candidate).then_some(candidate)
    }
}

fn is_monotonic(intervals: &[Option<(f64, f64)>]) -> bool {
    let mut previous_end: Option<f64> = None;
    for interval in intervals {
        let Some((start, end)) = *interval else {
            return false;
        };
        if !is_valid_interval(start, end) || previous_end.is_some_and(|prev| start < prev) {
            return false;
        }
        previous_end = Some(end);
    }
    true
}

//! Timestamp editing against a live playback clock.
//!
//! [`LineEditor`] adjusts one line and commits it alone. [`WorkingCopy`] holds
//! a whole song for grid-style editing and saves it as one set. Neither moves
//! playback unless asked to through a preview seek.

mod single;
mod working_copy;

pub use single::LineEditor;
pub use working_copy::{Cell, WorkingCopy};

use crate::line::LyricLine;
use crate::player::PlaybackSource;
use crate::time::SecondsExt;

/// One of a line's two time fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeField {
    Start,
    End,
}

impl TimeField {
    /// Current value of this field on `line`, unset reads as zero
    #[must_use]
    pub fn value_of(self, line: &LyricLine) -> f64 {
        match self {
            Self::Start => line.start_or_zero(),
            Self::End => line.end_or_zero(),
        }
    }
}

/// Read the clock, rounded to `precision` decimal places
fn capture(player: &dyn PlaybackSource, precision: u8) -> f64 {
    player.current_time().round_to(precision)
}

/// Seek to a field's value without touching the line
fn preview(player: &dyn PlaybackSource, line: &LyricLine, field: TimeField) -> f64 {
    let target = field.value_of(line);
    player.seek_to(target);
    target
}

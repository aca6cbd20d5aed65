use super::{capture, preview, TimeField};
use crate::config::EditorConfig;
use crate::error::{CoreError, Result};
use crate::line::LyricLine;
use crate::player::PlaybackSource;
use crate::store::{LyricStore, UpdateFields};
use crate::time::SecondsExt;
use crate::validate::{check_interval, Violation};
use tracing::{debug, info};

/// Editor for one line's interval.
///
/// Opening the editor has no effect on playback, so the operator can keep
/// scrubbing while it is open.
#[derive(Debug, Clone)]
pub struct LineEditor {
    line: LyricLine,
    precision: u8,
}

impl LineEditor {
    #[must_use]
    pub const fn new(line: LyricLine, config: &EditorConfig) -> Self {
        Self {
            line,
            precision: config.capture_precision,
        }
    }

    /// The line with any pending edits
    #[must_use]
    pub const fn line(&self) -> &LyricLine {
        &self.line
    }

    /// Overwrite the start with the current clock reading
    pub fn capture_start(&mut self, player: &dyn PlaybackSource) -> f64 {
        let time = capture(player, self.precision);
        debug!("Line {} start captured at {}", self.line.line_number, time.format_clock());
        self.line.start_time = Some(time);
        time
    }

    /// Overwrite the end with the current clock reading
    pub fn capture_end(&mut self, player: &dyn PlaybackSource) -> f64 {
        let time = capture(player, self.precision);
        debug!("Line {} end captured at {}", self.line.line_number, time.format_clock());
        self.line.end_time = Some(time);
        time
    }

    /// Type a start time directly
    pub fn set_start(&mut self, seconds: f64) {
        self.line.start_time = Some(seconds);
    }

    /// Type an end time directly
    pub fn set_end(&mut self, seconds: f64) {
        self.line.end_time = Some(seconds);
    }

    /// Seek playback to a field's current value, returning the target
    pub fn preview_seek(&self, field: TimeField, player: &dyn PlaybackSource) -> f64 {
        preview(player, &self.line, field)
    }

    /// Current interval length
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.line.duration()
    }

    /// Check the interval and hand back the line to persist.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidInterval` violation if the bounds are negative,
    /// non-finite, or end is not after start.
    pub fn commit(&self) -> std::result::Result<LyricLine, Violation> {
        check_interval(&self.line)?;
        Ok(self.line.clone())
    }

    /// Interval fields to send with an update
    #[must_use]
    pub const fn update_fields(&self) -> UpdateFields {
        UpdateFields {
            start_time: self.line.start_time,
            end_time: self.line.end_time,
        }
    }

    /// Commit and write the interval to a store.
    ///
    /// # Errors
    ///
    /// Returns the interval violation, `UnsavedLine` for a line with no id,
    /// or the store's failure.
    pub async fn commit_to(&self, store: &dyn LyricStore) -> Result<LyricLine> {
        let line = self.commit()?;
        let line_id = line.id.ok_or(CoreError::UnsavedLine {
            line_number: line.line_number,
        })?;
        store.update_line(line_id, self.update_fields()).await?;
        info!(
            "Saved line {} interval {} - {}",
            line.line_number,
            line.start_or_zero().format_clock(),
            line.end_or_zero().format_clock()
        );
        Ok(line)
    }
}

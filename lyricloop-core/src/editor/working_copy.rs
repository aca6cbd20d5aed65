use super::{capture, preview, TimeField};
use crate::config::{EditorConfig, PlaybackConfig};
use crate::error::{CoreError, Result};
use crate::line::{LyricLine, OrderedLines, SongId};
use crate::player::PlaybackSource;
use crate::store::LyricStore;
use crate::time::{parse_seconds_or_zero, SecondsExt};
use crate::validate::{self, CellValidity, Violation, ViolationKind};
use tracing::{debug, info, warn};

/// A single grid cell edit
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Translation(String),
    StartTime(f64),
    EndTime(f64),
}

impl Cell {
    /// A time cell from typed input; anything unparseable becomes `0`
    #[must_use]
    pub fn time_from_input(field: TimeField, raw: &str) -> Self {
        let seconds = parse_seconds_or_zero(raw);
        match field {
            TimeField::Start => Self::StartTime(seconds),
            TimeField::End => Self::EndTime(seconds),
        }
    }
}

/// In-memory edit state for all lines of one song.
///
/// Edits only touch this copy. [`WorkingCopy::save`] validates the whole
/// sequence and, if it passes, replaces the song's stored lines in one go.
/// A failed save keeps every edit so it can be retried.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    lines: OrderedLines,
    selected: Option<usize>,
    dirty: bool,
    config: EditorConfig,
    playback_rate: f64,
}

impl WorkingCopy {
    /// Wrap lines loaded from the store.
    ///
    /// Unset times become `0` so every row has editable numbers.
    #[must_use]
    pub fn from_lines(mut lines: OrderedLines, config: EditorConfig) -> Self {
        for line in &mut lines.lines {
            line.start_time = Some(line.start_or_zero());
            line.end_time = Some(line.end_or_zero());
        }
        lines.renumber();
        Self {
            lines,
            selected: None,
            dirty: false,
            config,
            playback_rate: 1.0,
        }
    }

    /// Load a song's lines from a store
    ///
    /// # Errors
    ///
    /// Returns the store's failure.
    pub async fn load(
        store: &dyn LyricStore,
        song_id: SongId,
        config: EditorConfig,
    ) -> Result<Self> {
        let lines = store.load_lines(song_id).await?;
        debug!("Loaded working copy for song {song_id} ({} rows)", lines.len());
        Ok(Self::from_lines(lines, config))
    }

    #[must_use]
    pub const fn song_id(&self) -> SongId {
        self.lines.song_id
    }

    #[must_use]
    pub const fn lines(&self) -> &OrderedLines {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether there are edits not yet saved
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub const fn selected(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected_line(&self) -> Option<&LyricLine> {
        self.selected.and_then(|i| self.lines.get(i))
    }

    fn out_of_range(&self, index: usize) -> CoreError {
        CoreError::RowOutOfRange {
            index,
            len: self.lines.lines.len(),
        }
    }

    fn row_mut(&mut self, index: usize) -> Result<&mut LyricLine> {
        let err = self.out_of_range(index);
        self.lines.lines.get_mut(index).ok_or(err)
    }

    fn selected_index(&self) -> Result<usize> {
        self.selected.ok_or(CoreError::NoRowSelected)
    }

    /// Select the row that capture and preview act on
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` for a bad index.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.lines.len() {
            return Err(self.out_of_range(index));
        }
        self.selected = Some(index);
        Ok(())
    }

    /// Append an empty row that starts where the last row ends.
    ///
    /// Returns the new row's index.
    pub fn add_row(&mut self) -> usize {
        let start = self.lines.lines.last().map_or(0.0, LyricLine::end_or_zero);
        let end = start + self.config.new_row_padding_secs;
        let row = LyricLine::new(self.song_id(), 0, "").with_interval(start, end);
        self.lines.append([row]);
        self.dirty = true;
        let index = self.lines.len() - 1;
        debug!("Added row {} ({start} - {end})", index + 1);
        index
    }

    /// Remove a row and renumber the rest
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` for a bad index.
    pub fn delete_row(&mut self, index: usize) -> Result<LyricLine> {
        if index >= self.lines.len() {
            return Err(self.out_of_range(index));
        }
        let removed = self.lines.lines.remove(index);
        self.lines.renumber();
        self.selected = match self.selected {
            Some(selected) if selected == index => None,
            Some(selected) if selected > index => Some(selected - 1),
            other => other,
        };
        self.dirty = true;
        debug!("Deleted row {}", removed.line_number);
        Ok(removed)
    }

    /// Apply one cell edit without any validation
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` for a bad index.
    pub fn set_cell(&mut self, index: usize, cell: Cell) -> Result<()> {
        let row = self.row_mut(index)?;
        match cell {
            Cell::Text(text) => row.text = text,
            Cell::Translation(translation) => {
                row.translation = (!translation.is_empty()).then_some(translation);
            }
            Cell::StartTime(seconds) => row.start_time = Some(seconds),
            Cell::EndTime(seconds) => row.end_time = Some(seconds),
        }
        self.dirty = true;
        Ok(())
    }

    /// Set the selected row's start from the clock.
    ///
    /// If the new start is at or past the row's end, the end is moved to the
    /// start plus the configured padding. Neighbours are not touched.
    ///
    /// # Errors
    ///
    /// Returns `NoRowSelected` if no row is selected.
    pub fn capture_start(&mut self, player: &dyn PlaybackSource) -> Result<f64> {
        let index = self.selected_index()?;
        let time = capture(player, self.config.capture_precision);
        let padding = self.config.start_capture_padding_secs;
        let precision = self.config.capture_precision;

        let row = self.row_mut(index)?;
        row.start_time = Some(time);
        if row.end_or_zero() <= time {
            row.end_time = Some((time + padding).round_to(precision));
        }
        info!("Row {} start set to {}", index + 1, time.format_clock());
        self.dirty = true;
        Ok(time)
    }

    /// Set the selected row's end from the clock.
    ///
    /// If the next row starts before the new end, its start is pushed forward
    /// to match.
    ///
    /// # Errors
    ///
    /// Returns `NoRowSelected` if no row is selected, or an `InvalidInterval`
    /// violation (leaving the row unchanged) if the clock is not past the
    /// row's start.
    pub fn capture_end(&mut self, player: &dyn PlaybackSource) -> Result<f64> {
        let index = self.selected_index()?;
        let time = capture(player, self.config.capture_precision);

        let row = self.row_mut(index)?;
        if time <= row.start_or_zero() {
            return Err(Violation::new(row.line_number, ViolationKind::InvalidInterval).into());
        }
        row.end_time = Some(time);

        if let Some(next) = self.lines.lines.get_mut(index + 1) {
            if next.start_or_zero() < time {
                debug!("Pushing row {} start forward to {time}", next.line_number);
                next.start_time = Some(time);
            }
        }
        info!("Row {} end set to {}", index + 1, time.format_clock());
        self.dirty = true;
        Ok(time)
    }

    /// Chain a row onto the previous one, keeping the previous row's length.
    ///
    /// Does nothing for the first row.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` for a bad index.
    pub fn auto_fill_from_previous(&mut self, index: usize) -> Result<()> {
        if index >= self.lines.len() {
            return Err(self.out_of_range(index));
        }
        let Some(previous) = index.checked_sub(1).and_then(|i| self.lines.get(i)) else {
            return Ok(());
        };
        let start = previous.end_or_zero();
        let duration = previous.end_or_zero() - previous.start_or_zero();

        let row = self.row_mut(index)?;
        row.start_time = Some(start);
        row.end_time = Some(start + duration);
        self.dirty = true;
        Ok(())
    }

    /// Advisory check of one row's time cells
    #[must_use]
    pub fn cell_validity(&self, index: usize) -> CellValidity {
        validate::cell_validity(&self.lines.lines, index)
    }

    /// Seek playback to a field of the selected row
    ///
    /// # Errors
    ///
    /// Returns `NoRowSelected` if no row is selected.
    pub fn preview_seek(&self, field: TimeField, player: &dyn PlaybackSource) -> Result<f64> {
        let line = self.selected_line().ok_or(CoreError::NoRowSelected)?;
        Ok(preview(player, line, field))
    }

    #[must_use]
    pub const fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Change the player's speed to one of the configured rates
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedPlaybackRate` for a rate not in the config.
    pub fn set_playback_rate(
        &mut self,
        rate: f64,
        config: &PlaybackConfig,
        player: &dyn PlaybackSource,
    ) -> Result<()> {
        if !config.allows_rate(rate) {
            return Err(CoreError::UnsupportedPlaybackRate { rate });
        }
        player.set_playback_rate(rate);
        self.playback_rate = rate;
        Ok(())
    }

    /// Swap in a whole new line set, as after a file import
    pub fn replace_all(&mut self, lines: OrderedLines) {
        let song_id = self.song_id();
        let mut replaced = Self::from_lines(lines, self.config);
        replaced.lines.song_id = song_id;
        replaced.lines.renumber();

        self.lines = replaced.lines;
        self.selected = None;
        self.dirty = true;
        info!("Working copy replaced with {} rows", self.lines.len());
    }

    /// Run the full-sequence gate without saving
    ///
    /// # Errors
    ///
    /// Returns the first violation.
    pub fn validate(&self) -> std::result::Result<(), Violation> {
        validate::validate_sequence(&self.lines.lines)
    }

    /// Validate and replace the song's stored lines with this copy.
    ///
    /// On a violation the offending row is selected and nothing is written.
    /// On a store failure the copy stays dirty for a retry.
    ///
    /// # Errors
    ///
    /// Returns the first violation or the store's failure.
    pub async fn save(&mut self, store: &dyn LyricStore) -> Result<()> {
        if let Err(violation) = self.validate() {
            warn!("Save blocked: {violation}");
            self.selected = self.lines.index_of_line_number(violation.line_number);
            return Err(violation.into());
        }

        match store.save_lines(self.song_id(), &self.lines).await {
            Ok(saved) => {
                self.lines = saved;
                self.dirty = false;
                info!("Saved {} rows for song {}", self.lines.len(), self.song_id());
                Ok(())
            }
            Err(e) => {
                warn!("Save failed, keeping working copy: {e}");
                Err(e)
            }
        }
    }
}

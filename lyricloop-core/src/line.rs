//! Lyric lines and the ordered per-song sequence.

use serde::{Deserialize, Serialize};

/// Identifier of a song in the store.
pub type SongId = i64;

/// Identifier of a persisted lyric line.
pub type LineId = i64;

/// Identifier of a learner. There is no authentication, the learner is picked by id.
pub type UserId = i64;

/// One timed lyric segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Store identity, `None` until the line has been persisted
    pub id: Option<LineId>,
    pub song_id: SongId,
    /// 1-based position within the song
    pub line_number: u32,
    pub text: String,
    pub translation: Option<String>,
    /// Interval start in seconds, `None` while not yet timed
    pub start_time: Option<f64>,
    /// Interval end in seconds, `None` while not yet timed
    pub end_time: Option<f64>,
}

impl LyricLine {
    /// Create an untimed, unsaved line
    pub fn new(song_id: SongId, line_number: u32, text: impl Into<String>) -> Self {
        Self {
            id: None,
            song_id,
            line_number,
            text: text.into(),
            translation: None,
            start_time: None,
            end_time: None,
        }
    }

    /// Set the interval
    #[must_use]
    pub fn with_interval(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    /// Set the translation
    #[must_use]
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Set the store identity
    #[must_use]
    pub fn with_id(mut self, id: LineId) -> Self {
        self.id = Some(id);
        self
    }

    /// Both interval ends, if the line is timed
    #[must_use]
    pub fn interval(&self) -> Option<(f64, f64)> {
        self.start_time.zip(self.end_time)
    }

    /// Whether `time` falls inside the interval, both ends inclusive
    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.interval()
            .is_some_and(|(start, end)| time >= start && time <= end)
    }

    /// Interval length in seconds (negative when the interval is inverted)
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.interval().map(|(start, end)| end - start)
    }

    /// Start time, treating an untimed start as zero
    #[must_use]
    pub fn start_or_zero(&self) -> f64 {
        self.start_time.unwrap_or(0.0)
    }

    /// End time, treating an untimed end as zero
    #[must_use]
    pub fn end_or_zero(&self) -> f64 {
        self.end_time.unwrap_or(0.0)
    }
}

/// All lines of one song, ordered by `line_number`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderedLines {
    pub song_id: SongId,
    pub lines: Vec<LyricLine>,
}

impl OrderedLines {
    /// Create an empty sequence for a song
    #[must_use]
    pub const fn new(song_id: SongId) -> Self {
        Self {
            song_id,
            lines: Vec::new(),
        }
    }

    /// Build a sequence from lines in any order.
    ///
    /// Lines are sorted by their current `line_number` (stable, so ties keep
    /// their input order) and then renumbered contiguously from 1.
    #[must_use]
    pub fn from_unsorted(song_id: SongId, mut lines: Vec<LyricLine>) -> Self {
        lines.sort_by_key(|line| line.line_number);
        let mut ordered = Self { song_id, lines };
        ordered.renumber();
        ordered
    }

    /// Re-derive contiguous 1-based line numbers from position and pin every
    /// line to this song
    pub fn renumber(&mut self) {
        let song_id = self.song_id;
        for (line, number) in self.lines.iter_mut().zip(1_u32..) {
            line.line_number = number;
            line.song_id = song_id;
        }
    }

    /// Append lines after the current last line, renumbering the result
    pub fn append(&mut self, lines: impl IntoIterator<Item = LyricLine>) {
        self.lines.extend(lines);
        self.renumber();
    }

    /// Position of the line with the given 1-based number
    #[must_use]
    pub fn index_of_line_number(&self, line_number: u32) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.line_number == line_number)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LyricLine> {
        self.lines.iter()
    }
}

impl<'a> IntoIterator for &'a OrderedLines {
    type Item = &'a LyricLine;
    type IntoIter = std::slice::Iter<'a, LyricLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let line = LyricLine::new(1, 1, "a").with_interval(2.0, 5.0);
        assert!(line.contains(2.0));
        assert!(line.contains(5.0));
        assert!(line.contains(3.3));
        assert!(!line.contains(1.99));
        assert!(!line.contains(5.01));
    }

    #[test]
    fn test_untimed_line_contains_nothing() {
        let line = LyricLine::new(1, 1, "a");
        assert!(!line.contains(0.0));
        assert!(line.interval().is_none());
        assert!(line.duration().is_none());
    }

    #[test]
    fn test_from_unsorted_renumbers() {
        let lines = vec![
            LyricLine::new(9, 7, "third"),
            LyricLine::new(9, 2, "first"),
            LyricLine::new(9, 4, "second"),
        ];
        let ordered = OrderedLines::from_unsorted(3, lines);

        let numbers: Vec<_> = ordered.iter().map(|l| l.line_number).collect();
        let texts: Vec<_> = ordered.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(ordered.iter().all(|l| l.song_id == 3));
    }

    #[test]
    fn test_append_continues_numbering() {
        let mut ordered =
            OrderedLines::from_unsorted(1, vec![LyricLine::new(1, 1, "a"), LyricLine::new(1, 2, "b")]);
        ordered.append(vec![LyricLine::new(1, 1, "c")]);

        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered.lines[2].text, "c");
        assert_eq!(ordered.lines[2].line_number, 3);
        assert_eq!(ordered.index_of_line_number(3), Some(2));
    }
}

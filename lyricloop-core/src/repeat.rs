//! Repeat-loop controller for practising one line.

use crate::line::LyricLine;
use crate::player::Seek;
use crate::validate::{check_interval, Violation};
use tracing::{debug, info};

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Off,
    /// Repeating the line at `index`
    Looping { index: usize },
}

/// State machine that keeps playback inside one line's interval.
///
/// While looping, reaching the line's end seeks back to its start and the
/// active line is pinned to the looped one. The loop only ends when the
/// operator toggles it again; it never expires on its own.
#[derive(Debug, Clone, Default)]
pub struct RepeatLoop {
    state: LoopState,
}

impl RepeatLoop {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: LoopState::Off,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    #[must_use]
    pub const fn is_looping(&self) -> bool {
        matches!(self.state, LoopState::Looping { .. })
    }

    /// Index of the looped line, which overrides the interval index
    #[must_use]
    pub const fn pinned(&self) -> Option<usize> {
        match self.state {
            LoopState::Looping { index } => Some(index),
            LoopState::Off => None,
        }
    }

    /// Operator selected "repeat this line" on `line` at `index`.
    ///
    /// - Off: start looping and seek to the line's start with playback.
    /// - Looping on the same line: stop looping, playback is left alone.
    /// - Looping on another line: move the loop to the selected line.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidInterval` violation when the selected line has no
    /// usable interval to loop over. The state is unchanged.
    pub fn toggle(&mut self, index: usize, line: &LyricLine) -> Result<Option<Seek>, Violation> {
        if self.pinned() == Some(index) {
            info!("Repeat off (line {})", line.line_number);
            self.state = LoopState::Off;
            return Ok(None);
        }

        check_interval(line)?;
        let start = line.start_or_zero();
        info!("Repeat on (line {}, from {start}s)", line.line_number);
        self.state = LoopState::Looping { index };
        Ok(Some(Seek::and_play(start)))
    }

    /// Stop looping without any playback side effect
    pub fn disarm(&mut self) {
        self.state = LoopState::Off;
    }

    /// Evaluate the loop condition for one clock tick.
    ///
    /// Returns a seek back to the looped line's start once `time` reaches its
    /// end. Does nothing while off or if the pinned line is gone or untimed.
    pub fn on_tick(&self, time: f64, lines: &[LyricLine]) -> Option<Seek> {
        let index = self.pinned()?;
        let (start, end) = lines.get(index)?.interval()?;
        if time >= end {
            debug!("Loop wrap at {time}s, back to {start}s");
            Some(Seek::new(start))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ViolationKind;

    fn lines() -> Vec<LyricLine> {
        vec![
            LyricLine::new(1, 1, "a").with_interval(0.0, 5.0),
            LyricLine::new(1, 2, "b").with_interval(5.0, 8.0),
            LyricLine::new(1, 3, "c"),
        ]
    }

    #[test]
    fn test_toggle_on_seeks_and_plays() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        let seek = repeat.toggle(1, &lines[1]).unwrap();

        assert_eq!(seek, Some(Seek::and_play(5.0)));
        assert_eq!(repeat.state(), LoopState::Looping { index: 1 });
        assert_eq!(repeat.pinned(), Some(1));
    }

    #[test]
    fn test_wraps_at_line_end() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        repeat.toggle(1, &lines[1]).unwrap();

        assert_eq!(repeat.on_tick(7.9, &lines), None);
        assert_eq!(repeat.on_tick(8.1, &lines), Some(Seek::new(5.0)));
        assert!(repeat.is_looping());
    }

    #[test]
    fn test_toggle_same_line_turns_off() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        repeat.toggle(0, &lines[0]).unwrap();

        assert_eq!(repeat.toggle(0, &lines[0]).unwrap(), None);
        assert_eq!(repeat.state(), LoopState::Off);
        assert_eq!(repeat.on_tick(100.0, &lines), None);
    }

    #[test]
    fn test_toggle_other_line_moves_loop() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        repeat.toggle(0, &lines[0]).unwrap();

        let seek = repeat.toggle(1, &lines[1]).unwrap();
        assert_eq!(seek, Some(Seek::and_play(5.0)));
        assert_eq!(repeat.pinned(), Some(1));
    }

    #[test]
    fn test_untimed_line_cannot_loop() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        let err = repeat.toggle(2, &lines[2]).unwrap_err();

        assert_eq!(err.kind, ViolationKind::InvalidInterval);
        assert_eq!(err.line_number, 3);
        assert_eq!(repeat.state(), LoopState::Off);
    }

    #[test]
    fn test_does_not_advance_to_next_line() {
        let lines = lines();
        let mut repeat = RepeatLoop::new();
        repeat.toggle(0, &lines[0]).unwrap();

        // Many ticks past the end keep seeking back, never onto line 2
        for _ in 0..5 {
            assert_eq!(repeat.on_tick(5.05, &lines), Some(Seek::new(0.0)));
        }
        assert_eq!(repeat.pinned(), Some(0));
    }
}

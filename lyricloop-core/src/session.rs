//! Playback-side state for studying a song: active line, repeat loop,
//! hide mode and learner progress, driven one clock tick at a time.

use crate::error::{CoreError, Result};
use crate::interval::IntervalIndex;
use crate::line::{LineId, LyricLine, OrderedLines};
use crate::player::{PlaybackSource, PlayerState, Seek};
use crate::progress::LineProgress;
use crate::repeat::{LoopState, RepeatLoop};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Placeholder shown instead of a hidden line's text
pub const HIDDEN_TEXT: &str = "___________";

/// Events emitted by a learning session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A different line became active
    ActiveLineChanged {
        index: usize,
        line_number: u32,
        time: f64,
    },
    /// The repeat loop sent playback back to the looped line's start
    LoopWrapped {
        line_number: u32,
        to: f64,
    },
    /// The repeat loop was armed, moved or disarmed
    LoopToggled {
        state: LoopState,
    },
    /// The player reported a new play state
    PlayerStateChanged {
        state: PlayerState,
    },
}

/// Result of one clock tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Clock reading used for this tick
    pub time: f64,
    pub active: Option<usize>,
    /// Seek the player must perform, if any
    pub seek: Option<Seek>,
}

/// What the caller must do after the operator picks a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSelection {
    pub seek: Seek,
    /// Line whose practice count should be incremented
    pub practice: Option<LineId>,
}

/// A line as shown to the learner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine<'a> {
    pub line_number: u32,
    pub text: &'a str,
    pub translation: Option<&'a str>,
    pub is_active: bool,
    pub is_mastered: bool,
    pub practice_count: u32,
}

/// Playback-side state for studying one song.
///
/// Owns the line set, the interval index and the repeat loop. Every clock
/// tick runs in a fixed order: read the clock, recompute the active line
/// (unless a loop pins it), evaluate the loop, then issue a seek.
pub struct LearningSession {
    lines: OrderedLines,
    index: IntervalIndex,
    repeat: RepeatLoop,
    hide_mode: bool,
    player_state: PlayerState,
    progress: HashMap<LineId, LineProgress>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl LearningSession {
    #[must_use]
    pub fn new(lines: OrderedLines) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let index = IntervalIndex::new(&lines.lines);
        Self {
            lines,
            index,
            repeat: RepeatLoop::new(),
            hide_mode: false,
            player_state: PlayerState::default(),
            progress: HashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    #[must_use]
    pub const fn lines(&self) -> &OrderedLines {
        &self.lines
    }

    /// Replace the line set after an edit elsewhere.
    ///
    /// A loop whose line no longer exists is dropped.
    pub fn set_lines(&mut self, lines: OrderedLines) {
        self.lines = lines;
        self.index.rebuild(&self.lines.lines);
        if self
            .repeat
            .pinned()
            .is_some_and(|pinned| pinned >= self.lines.len())
        {
            self.repeat.disarm();
            self.emit(SessionEvent::LoopToggled {
                state: LoopState::Off,
            });
        }
    }

    #[must_use]
    pub const fn active(&self) -> Option<usize> {
        self.index.active()
    }

    #[must_use]
    pub fn active_line(&self) -> Option<&LyricLine> {
        self.active().and_then(|i| self.lines.get(i))
    }

    #[must_use]
    pub const fn repeat_state(&self) -> LoopState {
        self.repeat.state()
    }

    #[must_use]
    pub const fn player_state(&self) -> PlayerState {
        self.player_state
    }

    /// Whether the clock should be polled
    #[must_use]
    pub const fn wants_ticks(&self) -> bool {
        self.player_state.is_playing()
    }

    /// Record a play-state notification from the player
    pub fn set_player_state(&mut self, state: PlayerState) {
        if self.player_state != state {
            debug!("Player state: {} -> {state}", self.player_state);
            self.player_state = state;
            self.emit(SessionEvent::PlayerStateChanged { state });
        }
    }

    /// Process one clock reading
    pub fn tick(&mut self, time: f64) -> TickOutcome {
        let previous = self.index.active();

        let active = if let Some(pinned) = self.repeat.pinned() {
            self.index.set_active(Some(pinned));
            self.index.active()
        } else {
            self.index.update(time)
        };

        if active != previous {
            if let Some((index, line)) = active.and_then(|i| self.lines.get(i).map(|l| (i, l))) {
                self.emit(SessionEvent::ActiveLineChanged {
                    index,
                    line_number: line.line_number,
                    time,
                });
            }
        }

        let seek = self.repeat.on_tick(time, &self.lines.lines);
        if let (Some(seek), Some(line)) = (seek, active.and_then(|i| self.lines.get(i))) {
            self.emit(SessionEvent::LoopWrapped {
                line_number: line.line_number,
                to: seek.to,
            });
        }

        TickOutcome { time, active, seek }
    }

    /// Read the player's clock, tick, and carry out any resulting seek
    pub fn tick_with(&mut self, player: &dyn PlaybackSource) -> TickOutcome {
        let outcome = self.tick(player.current_time());
        if let Some(seek) = outcome.seek {
            seek.apply(player);
        }
        outcome
    }

    /// The learner clicked a line: jump to it and start playing.
    ///
    /// A loop running on another line follows the selection.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if `index` is not a line. While looping, an
    /// `InvalidInterval` violation is returned for a line that cannot be
    /// looped, and the loop stays where it was.
    pub fn select_line(&mut self, index: usize) -> Result<LineSelection> {
        let line = self.lines.get(index).ok_or(CoreError::RowOutOfRange {
            index,
            len: self.lines.len(),
        })?;
        let seek = Seek::and_play(line.start_or_zero());
        let practice = line.id;
        let line_number = line.line_number;

        if self.repeat.pinned().is_some_and(|pinned| pinned != index) {
            // Only an explicit toggle may end a loop
            self.repeat.toggle(index, line)?;
            self.emit(SessionEvent::LoopToggled {
                state: self.repeat.state(),
            });
        }

        info!("Selected line {line_number}");
        self.index.set_active(Some(index));
        self.emit(SessionEvent::ActiveLineChanged {
            index,
            line_number,
            time: seek.to,
        });

        Ok(LineSelection { seek, practice })
    }

    /// Toggle the repeat loop on the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` for a bad index, or an `InvalidInterval`
    /// violation when the line cannot be looped.
    pub fn toggle_repeat(&mut self, index: usize) -> Result<Option<Seek>> {
        let line = self.lines.get(index).ok_or(CoreError::RowOutOfRange {
            index,
            len: self.lines.len(),
        })?;
        let seek = self.repeat.toggle(index, line)?;
        if self.repeat.is_looping() {
            self.index.set_active(Some(index));
        }
        self.emit(SessionEvent::LoopToggled {
            state: self.repeat.state(),
        });
        Ok(seek)
    }

    #[must_use]
    pub const fn hide_mode(&self) -> bool {
        self.hide_mode
    }

    /// Flip hide mode and return the new value
    pub fn toggle_hide_mode(&mut self) -> bool {
        self.hide_mode = !self.hide_mode;
        self.hide_mode
    }

    /// Replace the learner's progress for this song
    pub fn set_progress(&mut self, progress: HashMap<LineId, LineProgress>) {
        self.progress = progress;
    }

    /// Merge one updated progress record
    pub fn update_progress(&mut self, progress: LineProgress) {
        self.progress.insert(progress.line_id, progress);
    }

    #[must_use]
    pub fn progress_of(&self, line: &LyricLine) -> Option<&LineProgress> {
        line.id.and_then(|id| self.progress.get(&id))
    }

    /// Lines as the learner should see them.
    ///
    /// In hide mode the text of every line not yet mastered is masked.
    #[must_use]
    pub fn rendered_lines(&self) -> Vec<RenderedLine<'_>> {
        let active = self.active();
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let progress = self.progress_of(line);
                let is_mastered = progress.is_some_and(|p| p.is_mastered);
                let text = if self.hide_mode && !is_mastered {
                    HIDDEN_TEXT
                } else {
                    line.text.as_str()
                };
                RenderedLine {
                    line_number: line.line_number,
                    text,
                    translation: line.translation.as_deref(),
                    is_active: active == Some(i),
                    is_mastered,
                    practice_count: progress.map_or(0, |p| p.practice_count),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::SimulatedPlayer;
    use std::time::Duration;

    fn session() -> LearningSession {
        let lines = vec![
            LyricLine::new(1, 1, "one").with_interval(0.0, 5.0).with_id(10),
            LyricLine::new(1, 2, "two").with_interval(5.0, 8.0).with_id(11),
            LyricLine::new(1, 3, "three").with_interval(9.0, 12.0).with_id(12),
        ];
        LearningSession::new(OrderedLines::from_unsorted(1, lines))
    }

    #[test]
    fn test_tick_follows_clock() {
        let mut session = session();
        assert_eq!(session.tick(1.0).active, Some(0));
        assert_eq!(session.tick(6.0).active, Some(1));
        // Gap between lines 2 and 3 keeps line 2
        assert_eq!(session.tick(8.5).active, Some(1));
        assert_eq!(session.tick(9.5).active, Some(2));
    }

    #[test]
    fn test_loop_pins_active_line() {
        let mut session = session();
        let seek = session.toggle_repeat(1).unwrap();
        assert_eq!(seek, Some(Seek::and_play(5.0)));

        let outcome = session.tick(8.1);
        assert_eq!(outcome.active, Some(1));
        assert_eq!(outcome.seek, Some(Seek::new(5.0)));
        assert_eq!(session.repeat_state(), LoopState::Looping { index: 1 });

        // Even a clock reading inside line 3 does not move the active line
        assert_eq!(session.tick(10.0).active, Some(1));
    }

    #[test]
    fn test_loop_off_resumes_index() {
        let mut session = session();
        session.toggle_repeat(0).unwrap();
        assert_eq!(session.toggle_repeat(0).unwrap(), None);
        assert_eq!(session.tick(10.0).active, Some(2));
        assert_eq!(session.tick(10.0).seek, None);
    }

    #[test]
    fn test_select_line_requests_practice() {
        let mut session = session();
        let selection = session.select_line(2).unwrap();
        assert_eq!(selection.seek, Seek::and_play(9.0));
        assert_eq!(selection.practice, Some(12));
        assert_eq!(session.active(), Some(2));
    }

    #[test]
    fn test_select_line_moves_running_loop() {
        let mut session = session();
        session.toggle_repeat(0).unwrap();
        session.select_line(2).unwrap();
        assert_eq!(session.repeat_state(), LoopState::Looping { index: 2 });
    }

    #[test]
    fn test_select_untimed_line_keeps_running_loop() {
        let mut lines = session().lines().clone();
        lines.lines[1].start_time = None;
        lines.lines[1].end_time = None;
        let mut session = LearningSession::new(lines);
        session.toggle_repeat(0).unwrap();

        let err = session.select_line(1).unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&crate::validate::Violation::new(
                2,
                crate::validate::ViolationKind::InvalidInterval
            ))
        );
        assert_eq!(session.repeat_state(), LoopState::Looping { index: 0 });
        assert_eq!(session.active(), Some(0));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut session = session();
        assert!(matches!(
            session.select_line(7),
            Err(CoreError::RowOutOfRange { index: 7, len: 3 })
        ));
    }

    #[test]
    fn test_hide_mode_masks_unmastered_lines() {
        let mut session = session();
        session.update_progress(LineProgress {
            line_id: 11,
            is_mastered: true,
            practice_count: 3,
            last_practiced_at: None,
        });
        assert!(session.toggle_hide_mode());

        let rendered = session.rendered_lines();
        assert_eq!(rendered[0].text, HIDDEN_TEXT);
        assert_eq!(rendered[1].text, "two");
        assert_eq!(rendered[1].practice_count, 3);
        assert_eq!(rendered[2].text, HIDDEN_TEXT);

        assert!(!session.toggle_hide_mode());
        assert_eq!(session.rendered_lines()[0].text, "one");
    }

    #[test]
    fn test_set_lines_drops_stale_loop() {
        let mut session = session();
        session.toggle_repeat(2).unwrap();
        let shorter = OrderedLines::from_unsorted(
            1,
            vec![LyricLine::new(1, 1, "one").with_interval(0.0, 5.0)],
        );
        session.set_lines(shorter);
        assert_eq!(session.repeat_state(), LoopState::Off);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let mut session = session();
        let mut rx = session.subscribe();

        session.set_player_state(PlayerState::Playing);
        session.tick(6.0);

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::PlayerStateChanged {
                state: PlayerState::Playing
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::ActiveLineChanged {
                index: 1,
                line_number: 2,
                time: 6.0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_with_player_wraps_loop() {
        let mut session = session();
        let player = SimulatedPlayer::new(None);
        if let Some(seek) = session.toggle_repeat(1).unwrap() {
            seek.apply(&player);
        }

        tokio::time::advance(Duration::from_millis(3100)).await;
        let outcome = session.tick_with(&player);
        assert_eq!(outcome.seek, Some(Seek::new(5.0)));
        assert!((player.current_time() - 5.0).abs() < 1e-6);
        assert_eq!(player.state(), PlayerState::Playing);
    }
}

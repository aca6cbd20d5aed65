//! Playback source capability and a clock-driven stand-in player.

use crate::time::SecondsExt;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::debug;

/// Play state reported by the embedded player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    /// Loaded but never started
    #[default]
    Unstarted,
    Playing,
    Paused,
    Buffering,
    /// Reached the end of the media
    Ended,
}

impl PlayerState {
    /// Whether the playback clock is advancing
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Buffering => "buffering",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seek the core asks the player to perform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seek {
    /// Target position in seconds
    pub to: f64,
    /// Also request playback after seeking
    pub play: bool,
}

impl Seek {
    #[must_use]
    pub const fn new(position: f64) -> Self {
        Self {
            to: position,
            play: false,
        }
    }

    #[must_use]
    pub const fn and_play(position: f64) -> Self {
        Self {
            to: position,
            play: true,
        }
    }

    /// Carry out this seek on a player
    pub fn apply(self, player: &dyn PlaybackSource) {
        player.seek_to(self.to);
        if self.play {
            player.play();
        }
    }
}

/// The external media player, as seen by the core.
///
/// Implementations wrap an embedded video player. Only the clock, seeking,
/// play/pause and the play-state notification are needed; buffering, network
/// and rendering stay inside the implementation.
pub trait PlaybackSource: Send + Sync {
    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Jump to a position in seconds
    fn seek_to(&self, seconds: f64);

    /// Start or resume playback
    fn play(&self);

    /// Pause playback
    fn pause(&self);

    /// Latest play-state notification
    fn state(&self) -> PlayerState;

    /// Change playback speed (1.0 is normal speed)
    fn set_playback_rate(&self, rate: f64);
}

#[derive(Debug)]
struct ClockState {
    state: PlayerState,
    /// Position at `updated_at`
    position: f64,
    rate: f64,
    updated_at: Instant,
}

/// A player whose position is interpolated from a monotonic clock.
///
/// Stands in for an embedded video player in the command line and in tests.
/// Uses the tokio clock so paused test time drives playback deterministically.
#[derive(Debug)]
pub struct SimulatedPlayer {
    clock: Mutex<ClockState>,
    /// Media length; playback stops here
    duration: Option<f64>,
}

impl SimulatedPlayer {
    /// Create a paused player at position zero
    #[must_use]
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            clock: Mutex::new(ClockState {
                state: PlayerState::Unstarted,
                position: 0.0,
                rate: 1.0,
                updated_at: Instant::now(),
            }),
            duration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interpolated position, clamped to the media length
    fn position_of(&self, clock: &ClockState) -> f64 {
        let position = if clock.state.is_playing() {
            clock.position + clock.updated_at.elapsed().as_secs_f64() * clock.rate
        } else {
            clock.position
        };
        self.duration.map_or(position, |duration| position.min(duration))
    }

    /// Fold elapsed time into the stored position so the clock can change
    fn rebase(&self, clock: &mut ClockState) {
        clock.position = self.position_of(clock);
        clock.updated_at = Instant::now();
        if clock.state.is_playing() && self.reached_end(clock.position) {
            clock.state = PlayerState::Ended;
        }
    }

    fn reached_end(&self, position: f64) -> bool {
        self.duration.is_some_and(|duration| position >= duration)
    }
}

impl PlaybackSource for SimulatedPlayer {
    fn current_time(&self) -> f64 {
        let clock = self.lock();
        self.position_of(&clock)
    }

    fn seek_to(&self, seconds: f64) {
        let mut clock = self.lock();
        let target = self
            .duration
            .map_or(seconds, |duration| seconds.min(duration))
            .max(0.0);
        debug!("Seek to {}", target.format_clock());
        clock.position = target;
        clock.updated_at = Instant::now();
        if clock.state == PlayerState::Ended && !self.reached_end(target) {
            clock.state = PlayerState::Paused;
        }
    }

    fn play(&self) {
        let mut clock = self.lock();
        self.rebase(&mut clock);
        if !self.reached_end(clock.position) {
            clock.state = PlayerState::Playing;
        }
    }

    fn pause(&self) {
        let mut clock = self.lock();
        self.rebase(&mut clock);
        if clock.state.is_playing() {
            clock.state = PlayerState::Paused;
        }
    }

    fn state(&self) -> PlayerState {
        let mut clock = self.lock();
        self.rebase(&mut clock);
        clock.state
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut clock = self.lock();
        self.rebase(&mut clock);
        clock.rate = rate;
    }
}

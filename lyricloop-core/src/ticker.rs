//! Periodic clock polling that drives a learning session.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::player::PlaybackSource;
use crate::session::{LearningSession, TickOutcome};

/// Polls the player's clock on a fixed interval and feeds the session
pub struct Ticker {
    session: Arc<Mutex<LearningSession>>,
    player: Arc<dyn PlaybackSource>,
    interval: Duration,
    cancel_token: CancellationToken,
}

impl Ticker {
    /// Create a new ticker
    ///
    /// # Arguments
    /// * `session` - Session to feed clock readings into
    /// * `player` - Playback source to read the clock from and seek
    /// * `interval` - Time between clock reads
    /// * `cancel_token` - Optional external cancellation token for teardown
    pub fn new(
        session: Arc<Mutex<LearningSession>>,
        player: Arc<dyn PlaybackSource>,
        interval: Duration,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            session,
            player,
            interval,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start ticking in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!("Starting playback clock ticker ({:?})", self.interval);

        let mut ticks = tokio::time::interval(self.interval);
        // A late tick is delayed, never collapsed into a burst
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Ticker shutting down");
                    break;
                }
                _ = ticks.tick() => {
                    self.tick_once().await;
                }
            }
        }
    }

    /// Run a single tick.
    ///
    /// The player's state is forwarded to the session first. The clock is
    /// only read while the player is playing, in which case the tick outcome
    /// is returned.
    pub async fn tick_once(&self) -> Option<TickOutcome> {
        let mut session = self.session.lock().await;
        session.set_player_state(self.player.state());
        if !session.wants_ticks() {
            return None;
        }

        let outcome = session.tick_with(self.player.as_ref());
        if let Some(seek) = outcome.seek {
            debug!("Tick at {:.2}s issued seek to {:.2}s", outcome.time, seek.to);
        }
        Some(outcome)
    }
}

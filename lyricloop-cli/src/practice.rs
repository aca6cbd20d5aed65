//! Practice mode: play a song on a simulated clock and follow along.

use crate::commands::line_by_number;
use crate::error::{AppError, AppResult};
use lyricloop_core::{
    Config, CoreError, LearningSession, LyricLine, LyricStore, PlaybackSource, PlayerState,
    ProgressStore, SecondsExt, Seek, SessionEvent, SimulatedPlayer, SongId, SqliteStore, Ticker,
    UserId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Playback continues this long past the last lyric
const OUTRO_SECS: f64 = 2.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct PracticeOptions {
    pub line: Option<u32>,
    pub repeat: bool,
    pub hide: bool,
    pub seconds: u64,
    pub rate: Option<f64>,
}

/// What happened during a practice run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PracticeReport {
    /// Line numbers in the order they became active
    pub shown: Vec<u32>,
    /// Times the repeat loop jumped back
    pub loops: u32,
}

/// Text printed for a line, fixed when the run starts
struct TranscriptLine {
    text: String,
    translation: Option<String>,
}

type Transcript = HashMap<u32, TranscriptLine>;

fn transcript_of(session: &LearningSession) -> Transcript {
    session
        .rendered_lines()
        .into_iter()
        .map(|line| {
            (
                line.line_number,
                TranscriptLine {
                    text: line.text.to_owned(),
                    translation: line.translation.map(str::to_owned),
                },
            )
        })
        .collect()
}

fn media_length(lines: &[LyricLine]) -> Option<f64> {
    lines
        .iter()
        .filter_map(LyricLine::interval)
        .map(|(_, end)| end)
        .reduce(f64::max)
        .map(|end| end + OUTRO_SECS)
}

/// Run a practice session until the time limit, the end of the song, or
/// cancellation, whichever comes first.
///
/// # Errors
///
/// Returns an error if the song has no lines, the rate is not configured,
/// the starting line does not exist or cannot be looped, or the store fails.
pub async fn practice(
    store: &SqliteStore,
    config: &Config,
    user_id: UserId,
    song_id: SongId,
    options: PracticeOptions,
    cancel_token: CancellationToken,
) -> AppResult<PracticeReport> {
    let song = store.require_song(song_id).await?;
    let lines = store.load_lines(song_id).await?;
    if lines.is_empty() {
        return Err(AppError::NoLyrics { song_id });
    }

    let rate = options.rate.unwrap_or(config.playback.default_rate);
    if !config.playback.allows_rate(rate) {
        return Err(CoreError::UnsupportedPlaybackRate { rate }.into());
    }

    let player = Arc::new(SimulatedPlayer::new(media_length(&lines.lines)));
    player.set_playback_rate(rate);

    let mut session = LearningSession::new(lines);
    session.set_progress(store.load_progress(user_id, song_id).await?);
    if options.hide {
        session.toggle_hide_mode();
    }
    let rx = session.subscribe();

    let start = match options.line {
        Some(line_number) => {
            let (index, _) = line_by_number(session.lines(), song_id, line_number)?;
            let selection = session.select_line(index)?;
            if let Some(line_id) = selection.practice {
                session.update_progress(store.record_practice(user_id, line_id).await?);
            }
            if options.repeat {
                session.toggle_repeat(index)?.unwrap_or(selection.seek)
            } else {
                selection.seek
            }
        }
        None => Seek::and_play(0.0),
    };

    println!("{} ({} lines, {rate}x)", song.title, session.lines().len());
    let transcript = transcript_of(&session);

    let session = Arc::new(Mutex::new(session));
    let ticker = Arc::new(Ticker::new(
        Arc::clone(&session),
        Arc::clone(&player) as Arc<dyn PlaybackSource>,
        config.playback.tick_interval(),
        Some(cancel_token.clone()),
    ));
    let logger = tokio::spawn(log_session_events(rx, transcript, cancel_token.clone()));

    start.apply(player.as_ref());
    let ticker_handle = ticker.start();

    tokio::select! {
        () = cancel_token.cancelled() => {}
        () = tokio::time::sleep(Duration::from_secs(options.seconds)) => {
            info!("Practice time is up");
            cancel_token.cancel();
        }
    }

    let _ = ticker_handle.await;
    player.pause();
    info!("Stopped at {}", player.current_time().format_clock());

    match logger.await {
        Ok(report) => Ok(report),
        Err(e) => {
            error!("Session event logger failed: {e}");
            Ok(PracticeReport::default())
        }
    }
}

/// Print each line as it becomes active and log the rest of the session
async fn log_session_events(
    mut rx: broadcast::Receiver<SessionEvent>,
    transcript: Transcript,
    cancel_token: CancellationToken,
) -> PracticeReport {
    let mut report = PracticeReport::default();

    loop {
        // Queued events are printed before a cancellation is noticed
        let event = tokio::select! {
            biased;
            event = rx.recv() => event,
            () = cancel_token.cancelled() => break,
        };

        match event {
            Ok(SessionEvent::ActiveLineChanged {
                line_number, time, ..
            }) => {
                report.shown.push(line_number);
                if let Some(line) = transcript.get(&line_number) {
                    println!("[{}] {:>3}  {}", time.format_clock(), line_number, line.text);
                    if let Some(translation) = &line.translation {
                        println!("{:>15}{translation}", "");
                    }
                }
            }
            Ok(SessionEvent::LoopWrapped { line_number, to }) => {
                report.loops += 1;
                info!("Looping line {line_number} from {}", to.format_clock());
            }
            Ok(SessionEvent::LoopToggled { state }) => {
                info!("Repeat loop: {state:?}");
            }
            Ok(SessionEvent::PlayerStateChanged { state }) => {
                info!("Player {state}");
                if state == PlayerState::Ended {
                    cancel_token.cancel();
                    break;
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Session event channel closed");
                break;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                info!("Missed {} session events", n);
            }
        }
    }

    report
}

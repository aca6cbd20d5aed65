use lyricloop_core::{CoreError, SongId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Song {song_id} has no line {line_number}")]
    NoSuchLine { song_id: SongId, line_number: u32 },

    #[error("Song {song_id} has no lyrics yet")]
    NoLyrics { song_id: SongId },

    #[error("Nothing to change: pass --start and/or --end")]
    NothingToChange,

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

use crate::line::{LineId, SongId};
use crate::validate::Violation;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created with default settings.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Timestamp rule violations
    #[error("{0}")]
    Validation(#[from] Violation),

    // Editing errors
    #[error("Row {index} is out of range (working copy has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("No row is selected")]
    NoRowSelected,

    #[error("Line {line_number} has not been saved yet")]
    UnsavedLine { line_number: u32 },

    #[error("Import contained no lyric rows")]
    EmptyImport,

    #[error("Playback rate {rate} is not one of the configured rates")]
    UnsupportedPlaybackRate { rate: f64 },

    // Store errors
    #[error("Lyric line {line_id} not found")]
    LineNotFound { line_id: LineId },

    #[error("Song {song_id} not found")]
    SongNotFound { song_id: SongId },

    #[error("Store operation failed: {reason}")]
    Store { reason: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoreError {
    /// The rule violation behind this error, if it is one.
    #[must_use]
    pub const fn violation(&self) -> Option<&Violation> {
        match self {
            Self::Validation(violation) => Some(violation),
            _ => None,
        }
    }

    /// Whether the failure came from the persistence layer.
    ///
    /// Store failures leave every working copy intact so the operator can retry.
    #[must_use]
    pub const fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::DatabaseError(_) | Self::SqliteError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

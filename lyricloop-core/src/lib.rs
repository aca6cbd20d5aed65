pub mod codec;
pub mod config;
pub mod editor;
pub mod error;
pub mod interval;
pub mod line;
pub mod paths;
pub mod player;
pub mod progress;
pub mod repeat;
pub mod session;
pub mod store;
pub mod ticker;
pub mod time;
pub mod validate;

pub use codec::{
    export_file_name, export_tsv, import_tsv, parse_paste, parse_paste_line, PasteGrammar,
    TSV_HEADER,
};
pub use config::{Config, EditorConfig, LoggingConfig, PlaybackConfig, StorageConfig};
pub use editor::{Cell, LineEditor, TimeField, WorkingCopy};
pub use error::{CoreError, Result};
pub use interval::IntervalIndex;
pub use line::{LineId, LyricLine, OrderedLines, SongId, UserId};
pub use paths::{
    config_dir, config_path, database_path, log_file_path, APP_DIR_NAME, CONFIG_FILE_NAME,
    DATABASE_FILE_NAME, HOME_ENV, LOG_FILE_NAME,
};
pub use player::{PlaybackSource, PlayerState, Seek, SimulatedPlayer};
pub use progress::{LineProgress, ProgressStats, ProgressStore};
pub use repeat::{LoopState, RepeatLoop};
pub use session::{
    LearningSession, LineSelection, RenderedLine, SessionEvent, TickOutcome, HIDDEN_TEXT,
};
pub use store::{LyricStore, Song, SqliteStore, UpdateFields};
pub use ticker::Ticker;
pub use time::{parse_seconds_or_zero, SecondsExt};
pub use validate::{
    cell_validity, check_interval, check_line, check_text, validate_sequence, CellValidity,
    Violation, ViolationKind,
};

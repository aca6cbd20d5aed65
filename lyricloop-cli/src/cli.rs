use clap::{Parser, Subcommand};
use lyricloop_core::{SongId, UserId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Study song lyrics against a video timeline", long_about = None)]
pub struct Cli {
    /// Learner whose progress is read and written
    #[arg(short, long, global = true, default_value_t = 1)]
    pub user: UserId,

    /// Database file, overriding the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the song catalog.
    Song {
        #[command(subcommand)]
        command: SongCommands,
    },
    /// Append lyrics from a paste file (`<start>-<end> <text> | <translation>` or `<text> | <translation>` per line).
    Paste {
        song_id: SongId,
        file: PathBuf,
    },
    /// Replace a song's lyrics with the rows of a TSV file.
    Import {
        song_id: SongId,
        file: PathBuf,
    },
    /// Write a song's lyrics to `<title>_lyrics.tsv`.
    Export {
        song_id: SongId,
        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Check a song's timestamps and report the first problem.
    Validate {
        song_id: SongId,
    },
    /// Change one line's interval.
    Time {
        song_id: SongId,
        line_number: u32,
        /// New start in seconds
        #[arg(long)]
        start: Option<f64>,
        /// New end in seconds
        #[arg(long)]
        end: Option<f64>,
    },
    /// Play a song on a simulated clock and follow the active line.
    Practice {
        song_id: SongId,
        /// Start from this line
        #[arg(short, long)]
        line: Option<u32>,
        /// Loop the starting line until stopped
        #[arg(short, long, requires = "line")]
        repeat: bool,
        /// Mask lines that are not mastered yet
        #[arg(long)]
        hide: bool,
        /// Stop after this many seconds of wall time
        #[arg(short, long, default_value_t = 30)]
        seconds: u64,
        /// Playback speed
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Toggle a line's mastered flag.
    Master {
        song_id: SongId,
        line_number: u32,
    },
    /// Show progress on a song.
    Stats {
        song_id: SongId,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget all progress on a song.
    Reset {
        song_id: SongId,
    },
}

#[derive(Subcommand, Debug)]
pub enum SongCommands {
    /// Add a song.
    Add {
        title: String,
        /// Video id on the embedded player's platform
        video_id: String,
        #[arg(short, long)]
        artist: Option<String>,
    },
    /// List all songs.
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

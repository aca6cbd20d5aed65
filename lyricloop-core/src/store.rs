use crate::error::{CoreError, Result};
use crate::line::{LineId, LyricLine, OrderedLines, SongId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    artist TEXT,
    video_id TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- One row per lyric line; times are NULL until the line is timed
CREATE TABLE IF NOT EXISTS lyrics (
    id INTEGER PRIMARY KEY,
    song_id INTEGER NOT NULL,
    line_number INTEGER NOT NULL,
    text TEXT NOT NULL,
    translation TEXT,
    start_time REAL,
    end_time REAL,
    FOREIGN KEY (song_id) REFERENCES songs(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_progress (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    lyric_id INTEGER NOT NULL,
    is_mastered INTEGER NOT NULL DEFAULT 0,
    practice_count INTEGER NOT NULL DEFAULT 0,
    last_practiced_at INTEGER,
    FOREIGN KEY (lyric_id) REFERENCES lyrics(id) ON DELETE CASCADE,
    UNIQUE(user_id, lyric_id)
);

CREATE INDEX IF NOT EXISTS idx_lyrics_song ON lyrics(song_id, line_number);
CREATE INDEX IF NOT EXISTS idx_progress_user ON user_progress(user_id, lyric_id);
";

/// Partial update of a line's interval.
///
/// A field left as `None` keeps its stored value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateFields {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl UpdateFields {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }
}

/// Persistence of a song's lyric lines
#[async_trait]
pub trait LyricStore: Send + Sync {
    /// All lines of a song ordered by line number (empty for an unknown song)
    async fn load_lines(&self, song_id: SongId) -> Result<OrderedLines>;

    /// Replace the song's persisted lines with `lines`.
    ///
    /// The given set is authoritative: persisted lines missing from it are
    /// deleted. Returns the lines as stored, with ids assigned.
    async fn save_lines(&self, song_id: SongId, lines: &OrderedLines) -> Result<OrderedLines>;

    /// Update one line's interval fields
    async fn update_line(&self, line_id: LineId, fields: UpdateFields) -> Result<()>;
}

/// A song in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: Option<String>,
    /// Id of the video on the embedded player's platform
    pub video_id: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed song, lyric and progress store
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open a store at a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: &Path) -> Result<Self> {
        info!("Opening lyric database at {:?}", path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;

        info!("Lyric database initialized");
        Ok(Self { conn })
    }

    /// Open a throwaway in-memory store
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Add a song to the catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_song(
        &self,
        title: &str,
        artist: Option<&str>,
        video_id: &str,
    ) -> Result<Song> {
        let now = Utc::now();
        let mut song = Song {
            id: 0,
            title: title.to_string(),
            artist: artist.map(str::to_string),
            video_id: video_id.to_string(),
            created_at: DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now),
        };
        let row = song.clone();

        song.id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO songs (title, artist, video_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row.title, row.artist, row.video_id, row.created_at.timestamp()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        info!("Added song {} ({})", song.id, song.title);
        Ok(song)
    }

    /// Look up one song
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn song(&self, song_id: SongId) -> Result<Option<Song>> {
        self.conn
            .call(move |conn| {
                let song = conn
                    .query_row(
                        "SELECT id, title, artist, video_id, created_at FROM songs WHERE id = ?1",
                        [song_id],
                        song_from_row,
                    )
                    .optional()?;
                Ok(song)
            })
            .await
            .map_err(Into::into)
    }

    /// Look up one song, failing if it does not exist
    ///
    /// # Errors
    ///
    /// Returns `SongNotFound` for an unknown id, or a query error.
    pub async fn require_song(&self, song_id: SongId) -> Result<Song> {
        self.song(song_id)
            .await?
            .ok_or(CoreError::SongNotFound { song_id })
    }

    /// All songs, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn songs(&self) -> Result<Vec<Song>> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT id, title, artist, video_id, created_at FROM songs ORDER BY created_at DESC, id DESC",
                )?;
                let songs = stmt
                    .query_map([], song_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(songs)
            })
            .await
            .map_err(Into::into)
    }

    /// Checkpoint WAL for clean shutdown
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL checkpoint fails.
    pub async fn checkpoint(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE)")?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

fn song_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        video_id: row.get(3)?,
        created_at: DateTime::from_timestamp(row.get::<_, i64>(4)?, 0).unwrap_or_else(Utc::now),
    })
}

fn line_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LyricLine> {
    Ok(LyricLine {
        id: Some(row.get(0)?),
        song_id: row.get(1)?,
        line_number: row.get(2)?,
        text: row.get(3)?,
        translation: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
    })
}

#[async_trait]
impl LyricStore for SqliteStore {
    async fn load_lines(&self, song_id: SongId) -> Result<OrderedLines> {
        debug!("Loading lines for song {song_id}");
        let lines = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT id, song_id, line_number, text, translation, start_time, end_time
                    FROM lyrics
                    WHERE song_id = ?1
                    ORDER BY line_number, id
                ",
                )?;
                let lines = stmt
                    .query_map([song_id], line_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(lines)
            })
            .await?;

        Ok(OrderedLines::from_unsorted(song_id, lines))
    }

    async fn save_lines(&self, song_id: SongId, lines: &OrderedLines) -> Result<OrderedLines> {
        let mut saved = OrderedLines {
            song_id,
            lines: lines.lines.clone(),
        };
        saved.renumber();
        let rows = saved.lines.clone();
        let count = rows.len();

        let ids = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let song_exists = tx
                    .query_row("SELECT 1 FROM songs WHERE id = ?1", [song_id], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !song_exists {
                    return Ok(None);
                }

                let mut existing: HashSet<LineId> = HashSet::new();
                {
                    let mut stmt = tx.prepare("SELECT id FROM lyrics WHERE song_id = ?1")?;
                    let mut found = stmt.query([song_id])?;
                    while let Some(row) = found.next()? {
                        existing.insert(row.get(0)?);
                    }
                }

                let mut ids = Vec::with_capacity(rows.len());
                {
                    let mut update = tx.prepare(
                        r"
                        UPDATE lyrics
                        SET line_number = ?1, text = ?2, translation = ?3, start_time = ?4, end_time = ?5
                        WHERE id = ?6 AND song_id = ?7
                    ",
                    )?;
                    let mut insert = tx.prepare(
                        r"
                        INSERT INTO lyrics (song_id, line_number, text, translation, start_time, end_time)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ",
                    )?;

                    for line in &rows {
                        let kept = match line.id.filter(|id| existing.contains(id)) {
                            Some(id) => {
                                update.execute(rusqlite::params![
                                    line.line_number,
                                    line.text,
                                    line.translation,
                                    line.start_time,
                                    line.end_time,
                                    id,
                                    song_id
                                ])?;
                                id
                            }
                            None => {
                                insert.execute(rusqlite::params![
                                    song_id,
                                    line.line_number,
                                    line.text,
                                    line.translation,
                                    line.start_time,
                                    line.end_time
                                ])?;
                                tx.last_insert_rowid()
                            }
                        };
                        ids.push(kept);
                    }

                    let keep: HashSet<LineId> = ids.iter().copied().collect();
                    let mut delete = tx.prepare("DELETE FROM lyrics WHERE id = ?1")?;
                    for stale in existing.difference(&keep) {
                        delete.execute([stale])?;
                    }
                }

                tx.commit()?;
                Ok(Some(ids))
            })
            .await?
            .ok_or(CoreError::SongNotFound { song_id })?;

        for (line, id) in saved.lines.iter_mut().zip(ids) {
            line.id = Some(id);
        }

        info!("Saved {count} lines for song {song_id}");
        Ok(saved)
    }

    async fn update_line(&self, line_id: LineId, fields: UpdateFields) -> Result<()> {
        debug!("Updating line {line_id}: {:?}", fields);
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r"
                    UPDATE lyrics
                    SET start_time = COALESCE(?1, start_time),
                        end_time = COALESCE(?2, end_time)
                    WHERE id = ?3
                ",
                    rusqlite::params![fields.start_time, fields.end_time, line_id],
                )?;
                Ok(changed)
            })
            .await?;

        if changed == 0 {
            return Err(CoreError::LineNotFound { line_id });
        }
        Ok(())
    }
}

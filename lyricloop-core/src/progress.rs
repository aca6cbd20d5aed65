//! Per-learner mastery and practice tracking.

use crate::error::{CoreError, Result};
use crate::line::{LineId, SongId, UserId};
use crate::store::SqliteStore;
use crate::time::SecondsExt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// One learner's progress on one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProgress {
    pub line_id: LineId,
    pub is_mastered: bool,
    pub practice_count: u32,
    pub last_practiced_at: Option<DateTime<Utc>>,
}

/// Summary of a learner's progress on a song
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_lines: u32,
    pub mastered_lines: u32,
    /// Share of mastered lines, 0-100 with two decimals
    pub progress_percentage: f64,
    pub total_practice_count: u32,
}

impl ProgressStats {
    #[must_use]
    pub fn new(total_lines: u32, mastered_lines: u32, total_practice_count: u32) -> Self {
        let progress_percentage = if total_lines == 0 {
            0.0
        } else {
            (f64::from(mastered_lines) / f64::from(total_lines) * 100.0).round_to(2)
        };
        Self {
            total_lines,
            mastered_lines,
            progress_percentage,
            total_practice_count,
        }
    }
}

/// Storage of learner progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Progress records for every line of a song the learner has touched
    async fn load_progress(
        &self,
        user_id: UserId,
        song_id: SongId,
    ) -> Result<HashMap<LineId, LineProgress>>;

    /// Flip the mastered flag.
    ///
    /// The first toggle on an untouched line creates the record as mastered
    /// with one practice.
    async fn toggle_mastered(&self, user_id: UserId, line_id: LineId) -> Result<LineProgress>;

    /// Count one more practice of a line
    async fn record_practice(&self, user_id: UserId, line_id: LineId) -> Result<LineProgress>;

    async fn song_stats(&self, user_id: UserId, song_id: SongId) -> Result<ProgressStats>;

    /// Forget all progress on a song, returning how many records were removed
    async fn reset_song(&self, user_id: UserId, song_id: SongId) -> Result<usize>;
}

fn progress_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LineProgress> {
    Ok(LineProgress {
        line_id: row.get(0)?,
        is_mastered: row.get(1)?,
        practice_count: row.get(2)?,
        last_practiced_at: row
            .get::<_, Option<i64>>(3)?
            .and_then(|ts| DateTime::from_timestamp(ts, 0)),
    })
}

impl SqliteStore {
    /// Run an upsert on `user_progress` for an existing line
    async fn upsert_progress(
        &self,
        user_id: UserId,
        line_id: LineId,
        sql: &'static str,
    ) -> Result<LineProgress> {
        let now = Utc::now().timestamp();
        self.conn
            .call(move |conn| {
                let line_exists = conn
                    .query_row("SELECT 1 FROM lyrics WHERE id = ?1", [line_id], |_| Ok(()))
                    .optional()?
                    .is_some();
                if !line_exists {
                    return Ok(None);
                }
                let progress = conn.query_row(
                    sql,
                    rusqlite::params![user_id, line_id, now],
                    progress_from_row,
                )?;
                Ok(Some(progress))
            })
            .await?
            .ok_or(CoreError::LineNotFound { line_id })
    }
}

#[async_trait]
impl ProgressStore for SqliteStore {
    async fn load_progress(
        &self,
        user_id: UserId,
        song_id: SongId,
    ) -> Result<HashMap<LineId, LineProgress>> {
        debug!("Loading progress for user {user_id}, song {song_id}");
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r"
                    SELECT up.lyric_id, up.is_mastered, up.practice_count, up.last_practiced_at
                    FROM user_progress up
                    JOIN lyrics l ON l.id = up.lyric_id
                    WHERE up.user_id = ?1 AND l.song_id = ?2
                ",
                )?;
                let progress = stmt
                    .query_map([user_id, song_id], progress_from_row)?
                    .map(|row| row.map(|p| (p.line_id, p)))
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(progress)
            })
            .await
            .map_err(Into::into)
    }

    async fn toggle_mastered(&self, user_id: UserId, line_id: LineId) -> Result<LineProgress> {
        let progress = self
            .upsert_progress(
                user_id,
                line_id,
                r"
                INSERT INTO user_progress (user_id, lyric_id, is_mastered, practice_count, last_practiced_at)
                VALUES (?1, ?2, 1, 1, ?3)
                ON CONFLICT (user_id, lyric_id) DO UPDATE SET
                    is_mastered = NOT user_progress.is_mastered
                RETURNING lyric_id, is_mastered, practice_count, last_practiced_at
            ",
            )
            .await?;
        info!(
            "Line {line_id} is now {} for user {user_id}",
            if progress.is_mastered { "mastered" } else { "not mastered" }
        );
        Ok(progress)
    }

    async fn record_practice(&self, user_id: UserId, line_id: LineId) -> Result<LineProgress> {
        let progress = self
            .upsert_progress(
                user_id,
                line_id,
                r"
                INSERT INTO user_progress (user_id, lyric_id, practice_count, last_practiced_at)
                VALUES (?1, ?2, 1, ?3)
                ON CONFLICT (user_id, lyric_id) DO UPDATE SET
                    practice_count = user_progress.practice_count + 1,
                    last_practiced_at = excluded.last_practiced_at
                RETURNING lyric_id, is_mastered, practice_count, last_practiced_at
            ",
            )
            .await?;
        debug!(
            "Line {line_id} practiced {} times by user {user_id}",
            progress.practice_count
        );
        Ok(progress)
    }

    async fn song_stats(&self, user_id: UserId, song_id: SongId) -> Result<ProgressStats> {
        let (total, mastered, practice) = self
            .conn
            .call(move |conn| {
                let counts = conn.query_row(
                    r"
                    SELECT COUNT(*),
                           COUNT(CASE WHEN up.is_mastered THEN 1 END),
                           COALESCE(SUM(up.practice_count), 0)
                    FROM lyrics l
                    LEFT JOIN user_progress up ON l.id = up.lyric_id AND up.user_id = ?1
                    WHERE l.song_id = ?2
                ",
                    [user_id, song_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
                )?;
                Ok(counts)
            })
            .await?;

        let count = |n: i64| u32::try_from(n).unwrap_or(u32::MAX);
        Ok(ProgressStats::new(count(total), count(mastered), count(practice)))
    }

    async fn reset_song(&self, user_id: UserId, song_id: SongId) -> Result<usize> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    r"
                    DELETE FROM user_progress
                    WHERE user_id = ?1
                      AND lyric_id IN (SELECT id FROM lyrics WHERE song_id = ?2)
                ",
                    [user_id, song_id],
                )?;
                Ok(deleted)
            })
            .await?;
        info!("Reset {deleted} progress records for user {user_id}, song {song_id}");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{LyricLine, OrderedLines};
    use crate::store::LyricStore;

    async fn seeded() -> (SqliteStore, SongId, Vec<LineId>) {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let song = store.add_song("Song", None, "vid").await.unwrap();
        let lines = OrderedLines::from_unsorted(
            song.id,
            (1..=4)
                .map(|n| LyricLine::new(song.id, n, format!("line {n}")))
                .collect(),
        );
        let saved = store.save_lines(song.id, &lines).await.unwrap();
        let ids = saved.iter().filter_map(|line| line.id).collect();
        (store, song.id, ids)
    }

    #[tokio::test]
    async fn test_first_toggle_creates_mastered_record() {
        let (store, _, ids) = seeded().await;
        let progress = store.toggle_mastered(1, ids[0]).await.unwrap();
        assert!(progress.is_mastered);
        assert_eq!(progress.practice_count, 1);
        assert!(progress.last_practiced_at.is_some());

        let progress = store.toggle_mastered(1, ids[0]).await.unwrap();
        assert!(!progress.is_mastered);
        assert_eq!(progress.practice_count, 1);
    }

    #[tokio::test]
    async fn test_record_practice_increments() {
        let (store, song_id, ids) = seeded().await;
        store.record_practice(1, ids[1]).await.unwrap();
        let progress = store.record_practice(1, ids[1]).await.unwrap();
        assert_eq!(progress.practice_count, 2);
        assert!(!progress.is_mastered);

        let all = store.load_progress(1, song_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&ids[1]].practice_count, 2);
    }

    #[tokio::test]
    async fn test_progress_is_per_user() {
        let (store, song_id, ids) = seeded().await;
        store.toggle_mastered(1, ids[0]).await.unwrap();
        assert!(store.load_progress(2, song_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_song_stats() {
        let (store, song_id, ids) = seeded().await;
        store.toggle_mastered(1, ids[0]).await.unwrap();
        store.record_practice(1, ids[1]).await.unwrap();
        store.record_practice(1, ids[1]).await.unwrap();

        let stats = store.song_stats(1, song_id).await.unwrap();
        assert_eq!(stats.total_lines, 4);
        assert_eq!(stats.mastered_lines, 1);
        assert!((stats.progress_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_practice_count, 3);
    }

    #[tokio::test]
    async fn test_reset_song() {
        let (store, song_id, ids) = seeded().await;
        store.toggle_mastered(1, ids[0]).await.unwrap();
        store.record_practice(1, ids[2]).await.unwrap();
        store.record_practice(2, ids[2]).await.unwrap();

        assert_eq!(store.reset_song(1, song_id).await.unwrap(), 2);
        assert!(store.load_progress(1, song_id).await.unwrap().is_empty());
        assert_eq!(store.load_progress(2, song_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_line() {
        let (store, _, _) = seeded().await;
        let err = store.record_practice(1, 9_999).await.unwrap_err();
        assert!(matches!(err, CoreError::LineNotFound { line_id: 9_999 }));
    }

    #[test]
    fn test_stats_percentage_rounding() {
        let stats = ProgressStats::new(3, 1, 0);
        assert!((stats.progress_percentage - 33.33).abs() < 1e-9);
        assert!(ProgressStats::new(0, 0, 0).progress_percentage.abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_json_shape() {
        let json = serde_json::to_value(ProgressStats::new(4, 1, 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "total_lines": 4,
                "mastered_lines": 1,
                "progress_percentage": 25.0,
                "total_practice_count": 3,
            })
        );
    }
}

use crate::error::{AppError, AppResult};
use lyricloop_core::{
    export_file_name, export_tsv, import_tsv, parse_paste, validate_sequence, Config, LineEditor,
    LyricLine, LyricStore, OrderedLines, ProgressStore, SecondsExt, SongId, SqliteStore,
    UpdateFields, UserId, WorkingCopy,
};
use std::path::Path;
use tracing::info;

/// Find a line by its 1-based number
pub fn line_by_number(
    lines: &OrderedLines,
    song_id: SongId,
    line_number: u32,
) -> AppResult<(usize, &LyricLine)> {
    lines
        .index_of_line_number(line_number)
        .and_then(|index| lines.get(index).map(|line| (index, line)))
        .ok_or(AppError::NoSuchLine {
            song_id,
            line_number,
        })
}

pub async fn add_song(
    store: &SqliteStore,
    title: &str,
    artist: Option<&str>,
    video_id: &str,
) -> AppResult<()> {
    let song = store.add_song(title, artist, video_id).await?;
    println!("Added song {}: {}", song.id, song.title);
    Ok(())
}

pub async fn list_songs(store: &SqliteStore, json: bool) -> AppResult<()> {
    let songs = store.songs().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&songs)?);
        return Ok(());
    }
    if songs.is_empty() {
        println!("No songs yet. Add one with `lyricloop song add <title> <video-id>`.");
    }
    for song in songs {
        let artist = song.artist.as_deref().unwrap_or("unknown artist");
        println!("{:>4}  {} - {} [{}]", song.id, song.title, artist, song.video_id);
    }
    Ok(())
}

/// Append pasted lyrics to a song.
///
/// Pasted lines may be untimed, so only the text rule is enforced here.
pub async fn paste(store: &SqliteStore, song_id: SongId, file: &Path) -> AppResult<()> {
    store.require_song(song_id).await?;
    let input = std::fs::read_to_string(file)?;
    let pasted = parse_paste(song_id, &input)?;

    let mut lines = store.load_lines(song_id).await?;
    let first_new = lines.len();
    lines.append(pasted.lines);
    for line in &lines.lines[first_new..] {
        lyricloop_core::check_text(line).map_err(lyricloop_core::CoreError::from)?;
    }

    let saved = store.save_lines(song_id, &lines).await?;
    let added = saved.len() - first_new;
    let timed = saved.lines[first_new..]
        .iter()
        .filter(|line| line.interval().is_some())
        .count();
    println!("Added {added} lines ({timed} timed) to song {song_id}");
    Ok(())
}

pub async fn import(
    store: &SqliteStore,
    config: &Config,
    song_id: SongId,
    file: &Path,
) -> AppResult<()> {
    store.require_song(song_id).await?;
    let content = std::fs::read_to_string(file)?;
    let imported = import_tsv(song_id, &content)?;

    let mut copy = WorkingCopy::load(store, song_id, config.editor).await?;
    copy.replace_all(imported);
    copy.save(store).await?;
    println!("Imported {} lines into song {song_id}", copy.len());
    Ok(())
}

pub async fn export(store: &SqliteStore, song_id: SongId, out: &Path) -> AppResult<()> {
    let song = store.require_song(song_id).await?;
    let lines = store.load_lines(song_id).await?;

    std::fs::create_dir_all(out)?;
    let path = out.join(export_file_name(&song.title));
    std::fs::write(&path, export_tsv(&lines))?;
    info!("Exported {} lines to {}", lines.len(), path.display());
    println!("Wrote {}", path.display());
    Ok(())
}

pub async fn validate(store: &SqliteStore, song_id: SongId) -> AppResult<()> {
    store.require_song(song_id).await?;
    let lines = store.load_lines(song_id).await?;
    validate_sequence(&lines.lines).map_err(lyricloop_core::CoreError::from)?;
    println!("Song {song_id}: {} lines, all timestamps are consistent", lines.len());
    Ok(())
}

pub async fn set_time(
    store: &SqliteStore,
    config: &Config,
    song_id: SongId,
    line_number: u32,
    start: Option<f64>,
    end: Option<f64>,
) -> AppResult<()> {
    let fields = UpdateFields {
        start_time: start,
        end_time: end,
    };
    if fields.is_empty() {
        return Err(AppError::NothingToChange);
    }
    let lines = store.load_lines(song_id).await?;
    let (_, line) = line_by_number(&lines, song_id, line_number)?;

    let mut editor = LineEditor::new(line.clone(), &config.editor);
    if let Some(start) = fields.start_time {
        editor.set_start(start);
    }
    if let Some(end) = fields.end_time {
        editor.set_end(end);
    }
    let saved = editor.commit_to(store).await?;
    println!(
        "Line {line_number}: {} - {}",
        saved.start_or_zero().format_clock(),
        saved.end_or_zero().format_clock()
    );
    Ok(())
}

pub async fn toggle_master(
    store: &SqliteStore,
    user_id: UserId,
    song_id: SongId,
    line_number: u32,
) -> AppResult<()> {
    let lines = store.load_lines(song_id).await?;
    let (_, line) = line_by_number(&lines, song_id, line_number)?;
    let line_id = line.id.ok_or(lyricloop_core::CoreError::UnsavedLine { line_number })?;

    let progress = store.toggle_mastered(user_id, line_id).await?;
    let state = if progress.is_mastered {
        "mastered"
    } else {
        "not mastered"
    };
    println!("Line {line_number} is now {state}");
    Ok(())
}

pub async fn stats(
    store: &SqliteStore,
    user_id: UserId,
    song_id: SongId,
    json: bool,
) -> AppResult<()> {
    let song = store.require_song(song_id).await?;
    let stats = store.song_stats(user_id, song_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("{} (user {user_id})", song.title);
    println!(
        "  mastered: {}/{} ({:.2}%)",
        stats.mastered_lines, stats.total_lines, stats.progress_percentage
    );
    println!("  practice count: {}", stats.total_practice_count);
    Ok(())
}

pub async fn reset(store: &SqliteStore, user_id: UserId, song_id: SongId) -> AppResult<()> {
    store.require_song(song_id).await?;
    let deleted = store.reset_song(user_id, song_id).await?;
    println!("Cleared {deleted} progress records for song {song_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricloop_core::{CoreError, ViolationKind, TSV_HEADER};
    use std::path::PathBuf;

    async fn seeded() -> (SqliteStore, SongId) {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let song = store.add_song("Song", None, "vid").await.unwrap();
        let lines = OrderedLines::from_unsorted(
            song.id,
            vec![
                LyricLine::new(song.id, 1, "one").with_interval(0.0, 2.0),
                LyricLine::new(song.id, 2, "two").with_interval(2.0, 4.0),
            ],
        );
        store.save_lines(song.id, &lines).await.unwrap();
        (store, song.id)
    }

    fn input_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lyricloop-{}-{name}",
            std::process::id()
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_paste_appends_after_existing_lines() {
        let (store, song_id) = seeded().await;
        let file = input_file("paste-append.txt", "4-6.5 three | drei\nfour\n");

        paste(&store, song_id, &file).await.unwrap();

        let lines = store.load_lines(song_id).await.unwrap();
        let numbers: Vec<u32> = lines.iter().map(|line| line.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(lines.lines[0].text, "one");
        assert_eq!(lines.lines[2].interval(), Some((4.0, 6.5)));
        assert_eq!(lines.lines[2].translation.as_deref(), Some("drei"));
        assert_eq!(lines.lines[3].text, "four");
        assert_eq!(lines.lines[3].interval(), None);
    }

    #[tokio::test]
    async fn test_paste_rejects_blank_text() {
        let (store, song_id) = seeded().await;
        let file = input_file("paste-blank.txt", "| only translation\n");

        let err = paste(&store, song_id, &file).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Core(CoreError::Validation(v)) if v.kind == ViolationKind::MissingText
        ));
        assert_eq!(store.load_lines(song_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_replaces_lines() {
        let (store, song_id) = seeded().await;
        let file = input_file(
            "import-replace.tsv",
            &format!("{TSV_HEADER}\n9\tfirst\t\t0\t1.5\n9\tsecond\tzwei\t1.5\t3\n"),
        );

        import(&store, &Config::default(), song_id, &file).await.unwrap();

        let lines = store.load_lines(song_id).await.unwrap();
        let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(lines.lines[1].line_number, 2);
        assert_eq!(lines.lines[1].interval(), Some((1.5, 3.0)));
    }

    #[tokio::test]
    async fn test_import_with_overlap_leaves_store_alone() {
        let (store, song_id) = seeded().await;
        let file = input_file(
            "import-overlap.tsv",
            &format!("{TSV_HEADER}\n1\ta\t\t0\t5\n2\tb\t\t3\t8\n"),
        );

        let err = import(&store, &Config::default(), song_id, &file)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Core(CoreError::Validation(v))
                if v.kind == ViolationKind::OrderingConflict && v.line_number == 2
        ));
        let texts: Vec<String> = store
            .load_lines(song_id)
            .await
            .unwrap()
            .iter()
            .map(|line| line.text.clone())
            .collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_set_time_keeps_absent_field() {
        let (store, song_id) = seeded().await;

        set_time(&store, &Config::default(), song_id, 2, Some(2.5), None)
            .await
            .unwrap();

        let lines = store.load_lines(song_id).await.unwrap();
        assert_eq!(lines.lines[1].interval(), Some((2.5, 4.0)));
    }

    #[tokio::test]
    async fn test_set_time_rejects_negative_start() {
        let (store, song_id) = seeded().await;

        let err = set_time(&store, &Config::default(), song_id, 1, Some(-1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Core(CoreError::Validation(v)) if v.kind == ViolationKind::InvalidInterval
        ));
        let lines = store.load_lines(song_id).await.unwrap();
        assert_eq!(lines.lines[0].interval(), Some((0.0, 2.0)));
    }

    #[tokio::test]
    async fn test_set_time_needs_a_field() {
        let (store, song_id) = seeded().await;
        assert!(matches!(
            set_time(&store, &Config::default(), song_id, 1, None, None).await,
            Err(AppError::NothingToChange)
        ));
    }

    #[tokio::test]
    async fn test_unknown_line_number() {
        let (store, song_id) = seeded().await;
        assert!(matches!(
            toggle_master(&store, 1, song_id, 9).await,
            Err(AppError::NoSuchLine { line_number: 9, .. })
        ));
    }
}

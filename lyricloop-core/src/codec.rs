//! Tab-separated import/export and the free-text paste format.
//!
//! # TSV
//!
//! ```text
//! \u{FEFF}line_number<TAB>text<TAB>translation<TAB>start_time<TAB>end_time
//! 1<TAB>Hello<TAB>안녕<TAB>14.5<TAB>18
//! ```
//!
//! The byte-order mark lets spreadsheet programs detect UTF-8.
//!
//! # Paste
//!
//! One lyric per input line, in either form:
//!
//! ```text
//! 14.5-18.0 Hello | 안녕
//! Hello | 안녕
//! ```

use crate::error::{CoreError, Result};
use crate::line::{LyricLine, OrderedLines, SongId};
use crate::time::parse_seconds_or_zero;
use std::fmt::Write;
use tracing::{debug, info};

const BOM: char = '\u{FEFF}';

/// Header row of exported files
pub const TSV_HEADER: &str = "line_number\ttext\ttranslation\tstart_time\tend_time";

/// Which paste form a line was read with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteGrammar {
    /// `<start>-<end> <text>[| <translation>]`
    Timed,
    /// `<text>[| <translation>]`, no interval
    Plain,
}

/// Suggested file name for an export
#[must_use]
pub fn export_file_name(song_title: &str) -> String {
    let safe: String = song_title
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{safe}_lyrics.tsv")
}

/// Tabs and line breaks would split a cell
fn sanitize_cell(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

/// Render lines as a TSV document.
///
/// Unset times are written as `0`.
#[must_use]
pub fn export_tsv(lines: &OrderedLines) -> String {
    let mut out = String::new();
    out.push(BOM);
    out.push_str(TSV_HEADER);
    for line in lines {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "\n{}\t{}\t{}\t{}\t{}",
            line.line_number,
            sanitize_cell(&line.text),
            sanitize_cell(line.translation.as_deref().unwrap_or_default()),
            line.start_or_zero(),
            line.end_or_zero(),
        );
    }
    out
}

/// Parse a TSV document into a fresh, unsaved line set.
///
/// The first row is treated as the header and dropped. Line numbers come from
/// row order; bad or missing times read as `0`.
///
/// # Errors
///
/// Returns `EmptyImport` if there are no data rows.
pub fn import_tsv(song_id: SongId, content: &str) -> Result<OrderedLines> {
    let content = content.strip_prefix(BOM).unwrap_or(content);

    let lines: Vec<LyricLine> = content
        .split('\n')
        .skip(1)
        .map(|row| row.trim_end_matches('\r'))
        .filter(|row| !row.trim().is_empty())
        .map(|row| {
            let cells: Vec<&str> = row.split('\t').collect();
            let cell = |i: usize| cells.get(i).copied().unwrap_or_default();

            let mut line = LyricLine::new(song_id, 0, cell(1).trim())
                .with_interval(parse_seconds_or_zero(cell(3)), parse_seconds_or_zero(cell(4)));
            line.translation = non_empty(cell(2));
            line
        })
        .collect();

    if lines.is_empty() {
        return Err(CoreError::EmptyImport);
    }

    info!("Imported {} rows from TSV", lines.len());
    let mut ordered = OrderedLines { song_id, lines };
    ordered.renumber();
    Ok(ordered)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parse pasted text, one lyric per non-blank line.
///
/// Lines that do not match the timed form are read as plain lyrics; that is
/// never an error.
///
/// # Errors
///
/// Returns `EmptyImport` if the input has no non-blank lines.
pub fn parse_paste(song_id: SongId, input: &str) -> Result<OrderedLines> {
    let mut timed = 0_usize;
    let lines: Vec<LyricLine> = input
        .lines()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            let (line, grammar) = parse_paste_line(song_id, raw);
            if grammar == PasteGrammar::Timed {
                timed += 1;
            }
            line
        })
        .collect();

    if lines.is_empty() {
        return Err(CoreError::EmptyImport);
    }

    info!("Parsed {} pasted lines ({timed} timed)", lines.len());
    let mut ordered = OrderedLines { song_id, lines };
    ordered.renumber();
    Ok(ordered)
}

/// Parse one pasted line, trying the timed form first.
///
/// The returned line has `line_number` 0; callers renumber.
#[must_use]
pub fn parse_paste_line(song_id: SongId, raw: &str) -> (LyricLine, PasteGrammar) {
    let raw = raw.trim();
    if let Some((start, end, rest)) = split_interval_prefix(raw) {
        let (text, translation) = split_timed_text(rest);
        let mut line = LyricLine::new(song_id, 0, text).with_interval(start, end);
        line.translation = translation;
        return (line, PasteGrammar::Timed);
    }

    debug!("Paste line has no interval prefix, reading as plain text: {raw:?}");
    let mut parts = raw.split('|');
    let text = parts.next().unwrap_or_default().trim();
    let mut line = LyricLine::new(song_id, 0, text);
    line.translation = parts.next().and_then(non_empty);
    (line, PasteGrammar::Plain)
}

/// Read `<start>-<end><whitespace>` off the front of `raw`.
///
/// Returns both times and the remaining text, which is never empty.
fn split_interval_prefix(raw: &str) -> Option<(f64, f64, &str)> {
    let (start, rest) = split_number(raw)?;
    let rest = rest.strip_prefix('-')?;
    let (end, rest) = split_number(rest)?;

    let text = rest.trim_start();
    if text.len() == rest.len() || text.is_empty() {
        return None;
    }
    Some((start, end, text))
}

/// Read `digits[.digits]` off the front of `s`
fn split_number(s: &str) -> Option<(f64, &str)> {
    let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
    if int_len == 0 {
        return None;
    }
    let mut len = int_len;
    if s[len..].starts_with('.') {
        len += 1;
        len += s[len..].bytes().take_while(u8::is_ascii_digit).count();
    }
    let value = s[..len].parse().ok()?;
    Some((value, &s[len..]))
}

/// Split timed-form text at the first `|` that has something after it
fn split_timed_text(text: &str) -> (String, Option<String>) {
    let separator = text
        .char_indices()
        .skip(1)
        .find(|&(i, c)| c == '|' && i + 1 < text.len())
        .map(|(i, _)| i);

    match separator {
        Some(i) => (text[..i].trim().to_string(), non_empty(&text[i + 1..])),
        None => (text.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paste_timed_with_translation() {
        let (line, grammar) = parse_paste_line(1, "14.5-18.0 Hello | 안녕");
        assert_eq!(grammar, PasteGrammar::Timed);
        assert_eq!(line.start_time, Some(14.5));
        assert_eq!(line.end_time, Some(18.0));
        assert_eq!(line.text, "Hello");
        assert_eq!(line.translation.as_deref(), Some("안녕"));
    }

    #[test]
    fn test_paste_plain_with_translation() {
        let (line, grammar) = parse_paste_line(1, "Hello | 안녕");
        assert_eq!(grammar, PasteGrammar::Plain);
        assert_eq!(line.start_time, None);
        assert_eq!(line.end_time, None);
        assert_eq!(line.text, "Hello");
        assert_eq!(line.translation.as_deref(), Some("안녕"));
    }

    #[test]
    fn test_paste_timed_without_translation() {
        let (line, grammar) = parse_paste_line(1, "3-7 So much time");
        assert_eq!(grammar, PasteGrammar::Timed);
        assert_eq!(line.interval(), Some((3.0, 7.0)));
        assert_eq!(line.text, "So much time");
        assert_eq!(line.translation, None);
    }

    #[test]
    fn test_paste_prefix_without_space_is_plain() {
        let (line, grammar) = parse_paste_line(1, "1.5-2.5Hello");
        assert_eq!(grammar, PasteGrammar::Plain);
        assert_eq!(line.text, "1.5-2.5Hello");
        assert_eq!(line.interval(), None);
    }

    #[test]
    fn test_paste_malformed_numbers_fall_back() {
        for raw in [".5-2 text", "1-.5 text", "a-2 text", "1- 2 text", "1-2"] {
            let (_, grammar) = parse_paste_line(1, raw);
            assert_eq!(grammar, PasteGrammar::Plain, "{raw}");
        }
        let (line, grammar) = parse_paste_line(1, "12.-13. text");
        assert_eq!(grammar, PasteGrammar::Timed);
        assert_eq!(line.interval(), Some((12.0, 13.0)));
    }

    #[test]
    fn test_paste_trailing_bar_stays_in_text() {
        let (line, _) = parse_paste_line(1, "1-2 Hello |");
        assert_eq!(line.text, "Hello |");
        assert_eq!(line.translation, None);
    }

    #[test]
    fn test_paste_splits_at_first_bar() {
        let (line, _) = parse_paste_line(1, "1-2 a | b | c");
        assert_eq!(line.text, "a");
        assert_eq!(line.translation.as_deref(), Some("b | c"));

        let (line, _) = parse_paste_line(1, "a | b | c");
        assert_eq!(line.text, "a");
        assert_eq!(line.translation.as_deref(), Some("b"));
    }

    #[test]
    fn test_parse_paste_numbers_and_skips_blank_lines() {
        let input = "0-2 first\r\n\n   \nsecond | 둘\n4-6 third\n";
        let lines = parse_paste(7, input).unwrap();
        assert_eq!(lines.len(), 3);
        let numbers: Vec<_> = lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(lines.iter().all(|l| l.song_id == 7));
        assert_eq!(lines.lines[0].text, "first");
        assert_eq!(lines.lines[1].interval(), None);
    }

    #[test]
    fn test_parse_paste_empty() {
        assert!(matches!(parse_paste(1, "\n  \n"), Err(CoreError::EmptyImport)));
    }

    #[test]
    fn test_export_format() {
        let lines = OrderedLines::from_unsorted(
            1,
            vec![
                LyricLine::new(1, 1, "Hello")
                    .with_interval(14.5, 18.0)
                    .with_translation("안녕"),
                LyricLine::new(1, 2, "untimed"),
            ],
        );
        let tsv = export_tsv(&lines);
        assert_eq!(
            tsv,
            "\u{FEFF}line_number\ttext\ttranslation\tstart_time\tend_time\n\
             1\tHello\t안녕\t14.5\t18\n\
             2\tuntimed\t\t0\t0"
        );
    }

    #[test]
    fn test_round_trip() {
        let original = OrderedLines::from_unsorted(
            3,
            vec![
                LyricLine::new(3, 1, "one").with_interval(0.0, 2.25),
                LyricLine::new(3, 2, "two")
                    .with_interval(2.25, 5.1)
                    .with_translation("둘"),
                LyricLine::new(3, 3, "three").with_interval(5.1, 9.99),
            ],
        );
        let imported = import_tsv(3, &export_tsv(&original)).unwrap();
        assert_eq!(imported, original);
    }

    #[test]
    fn test_import_tolerates_bad_cells() {
        let content = "header\r\n9\tA\t\tabc\t-4\r\n\r\n7\tB\tb\t1.5\r\n";
        let lines = import_tsv(1, content).unwrap();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines.lines[0].line_number, 1);
        assert_eq!(lines.lines[0].interval(), Some((0.0, 0.0)));
        assert_eq!(lines.lines[0].translation, None);

        assert_eq!(lines.lines[1].line_number, 2);
        assert_eq!(lines.lines[1].interval(), Some((1.5, 0.0)));
        assert_eq!(lines.lines[1].translation.as_deref(), Some("b"));
    }

    #[test]
    fn test_import_header_only() {
        assert!(matches!(import_tsv(1, TSV_HEADER), Err(CoreError::EmptyImport)));
    }

    #[test]
    fn test_export_sanitizes_cells() {
        let lines = OrderedLines::from_unsorted(1, vec![LyricLine::new(1, 1, "a\tb\nc")]);
        assert!(export_tsv(&lines).ends_with("1\ta b c\t\t0\t0"));
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Spring Day"), "Spring Day_lyrics.tsv");
        assert_eq!(export_file_name("AC/DC"), "AC_DC_lyrics.tsv");
    }
}

//! Timestamp validation rules.
//!
//! Two layers share the same rules:
//!
//! - Hard gates ([`check_interval`], [`check_line`], [`validate_sequence`]) decide
//!   whether a line or a whole song may be persisted. The first violation wins
//!   and aborts the save.
//! - Advisory checks ([`cell_validity`]) recompute the interval and ordering
//!   rules for one row so an editor can highlight problems while typing. They
//!   never block an interim edit.

use crate::line::LyricLine;
use std::fmt;
use thiserror::Error;

/// Kind of rule a line broke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// End is not after start, or the line is untimed
    InvalidInterval,
    /// Text is empty
    MissingText,
    /// Start is before the previous line's end
    OrderingConflict,
}

impl ViolationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInterval => "invalid_interval",
            Self::MissingText => "missing_text",
            Self::OrderingConflict => "ordering_conflict",
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::InvalidInterval => "end time must be after start time",
            Self::MissingText => "lyric text is empty",
            Self::OrderingConflict => "start time is before the previous line's end time",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule violation, located by line number so the operator can fix the row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("line {line_number}: {} ({kind})", .kind.describe())]
pub struct Violation {
    pub line_number: u32,
    pub kind: ViolationKind,
}

impl Violation {
    #[must_use]
    pub const fn new(line_number: u32, kind: ViolationKind) -> Self {
        Self { line_number, kind }
    }
}

/// Per-line interval rule: finite, non-negative seconds with
/// `end_time > start_time`.
///
/// An untimed line has no valid interval.
///
/// # Errors
///
/// Returns [`ViolationKind::InvalidInterval`] when the rule fails.
pub fn check_interval(line: &LyricLine) -> Result<(), Violation> {
    match line.interval() {
        Some((start, end)) if is_valid_interval(start, end) => Ok(()),
        _ => Err(Violation::new(line.line_number, ViolationKind::InvalidInterval)),
    }
}

/// Interval bounds usable on a media timeline
pub(crate) fn is_valid_interval(start: f64, end: f64) -> bool {
    start.is_finite() && end.is_finite() && start >= 0.0 && end > start
}

/// Per-line text rule: text must not be blank.
///
/// # Errors
///
/// Returns [`ViolationKind::MissingText`] when the rule fails.
pub fn check_text(line: &LyricLine) -> Result<(), Violation> {
    if line.text.trim().is_empty() {
        Err(Violation::new(line.line_number, ViolationKind::MissingText))
    } else {
        Ok(())
    }
}

/// Both per-line rules, text first.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn check_line(line: &LyricLine) -> Result<(), Violation> {
    check_text(line)?;
    check_interval(line)
}

/// Full-sequence gate for the batch and grid save paths.
///
/// Rows are checked in order; for each row the text rule, the interval rule
/// and then ordering against the previous row are applied. Only adjacent
/// pairs are compared.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_sequence(lines: &[LyricLine]) -> Result<(), Violation> {
    let mut previous: Option<&LyricLine> = None;
    for line in lines {
        check_line(line)?;
        if let Some(prev) = previous {
            if line.start_or_zero() < prev.end_or_zero() {
                return Err(Violation::new(
                    line.line_number,
                    ViolationKind::OrderingConflict,
                ));
            }
        }
        previous = Some(line);
    }
    Ok(())
}

/// Advisory highlight state for one row's time cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellValidity {
    pub start_ok: bool,
    pub end_ok: bool,
}

impl CellValidity {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.start_ok && self.end_ok
    }
}

/// Recompute the interval and ordering rules for the row at `index`.
///
/// Zero or untimed values count as "not filled in yet" and are not flagged
/// against, matching how a partially timed grid is edited top to bottom.
/// Rows outside the slice are reported valid.
#[must_use]
pub fn cell_validity(lines: &[LyricLine], index: usize) -> CellValidity {
    let Some(row) = lines.get(index) else {
        return CellValidity {
            start_ok: true,
            end_ok: true,
        };
    };
    let start = row.start_or_zero();
    let end = row.end_or_zero();

    let mut start_ok = !(end > 0.0 && start >= end);
    if let Some(prev) = index.checked_sub(1).and_then(|i| lines.get(i)) {
        let prev_end = prev.end_or_zero();
        if prev_end > 0.0 && start < prev_end {
            start_ok = false;
        }
    }

    let mut end_ok = !(start > 0.0 && end <= start);
    if let Some(next) = lines.get(index + 1) {
        let next_start = next.start_or_zero();
        if next_start > 0.0 && end > next_start {
            end_ok = false;
        }
    }

    CellValidity { start_ok, end_ok }
}

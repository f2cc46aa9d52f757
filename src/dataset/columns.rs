//! Column resolution strategies
//!
//! Input files name their columns inconsistently ("time" vs "Duration" vs
//! "follow_up"), so each engine resolves the columns it needs through an
//! explicit candidate list plus a documented structural fallback, rather
//! than inline string matching. `resolve` itself is a pure function so the
//! matching rules are testable in isolation.

use crate::dataset::DataTable;
use crate::error::{EngineError, Result};

/// Candidate names for the observed-duration column.
pub const TIME_CANDIDATES: &[&str] = &[
    "time",
    "duration",
    "TIME",
    "DURATION",
    "Time",
    "Duration",
    "survival_time",
    "follow_up",
];

/// Candidate names for the event-indicator column (0 = censored, 1 = event).
pub const EVENT_CANDIDATES: &[&str] = &[
    "event", "status", "EVENT", "STATUS", "Event", "Status", "DEATH", "death", "Death", "censored",
];

/// Candidate names for the age column of a mortality series.
pub const AGE_CANDIDATES: &[&str] = &["age", "x", "ages"];

/// Candidate names for the mortality-rate column.
pub const QX_CANDIDATES: &[&str] = &[
    "qx",
    "q_x",
    "mortality",
    "mortality_rate",
    "death_rate",
    "deaths",
];

/// Role a resolved column plays, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Time,
    Event,
    Age,
    Qx,
}

impl ColumnRole {
    fn name(self) -> &'static str {
        match self {
            ColumnRole::Time => "time",
            ColumnRole::Event => "event",
            ColumnRole::Age => "age",
            ColumnRole::Qx => "qx",
        }
    }
}

/// First column whose name exactly matches a candidate, in candidate order.
pub fn resolve<'a>(columns: &'a [String], candidates: &[&str]) -> Option<&'a str> {
    for cand in candidates {
        if let Some(found) = columns.iter().find(|c| c.as_str() == *cand) {
            return Some(found.as_str());
        }
    }
    None
}

/// Resolve the time column: candidate names, then the first numeric column.
pub fn resolve_time(table: &DataTable) -> Result<usize> {
    if let Some(idx) = resolve_index(table, TIME_CANDIDATES) {
        return Ok(idx);
    }
    table
        .numeric_column_indices()
        .into_iter()
        .next()
        .ok_or_else(|| missing(ColumnRole::Time, TIME_CANDIDATES))
}

/// Resolve the event column: candidate names, then the first binary 0/1
/// column other than the time column.
pub fn resolve_event(table: &DataTable, time_col: usize) -> Result<usize> {
    if let Some(idx) = resolve_index(table, EVENT_CANDIDATES) {
        return Ok(idx);
    }
    (0..table.headers().len())
        .find(|&c| c != time_col && table.is_binary_column(c))
        .ok_or_else(|| missing(ColumnRole::Event, EVENT_CANDIDATES))
}

/// Resolve the age column of a mortality table: candidate names (compared
/// case-insensitively, as the original files mix "Age"/"age"), then the
/// first column.
pub fn resolve_age(table: &DataTable) -> Result<usize> {
    if let Some(idx) = resolve_lowercase(table, AGE_CANDIDATES) {
        return Ok(idx);
    }
    if table.headers().is_empty() {
        return Err(missing(ColumnRole::Age, AGE_CANDIDATES));
    }
    Ok(0)
}

/// Resolve the qx column: candidate names, then the second column (or the
/// first for a single-column file).
pub fn resolve_qx(table: &DataTable) -> Result<usize> {
    if let Some(idx) = resolve_lowercase(table, QX_CANDIDATES) {
        return Ok(idx);
    }
    match table.headers().len() {
        0 => Err(missing(ColumnRole::Qx, QX_CANDIDATES)),
        1 => Ok(0),
        _ => Ok(1),
    }
}

fn resolve_index(table: &DataTable, candidates: &[&str]) -> Option<usize> {
    resolve(table.headers(), candidates).and_then(|name| table.column_index(name))
}

fn resolve_lowercase(table: &DataTable, candidates: &[&str]) -> Option<usize> {
    for cand in candidates {
        if let Some(idx) = table
            .headers()
            .iter()
            .position(|h| h.trim().to_lowercase() == *cand)
        {
            return Some(idx);
        }
    }
    None
}

fn missing(role: ColumnRole, candidates: &[&str]) -> EngineError {
    EngineError::MissingColumn {
        role: role.name(),
        tried: candidates.iter().map(|s| s.to_string()).collect(),
    }
}

// src/schema/mod.rs
use std::collections::HashSet;
use tracing::warn;

use chrono::NaiveDate;

/// Scans `text` for an embedded calendar date, trying:
///  - an 8-digit contiguous `YYYYMMDD` (not part of a longer digit run)
///  - a 10-char `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY_MM_DD`
/// Surrounding non-date tokens are ignored, so this works both on bare
/// column names like "2020-01-13" and on full paths like
/// "gs://bucket/asof/20200902".
pub fn find_date(text: &str) -> Option<NaiveDate> {
    let chars: Vec<char> = text.chars().collect();

    // Try YYYYMMDD
    if chars.len() >= 8 {
        for i in 0..=chars.len() - 8 {
            let slice = &chars[i..i + 8];
            if !slice.iter().all(|c| c.is_ascii_digit()) {
                continue;
            }
            // reject windows inside a longer digit run
            if i > 0 && chars[i - 1].is_ascii_digit() {
                continue;
            }
            if i + 8 < chars.len() && chars[i + 8].is_ascii_digit() {
                continue;
            }
            let s: String = slice.iter().collect();
            let y: i32 = s[0..4].parse().ok()?;
            let m: u32 = s[4..6].parse().ok()?;
            let d: u32 = s[6..8].parse().ok()?;
            if let Some(date) = valid_ymd(y, m, d) {
                return Some(date);
            }
        }
    }

    // Try YYYY-MM-DD / YYYY/MM/DD / YYYY_MM_DD
    if chars.len() >= 10 {
        for i in 0..=chars.len() - 10 {
            let window = &chars[i..i + 10];
            let sep = window[4];
            if sep != '-' && sep != '/' && sep != '_' {
                continue;
            }
            if window[7] != sep {
                continue;
            }
            let slice: String = window.iter().collect();
            let parts: Vec<&str> = slice.split(sep).collect();
            if parts.len() != 3 {
                continue;
            }
            let (y, m, d) = (
                match parts[0].parse::<i32>() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
                match parts[1].parse::<u32>() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
                match parts[2].parse::<u32>() {
                    Ok(v) => v,
                    Err(_) => continue,
                },
            );
            if let Some(date) = valid_ymd(y, m, d) {
                return Some(date);
            }
        }
    }

    None
}

fn valid_ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    if !(1990..=2099).contains(&y) {
        return None;
    }
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Whether a column name (or any other string) carries a parseable date.
/// The classifier and the directory locator share this routine so that an
/// ambiguous token classifies the same way in both.
pub fn is_date(text: &str) -> bool {
    find_date(text).is_some()
}

/// The column set of a wide table, split into dimension columns and
/// date-valued columns. Original left-to-right order is preserved in both
/// halves; each entry keeps its source column index for the reshaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPartition {
    pub dimensions: Vec<(usize, String)>,
    pub dates: Vec<(usize, String)>,
}

impl ColumnPartition {
    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|(_, n)| n.clone()).collect()
    }
}

/// Classify every column of a wide table by the date-parseability of its name.
pub fn partition_columns(columns: &[String]) -> ColumnPartition {
    let mut dimensions = Vec::new();
    let mut dates = Vec::new();
    for (i, name) in columns.iter().enumerate() {
        if is_date(name) {
            dates.push((i, name.clone()));
        } else {
            dimensions.push((i, name.clone()));
        }
    }
    ColumnPartition { dimensions, dates }
}

/// Result of comparing a source dimension-column set against the configured
/// reference set. `missing` lists reference columns absent from the source,
/// `extra` lists source columns absent from the reference; both sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCheck {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl ColumnCheck {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compare a source column-name list against the expected reference set.
/// Any difference is reported column-by-column; callers abort the run on a
/// non-ok result rather than proceeding with a drifted schema.
pub fn check_dimension_columns(source: &[String], reference: &[String]) -> ColumnCheck {
    let set_source: HashSet<&str> = source.iter().map(String::as_str).collect();
    let set_reference: HashSet<&str> = reference.iter().map(String::as_str).collect();

    let mut missing: Vec<String> = set_reference
        .difference(&set_source)
        .map(|s| s.to_string())
        .collect();
    let mut extra: Vec<String> = set_source
        .difference(&set_reference)
        .map(|s| s.to_string())
        .collect();
    missing.sort();
    extra.sort();

    for col in &missing {
        warn!(column = %col, "missing from source");
    }
    for col in &extra {
        warn!(column = %col, "extra in source");
    }

    ColumnCheck { missing, extra }
}

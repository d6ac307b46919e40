// src/locate/mod.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::schema::find_date;

/// Version marker near the end of a directory path, e.g. "…/20200902-v1/".
static VERSION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-v(\d+)/*$").expect("invalid version marker regex"));

/// Identity of one published dataset snapshot. Ordering is lexicographic by
/// (date, version): a higher date wins, ties on date go to the higher version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateVersion {
    pub date: NaiveDate,
    pub version: u32,
}

impl DateVersion {
    pub fn new(date: NaiveDate, version: u32) -> Self {
        Self { date, version }
    }

    /// Directory name under the dataset prefix, e.g. "20200902-v1".
    pub fn dir_name(&self) -> String {
        format!("{}-v{}", self.date.format("%Y%m%d"), self.version)
    }

    /// Freshness gate against the last processed snapshot. A snapshot is
    /// stale only when its date is earlier AND its version is not greater:
    /// an earlier date with a strictly higher version still counts as new.
    pub fn supersedes(&self, stored: &DateVersion) -> bool {
        !(self.date < stored.date && self.version <= stored.version)
    }
}

impl std::fmt::Display for DateVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-v{}", self.date.format("%Y%m%d"), self.version)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseDirError {
    #[error("no version marker in `{0}`")]
    MissingVersion(String),
    #[error("no parseable date in `{0}`")]
    MissingDate(String),
}

/// Extract the `(date, version)` pair embedded in a directory path. The
/// version comes from the trailing `-v{N}` marker; the date is scanned
/// fuzzily from the text before it.
pub fn parse_date_version(path: &str) -> Result<DateVersion, ParseDirError> {
    let caps = VERSION_MARKER
        .captures(path)
        .ok_or_else(|| ParseDirError::MissingVersion(path.to_string()))?;
    let marker = caps.get(0).expect("whole-match group");
    let version: u32 = caps[1]
        .parse()
        .map_err(|_| ParseDirError::MissingVersion(path.to_string()))?;

    let date = find_date(&path[..marker.start()])
        .ok_or_else(|| ParseDirError::MissingDate(path.to_string()))?;

    Ok(DateVersion::new(date, version))
}

/// Pick the maximal `(date, version)` among the listed directory paths.
/// Empty entries are ignored; unparseable entries are logged and skipped.
/// Returns `None` when nothing usable remains.
pub fn find_latest<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<DateVersion> {
    let mut latest: Option<DateVersion> = None;
    for path in paths {
        if path.is_empty() {
            continue;
        }
        match parse_date_version(path) {
            Ok(dv) => {
                if latest.map_or(true, |cur| dv > cur) {
                    latest = Some(dv);
                }
            }
            Err(e) => {
                warn!(path = %path, error = %e, "skipping unparseable directory entry");
            }
        }
    }
    latest
}

// src/config/mod.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::locate::DateVersion;
use crate::schema::find_date;

/// Persisted configuration-and-state document for both pipelines. Loaded
/// once at the start of a run, passed through explicitly, and written back
/// once at the end; stages never re-open the file themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// URL template for the daily mobility CSV; the run appends
    /// `{YYYY-MM-DD}.csv`.
    pub csv_source_link: String,
    /// Provider landing page, used by the discovery fallback.
    pub source_link: String,
    /// CSS selector locating the download link on the landing page.
    pub csv_selector: String,
    /// Reference dimension-column set for the mobility wide table.
    pub static_non_date_columns: Vec<String>,
    /// Directory where output CSVs are written.
    pub save_path: PathBuf,
    /// Last successfully processed mobility source URL.
    #[serde(default)]
    pub latest_source_link: String,

    /// Object-store prefix holding the dated/versioned visit-data directories.
    pub visit_data_endpoint: String,
    /// Last processed visit-data date, `YYYYMMDD`. Empty before the first run.
    #[serde(default)]
    pub latest_date: String,
    /// Last processed visit-data version.
    #[serde(default)]
    pub latest_version: u32,
    /// Local directory for downloaded visit-data partitions.
    pub grouped_states_path: PathBuf,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self).context("serializing config")?;
        fs::write(path, raw).with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// The last processed `(date, version)` pair, if any has been recorded.
    pub fn stored_date_version(&self) -> Option<DateVersion> {
        let date = find_date(&self.latest_date)?;
        Some(DateVersion::new(date, self.latest_version))
    }

    pub fn set_date_version(&mut self, dv: &DateVersion) {
        self.latest_date = dv.date.format("%Y%m%d").to_string();
        self.latest_version = dv.version;
    }
}

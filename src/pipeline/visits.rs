// src/pipeline/visits.rs
use anyhow::{Context, Result};
use glob::glob;
use std::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::locate::find_latest;
use crate::pipeline::RunOutcome;
use crate::process::concat_partitions;
use crate::remote::{ObjectStore, StoreError};
use crate::table::Table;

/// How partition contents reach the concatenation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Stream each partition straight into memory.
    InMemory,
    /// Copy partitions into the local grouped-states directory first, then
    /// read them back sorted by file name.
    Downloaded,
}

impl AccessMode {
    fn suffix(&self) -> &'static str {
        match self {
            AccessMode::InMemory => "in_memory",
            AccessMode::Downloaded => "downloaded",
        }
    }
}

/// One run of the versioned visit-data pipeline: list the dated/versioned
/// directories under the endpoint, resolve the latest `(date, version)`,
/// gate on freshness (unless `check_latest` is off), fetch the grouped
/// partitions, concatenate, and write one combined CSV.
///
/// `cfg` is mutated in place on success; the caller persists it once.
pub async fn run(
    cfg: &mut Config,
    store: &dyn ObjectStore,
    mode: AccessMode,
    check_latest: bool,
) -> Result<RunOutcome> {
    // 1) list candidate directories
    let entries = match store.list(&cfg.visit_data_endpoint).await {
        Ok(entries) => entries,
        Err(StoreError::NotFound(prefix)) => {
            warn!(%prefix, "cannot find endpoint");
            return Ok(RunOutcome::SourceMissing);
        }
        Err(e) => return Err(e.into()),
    };

    // 2) resolve the latest (date, version)
    let latest = match find_latest(entries.iter().map(String::as_str)) {
        Some(dv) => dv,
        None => {
            warn!(endpoint = %cfg.visit_data_endpoint, "no parseable dated directories");
            return Ok(RunOutcome::NoCandidates);
        }
    };
    info!(latest = %latest, "latest date-version");

    // 3) freshness gate against persisted state
    if check_latest {
        if let Some(stored) = cfg.stored_date_version() {
            if !latest.supersedes(&stored) {
                info!(latest = %latest, stored = %stored, "latest date-version already processed");
                return Ok(RunOutcome::NothingNew);
            }
        }
    }

    // 4) list the snapshot and keep the grouped-region partitions
    let latest_dir = format!("{}{}/", cfg.visit_data_endpoint, latest.dir_name());
    let files = match store.list(&latest_dir).await {
        Ok(files) => files,
        Err(StoreError::NotFound(prefix)) => {
            warn!(%prefix, "latest directory vanished between listing and fetch");
            return Ok(RunOutcome::SourceMissing);
        }
        Err(e) => return Err(e.into()),
    };
    let grouped: Vec<String> = files.into_iter().filter(|f| f.contains("grouped")).collect();
    if grouped.is_empty() {
        warn!(dir = %latest_dir, "no grouped partitions in latest directory");
        return Ok(RunOutcome::NoCandidates);
    }
    info!(count = grouped.len(), dir = %latest_dir, "grouped partitions located");

    // 5) load partitions per the access mode
    let tables = match mode {
        AccessMode::InMemory => {
            let mut tables = Vec::with_capacity(grouped.len());
            for path in &grouped {
                let bytes = store.read(path).await?;
                tables.push(
                    Table::from_csv(&bytes)
                        .with_context(|| format!("parsing partition {}", path))?,
                );
            }
            tables
        }
        AccessMode::Downloaded => {
            fs::create_dir_all(&cfg.grouped_states_path).with_context(|| {
                format!(
                    "creating download dir {}",
                    cfg.grouped_states_path.display()
                )
            })?;
            for path in &grouped {
                store.download(path, &cfg.grouped_states_path).await?;
            }

            let pattern = format!("{}/*", cfg.grouped_states_path.display());
            let mut local: Vec<_> = glob(&pattern)
                .context("invalid glob pattern for downloaded partitions")?
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file())
                .collect();
            local.sort();

            let mut tables = Vec::with_capacity(local.len());
            for path in &local {
                let bytes = fs::read(path)
                    .with_context(|| format!("reading downloaded partition {}", path.display()))?;
                tables.push(
                    Table::from_csv(&bytes)
                        .with_context(|| format!("parsing partition {}", path.display()))?,
                );
            }
            tables
        }
    };

    // 6) concatenate and save
    let combined = concat_partitions(tables)?;
    fs::create_dir_all(&cfg.save_path)
        .with_context(|| format!("creating output dir {}", cfg.save_path.display()))?;
    let output = cfg.save_path.join(format!(
        "visit_data_{}-{}_{}.csv",
        latest.date.format("%Y%m%d"),
        latest.version,
        mode.suffix()
    ));
    combined.write_csv(&output)?;
    info!(output = %output.display(), rows = combined.row_count(), "wrote combined table");

    // 7) record state
    cfg.set_date_version(&latest);

    Ok(RunOutcome::Completed {
        rows: combined.row_count(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    const ENDPOINT: &str = "gs://data.visitdata.org/processed/vendor/foursquare/asof/";

    struct FakeStore {
        listings: HashMap<String, Vec<String>>,
        objects: HashMap<String, Vec<u8>>,
    }

    impl FakeStore {
        fn snapshot() -> Self {
            let dirs: Vec<String> = [
                "20200830-v0/",
                "20200901-v0/",
                "20200902-v0/",
                "20200902-v1/",
            ]
            .iter()
            .map(|d| format!("{}{}", ENDPOINT, d))
            .collect();

            // gsutil ls returns entries in lexicographic order
            let latest_dir = format!("{}20200902-v1/", ENDPOINT);
            let files = vec![
                format!("{}README.txt", latest_dir),
                format!("{}groupedOR.csv", latest_dir),
                format!("{}groupedWA.csv", latest_dir),
            ];

            let mut objects = HashMap::new();
            objects.insert(
                format!("{}groupedOR.csv", latest_dir),
                b"state,county,visits\nOR,Multnomah,5\n".to_vec(),
            );
            objects.insert(
                format!("{}groupedWA.csv", latest_dir),
                b"state,county,visits\nWA,King,10\nWA,Pierce,7\n".to_vec(),
            );

            let mut listings = HashMap::new();
            listings.insert(ENDPOINT.to_string(), dirs);
            listings.insert(latest_dir, files);
            Self { listings, objects }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.listings
                .get(prefix)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(prefix.to_string()))
        }

        async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
            self.objects
                .get(path)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(path.to_string()))
        }

        async fn download(&self, path: &str, dest_dir: &Path) -> Result<(), StoreError> {
            let bytes = self.read(path).await?;
            let name = path.rsplit('/').next().unwrap();
            std::fs::write(dest_dir.join(name), bytes)?;
            Ok(())
        }
    }

    fn test_config(save_path: PathBuf, download_path: PathBuf) -> Config {
        let mut cfg = crate::config::tests::sample();
        cfg.save_path = save_path;
        cfg.grouped_states_path = download_path;
        cfg
    }

    #[tokio::test]
    async fn concatenates_grouped_partitions_in_memory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        let store = FakeStore::snapshot();

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, true).await?;
        let output = match outcome {
            RunOutcome::Completed { output, rows } => {
                assert_eq!(rows, 3);
                output
            }
            other => panic!("expected completed, got {:?}", other),
        };
        assert!(output.ends_with("visit_data_20200902-1_in_memory.csv"));

        let combined = Table::from_csv(&fs::read(&output)?)?;
        assert_eq!(combined.columns, vec!["state", "county", "visits"]);
        assert_eq!(combined.rows[0], vec!["OR", "Multnomah", "5"]);
        assert_eq!(combined.rows[1], vec!["WA", "King", "10"]);
        assert_eq!(combined.rows[2], vec!["WA", "Pierce", "7"]);

        // state recorded for the freshness gate
        assert_eq!(cfg.latest_date, "20200902");
        assert_eq!(cfg.latest_version, 1);
        Ok(())
    }

    #[tokio::test]
    async fn in_memory_and_downloaded_agree() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FakeStore::snapshot();

        let mut cfg_a = test_config(dir.path().join("out"), dir.path().join("dl"));
        let in_memory = run(&mut cfg_a, &store, AccessMode::InMemory, false).await?;

        let mut cfg_b = test_config(dir.path().join("out"), dir.path().join("dl"));
        let downloaded = run(&mut cfg_b, &store, AccessMode::Downloaded, false).await?;

        let (path_a, path_b) = match (in_memory, downloaded) {
            (
                RunOutcome::Completed { output: a, .. },
                RunOutcome::Completed { output: b, .. },
            ) => (a, b),
            other => panic!("expected two completed runs, got {:?}", other),
        };
        let table_a = Table::from_csv(&fs::read(path_a)?)?;
        let table_b = Table::from_csv(&fs::read(path_b)?)?;
        assert_eq!(table_a, table_b);
        Ok(())
    }

    #[tokio::test]
    async fn already_processed_snapshot_is_nothing_new() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        cfg.latest_date = "20200903".into();
        cfg.latest_version = 1;
        let store = FakeStore::snapshot();

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, true).await?;
        assert_eq!(outcome, RunOutcome::NothingNew);
        Ok(())
    }

    #[tokio::test]
    async fn earlier_date_with_higher_version_still_processes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        // stored state is ahead by date but behind by version
        cfg.latest_date = "20200903".into();
        cfg.latest_version = 0;
        let store = FakeStore::snapshot();

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, true).await?;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn gate_can_be_bypassed_for_reprocessing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        cfg.latest_date = "20200903".into();
        cfg.latest_version = 1;
        let store = FakeStore::snapshot();

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, false).await?;
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_endpoint_ends_quietly() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        cfg.visit_data_endpoint = "gs://data.visitdata.org/processed/vendor/threesquare/asof/".into();
        let store = FakeStore::snapshot();

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, true).await?;
        assert_eq!(outcome, RunOutcome::SourceMissing);
        Ok(())
    }

    #[tokio::test]
    async fn directory_of_junk_yields_no_candidates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cfg = test_config(dir.path().join("out"), dir.path().join("dl"));
        let mut store = FakeStore::snapshot();
        store.listings.insert(
            ENDPOINT.to_string(),
            vec![format!("{}not-a-snapshot/", ENDPOINT)],
        );

        let outcome = run(&mut cfg, &store, AccessMode::InMemory, true).await?;
        assert_eq!(outcome, RunOutcome::NoCandidates);
        Ok(())
    }
}

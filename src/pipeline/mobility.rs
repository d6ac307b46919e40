// src/pipeline/mobility.rs
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::fs;
use tracing::{info, warn};

use crate::config::Config;
use crate::fetch::{discover::LinkResolver, CsvFetcher, FetchError};
use crate::pipeline::RunOutcome;
use crate::process::wide_to_long;
use crate::schema::{check_dimension_columns, find_date, partition_columns};
use crate::table::Table;

/// One run of the date-scoped mobility pipeline:
/// fetch by templated date URL (falling back to page discovery on 404),
/// validate dimension columns, unpivot to long format, write the output CSV,
/// and record the processed source link in `cfg`.
///
/// `cfg` is mutated in place on success; the caller persists it once.
pub async fn run(
    cfg: &mut Config,
    fetcher: &dyn CsvFetcher,
    resolver: &dyn LinkResolver,
    date: Option<NaiveDate>,
) -> Result<RunOutcome> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let direct_url = format!("{}{}.csv", cfg.csv_source_link, date.format("%Y-%m-%d"));

    // 1) locate + fetch, direct-by-date first
    let (table, link) = match fetcher.fetch_csv(&direct_url).await {
        Ok(table) => {
            info!(url = %direct_url, "found source csv at templated link");
            (table, direct_url)
        }
        Err(FetchError::NotFound(_)) => {
            info!(date = %date, "no csv for requested date; falling back to page discovery");
            let link = match resolver.resolve(&cfg.source_link, &cfg.csv_selector).await {
                Ok(link) => link,
                Err(e) => {
                    warn!(error = %e, "discovery fallback failed");
                    return Ok(RunOutcome::SourceMissing);
                }
            };
            info!(url = %link, "source csv link discovered");
            match fetcher.fetch_csv(&link).await {
                Ok(table) => (table, link),
                Err(FetchError::NotFound(_)) => return Ok(RunOutcome::SourceMissing),
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    // 2) freshness: same link as last run means nothing to reshape, but the
    //    template is still re-derived so a stale one self-repairs
    if link == cfg.latest_source_link {
        info!(url = %link, "source link unchanged since last run");
        record_source_link(cfg, &link);
        return Ok(RunOutcome::NothingNew);
    }

    // 3) schema check, then unpivot
    let partition = partition_columns(&table.columns);
    let check = check_dimension_columns(&partition.dimension_names(), &cfg.static_non_date_columns);
    if !check.is_ok() {
        return Ok(RunOutcome::SchemaMismatch(check));
    }
    let long: Table = wide_to_long(&table, &partition);

    // 4) write output, named by the date embedded in the resolved link
    let file_name = link.rsplit('/').next().unwrap_or(&link);
    let file_date = find_date(file_name)
        .with_context(|| format!("no date in resolved source file name `{}`", file_name))?;

    fs::create_dir_all(&cfg.save_path)
        .with_context(|| format!("creating output dir {}", cfg.save_path.display()))?;
    let output = cfg
        .save_path
        .join(format!("apple_mobility_{}.csv", file_date.format("%Y-%m-%d")));
    long.write_csv(&output)?;
    info!(output = %output.display(), rows = long.row_count(), "wrote long table");

    // 5) record state
    record_source_link(cfg, &link);

    Ok(RunOutcome::Completed {
        rows: long.row_count(),
        output,
    })
}

/// Record `link` as the processed source and re-derive the URL template from
/// it (the link minus its `{date}.csv` tail). Runs on every resolved link,
/// including the nothing-new path, so a stale template gets repaired.
fn record_source_link(cfg: &mut Config, link: &str) {
    cfg.latest_source_link = link.to_string();
    let file_name = link.rsplit('/').next().unwrap_or(link);
    match find_date(file_name) {
        Some(date) => {
            let tail = format!("{}.csv", date.format("%Y-%m-%d"));
            match link.strip_suffix(&tail) {
                Some(prefix) => cfg.csv_source_link = prefix.to_string(),
                None => {
                    warn!(url = %link, "resolved link does not end in a date; keeping old template")
                }
            }
        }
        None => warn!(url = %link, "no date in resolved link; keeping old template"),
    }
}

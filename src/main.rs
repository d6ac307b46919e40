use anyhow::{Context, Result};
use mobscraper::{
    config::Config,
    fetch::{discover::PageScraper, HttpFetcher},
    pipeline::{mobility, visits, RunOutcome},
    remote::GsutilStore,
};
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) load config once ─────────────────────────────────────────
    let config_path =
        std::env::var("MOBSCRAPER_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let mut cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path))?;

    // ─── 3) build collaborators ──────────────────────────────────────
    let client = Client::new();
    let fetcher = HttpFetcher::new(client.clone());
    let resolver = PageScraper::new(client);
    let store = GsutilStore;

    // ─── 4) run the mobility pipeline ────────────────────────────────
    match mobility::run(&mut cfg, &fetcher, &resolver, None).await {
        Ok(outcome) => log_outcome("mobility", &outcome),
        Err(e) => error!(pipeline = "mobility", error = %e, "run failed"),
    }

    // ─── 5) run the visit-data pipeline ──────────────────────────────
    match visits::run(&mut cfg, &store, visits::AccessMode::InMemory, true).await {
        Ok(outcome) => log_outcome("visits", &outcome),
        Err(e) => error!(pipeline = "visits", error = %e, "run failed"),
    }

    // ─── 6) persist state once ───────────────────────────────────────
    cfg.save(&config_path)
        .with_context(|| format!("saving config to {}", config_path))?;
    info!("state saved; all done");
    Ok(())
}

fn log_outcome(pipeline: &str, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { output, rows } => {
            info!(pipeline, rows, output = %output.display(), "completed");
        }
        other => info!(pipeline, outcome = other.as_str(), "run ended without output"),
    }
}

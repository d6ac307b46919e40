// src/remote/mod.rs
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The prefix or object does not exist (the CLI exits non-zero when
    /// asked to list a missing prefix).
    #[error("not found in object store: {0}")]
    NotFound(String),
    #[error("gsutil {op} {path} failed: {detail}")]
    Command {
        op: &'static str,
        path: String,
        detail: String,
    },
    #[error("failed to run gsutil: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Remote object-store collaborator. Listing returns full entry paths, one
/// per line of CLI output; `read` streams an object into memory; `download`
/// copies an object into a local directory.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    async fn download(&self, path: &str, dest_dir: &Path) -> Result<(), StoreError>;
}

/// Shell-out to the `gsutil` CLI (`ls`, `cat`, `cp`). Blocking from the
/// pipeline's point of view; no timeout is applied.
pub struct GsutilStore;

impl GsutilStore {
    async fn run(op: &'static str, args: &[&str]) -> Result<Vec<u8>, StoreError> {
        debug!(op, ?args, "running gsutil");
        let output = Command::new("gsutil").args(args).output().await?;
        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(StoreError::Command {
                op,
                path: args.last().unwrap_or(&"").to_string(),
                detail,
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl ObjectStore for GsutilStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let stdout = Self::run("ls", &["ls", prefix])
            .await
            .map_err(|e| match e {
                StoreError::Command { .. } => StoreError::NotFound(prefix.to_string()),
                other => other,
            })?;
        let entries = String::from_utf8_lossy(&stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        Self::run("cat", &["cat", path]).await
    }

    async fn download(&self, path: &str, dest_dir: &Path) -> Result<(), StoreError> {
        let dest = dest_dir.to_string_lossy().to_string();
        Self::run("cp", &["cp", path, dest.as_str()]).await?;
        Ok(())
    }
}

// src/pipeline/mod.rs
use std::path::PathBuf;

use crate::schema::ColumnCheck;

pub mod mobility;
pub mod visits;

/// Tagged outcome of one pipeline run. Every non-completed cause is carried
/// explicitly so callers and tests can distinguish them; none of these is an
/// error in the `Result` sense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run produced an output file.
    Completed { output: PathBuf, rows: usize },
    /// The located artifact is not newer than the persisted state.
    NothingNew,
    /// The locator found nothing usable.
    NoCandidates,
    /// Dimension columns disagree with the reference set; nothing was
    /// reshaped or written.
    SchemaMismatch(ColumnCheck),
    /// The source artifact is absent and discovery could not resolve it.
    SourceMissing,
}

impl RunOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::NothingNew => "nothing-new",
            RunOutcome::NoCandidates => "no-candidates",
            RunOutcome::SchemaMismatch(_) => "schema-mismatch",
            RunOutcome::SourceMissing => "source-missing",
        }
    }
}

use crate::report::ValidationReport;
use bdfnum_deck::DeckError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run. Validation problems that are part of a normal
/// report travel in [`ValidationReport`] instead, and only become an
/// `EngineError` when they block the next phase.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("invalid range snapshot {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("output directory {} is the source deck's directory; refusing to overwrite the input", .0.display())]
    OutputOverlapsSource(PathBuf),

    #[error("unsupported range snapshot version {0} (expected 1)")]
    SnapshotVersion(u32),

    #[error("range plan rejected with {} error(s)", .0.errors().count())]
    PlanRejected(ValidationReport),

    #[error("renumbered model failed validation with {} error(s); nothing was written", .0.errors().count())]
    PostValidation(ValidationReport),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    /// The report carried by a rejected plan or a failed post-validation.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            EngineError::PlanRejected(report) | EngineError::PostValidation(report) => Some(report),
            _ => None,
        }
    }
}

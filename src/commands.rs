//! Operator commands.

use tracing::{info, warn};

use crate::engines::traits::{EngineError, SearchEngine};

/// Result of a settings sync that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    /// The backend has no settings to push
    Unsupported { backend: &'static str },
}

/// Push the configured index settings of `engine` to its backend.
///
/// A backend without settings support is reported as
/// [`SyncOutcome::Unsupported`] instead of an error.
pub async fn sync_index_settings(engine: &dyn SearchEngine) -> Result<SyncOutcome, EngineError> {
    match engine.sync_index_settings().await {
        Ok(()) => {
            info!(engine = engine.name(), "Index settings synced");
            Ok(SyncOutcome::Synced)
        }
        Err(EngineError::Unsupported { backend, .. }) => {
            warn!(engine = backend, "Index settings sync not supported by this backend");
            Ok(SyncOutcome::Unsupported { backend })
        }
        Err(e) => Err(e),
    }
}

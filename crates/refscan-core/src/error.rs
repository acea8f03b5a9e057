//! Error types for refscan core
//!
//! - [`ScanError`]: anything that aborts topology resolution or a scan step
//! - [`StepFailure`]: a failed step, handing back the untouched state
//! - [`DriverError`]: a failed batch operation, naming it for the user

use crate::state::ScanState;
use refscan_host::{SchemaError, StorageError};
use refscan_query::QueryError;
use refscan_report::StoreError;

/// Scan error
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Schema introspection failed; no partial reference map is used
    #[error("schema resolution failed: {0}")]
    Schema(#[from] SchemaError),

    /// Candidate query failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Bulk load failed as a whole
    #[error("bulk load of {entity_type} failed: {source}")]
    Load {
        /// Entity type being loaded
        entity_type: String,
        /// Underlying storage failure
        #[source]
        source: StorageError,
    },

    /// Report store rejected a clear or merge
    #[error("report store failed: {0}")]
    Store(#[from] StoreError),
}

/// A step that did not complete
///
/// Carries the state the step was given, unchanged, so the driver can retry
/// from exactly the same point without losing the page's findings.
#[derive(Debug, thiserror::Error)]
#[error("scan step failed: {source}")]
pub struct StepFailure {
    /// Why the step failed
    #[source]
    pub source: ScanError,

    /// State to retry from
    pub state: ScanState,
}

/// Batch driver error
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The report store could not be cleared before the run
    #[error("failed to clear the report store: {0}")]
    Clear(#[source] StoreError),

    /// One operation of the batch failed
    #[error("operation {operation} failed: {source}")]
    Operation {
        /// Operation identity
        operation: String,
        /// Operation arguments, rendered for display
        arguments: String,
        /// Underlying failure
        #[source]
        source: ScanError,
    },
}

impl DriverError {
    /// Message shown to the user when the batch finishes with this error
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Clear(err) => {
                format!("An error occurred while clearing the broken reference report: {err}")
            }
            Self::Operation {
                operation,
                arguments,
                ..
            } => format!(
                "An error occurred while processing {operation} with arguments: {arguments}"
            ),
        }
    }

    /// Whether retrying the failed step may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Clear(_)
                | Self::Operation {
                    source: ScanError::Store(_) | ScanError::Load { .. } | ScanError::Query(_),
                    ..
                }
        )
    }
}

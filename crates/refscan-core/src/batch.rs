//! Batch driver
//!
//! Turns a reference map into one scan operation per entity type and drives
//! them step by step. Dropping a [`BatchRun`] between steps abandons the run;
//! findings merged so far stay in the store.

use crate::coordinator::ScanCoordinator;
use crate::error::DriverError;
use crate::state::{Progress, ScanState};
use refscan_topology::{ReferenceMap, TypeReferences};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message shown when every operation succeeded
pub const FINISHED_MESSAGE: &str = "All broken entity references have been processed.";

/// Scan of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOperation {
    /// Entity type scanned
    pub entity_type: String,
    /// Its reference map entry
    pub references: TypeReferences,
}

impl ScanOperation {
    /// Operation arguments as JSON, for error reports
    #[must_use]
    pub fn arguments(&self) -> String {
        serde_json::to_string(&self.references).unwrap_or_default()
    }
}

impl fmt::Display for ScanOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan {}", self.entity_type)
    }
}

/// Progress after one batch step
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// 1-based index of the operation the step ran
    pub operation: usize,
    /// Number of operations in the batch
    pub operation_count: usize,
    /// Entity type the step scanned
    pub entity_type: String,
    /// Progress of that entity type
    pub progress: Progress,
    /// Per-type status line
    pub message: String,
    /// Operations fully completed
    pub completed: usize,
}

impl BatchProgress {
    /// Overall status line
    #[must_use]
    pub fn overall(&self) -> String {
        format!(
            "Processed {} out of {} entity types.",
            self.completed, self.operation_count
        )
    }
}

/// Summary of a finished batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFinished {
    /// Every operation completed
    pub success: bool,
    /// Message for the user
    pub message: String,
    /// Broken targets merged during the run
    pub broken_targets: usize,
    /// Operations fully completed
    pub completed: usize,
    /// Operations in the batch
    pub total: usize,
}

/// One scan over every entity type of a reference map
#[derive(Debug)]
pub struct BatchRun {
    coordinator: ScanCoordinator,
    operations: Vec<ScanOperation>,
    current: usize,
    state: ScanState,
    started: bool,
    broken_targets: usize,
    max_retries: usize,
}

impl BatchRun {
    /// Batch over `map`, in entity type order
    #[must_use]
    pub fn new(coordinator: ScanCoordinator, map: ReferenceMap) -> Self {
        let operations = map
            .into_iter()
            .map(|(entity_type, references)| ScanOperation {
                entity_type,
                references,
            })
            .collect();
        Self {
            coordinator,
            operations,
            current: 0,
            state: ScanState::Unstarted,
            started: false,
            broken_targets: 0,
            max_retries: 0,
        }
    }

    /// Retry each failed step up to `retries` times in
    /// [`Self::run_to_completion`] when the failure is retryable
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Operations in run order
    #[inline]
    #[must_use]
    pub fn operations(&self) -> &[ScanOperation] {
        &self.operations
    }

    /// Every operation completed
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current >= self.operations.len()
    }

    /// Clear the report store; called once before the first step
    ///
    /// # Errors
    /// Returns [`DriverError::Clear`] if the store cannot be cleared
    pub async fn start(&mut self) -> Result<(), DriverError> {
        self.coordinator
            .store()
            .clear()
            .await
            .map_err(DriverError::Clear)?;
        self.started = true;
        tracing::info!(operations = self.operations.len(), "batch started");
        Ok(())
    }

    /// Run one step of the current operation
    ///
    /// Starts the run first when needed. Returns `None` once every operation
    /// completed. After an error the failed step can be retried by calling
    /// `step` again.
    ///
    /// # Errors
    /// Returns [`DriverError`] naming the failed operation
    pub async fn step(&mut self) -> Result<Option<BatchProgress>, DriverError> {
        if !self.started {
            self.start().await?;
        }
        let Some(operation) = self.operations.get(self.current) else {
            return Ok(None);
        };

        let state = std::mem::take(&mut self.state);
        let outcome = match self
            .coordinator
            .run_step(&operation.entity_type, &operation.references, state)
            .await
        {
            Ok(outcome) => outcome,
            Err(failure) => {
                self.state = failure.state;
                tracing::warn!(operation = %operation, error = %failure.source, "batch step failed");
                return Err(DriverError::Operation {
                    operation: operation.to_string(),
                    arguments: operation.arguments(),
                    source: failure.source,
                });
            }
        };

        let index = self.current + 1;
        let entity_type = operation.entity_type.clone();
        self.broken_targets += outcome.broken_targets;
        if outcome.is_done() {
            self.current += 1;
            self.state = ScanState::Unstarted;
        } else {
            self.state = outcome.state;
        }

        Ok(Some(BatchProgress {
            operation: index,
            operation_count: self.operations.len(),
            entity_type,
            progress: outcome.progress,
            message: outcome.message,
            completed: self.current,
        }))
    }

    /// Drive every operation, reporting each step to `on_progress`
    pub async fn run_to_completion<F>(&mut self, mut on_progress: F) -> BatchFinished
    where
        F: FnMut(&BatchProgress),
    {
        let mut retries = 0;
        loop {
            match self.step().await {
                Ok(Some(progress)) => {
                    retries = 0;
                    on_progress(&progress);
                }
                Ok(None) => return self.finished(None),
                Err(err) if err.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    tracing::info!(attempt = retries, "retrying batch step");
                }
                Err(err) => return self.finished(Some(&err)),
            }
        }
    }

    /// Summary of the run, successful unless `failure` is given
    #[must_use]
    pub fn finished(&self, failure: Option<&DriverError>) -> BatchFinished {
        let message = match failure {
            None => FINISHED_MESSAGE.to_string(),
            Some(err) => err.user_message(),
        };
        tracing::info!(
            success = failure.is_none(),
            broken_targets = self.broken_targets,
            "batch finished"
        );
        BatchFinished {
            success: failure.is_none(),
            message,
            broken_targets: self.broken_targets,
            completed: self.current,
            total: self.operations.len(),
        }
    }
}

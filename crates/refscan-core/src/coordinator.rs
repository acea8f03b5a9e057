//! Incremental scan coordinator
//!
//! Scans one entity type in bounded pages. Each call to
//! [`ScanCoordinator::run_step`] does a bounded amount of work, merges what
//! it found into the report store and hands back the next [`ScanState`].

use crate::config::DEFAULT_PAGE_SIZE;
use crate::error::{ScanError, StepFailure};
use crate::state::{Progress, ScanCursor, ScanState, ScanTally};
use refscan_host::{EntityStorage, LoadedEntity};
use refscan_query::BrokenReferenceQuery;
use refscan_report::{BrokenReferenceReport, ReportStore};
use refscan_topology::TypeReferences;
use std::sync::Arc;

/// Result of one completed step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// State to pass to the next step
    pub state: ScanState,
    /// Progress after this step
    pub progress: Progress,
    /// Human-readable status line
    pub message: String,
    /// Entities requested from storage in this step
    pub attempted: usize,
    /// Entities actually loaded in this step
    pub loaded: usize,
    /// Broken targets merged into the report in this step
    pub broken_targets: usize,
}

impl StepOutcome {
    /// Whether the type is fully scanned
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

/// Drives the paged scan of one entity type at a time
#[derive(Clone)]
pub struct ScanCoordinator {
    query: BrokenReferenceQuery,
    storage: Arc<dyn EntityStorage>,
    store: Arc<dyn ReportStore>,
    page_size: usize,
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("query", &self.query)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl ScanCoordinator {
    /// Coordinator over explicit collaborators
    #[must_use]
    pub fn new(storage: Arc<dyn EntityStorage>, store: Arc<dyn ReportStore>) -> Self {
        Self {
            query: BrokenReferenceQuery::new(Arc::clone(&storage)),
            storage,
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// With page size; zero is raised to one
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// With a custom query engine
    #[inline]
    #[must_use]
    pub fn with_query(mut self, query: BrokenReferenceQuery) -> Self {
        self.query = query;
        self
    }

    /// Entities loaded per step
    #[inline]
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Report store findings are merged into
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// Run one bounded step of the scan of `entity_type`
    ///
    /// An unstarted scan queries its candidates and, when there are any,
    /// processes the first page in the same step. A done scan is a no-op.
    ///
    /// # Errors
    /// Returns [`StepFailure`] when the candidate query, the bulk load or the
    /// report merge fails. The failure carries `state` unchanged, so retrying
    /// with it repeats exactly the failed work.
    pub async fn run_step(
        &self,
        entity_type: &str,
        references: &TypeReferences,
        state: ScanState,
    ) -> Result<StepOutcome, StepFailure> {
        match state {
            ScanState::Unstarted => {
                let candidates = match self
                    .query
                    .find_candidate_ids(entity_type, references, false)
                    .await
                {
                    Ok(candidates) => candidates,
                    Err(err) => {
                        return Err(StepFailure {
                            source: err.into(),
                            state: ScanState::Unstarted,
                        })
                    }
                };

                tracing::info!(entity_type, candidates = candidates.len(), "scan started");
                if candidates.is_empty() {
                    return Ok(done_outcome(entity_type, ScanTally::default()));
                }

                let cursor = ScanCursor::new(candidates);
                self.process_page(entity_type, references, cursor)
                    .await
                    .map_err(|(source, _)| StepFailure {
                        source,
                        // The candidate query is repeated on retry
                        state: ScanState::Unstarted,
                    })
            }
            ScanState::InProgress(cursor) => self
                .process_page(entity_type, references, cursor)
                .await
                .map_err(|(source, cursor)| StepFailure {
                    source,
                    state: ScanState::InProgress(cursor),
                }),
            ScanState::Done(tally) => Ok(done_outcome(entity_type, tally)),
        }
    }

    /// Load, check and merge one page; on error the page is put back
    async fn process_page(
        &self,
        entity_type: &str,
        references: &TypeReferences,
        mut cursor: ScanCursor,
    ) -> Result<StepOutcome, (ScanError, ScanCursor)> {
        let page = cursor.take_page(self.page_size);
        let attempted = page.len();

        let entities = match self.storage.load_multiple(entity_type, &page).await {
            Ok(entities) => entities,
            Err(source) => {
                cursor.restore_page(page);
                let err = ScanError::Load {
                    entity_type: entity_type.to_string(),
                    source,
                };
                return Err((err, cursor));
            }
        };

        let loaded = entities.len().min(attempted);
        if loaded < attempted {
            tracing::warn!(
                entity_type,
                missing = attempted - loaded,
                "candidates vanished before load"
            );
        }

        let fragment = collect_broken(entity_type, references, &entities);
        let broken_targets = fragment.target_count();
        if !fragment.is_empty() {
            if let Err(err) = self.store.merge(&fragment).await {
                cursor.restore_page(page);
                return Err((err.into(), cursor));
            }
        }

        cursor.advance(loaded, attempted);
        tracing::debug!(
            entity_type,
            attempted,
            loaded,
            broken_targets,
            remaining = cursor.remaining().len(),
            "page checked"
        );

        let message = step_message(cursor.attempted(), cursor.total(), entity_type);
        let progress = cursor.progress();
        let state = cursor.into_state();
        if state.is_done() {
            tracing::info!(entity_type, processed = state.processed(), "scan finished");
        }

        Ok(StepOutcome {
            state,
            progress,
            message,
            attempted,
            loaded,
            broken_targets,
        })
    }
}

/// Broken values of loaded entities, per their bundle's mapped fields
fn collect_broken(
    entity_type: &str,
    references: &TypeReferences,
    entities: &[LoadedEntity],
) -> BrokenReferenceReport {
    let mut fragment = BrokenReferenceReport::new();
    for entity in entities {
        let Some(fields) = references.fields(entity.bundle()) else {
            continue;
        };
        for field in fields.keys() {
            for item in entity.get(field) {
                if let Some(target) = item.target_id.filter(|_| item.is_broken()) {
                    fragment.record(entity_type, entity.bundle(), field, entity.id(), target);
                }
            }
        }
    }
    fragment
}

fn done_outcome(entity_type: &str, tally: ScanTally) -> StepOutcome {
    StepOutcome {
        state: ScanState::Done(tally),
        progress: Progress::DONE,
        message: step_message(tally.processed + tally.skipped, tally.total, entity_type),
        attempted: 0,
        loaded: 0,
        broken_targets: 0,
    }
}

/// `done` counts IDs attempted after this step's page, not before it
fn step_message(done: usize, total: usize, entity_type: &str) -> String {
    format!("Validating {done} of {total} broken target references in entity type {entity_type}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscan_host::{EntityId, MemoryHost, ReferenceItem};
    use refscan_report::MemoryReportStore;

    fn refs() -> TypeReferences {
        let mut refs = TypeReferences::new(Some("type".into()));
        refs.insert("article", "field_author", "uuid");
        refs
    }

    #[test]
    fn collects_only_broken_values_of_mapped_fields() {
        let set = |id| ReferenceItem {
            target_id: Some(EntityId::new(id)),
            resolved: None,
        };
        let ok = ReferenceItem {
            target_id: Some(EntityId::new(1)),
            resolved: Some(EntityId::new(1)),
        };
        let unset = ReferenceItem {
            target_id: None,
            resolved: None,
        };

        let entities = vec![
            LoadedEntity::new(EntityId::new(10), "article")
                .with_field("field_author", vec![ok, set(42), unset, set(43)])
                .with_field("field_other", vec![set(99)]),
            LoadedEntity::new(EntityId::new(11), "page").with_field("field_author", vec![set(7)]),
        ];

        let fragment = collect_broken("node", &refs(), &entities);
        assert_eq!(
            fragment.get("node", "article", "field_author", EntityId::new(10)),
            Some(&[EntityId::new(42), EntityId::new(43)][..])
        );
        assert_eq!(fragment.target_count(), 2);
    }

    #[tokio::test]
    async fn done_state_is_a_no_op() {
        let host = Arc::new(MemoryHost::builder().build());
        let coordinator = ScanCoordinator::new(host, Arc::new(MemoryReportStore::new()));

        let tally = ScanTally {
            processed: 3,
            skipped: 0,
            total: 3,
        };
        let outcome = coordinator
            .run_step("node", &refs(), ScanState::Done(tally))
            .await
            .unwrap();
        assert_eq!(outcome.state, ScanState::Done(tally));
        assert_eq!(outcome.progress, Progress::DONE);
        assert_eq!(outcome.attempted, 0);
    }

    #[test]
    fn message_format() {
        assert_eq!(
            step_message(30, 31, "node"),
            "Validating 30 of 31 broken target references in entity type node"
        );
    }

    #[test]
    fn zero_page_size_is_raised() {
        let host = Arc::new(MemoryHost::builder().build());
        let coordinator =
            ScanCoordinator::new(host, Arc::new(MemoryReportStore::new())).with_page_size(0);
        assert_eq!(coordinator.page_size(), 1);
    }
}

//! Candidate query engine

use indexmap::IndexSet;
use refscan_host::{EntityId, EntityQuery, EntityStorage, StorageError};
use refscan_topology::{ReferenceMap, TypeReferences};
use std::sync::Arc;

/// Deduplicated candidate IDs in first-seen order
pub type CandidateIds = IndexSet<EntityId>;

/// Result cap applied per (bundle, field) query when probing
pub const PROBE_LIMIT: usize = 1;

/// Query failures
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Host could not execute a candidate query
    #[error("candidate query on {entity_type}.{field} failed: {source}")]
    Storage {
        /// Entity type queried
        entity_type: String,
        /// Field being checked
        field: String,
        /// Underlying storage failure
        #[source]
        source: StorageError,
    },
}

/// Issues existence-check queries for reference map entries
#[derive(Clone)]
pub struct BrokenReferenceQuery {
    storage: Arc<dyn EntityStorage>,
}

impl std::fmt::Debug for BrokenReferenceQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokenReferenceQuery").finish_non_exhaustive()
    }
}

impl BrokenReferenceQuery {
    /// Engine over a host storage
    #[inline]
    #[must_use]
    pub fn new(storage: Arc<dyn EntityStorage>) -> Self {
        Self { storage }
    }

    /// Entities of `entity_type` with at least one dangling reference
    ///
    /// One query per mapped (bundle, field): restricted to the bundle when
    /// the type has a bundle key, requiring a positive raw value, and
    /// requiring that no target row carries the value under the target
    /// identity key. With `capped`, each query stops after [`PROBE_LIMIT`] rows.
    ///
    /// # Errors
    /// Returns error if any query fails; partial results are discarded.
    pub async fn find_candidate_ids(
        &self,
        entity_type: &str,
        references: &TypeReferences,
        capped: bool,
    ) -> Result<CandidateIds, QueryError> {
        let mut candidates = CandidateIds::new();

        for target in references.targets() {
            let mut query = EntityQuery::new(entity_type);
            if let Some(bundle_key) = &references.bundle_key {
                query = query.bundle(bundle_key.as_str(), target.bundle);
            }
            query = query
                .positive(target.field)
                .target_missing(target.field, target.target_key);
            if capped {
                query = query.range(PROBE_LIMIT);
            }

            let ids = self
                .storage
                .execute(&query)
                .await
                .map_err(|source| QueryError::Storage {
                    entity_type: entity_type.to_string(),
                    field: target.field.to_string(),
                    source,
                })?;

            tracing::trace!(
                entity_type,
                bundle = target.bundle,
                field = target.field,
                hits = ids.len(),
                "candidate query"
            );
            candidates.extend(ids);
        }

        tracing::debug!(entity_type, capped, candidates = candidates.len(), "candidates found");
        Ok(candidates)
    }

    /// Whether any entity of the type has a dangling reference
    ///
    /// # Errors
    /// Returns error if a probe query fails
    pub async fn has_candidates(
        &self,
        entity_type: &str,
        references: &TypeReferences,
    ) -> Result<bool, QueryError> {
        Ok(!self
            .find_candidate_ids(entity_type, references, true)
            .await?
            .is_empty())
    }

    /// Rough count of entity types with at least one broken reference
    ///
    /// Advisory only: one capped probe per type, counting 1 per type with a
    /// hit.
    ///
    /// # Errors
    /// Returns error if a probe query fails
    pub async fn count_candidate_types(&self, map: &ReferenceMap) -> Result<usize, QueryError> {
        let mut types = 0;
        for (entity_type, references) in map.iter() {
            if self.has_candidates(entity_type, references).await? {
                types += 1;
            }
        }
        Ok(types)
    }
}

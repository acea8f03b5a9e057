//! Testing utilities for the refscan workspace
//!
//! Shared site fixtures and fault-injecting collaborators.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use refscan_host::{
    EntityId, EntityQuery, EntityStorage, EntityTypeDefinition, LoadedEntity, MemoryField,
    MemoryHost, StorageError, ENTITY_REFERENCE,
};
use refscan_report::{BrokenReferenceReport, MemoryReportStore, ReportStore, StoreError};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Target ID of the single dangling reference in [`single_broken_reference`]
pub const DELETED_TARGET: u64 = 42;

/// `node` article 1 has `ref` pointing at deleted user 42; node 2 points at
/// existing user 7.
pub fn single_broken_reference() -> MemoryHost {
    MemoryHost::builder()
        .entity_type("node", Some("type"))
        .entity_type("user", None)
        .reference_field("node", "article", "ref", "user")
        .entity("user", 7, "user", &[])
        .entity("node", 1, "article", &[("ref", &[DELETED_TARGET])])
        .entity("node", 2, "article", &[("ref", &[7])])
        .build()
}

/// `n` article nodes, IDs `1..=n`, each referencing a distinct missing user
pub fn bulk_candidates(n: u64) -> MemoryHost {
    let mut builder = MemoryHost::builder()
        .entity_type("node", Some("type"))
        .entity_type("user", None)
        .reference_field("node", "article", "field_author", "user");
    for id in 1..=n {
        builder = builder.entity("node", id, "article", &[("field_author", &[1000 + id])]);
    }
    builder.build()
}

/// Every reference resolves
pub fn clean_site() -> MemoryHost {
    MemoryHost::builder()
        .entity_type("node", Some("type"))
        .entity_type("user", None)
        .entity_type("taxonomy_term", Some("vid"))
        .reference_field("node", "article", "field_author", "user")
        .reference_field("node", "article", "field_tags", "taxonomy_term")
        .entity("user", 1, "user", &[])
        .entity("taxonomy_term", 5, "tags", &[])
        .entity("node", 10, "article", &[("field_author", &[1]), ("field_tags", &[5])])
        .entity("node", 11, "article", &[("field_author", &[0])])
        .build()
}

/// Several types and bundles, an excluded comment field, a computed field
/// and a target type without an identity key
///
/// Broken: node 10 author 42 and tags 8, 9; node 12 author 43;
/// term 20 parent 99. The comment's `entity_id` is dangling but excluded.
pub fn mixed_site() -> MemoryHost {
    MemoryHost::builder()
        .entity_type("node", Some("type"))
        .entity_type("user", None)
        .entity_type("taxonomy_term", Some("vid"))
        .entity_type("comment", Some("comment_type"))
        .entity_type_definition(EntityTypeDefinition {
            uuid_key: None,
            ..EntityTypeDefinition::new("legacy", None)
        })
        .reference_field("node", "article", "field_author", "user")
        .reference_field("node", "article", "field_tags", "taxonomy_term")
        .reference_field("node", "page", "field_author", "user")
        .reference_field("node", "page", "field_legacy", "legacy")
        .reference_field("taxonomy_term", "tags", "parent", "taxonomy_term")
        .reference_field("comment", "comment", "entity_id", "node")
        .field(MemoryField {
            entity_type: "node".into(),
            bundle: "article".into(),
            name: "field_computed".into(),
            kind: ENTITY_REFERENCE.into(),
            computed: true,
            target_entity_type: "user".into(),
        })
        .entity("user", 1, "user", &[])
        .entity("taxonomy_term", 5, "tags", &[])
        .entity("taxonomy_term", 20, "tags", &[("parent", &[99])])
        .entity(
            "node",
            10,
            "article",
            &[("field_author", &[42]), ("field_tags", &[5, 8, 9])],
        )
        .entity("node", 11, "article", &[("field_author", &[1])])
        .entity("node", 12, "page", &[("field_author", &[43]), ("field_legacy", &[77])])
        .entity("comment", 30, "comment", &[("entity_id", &[404])])
        .build()
}

/// Storage wrapper that loses chosen IDs on load, fails the first loads on
/// request and records every load call
pub struct FlakyStorage {
    inner: Arc<dyn EntityStorage>,
    dropped: Mutex<BTreeSet<EntityId>>,
    failing_loads: Mutex<usize>,
    loads: Mutex<Vec<Vec<EntityId>>>,
}

impl FlakyStorage {
    pub fn new(inner: Arc<dyn EntityStorage>) -> Self {
        Self {
            inner,
            dropped: Mutex::new(BTreeSet::new()),
            failing_loads: Mutex::new(0),
            loads: Mutex::new(Vec::new()),
        }
    }

    /// Make these IDs absent from every later load
    pub fn drop_on_load(&self, ids: impl IntoIterator<Item = u64>) {
        self.dropped
            .lock()
            .extend(ids.into_iter().map(EntityId::new));
    }

    /// Fail the next `n` bulk loads
    pub fn fail_next_loads(&self, n: usize) {
        *self.failing_loads.lock() = n;
    }

    /// IDs requested by each load call, in call order
    pub fn load_calls(&self) -> Vec<Vec<EntityId>> {
        self.loads.lock().clone()
    }
}

#[async_trait]
impl EntityStorage for FlakyStorage {
    async fn execute(&self, query: &EntityQuery) -> Result<Vec<EntityId>, StorageError> {
        self.inner.execute(query).await
    }

    async fn load_multiple(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<Vec<LoadedEntity>, StorageError> {
        self.loads.lock().push(ids.to_vec());
        {
            let mut failing = self.failing_loads.lock();
            if *failing > 0 {
                *failing -= 1;
                return Err(StorageError::Backend("injected load failure".into()));
            }
        }
        let mut loaded = self.inner.load_multiple(entity_type, ids).await?;
        let dropped = self.dropped.lock().clone();
        loaded.retain(|entity| !dropped.contains(&entity.id()));
        Ok(loaded)
    }
}

/// Report store that fails the first `n` merges, then delegates to memory
#[derive(Debug, Default)]
pub struct FailingReportStore {
    inner: MemoryReportStore,
    failures_left: Mutex<usize>,
    merge_attempts: Mutex<usize>,
}

impl FailingReportStore {
    pub fn failing_first(n: usize) -> Self {
        Self {
            inner: MemoryReportStore::new(),
            failures_left: Mutex::new(n),
            merge_attempts: Mutex::new(0),
        }
    }

    pub fn merge_attempts(&self) -> usize {
        *self.merge_attempts.lock()
    }
}

#[async_trait]
impl ReportStore for FailingReportStore {
    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn merge(&self, fragment: &BrokenReferenceReport) -> Result<(), StoreError> {
        *self.merge_attempts.lock() += 1;
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Backend("injected merge failure".into()));
            }
        }
        self.inner.merge(fragment).await
    }

    async fn read(&self) -> Result<BrokenReferenceReport, StoreError> {
        self.inner.read().await
    }
}

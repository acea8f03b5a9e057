//! Entity storage collaborator
//!
//! Provides the [`EntityQuery`] builder describing an existence-check query,
//! and [`EntityStorage`] which executes those queries and bulk-loads entities.

use crate::ids::EntityId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One filter of an [`EntityQuery`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Bundle key equals the given bundle
    BundleEquals {
        /// Bundle discriminator field
        key: String,
        /// Required bundle
        bundle: String,
    },

    /// Field has at least one raw value greater than zero
    Positive {
        /// Field name
        field: String,
    },

    /// Field has a value whose target has no row with the identity key set
    TargetMissing {
        /// Field name
        field: String,
        /// Identity key that must exist on the target
        identity_key: String,
    },
}

/// Query over one entity type, built by the caller and executed by the host
///
/// Access checks are never applied; the scanner must see every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQuery {
    entity_type: String,
    conditions: Vec<Condition>,
    limit: Option<usize>,
}

impl EntityQuery {
    /// Unfiltered query over an entity type
    #[inline]
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            conditions: Vec::new(),
            limit: None,
        }
    }

    /// Restrict to a bundle
    #[must_use]
    pub fn bundle(mut self, key: impl Into<String>, bundle: impl Into<String>) -> Self {
        self.conditions.push(Condition::BundleEquals {
            key: key.into(),
            bundle: bundle.into(),
        });
        self
    }

    /// Require a positive raw value on `field`
    #[must_use]
    pub fn positive(mut self, field: impl Into<String>) -> Self {
        self.conditions.push(Condition::Positive {
            field: field.into(),
        });
        self
    }

    /// Require that `field` points at a target lacking `identity_key`
    #[must_use]
    pub fn target_missing(
        mut self,
        field: impl Into<String>,
        identity_key: impl Into<String>,
    ) -> Self {
        self.conditions.push(Condition::TargetMissing {
            field: field.into(),
            identity_key: identity_key.into(),
        });
        self
    }

    /// Cap the number of returned IDs
    #[inline]
    #[must_use]
    pub fn range(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Entity type queried
    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Filters in insertion order
    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Result cap, if any
    #[inline]
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// One value of a (possibly multi-valued) reference field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItem {
    /// Raw stored target; `None` when the value is unset
    pub target_id: Option<EntityId>,

    /// Target entity, when it could be loaded
    pub resolved: Option<EntityId>,
}

impl ReferenceItem {
    /// Target is set but does not resolve
    #[inline]
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.target_id.is_some() && self.resolved.is_none()
    }
}

/// A loaded content entity, reduced to what reference checking needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedEntity {
    id: EntityId,
    bundle: String,
    fields: BTreeMap<String, Vec<ReferenceItem>>,
}

impl LoadedEntity {
    /// Entity without reference values
    #[must_use]
    pub fn new(id: EntityId, bundle: impl Into<String>) -> Self {
        Self {
            id,
            bundle: bundle.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach the values of one field
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, items: Vec<ReferenceItem>) -> Self {
        self.fields.insert(field.into(), items);
        self
    }

    /// Entity ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Bundle the entity belongs to
    #[inline]
    #[must_use]
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// Values of a field; empty when the field is absent
    #[must_use]
    pub fn get(&self, field: &str) -> &[ReferenceItem] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Storage failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Entity type has no storage
    #[error("no storage for entity type: {0}")]
    UnknownEntityType(String),

    /// Query references a field the type does not have
    #[error("unknown field in query: {entity_type}.{field}")]
    UnknownField {
        /// Entity type
        entity_type: String,
        /// Field name
        field: String,
    },

    /// Host-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Query execution and bulk loading on the host
#[async_trait]
pub trait EntityStorage: Send + Sync {
    /// Run a query and return matching IDs in storage order
    ///
    /// # Errors
    /// Returns error if the query cannot be executed
    async fn execute(&self, query: &EntityQuery) -> Result<Vec<EntityId>, StorageError>;

    /// Load entities by ID
    ///
    /// IDs that cannot be loaded are absent from the result; that is not an
    /// error.
    ///
    /// # Errors
    /// Returns error if the storage itself is unavailable
    async fn load_multiple(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<Vec<LoadedEntity>, StorageError>;
}

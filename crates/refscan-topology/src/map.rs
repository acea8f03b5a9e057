//! Reference map
//!
//! Resolved topology of which (entity type, bundle, field) triples must be
//! checked, and the identity key each target must have.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference fields of one entity type
///
/// Immutable for the duration of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeReferences {
    /// Bundle discriminator field; `None` for bundle-less types
    pub bundle_key: Option<String>,

    /// Bundle → field → target identity key
    pub bundles: BTreeMap<String, BTreeMap<String, String>>,
}

/// One mapped (bundle, field) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTarget<'a> {
    /// Bundle
    pub bundle: &'a str,
    /// Field name
    pub field: &'a str,
    /// Identity key checked on the target
    pub target_key: &'a str,
}

impl TypeReferences {
    /// No fields yet
    #[inline]
    #[must_use]
    pub fn new(bundle_key: Option<String>) -> Self {
        Self {
            bundle_key,
            bundles: BTreeMap::new(),
        }
    }

    /// Map a field on a bundle
    pub fn insert(
        &mut self,
        bundle: impl Into<String>,
        field: impl Into<String>,
        target_key: impl Into<String>,
    ) {
        self.bundles
            .entry(bundle.into())
            .or_default()
            .insert(field.into(), target_key.into());
    }

    /// Fields to check on a bundle
    #[inline]
    #[must_use]
    pub fn fields(&self, bundle: &str) -> Option<&BTreeMap<String, String>> {
        self.bundles.get(bundle)
    }

    /// Identity key for a (bundle, field) pair
    #[must_use]
    pub fn target_key(&self, bundle: &str, field: &str) -> Option<&str> {
        self.fields(bundle)?.get(field).map(String::as_str)
    }

    /// Every mapped pair, ordered by bundle then field
    pub fn targets(&self) -> impl Iterator<Item = FieldTarget<'_>> {
        self.bundles.iter().flat_map(|(bundle, fields)| {
            fields.iter().map(move |(field, key)| FieldTarget {
                bundle,
                field,
                target_key: key,
            })
        })
    }

    /// Number of mapped pairs
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.bundles.values().map(BTreeMap::len).sum()
    }

    /// No field mapped
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    /// Union another entry's fields into this one
    ///
    /// Field names are unique within a bundle, so nothing is overwritten in
    /// practice; an existing key wins if it ever is.
    pub fn merge(&mut self, other: TypeReferences) {
        if self.bundle_key.is_none() {
            self.bundle_key = other.bundle_key;
        }
        for (bundle, fields) in other.bundles {
            let existing = self.bundles.entry(bundle).or_default();
            for (field, key) in fields {
                existing.entry(field).or_insert(key);
            }
        }
    }
}

/// Entity type → reference fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceMap {
    types: BTreeMap<String, TypeReferences>,
}

impl ReferenceMap {
    /// Empty map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge an entity type's entry; empty entries are dropped
    pub fn insert(&mut self, entity_type: impl Into<String>, references: TypeReferences) {
        if references.is_empty() {
            return;
        }
        match self.types.entry(entity_type.into()) {
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                slot.get_mut().merge(references);
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(references);
            }
        }
    }

    /// Merge a map resolved for another field kind
    pub fn merge(&mut self, other: ReferenceMap) {
        for (entity_type, references) in other.types {
            self.insert(entity_type, references);
        }
    }

    /// Entry for an entity type
    #[inline]
    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&TypeReferences> {
        self.types.get(entity_type)
    }

    /// Whether the type has any mapped field
    #[inline]
    #[must_use]
    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    /// Entries in entity type order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeReferences)> {
        self.types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mapped entity types
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of entity types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// No entity type mapped
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl IntoIterator for ReferenceMap {
    type Item = (String, TypeReferences);
    type IntoIter = std::collections::btree_map::IntoIter<String, TypeReferences>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.into_iter()
    }
}

//! Schema introspection collaborator
//!
//! Provides [`SchemaIntrospection`], the read-only view of the host's entity
//! types and field definitions that topology resolution walks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field kind of the generic entity reference field
pub const ENTITY_REFERENCE: &str = "entity_reference";

/// Entity type → field name → usage of a field kind
pub type FieldMap = BTreeMap<String, BTreeMap<String, FieldMapEntry>>;

/// Where a field of a given kind is attached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapEntry {
    /// Bundles of the entity type carrying the field
    pub bundles: Vec<String>,
}

/// Definition of an entity type as far as reference checking is concerned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    /// Machine name of the type
    pub id: String,

    /// Field discriminating bundles; `None` when the type has no bundles
    #[serde(default)]
    pub bundle_key: Option<String>,

    /// Unique external identity key (UUID-style), if the type has one
    #[serde(default = "default_uuid_key")]
    pub uuid_key: Option<String>,

    /// Whether entities of this type can be loaded and carry fields
    #[serde(default = "default_fieldable")]
    pub fieldable: bool,
}

fn default_uuid_key() -> Option<String> {
    Some("uuid".to_string())
}

fn default_fieldable() -> bool {
    true
}

impl EntityTypeDefinition {
    /// Fieldable type with a `uuid` identity key
    #[must_use]
    pub fn new(id: impl Into<String>, bundle_key: Option<&str>) -> Self {
        Self {
            id: id.into(),
            bundle_key: bundle_key.map(str::to_string),
            uuid_key: Some("uuid".to_string()),
            fieldable: true,
        }
    }

    /// Mark the type as not fieldable
    #[inline]
    #[must_use]
    pub fn not_fieldable(mut self) -> Self {
        self.fieldable = false;
        self
    }

    /// The key a reference target must have for the reference to be valid
    #[inline]
    #[must_use]
    pub fn identity_key(&self) -> Option<&str> {
        self.uuid_key.as_deref()
    }
}

/// Definition of one field on one bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field machine name
    pub name: String,

    /// Field kind, e.g. [`ENTITY_REFERENCE`]
    pub kind: String,

    /// Derived at runtime rather than stored
    #[serde(default)]
    pub computed: bool,

    /// Entity type the field points at (from the field's storage settings)
    pub target_entity_type: String,
}

/// Schema introspection failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Entity type is not defined on the host
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Field is not defined on the given bundle
    #[error("unknown field {entity_type}.{bundle}.{field}")]
    UnknownField {
        /// Entity type
        entity_type: String,
        /// Bundle
        bundle: String,
        /// Field name
        field: String,
    },

    /// Host-specific failure
    #[error("schema backend error: {0}")]
    Backend(String),
}

/// Read-only schema of the host platform
pub trait SchemaIntrospection: Send + Sync {
    /// Every (entity type, field) using `kind`, with the bundles it appears in
    ///
    /// # Errors
    /// Returns error if the host cannot enumerate its field map
    fn field_map_by_kind(&self, kind: &str) -> Result<FieldMap, SchemaError>;

    /// Definition of an entity type
    ///
    /// # Errors
    /// Returns [`SchemaError::UnknownEntityType`] for undefined types
    fn entity_type(&self, entity_type: &str) -> Result<EntityTypeDefinition, SchemaError>;

    /// Definition of a field on a bundle
    ///
    /// # Errors
    /// Returns [`SchemaError::UnknownField`] if the bundle lacks the field
    fn field_definition(
        &self,
        entity_type: &str,
        bundle: &str,
        field: &str,
    ) -> Result<FieldDefinition, SchemaError>;

    /// Whether entities of the type are individually loadable with fields
    ///
    /// # Errors
    /// Returns [`SchemaError::UnknownEntityType`] for undefined types
    fn is_fieldable(&self, entity_type: &str) -> Result<bool, SchemaError> {
        Ok(self.entity_type(entity_type)?.fieldable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_type_is_fieldable_with_uuid() {
        let def = EntityTypeDefinition::new("node", Some("type"));
        assert!(def.fieldable);
        assert_eq!(def.identity_key(), Some("uuid"));
        assert_eq!(def.bundle_key.as_deref(), Some("type"));
    }

    #[test]
    fn definition_defaults_when_deserialized() {
        let def: EntityTypeDefinition = serde_json::from_str(r#"{"id":"user"}"#).unwrap();
        assert!(def.fieldable);
        assert_eq!(def.bundle_key, None);
        assert_eq!(def.identity_key(), Some("uuid"));
    }

    #[test]
    fn explicit_null_identity_key() {
        let def: EntityTypeDefinition =
            serde_json::from_str(r#"{"id":"path_alias","uuid_key":null}"#).unwrap();
        assert_eq!(def.identity_key(), None);
    }
}

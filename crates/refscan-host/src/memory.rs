//! In-memory host
//!
//! [`MemoryHost`] holds a complete dataset (entity types, field definitions,
//! entities) and implements both [`SchemaIntrospection`] and
//! [`EntityStorage`] over it. The dataset is serde-friendly so a snapshot of a
//! real site can be scanned from a JSON file.

use crate::ids::EntityId;
use crate::schema::{
    EntityTypeDefinition, FieldDefinition, FieldMap, FieldMapEntry, SchemaError,
    SchemaIntrospection, ENTITY_REFERENCE,
};
use crate::storage::{Condition, EntityQuery, EntityStorage, LoadedEntity, ReferenceItem, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Field definition attached to one bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryField {
    /// Owning entity type
    pub entity_type: String,
    /// Owning bundle
    pub bundle: String,
    /// Field name
    pub name: String,
    /// Field kind
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Derived rather than stored
    #[serde(default)]
    pub computed: bool,
    /// Entity type the field targets
    pub target_entity_type: String,
}

fn default_kind() -> String {
    ENTITY_REFERENCE.to_string()
}

/// Stored entity with its raw reference values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntity {
    /// Entity type
    pub entity_type: String,
    /// Entity ID
    pub id: EntityId,
    /// Bundle; bundle-less types use the entity type name
    pub bundle: String,
    /// Field name → raw target IDs (0 = unset)
    #[serde(default)]
    pub values: BTreeMap<String, Vec<u64>>,
}

/// Serializable snapshot of a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDataset {
    /// Entity type definitions
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDefinition>,
    /// Field definitions
    #[serde(default)]
    pub fields: Vec<MemoryField>,
    /// Entities
    #[serde(default)]
    pub entities: Vec<MemoryEntity>,
}

/// Dataset loading failures
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// File could not be read
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid dataset
    #[error("invalid dataset: {0}")]
    Json(#[from] serde_json::Error),
}

type FieldKey = (String, String, String);

#[derive(Debug, Default)]
struct Tables {
    types: BTreeMap<String, EntityTypeDefinition>,
    fields: BTreeMap<FieldKey, MemoryField>,
    entities: BTreeMap<String, BTreeMap<EntityId, MemoryEntity>>,
}

impl Tables {
    fn from_dataset(dataset: MemoryDataset) -> Self {
        let mut tables = Self::default();
        for def in dataset.entity_types {
            tables.entities.entry(def.id.clone()).or_default();
            tables.types.insert(def.id.clone(), def);
        }
        for field in dataset.fields {
            let key = (
                field.entity_type.clone(),
                field.bundle.clone(),
                field.name.clone(),
            );
            tables.fields.insert(key, field);
        }
        for entity in dataset.entities {
            tables
                .entities
                .entry(entity.entity_type.clone())
                .or_default()
                .insert(entity.id, entity);
        }
        tables
    }

    fn field(&self, entity_type: &str, bundle: &str, field: &str) -> Option<&MemoryField> {
        self.fields
            .get(&(entity_type.to_string(), bundle.to_string(), field.to_string()))
    }

    fn target_exists(&self, target_type: &str, id: EntityId) -> bool {
        self.entities
            .get(target_type)
            .is_some_and(|rows| rows.contains_key(&id))
    }

    /// A target row with `identity_key` exists for the raw value
    fn target_has_identity(&self, target_type: &str, id: EntityId, identity_key: &str) -> bool {
        let keyed = self
            .types
            .get(target_type)
            .and_then(EntityTypeDefinition::identity_key)
            == Some(identity_key);
        keyed && self.target_exists(target_type, id)
    }

    fn matches(&self, entity: &MemoryEntity, condition: &Condition) -> bool {
        match condition {
            Condition::BundleEquals { bundle, .. } => entity.bundle == *bundle,
            Condition::Positive { field } => entity
                .values
                .get(field)
                .is_some_and(|values| values.iter().any(|v| *v > 0)),
            Condition::TargetMissing {
                field,
                identity_key,
            } => {
                let Some(def) = self.field(&entity.entity_type, &entity.bundle, field) else {
                    return false;
                };
                entity.values.get(field).is_some_and(|values| {
                    values.iter().filter_map(|v| EntityId::from_raw(*v)).any(|id| {
                        !self.target_has_identity(&def.target_entity_type, id, identity_key)
                    })
                })
            }
        }
    }

    fn load(&self, entity: &MemoryEntity) -> LoadedEntity {
        let mut loaded = LoadedEntity::new(entity.id, entity.bundle.clone());
        for (name, values) in &entity.values {
            let Some(def) = self.field(&entity.entity_type, &entity.bundle, name) else {
                continue;
            };
            let items = values
                .iter()
                .map(|raw| {
                    let target_id = EntityId::from_raw(*raw);
                    let resolved =
                        target_id.filter(|id| self.target_exists(&def.target_entity_type, *id));
                    ReferenceItem {
                        target_id,
                        resolved,
                    }
                })
                .collect();
            loaded = loaded.with_field(name.clone(), items);
        }
        loaded
    }
}

/// In-memory host platform
#[derive(Debug, Default)]
pub struct MemoryHost {
    tables: RwLock<Tables>,
}

impl MemoryHost {
    /// Host over a dataset
    #[must_use]
    pub fn from_dataset(dataset: MemoryDataset) -> Self {
        Self {
            tables: RwLock::new(Tables::from_dataset(dataset)),
        }
    }

    /// Parse a JSON dataset
    ///
    /// # Errors
    /// Returns error if the JSON does not describe a dataset
    pub fn from_json_str(json: &str) -> Result<Self, DatasetError> {
        Ok(Self::from_dataset(serde_json::from_str(json)?))
    }

    /// Read a JSON dataset file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Start building a dataset fluently
    #[inline]
    #[must_use]
    pub fn builder() -> MemoryHostBuilder {
        MemoryHostBuilder::default()
    }

    /// Delete an entity; returns whether it existed
    pub fn delete(&self, entity_type: &str, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        let mut tables = self.tables.write();
        tables
            .entities
            .get_mut(entity_type)
            .and_then(|rows| rows.remove(&id))
            .is_some()
    }

    /// Insert or replace an entity
    pub fn upsert(&self, entity: MemoryEntity) {
        let mut tables = self.tables.write();
        tables
            .entities
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.id, entity);
    }

    /// Number of stored entities of a type
    #[must_use]
    pub fn count(&self, entity_type: &str) -> usize {
        self.tables
            .read()
            .entities
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    /// Snapshot the current dataset
    #[must_use]
    pub fn dataset(&self) -> MemoryDataset {
        let tables = self.tables.read();
        MemoryDataset {
            entity_types: tables.types.values().cloned().collect(),
            fields: tables.fields.values().cloned().collect(),
            entities: tables
                .entities
                .values()
                .flat_map(|rows| rows.values().cloned())
                .collect(),
        }
    }
}

impl SchemaIntrospection for MemoryHost {
    fn field_map_by_kind(&self, kind: &str) -> Result<FieldMap, SchemaError> {
        let tables = self.tables.read();
        let mut map = FieldMap::new();
        for field in tables.fields.values().filter(|f| f.kind == kind) {
            let entry: &mut FieldMapEntry = map
                .entry(field.entity_type.clone())
                .or_default()
                .entry(field.name.clone())
                .or_default();
            if !entry.bundles.contains(&field.bundle) {
                entry.bundles.push(field.bundle.clone());
            }
        }
        Ok(map)
    }

    fn entity_type(&self, entity_type: &str) -> Result<EntityTypeDefinition, SchemaError> {
        self.tables
            .read()
            .types
            .get(entity_type)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownEntityType(entity_type.to_string()))
    }

    fn field_definition(
        &self,
        entity_type: &str,
        bundle: &str,
        field: &str,
    ) -> Result<FieldDefinition, SchemaError> {
        let tables = self.tables.read();
        let def = tables
            .field(entity_type, bundle, field)
            .ok_or_else(|| SchemaError::UnknownField {
                entity_type: entity_type.to_string(),
                bundle: bundle.to_string(),
                field: field.to_string(),
            })?;
        Ok(FieldDefinition {
            name: def.name.clone(),
            kind: def.kind.clone(),
            computed: def.computed,
            target_entity_type: def.target_entity_type.clone(),
        })
    }
}

#[async_trait]
impl EntityStorage for MemoryHost {
    async fn execute(&self, query: &EntityQuery) -> Result<Vec<EntityId>, StorageError> {
        let tables = self.tables.read();
        if !tables.types.contains_key(query.entity_type()) {
            return Err(StorageError::UnknownEntityType(
                query.entity_type().to_string(),
            ));
        }
        let Some(rows) = tables.entities.get(query.entity_type()) else {
            return Ok(Vec::new());
        };

        let matching = rows
            .values()
            .filter(|entity| query.conditions().iter().all(|c| tables.matches(entity, c)))
            .map(|entity| entity.id);

        let ids: Vec<EntityId> = match query.limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        };
        tracing::trace!(entity_type = query.entity_type(), hits = ids.len(), "memory query");
        Ok(ids)
    }

    async fn load_multiple(
        &self,
        entity_type: &str,
        ids: &[EntityId],
    ) -> Result<Vec<LoadedEntity>, StorageError> {
        let tables = self.tables.read();
        let rows = tables
            .entities
            .get(entity_type)
            .ok_or_else(|| StorageError::UnknownEntityType(entity_type.to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id))
            .map(|entity| tables.load(entity))
            .collect())
    }
}

/// Fluent construction of a [`MemoryHost`]
#[derive(Debug, Default)]
pub struct MemoryHostBuilder {
    dataset: MemoryDataset,
}

impl MemoryHostBuilder {
    /// Fieldable entity type with a `uuid` identity key
    #[must_use]
    pub fn entity_type(self, id: &str, bundle_key: Option<&str>) -> Self {
        self.entity_type_definition(EntityTypeDefinition::new(id, bundle_key))
    }

    /// Entity type with an explicit definition
    #[must_use]
    pub fn entity_type_definition(mut self, def: EntityTypeDefinition) -> Self {
        self.dataset.entity_types.push(def);
        self
    }

    /// Stored `entity_reference` field on a bundle
    #[must_use]
    pub fn reference_field(self, entity_type: &str, bundle: &str, name: &str, target: &str) -> Self {
        self.field(MemoryField {
            entity_type: entity_type.to_string(),
            bundle: bundle.to_string(),
            name: name.to_string(),
            kind: ENTITY_REFERENCE.to_string(),
            computed: false,
            target_entity_type: target.to_string(),
        })
    }

    /// Arbitrary field definition
    #[must_use]
    pub fn field(mut self, field: MemoryField) -> Self {
        self.dataset.fields.push(field);
        self
    }

    /// Entity with raw reference values
    #[must_use]
    pub fn entity(mut self, entity_type: &str, id: u64, bundle: &str, values: &[(&str, &[u64])]) -> Self {
        self.dataset.entities.push(MemoryEntity {
            entity_type: entity_type.to_string(),
            id: EntityId::new(id),
            bundle: bundle.to_string(),
            values: values
                .iter()
                .map(|(field, raw)| ((*field).to_string(), raw.to_vec()))
                .collect(),
        });
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> MemoryHost {
        MemoryHost::from_dataset(self.dataset)
    }
}

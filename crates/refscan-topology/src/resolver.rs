//! Field topology resolver
//!
//! Walks every reference-capable field kind on the host and keeps only the
//! fields whose stored values can be meaningfully checked.

use crate::exclusion::ExclusionList;
use crate::map::{ReferenceMap, TypeReferences};
use refscan_host::{SchemaError, SchemaIntrospection, ENTITY_REFERENCE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the resolver walks and what it skips
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Field kinds holding entity references
    pub kinds: Vec<String>,

    /// Known-anomaly (entity type, field) pairs
    pub exclusions: ExclusionList,
}

impl ResolverOptions {
    /// Also walk another reference-like field kind
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Replace the exclusion list
    #[inline]
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: ExclusionList) -> Self {
        self.exclusions = exclusions;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            kinds: vec![ENTITY_REFERENCE.to_string()],
            exclusions: ExclusionList::default(),
        }
    }
}

/// Builds the [`ReferenceMap`] from the host schema
pub struct TopologyResolver {
    schema: Arc<dyn SchemaIntrospection>,
    options: ResolverOptions,
}

impl std::fmt::Debug for TopologyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TopologyResolver {
    /// Resolver over a schema
    #[inline]
    #[must_use]
    pub fn new(schema: Arc<dyn SchemaIntrospection>, options: ResolverOptions) -> Self {
        Self { schema, options }
    }

    /// Options in effect
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve every reference field that must be checked
    ///
    /// Results of all configured kinds are merged field by field. Entity
    /// types without a single checkable field are omitted.
    ///
    /// # Errors
    /// Any introspection failure aborts resolution; no partial map is
    /// returned.
    pub fn resolve_reference_fields(&self) -> Result<ReferenceMap, SchemaError> {
        let mut map = ReferenceMap::new();
        for kind in &self.options.kinds {
            let resolved = self.resolve_kind(kind)?;
            tracing::debug!(kind = %kind, entity_types = resolved.len(), "resolved field kind");
            map.merge(resolved);
        }
        tracing::info!(entity_types = map.len(), "reference map resolved");
        Ok(map)
    }

    fn resolve_kind(&self, kind: &str) -> Result<ReferenceMap, SchemaError> {
        let mut map = ReferenceMap::new();

        for (entity_type, fields) in self.schema.field_map_by_kind(kind)? {
            let definition = self.schema.entity_type(&entity_type)?;
            let bundle_key = definition.bundle_key.as_deref();
            let mut references = TypeReferences::new(definition.bundle_key.clone());

            for (field, usage) in &fields {
                if bundle_key == Some(field.as_str()) {
                    continue;
                }
                if self.options.exclusions.contains(&entity_type, field) {
                    tracing::debug!(%entity_type, %field, "excluded field");
                    continue;
                }

                for bundle in &usage.bundles {
                    let field_definition =
                        self.schema.field_definition(&entity_type, bundle, field)?;
                    if field_definition.computed {
                        continue;
                    }

                    let target = field_definition.target_entity_type.as_str();
                    if !self.schema.is_fieldable(target)? {
                        tracing::debug!(%entity_type, %bundle, %field, target_type = target, "target not fieldable");
                        continue;
                    }

                    let target_definition = self.schema.entity_type(target)?;
                    let Some(identity_key) = target_definition.identity_key() else {
                        tracing::warn!(
                            %entity_type,
                            %bundle,
                            %field,
                            target_type = target,
                            "target type has no identity key, field skipped"
                        );
                        continue;
                    };

                    references.insert(bundle.as_str(), field.as_str(), identity_key);
                }
            }

            map.insert(entity_type, references);
        }

        Ok(map)
    }
}

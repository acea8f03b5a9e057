//! Typed broken reference report

use crate::summary::{ReportSummary, SummaryRow};
use refscan_host::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Sources = BTreeMap<EntityId, Vec<EntityId>>;
type Fields = BTreeMap<String, Sources>;
type Bundles = BTreeMap<String, Fields>;

/// One source entity field with its broken targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenReference {
    /// Entity type of the source
    pub entity_type: String,
    /// Bundle of the source
    pub bundle: String,
    /// Reference field
    pub field: String,
    /// Source entity
    pub source_id: EntityId,
    /// Broken targets in discovery order
    pub targets: Vec<EntityId>,
}

/// Entity type → bundle → field → source entity → broken targets
///
/// The same type serves as the full report and as the fragment a single
/// scan step produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokenReferenceReport {
    types: BTreeMap<String, Bundles>,
}

impl BrokenReferenceReport {
    /// Empty report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one broken target
    pub fn record(
        &mut self,
        entity_type: &str,
        bundle: &str,
        field: &str,
        source_id: EntityId,
        target_id: EntityId,
    ) {
        self.targets_mut(entity_type, bundle, field, source_id)
            .push(target_id);
    }

    fn targets_mut(
        &mut self,
        entity_type: &str,
        bundle: &str,
        field: &str,
        source_id: EntityId,
    ) -> &mut Vec<EntityId> {
        self.types
            .entry(entity_type.to_string())
            .or_default()
            .entry(bundle.to_string())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .entry(source_id)
            .or_default()
    }

    /// Merge a fragment by appending its targets
    pub fn merge(&mut self, fragment: BrokenReferenceReport) {
        for (entity_type, bundles) in fragment.types {
            for (bundle, fields) in bundles {
                for (field, sources) in fields {
                    for (source_id, targets) in sources {
                        self.targets_mut(&entity_type, &bundle, &field, source_id)
                            .extend(targets);
                    }
                }
            }
        }
    }

    /// Broken targets of one source field
    #[must_use]
    pub fn get(
        &self,
        entity_type: &str,
        bundle: &str,
        field: &str,
        source_id: EntityId,
    ) -> Option<&[EntityId]> {
        self.types
            .get(entity_type)?
            .get(bundle)?
            .get(field)?
            .get(&source_id)
            .map(Vec::as_slice)
    }

    /// Flat records ordered by entity type, bundle, field and source
    pub fn records(&self) -> impl Iterator<Item = BrokenReference> + '_ {
        self.types.iter().flat_map(|(entity_type, bundles)| {
            bundles.iter().flat_map(move |(bundle, fields)| {
                fields.iter().flat_map(move |(field, sources)| {
                    sources.iter().map(move |(source_id, targets)| BrokenReference {
                        entity_type: entity_type.clone(),
                        bundle: bundle.clone(),
                        field: field.clone(),
                        source_id: *source_id,
                        targets: targets.clone(),
                    })
                })
            })
        })
    }

    /// Entity types with findings
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// No findings
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Number of source entity fields with at least one broken target
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources().count()
    }

    /// Number of broken targets, duplicates included
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.sources().map(|(_, targets)| targets.len()).sum()
    }

    fn sources(&self) -> impl Iterator<Item = (&EntityId, &Vec<EntityId>)> {
        self.types
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::iter)
    }

    /// One row per (entity type, bundle, field)
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        let mut rows = Vec::new();
        for (entity_type, bundles) in &self.types {
            for (bundle, fields) in bundles {
                for (field, sources) in fields {
                    rows.push(SummaryRow {
                        index: rows.len() + 1,
                        entity_type: entity_type.clone(),
                        bundle: bundle.clone(),
                        field: field.clone(),
                        source_amount: sources.len(),
                        target_amount: sources.values().map(Vec::len).sum(),
                    });
                }
            }
        }
        ReportSummary::from_rows(rows)
    }
}

impl FromIterator<BrokenReference> for BrokenReferenceReport {
    fn from_iter<I: IntoIterator<Item = BrokenReference>>(iter: I) -> Self {
        let mut report = Self::new();
        for record in iter {
            report
                .targets_mut(
                    &record.entity_type,
                    &record.bundle,
                    &record.field,
                    record.source_id,
                )
                .extend(record.targets);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EntityId {
        EntityId::new(n)
    }

    #[test]
    fn record_keeps_discovery_order() {
        let mut report = BrokenReferenceReport::new();
        report.record("node", "article", "field_tags", id(1), id(9));
        report.record("node", "article", "field_tags", id(1), id(3));

        assert_eq!(
            report.get("node", "article", "field_tags", id(1)),
            Some(&[id(9), id(3)][..])
        );
    }

    #[test]
    fn merge_appends_duplicates() {
        let mut report = BrokenReferenceReport::new();
        report.record("node", "article", "field_tags", id(1), id(9));

        let mut fragment = BrokenReferenceReport::new();
        fragment.record("node", "article", "field_tags", id(1), id(9));
        fragment.record("node", "page", "field_author", id(2), id(42));
        report.merge(fragment);

        assert_eq!(
            report.get("node", "article", "field_tags", id(1)),
            Some(&[id(9), id(9)][..])
        );
        assert_eq!(report.source_count(), 2);
        assert_eq!(report.target_count(), 3);
    }

    #[test]
    fn records_flatten_in_key_order() {
        let mut report = BrokenReferenceReport::new();
        report.record("user", "user", "field_manager", id(5), id(6));
        report.record("node", "page", "field_author", id(2), id(42));

        let records: Vec<_> = report.records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_type, "node");
        assert_eq!(records[1].targets, vec![id(6)]);

        let rebuilt: BrokenReferenceReport = records.into_iter().collect();
        assert_eq!(rebuilt, report);
    }

    #[test]
    fn serializes_as_nested_object() {
        let mut report = BrokenReferenceReport::new();
        report.record("node", "article", "field_author", id(1), id(42));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["node"]["article"]["field_author"]["1"][0], 42);

        let back: BrokenReferenceReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}

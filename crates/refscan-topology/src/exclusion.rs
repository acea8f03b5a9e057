//! Known-anomaly exclusion list
//!
//! Some (entity type, field) pairs are reference fields on paper but the
//! integrity check is meaningless or errors on the host. They are never
//! mapped, whatever field kind they come from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One excluded `entity_type.field` pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExcludedField {
    /// Entity type
    pub entity_type: String,
    /// Field name
    pub field: String,
}

impl ExcludedField {
    /// Exclude `field` on `entity_type`
    #[must_use]
    pub fn new(entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            field: field.into(),
        }
    }

    /// Whether this entry covers the pair
    #[inline]
    #[must_use]
    pub fn matches(&self, entity_type: &str, field: &str) -> bool {
        self.entity_type == entity_type && self.field == field
    }
}

/// Malformed `entity_type.field` string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected `entity_type.field`, got `{0}`")]
pub struct ParseExcludedFieldError(pub String);

impl FromStr for ExcludedField {
    type Err = ParseExcludedFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((entity_type, field)) if !entity_type.is_empty() && !field.is_empty() => {
                Ok(Self::new(entity_type, field))
            }
            _ => Err(ParseExcludedFieldError(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExcludedField {
    type Error = ParseExcludedFieldError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExcludedField> for String {
    fn from(value: ExcludedField) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ExcludedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_type, self.field)
    }
}

/// Fixed set of excluded pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionList(Vec<ExcludedField>);

impl ExclusionList {
    /// Empty list
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Add a pair
    #[must_use]
    pub fn with(mut self, entry: ExcludedField) -> Self {
        if !self.0.contains(&entry) {
            self.0.push(entry);
        }
        self
    }

    /// Whether the pair is excluded
    #[must_use]
    pub fn contains(&self, entity_type: &str, field: &str) -> bool {
        self.0.iter().any(|e| e.matches(entity_type, field))
    }

    /// Excluded pairs
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[ExcludedField] {
        &self.0
    }
}

impl Default for ExclusionList {
    /// Comment host entity IDs point at whatever type the comment hangs off,
    /// so the single target type the field declares is wrong.
    fn default() -> Self {
        Self::empty().with(ExcludedField::new("comment", "entity_id"))
    }
}

impl FromIterator<ExcludedField> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = ExcludedField>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

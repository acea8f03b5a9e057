//! Entity identifiers

use serde::{Deserialize, Serialize};

/// Internal numeric identifier of a content entity
///
/// Reference fields store these as raw target values. A raw value of `0`
/// means "no reference set" and never becomes an `EntityId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Interpret a raw stored reference value; zero means unset
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_raw_value_is_unset() {
        assert_eq!(EntityId::from_raw(0), None);
        assert_eq!(EntityId::from_raw(7), Some(EntityId::new(7)));
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&EntityId::new(42)).unwrap();
        assert_eq!(json, "42");
    }
}

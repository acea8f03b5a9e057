//! Read-only pre-scan checks
//!
//! Cheap answers for a report screen before anyone builds a full report.

use crate::error::ScanError;
use refscan_query::BrokenReferenceQuery;
use refscan_report::{BrokenReferenceReport, ReportSummary};
use refscan_topology::{ReferenceMap, TopologyResolver};
use std::fmt;

/// Status line for the report screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// A report exists
    Report(ReportSummary),

    /// No report yet, but probes hit this many entity types
    Estimate(usize),

    /// No report and no probe hit
    Clean,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report(summary) => f.write_str(&summary.headline()),
            Self::Estimate(types) => write!(
                f,
                "At least {types} different types of broken references found. \
                 Build report to get full details."
            ),
            Self::Clean => f.write_str(
                "No broken entity references were found, good work! \
                 Note: quick check might not find everything, running report build is advised.",
            ),
        }
    }
}

/// Advisory queries over the current schema and storage
#[derive(Debug)]
pub struct ScanAdvisor {
    resolver: TopologyResolver,
    query: BrokenReferenceQuery,
}

impl ScanAdvisor {
    /// Advisor from a resolver and a query engine
    #[inline]
    #[must_use]
    pub fn new(resolver: TopologyResolver, query: BrokenReferenceQuery) -> Self {
        Self { resolver, query }
    }

    /// Current reference map
    ///
    /// # Errors
    /// Returns [`ScanError::Schema`] if resolution fails
    pub fn reference_map(&self) -> Result<ReferenceMap, ScanError> {
        Ok(self.resolver.resolve_reference_fields()?)
    }

    /// Whether an entity type has at least one broken reference candidate
    ///
    /// Types absent from the reference map have none.
    ///
    /// # Errors
    /// Returns error if resolution or a probe query fails
    pub async fn has_candidates(&self, entity_type: &str) -> Result<bool, ScanError> {
        let map = self.reference_map()?;
        match map.get(entity_type) {
            Some(references) => Ok(self.query.has_candidates(entity_type, references).await?),
            None => Ok(false),
        }
    }

    /// Rough count of entity types with broken references
    ///
    /// # Errors
    /// Returns error if resolution or a probe query fails
    pub async fn count_candidate_types(&self) -> Result<usize, ScanError> {
        let map = self.reference_map()?;
        Ok(self.query.count_candidate_types(&map).await?)
    }

    /// Status line for `report`: its totals when non-empty, otherwise a probe
    /// estimate
    ///
    /// # Errors
    /// Returns error if the estimate is needed and cannot be computed
    pub async fn advisory(&self, report: &BrokenReferenceReport) -> Result<Advisory, ScanError> {
        if !report.is_empty() {
            return Ok(Advisory::Report(report.summary()));
        }
        match self.count_candidate_types().await? {
            0 => Ok(Advisory::Clean),
            types => Ok(Advisory::Estimate(types)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            Advisory::Estimate(2).to_string(),
            "At least 2 different types of broken references found. Build report to get full details."
        );
        assert!(Advisory::Clean
            .to_string()
            .starts_with("No broken entity references were found, good work!"));
        assert_eq!(
            Advisory::Report(ReportSummary::default()).to_string(),
            "Total 0 of broken references between 0 different types."
        );
    }
}

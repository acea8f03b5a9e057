//! Report summary rows

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts for one (entity type, bundle, field)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// 1-based row number
    pub index: usize,
    /// Entity type
    pub entity_type: String,
    /// Bundle
    pub bundle: String,
    /// Reference field
    pub field: String,
    /// Source entities with broken values in this field
    pub source_amount: usize,
    /// Broken target values
    pub target_amount: usize,
}

/// Report rows plus totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Rows in entity type, bundle, field order
    pub rows: Vec<SummaryRow>,
    /// Sum of source amounts
    pub total_sources: usize,
    /// Number of distinct (entity type, bundle, field) groups
    pub total_groups: usize,
}

impl ReportSummary {
    /// Totals derived from rows
    #[must_use]
    pub fn from_rows(rows: Vec<SummaryRow>) -> Self {
        Self {
            total_sources: rows.iter().map(|r| r.source_amount).sum(),
            total_groups: rows.len(),
            rows,
        }
    }

    /// No rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Headline shown above the table
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "Total {} of broken references between {} different types.",
            self.total_sources, self.total_groups
        )
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline())?;
        writeln!(
            f,
            "{:>4}  {:<20} {:<20} {:<28} {:>8} {:>8}",
            "#", "Entity type", "Bundle", "Field", "Sources", "Targets"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:>4}  {:<20} {:<20} {:<28} {:>8} {:>8}",
                row.index,
                row.entity_type,
                row.bundle,
                row.field,
                row.source_amount,
                row.target_amount
            )?;
        }
        Ok(())
    }
}

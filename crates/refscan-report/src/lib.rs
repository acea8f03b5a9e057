//! refscan report
//!
//! Accumulated scan results and where they live between steps.
//!
//! - [`BrokenReferenceReport`]: typed index entity type → bundle → field →
//!   source entity → broken target IDs, also used for per-page fragments
//! - [`ReportSummary`]: one row per (entity type, bundle, field)
//! - [`ReportStore`]: session-scoped durable store with `clear` / `merge` /
//!   `read`, implemented by [`MemoryReportStore`] and [`JsonFileReportStore`]
//!
//! # Merge policy
//!
//! Merging appends: targets recorded for an existing
//! (entity type, bundle, field, source) key are added after the ones already
//! stored, duplicates included. Full scans always clear the store first, so
//! repeating a scan over unchanged data reproduces the same report.
//!
//! # Example
//!
//! ```rust
//! use refscan_host::EntityId;
//! use refscan_report::BrokenReferenceReport;
//!
//! let mut report = BrokenReferenceReport::new();
//! report.record("node", "article", "field_author", EntityId::new(1), EntityId::new(42));
//!
//! let summary = report.summary();
//! assert_eq!(summary.total_sources, 1);
//! assert_eq!(summary.rows[0].target_amount, 1);
//! ```

#![warn(missing_docs)]

pub mod report;
pub mod store;
pub mod summary;

// Re-exports
pub use report::{BrokenReference, BrokenReferenceReport};
pub use store::{JsonFileReportStore, MemoryReportStore, ReportStore, StoreError};
pub use summary::{ReportSummary, SummaryRow};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

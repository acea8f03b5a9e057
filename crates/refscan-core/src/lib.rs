//! refscan core - incremental broken reference scanning
//!
//! Ties the topology resolver, the candidate query engine and the report
//! store together:
//! - [`ScanCoordinator`] scans one entity type in bounded pages
//! - [`BatchRun`] drives one scan operation per entity type
//! - [`ScanAdvisor`] answers cheap pre-scan questions
//! - [`Scanner`] wires all of them from injected collaborators
//!
//! # Example
//!
//! ```rust
//! use refscan_core::Scanner;
//! use refscan_host::MemoryHost;
//! use refscan_report::{MemoryReportStore, ReportStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Arc::new(
//!     MemoryHost::builder()
//!         .entity_type("node", Some("type"))
//!         .entity_type("user", None)
//!         .reference_field("node", "article", "field_author", "user")
//!         .entity("node", 1, "article", &[("field_author", &[42])])
//!         .build(),
//! );
//! let store = Arc::new(MemoryReportStore::new());
//! let scanner = Scanner::new(host.clone(), host, store.clone());
//!
//! let finished = scanner.batch()?.run_to_completion(|_| {}).await;
//! assert!(finished.success);
//! assert_eq!(store.read().await?.target_count(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod advisor;
pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod scanner;
pub mod state;

// Re-exports
pub use advisor::{Advisory, ScanAdvisor};
pub use batch::{BatchFinished, BatchProgress, BatchRun, ScanOperation, FINISHED_MESSAGE};
pub use config::{ConfigError, ScanConfig, DEFAULT_PAGE_SIZE};
pub use coordinator::{ScanCoordinator, StepOutcome};
pub use error::{DriverError, ScanError, StepFailure};
pub use scanner::Scanner;
pub use state::{Progress, ScanCursor, ScanState, ScanTally};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running scans
    pub use crate::{
        Advisory, BatchRun, ScanConfig, ScanCoordinator, ScanState, Scanner, StepOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

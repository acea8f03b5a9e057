//! refscan broken reference queries
//!
//! [`BrokenReferenceQuery`] turns a [`TypeReferences`] entry into one
//! existence-check query per (bundle, field) and unions the hits. The result
//! is a superset prefilter: it says which entities are worth loading, not
//! which values are broken. Authoritative checks happen when the entities
//! are loaded.
//!
//! [`TypeReferences`]: refscan_topology::TypeReferences

#![warn(missing_docs)]

mod engine;

pub use engine::{BrokenReferenceQuery, CandidateIds, QueryError, PROBE_LIMIT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

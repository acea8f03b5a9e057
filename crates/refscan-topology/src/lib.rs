//! refscan field topology
//!
//! Resolves the host schema into a [`ReferenceMap`]: for every entity type,
//! which bundles and fields hold references, and which identity key must
//! exist on the target for each reference to be valid.
//!
//! # Example
//!
//! ```rust
//! use refscan_host::MemoryHost;
//! use refscan_topology::{ResolverOptions, TopologyResolver};
//! use std::sync::Arc;
//!
//! let host = MemoryHost::builder()
//!     .entity_type("node", Some("type"))
//!     .entity_type("user", None)
//!     .reference_field("node", "article", "field_author", "user")
//!     .build();
//!
//! let resolver = TopologyResolver::new(Arc::new(host), ResolverOptions::default());
//! let map = resolver.resolve_reference_fields().unwrap();
//!
//! let node = map.get("node").unwrap();
//! assert_eq!(node.target_key("article", "field_author"), Some("uuid"));
//! ```

#![warn(missing_docs)]

pub mod exclusion;
pub mod map;
pub mod resolver;

// Re-exports
pub use exclusion::{ExcludedField, ExclusionList, ParseExcludedFieldError};
pub use map::{FieldTarget, ReferenceMap, TypeReferences};
pub use resolver::{ResolverOptions, TopologyResolver};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! refscan host collaborators
//!
//! The scan engine never reaches into the content platform directly. Every
//! platform capability it needs is expressed as a trait here and passed in
//! explicitly:
//!
//! - [`SchemaIntrospection`]: entity types, bundle keys and field definitions
//! - [`EntityStorage`]: condition queries and bulk entity loading
//!
//! [`MemoryHost`] implements both over a JSON-deserializable dataset.
//!
//! # Example
//!
//! ```rust
//! use refscan_host::{EntityId, MemoryHost, SchemaIntrospection};
//!
//! let host = MemoryHost::builder()
//!     .entity_type("node", Some("type"))
//!     .entity_type("user", None)
//!     .reference_field("node", "article", "field_author", "user")
//!     .entity("node", 1, "article", &[("field_author", &[42])])
//!     .build();
//!
//! let map = host.field_map_by_kind("entity_reference").unwrap();
//! assert!(map["node"].contains_key("field_author"));
//! assert_eq!(EntityId::new(42).get(), 42);
//! ```

#![warn(missing_docs)]

pub mod ids;
pub mod memory;
pub mod schema;
pub mod storage;

// Re-exports
pub use ids::EntityId;
pub use memory::{DatasetError, MemoryDataset, MemoryEntity, MemoryField, MemoryHost, MemoryHostBuilder};
pub use schema::{
    EntityTypeDefinition, FieldDefinition, FieldMap, FieldMapEntry, SchemaError,
    SchemaIntrospection, ENTITY_REFERENCE,
};
pub use storage::{
    Condition, EntityQuery, EntityStorage, LoadedEntity, ReferenceItem, StorageError,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for host collaborators
    pub use crate::{
        EntityId, EntityQuery, EntityStorage, LoadedEntity, ReferenceItem, SchemaIntrospection,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

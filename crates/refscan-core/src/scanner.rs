//! Scanner wiring
//!
//! Holds the injected collaborators and configuration, and builds the
//! resolver, coordinator, batch runs and advisor from them.

use crate::advisor::ScanAdvisor;
use crate::batch::BatchRun;
use crate::config::ScanConfig;
use crate::coordinator::ScanCoordinator;
use crate::error::ScanError;
use refscan_host::{EntityStorage, SchemaIntrospection};
use refscan_query::BrokenReferenceQuery;
use refscan_report::ReportStore;
use refscan_topology::TopologyResolver;
use std::sync::Arc;

/// Broken reference scanner over explicit host collaborators
#[derive(Clone)]
pub struct Scanner {
    schema: Arc<dyn SchemaIntrospection>,
    storage: Arc<dyn EntityStorage>,
    store: Arc<dyn ReportStore>,
    config: ScanConfig,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Scanner with default configuration
    #[must_use]
    pub fn new(
        schema: Arc<dyn SchemaIntrospection>,
        storage: Arc<dyn EntityStorage>,
        store: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            schema,
            storage,
            store,
            config: ScanConfig::default(),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration in effect
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Report store of this scanner's session
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// Topology resolver for the configured kinds and exclusions
    #[must_use]
    pub fn resolver(&self) -> TopologyResolver {
        TopologyResolver::new(Arc::clone(&self.schema), self.config.resolver_options())
    }

    /// Query engine over the host storage
    #[must_use]
    pub fn query(&self) -> BrokenReferenceQuery {
        BrokenReferenceQuery::new(Arc::clone(&self.storage))
    }

    /// Paged coordinator with the configured page size
    #[must_use]
    pub fn coordinator(&self) -> ScanCoordinator {
        ScanCoordinator::new(Arc::clone(&self.storage), Arc::clone(&self.store))
            .with_query(self.query())
            .with_page_size(self.config.page_size)
    }

    /// Advisory checks
    #[must_use]
    pub fn advisor(&self) -> ScanAdvisor {
        ScanAdvisor::new(self.resolver(), self.query())
    }

    /// Batch run over the freshly resolved reference map
    ///
    /// # Errors
    /// Returns [`ScanError::Schema`] if the reference map cannot be resolved
    pub fn batch(&self) -> Result<BatchRun, ScanError> {
        let map = self.resolver().resolve_reference_fields()?;
        Ok(BatchRun::new(self.coordinator(), map))
    }
}

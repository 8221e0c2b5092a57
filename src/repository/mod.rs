//! Equipment repository
//!
//! Orchestrates the compilers against a [`GraphStore`]:
//!
//! - metadata sources and equipment type lifecycle
//! - instance listings, lookups and hierarchies
//! - instance upserts and batch soft deletion
//!
//! Structural mutations require a [`StructuralGuard`] from this
//! repository's [`StructuralLock`]. Reads are unsynchronized. Every store
//! failure is wrapped with the name of the operation that issued it.

mod deletion;
mod equipment;
mod lock;
mod metadata;
mod rows;
mod types;

use tracing::debug;

pub use deletion::DeletionReport;
pub use lock::{StructuralGuard, StructuralLock};

use crate::config::DeletionConfig;
use crate::errors::{EquipError, EquipResult};
use crate::query::ast::{Query, QueryVars};
use crate::query::render::render_query;
use crate::schema::SchemaCompiler;
use crate::store::{GraphStore, MutationResponse, QueryResponse, Request};

pub struct EquipmentRepository<S: GraphStore> {
    store: S,
    lock: StructuralLock,
    config: DeletionConfig,
}

impl<S: GraphStore> EquipmentRepository<S> {
    /// Create a repository with deletion settings read from the environment
    pub fn new(store: S) -> Self {
        Self::with_config(store, DeletionConfig::from_env())
    }

    pub fn with_config(store: S, config: DeletionConfig) -> Self {
        Self {
            store,
            lock: StructuralLock::new(),
            config,
        }
    }

    pub fn lock(&self) -> &StructuralLock {
        &self.lock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DeletionConfig {
        &self.config
    }

    /// Declare the shared predicates and node types
    pub fn bootstrap(&self) -> EquipResult<()> {
        self.store
            .alter(&SchemaCompiler::base_statements())
            .map_err(|e| EquipError::store("bootstrap", e))
    }

    fn read(&self, operation: &str, query: &Query, vars: &QueryVars) -> EquipResult<QueryResponse> {
        debug!(operation = operation, query = %render_query(query), "store query");
        self.store
            .query(query, vars)
            .map_err(|e| EquipError::store(operation, e))
    }

    fn write(&self, operation: &str, request: &Request) -> EquipResult<MutationResponse> {
        debug!(
            operation = operation,
            mutations = request.mutations.len(),
            "store request"
        );
        self.store
            .execute(request)
            .map_err(|e| EquipError::store(operation, e))
    }
}

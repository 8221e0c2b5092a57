//! Graph store seam
//!
//! The repository talks to persistence only through [`GraphStore`]: a
//! read-only query with bound variables, an atomic request of query plus
//! conditional mutations, and schema alteration. Connection management
//! belongs to implementors.
//!
//! [`MemoryGraphStore`] is a complete in-process implementation.

mod errors;
mod memory;
pub mod request;
mod uid;

use std::sync::Arc;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryGraphStore;
pub use request::{
    Condition, Mutation, MutationResponse, NQuad, Object, QueryResponse, Request, Subject,
};
pub use uid::{ParseUidError, Uid};

use crate::query::ast::{Query, QueryVars};
use crate::schema::SchemaStatement;

pub trait GraphStore: Send + Sync {
    /// Evaluate a read-only query
    fn query(&self, query: &Query, vars: &QueryVars) -> StoreResult<QueryResponse>;

    /// Run a query and its conditional mutations, committing all or nothing
    fn execute(&self, request: &Request) -> StoreResult<MutationResponse>;

    /// Apply schema statements; identical statements are no-ops
    fn alter(&self, statements: &[SchemaStatement]) -> StoreResult<()>;
}

impl<S: GraphStore + ?Sized> GraphStore for Arc<S> {
    fn query(&self, query: &Query, vars: &QueryVars) -> StoreResult<QueryResponse> {
        (**self).query(query, vars)
    }

    fn execute(&self, request: &Request) -> StoreResult<MutationResponse> {
        (**self).execute(request)
    }

    fn alter(&self, statements: &[SchemaStatement]) -> StoreResult<()> {
        (**self).alter(statements)
    }
}

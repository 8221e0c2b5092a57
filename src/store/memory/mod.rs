//! In-process graph store
//!
//! Evaluates query ASTs directly and applies requests atomically: each
//! request runs against a copy of the graph that replaces the original only
//! when every mutation succeeded.

mod eval;
mod graph;
mod mutate;

use std::sync::RwLock;

use serde_json::Value;

use self::graph::Graph;
use self::mutate::Mutator;
use super::errors::{StoreError, StoreResult};
use super::request::{MutationResponse, QueryResponse, Request};
use super::{GraphStore, Uid};
use crate::query::ast::{Query, QueryVars};
use crate::schema::{PredicateStatement, SchemaStatement, TypeStatement};

#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    graph: RwLock<Graph>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.read().map(|g| g.len()).unwrap_or(0)
    }

    /// Debug view of a node's values and forward edges
    pub fn node(&self, uid: Uid) -> Option<Value> {
        self.graph.read().ok().and_then(|g| g.node_json(uid))
    }

    pub fn predicate(&self, name: &str) -> Option<PredicateStatement> {
        self.graph.read().ok().and_then(|g| g.predicate(name).cloned())
    }

    pub fn type_declaration(&self, name: &str) -> Option<TypeStatement> {
        self.graph
            .read()
            .ok()
            .and_then(|g| g.type_declaration(name).cloned())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("graph lock poisoned".into())
}

impl GraphStore for MemoryGraphStore {
    fn query(&self, query: &Query, vars: &QueryVars) -> StoreResult<QueryResponse> {
        let graph = self.graph.read().map_err(poisoned)?;
        Ok(eval::evaluate(&graph, query, vars)?.response)
    }

    fn execute(&self, request: &Request) -> StoreResult<MutationResponse> {
        let mut graph = self.graph.write().map_err(poisoned)?;
        let mut working = graph.clone();

        let evaluation = match request.query {
            Some(ref query) => eval::evaluate(&working, query, &request.vars)?,
            None => eval::evaluate(&working, &Query::new("empty"), &request.vars)?,
        };

        let assigned = {
            let mut mutator = Mutator::new(&mut working, &evaluation.vars);
            for mutation in &request.mutations {
                mutator.apply(mutation)?;
            }
            mutator.into_assigned()
        };

        *graph = working;
        Ok(MutationResponse {
            query: evaluation.response,
            assigned,
        })
    }

    fn alter(&self, statements: &[SchemaStatement]) -> StoreResult<()> {
        let mut graph = self.graph.write().map_err(poisoned)?;
        graph.apply_schema(statements).map_err(StoreError::Schema)
    }
}

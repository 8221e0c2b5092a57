//! Store requests and responses
//!
//! A [`Request`] pairs an optional query with conditional mutations. The
//! store evaluates the query first, then applies every mutation whose
//! condition holds, and commits all of it or nothing.

use std::collections::BTreeMap;

use serde_json::Value;

use super::uid::Uid;
use crate::query::ast::{Query, QueryVars};

/// Node a quad refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Every node bound to a query variable. An empty variable in a set
    /// mutation allocates one fresh node per request.
    Var(String),
    /// Request-local label, allocated once per request
    Blank(String),
    Node(Uid),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Value(Value),
    Node(Subject),
    /// Any value; only valid in deletions
    Any,
}

/// Predicate position of a quad; `*` in deletions clears every predicate
pub const ANY_PREDICATE: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct NQuad {
    pub subject: Subject,
    pub predicate: String,
    pub object: Object,
}

impl NQuad {
    pub fn value(subject: Subject, predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object: Object::Value(value.into()),
        }
    }

    pub fn edge(subject: Subject, predicate: impl Into<String>, target: Subject) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object: Object::Node(target),
        }
    }

    /// `subject predicate * .`
    pub fn clear(subject: Subject, predicate: impl Into<String>) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object: Object::Any,
        }
    }

    /// `subject * * .`
    pub fn clear_all(subject: Subject) -> Self {
        Self::clear(subject, ANY_PREDICATE)
    }
}

/// Guard on a mutation, evaluated against the request's query variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `@if(eq(len(var), 0))`
    Empty(String),
    /// `@if(gt(len(var), 0))`
    NotEmpty(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    pub condition: Option<Condition>,
    pub set: Vec<NQuad>,
    pub delete: Vec<NQuad>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn set(mut self, quad: NQuad) -> Self {
        self.set.push(quad);
        self
    }

    pub fn delete(mut self, quad: NQuad) -> Self {
        self.delete.push(quad);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }
}

/// One atomic request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub query: Option<Query>,
    pub vars: QueryVars,
    pub mutations: Vec<Mutation>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn mutate(mut self, mutation: Mutation) -> Self {
        if !mutation.is_empty() {
            self.mutations.push(mutation);
        }
        self
    }
}

/// Rows returned per named block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub blocks: BTreeMap<String, Vec<Value>>,
}

impl QueryResponse {
    pub fn rows(&self, block: &str) -> &[Value] {
        self.blocks.get(block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn take_rows(&mut self, block: &str) -> Vec<Value> {
        self.blocks.remove(block).unwrap_or_default()
    }

    /// Count reported by a `count(uid)` selection; zero when absent
    pub fn count(&self, block: &str, alias: &str) -> u64 {
        self.rows(block)
            .first()
            .and_then(|row| row.get(alias))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// Result of an executed request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResponse {
    pub query: QueryResponse,
    /// Blank node label → allocated uid
    pub assigned: BTreeMap<String, Uid>,
}

impl MutationResponse {
    pub fn assigned(&self, label: &str) -> Option<Uid> {
        self.assigned.get(label).copied()
    }
}

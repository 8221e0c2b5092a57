//! Query evaluation over the in-memory graph
//!
//! Blocks are evaluated in declaration order; a block may only reference
//! variables bound by earlier blocks. Ordering is stable with ties broken by
//! uid, and nodes missing the sort predicate come last in either direction.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::graph::Graph;
use crate::query::ast::{
    Block, Filter, Func, Order, PageArg, Query, QueryVars, Selection, SortDirection, Traversal,
    UidRef,
};
use crate::schema::naming;
use crate::store::{QueryResponse, StoreError, StoreResult, Uid};

/// Evaluated query: named block rows plus every bound uid variable
pub(super) struct Evaluation {
    pub response: QueryResponse,
    pub vars: HashMap<String, BTreeSet<Uid>>,
}

pub(super) fn evaluate(graph: &Graph, query: &Query, params: &QueryVars) -> StoreResult<Evaluation> {
    let mut evaluator = Evaluator {
        graph,
        params,
        vars: HashMap::new(),
        regexes: HashMap::new(),
    };
    let mut response = QueryResponse::default();
    for block in &query.blocks {
        if let Some(rows) = evaluator.block(block)? {
            if let Some(name) = block.name() {
                response.blocks.insert(name.to_string(), rows);
            }
        }
    }
    Ok(Evaluation {
        response,
        vars: evaluator.vars,
    })
}

struct Evaluator<'a> {
    graph: &'a Graph,
    params: &'a QueryVars,
    vars: HashMap<String, BTreeSet<Uid>>,
    regexes: HashMap<String, Regex>,
}

impl<'a> Evaluator<'a> {
    fn block(&mut self, block: &Block) -> StoreResult<Option<Vec<Value>>> {
        let mut nodes = Vec::new();
        for uid in self.func(&block.root)? {
            if self.matches_opt(uid, block.filter.as_ref())? {
                nodes.push(uid);
            }
        }

        if let Some(ref order) = block.order {
            self.sort(&mut nodes, order);
        }
        let offset = self.page_arg(block.page.offset.as_ref())?.unwrap_or(0) as usize;
        let nodes: Vec<Uid> = match self.page_arg(block.page.first.as_ref())? {
            Some(first) => nodes.into_iter().skip(offset).take(first as usize).collect(),
            None => nodes.into_iter().skip(offset).collect(),
        };

        if let Some(ref var) = block.bind {
            self.vars
                .entry(var.clone())
                .or_default()
                .extend(nodes.iter().copied());
        }

        match block.recurse {
            Some(recurse) => self.recurse(&nodes, &block.traversals, recurse.depth, recurse.allow_loop)?,
            None => {
                for traversal in &block.traversals {
                    self.traverse(&nodes, traversal)?;
                }
            }
        }

        if block.name().is_none() {
            return Ok(None);
        }
        Ok(Some(self.project(&nodes, &block.selections)?))
    }

    fn func(&self, func: &Func) -> StoreResult<Vec<Uid>> {
        let graph = self.graph;
        let uids = match func {
            Func::Eq { predicate, value } => graph
                .uids()
                .filter(|uid| values_match(graph.values(*uid, predicate), value))
                .collect(),
            Func::Has(predicate) => graph.uids().filter(|uid| graph.has(*uid, predicate)).collect(),
            Func::Type(name) => {
                let wanted = Value::String(name.clone());
                graph
                    .uids()
                    .filter(|uid| graph.values(*uid, naming::NODE_TYPE).contains(&wanted))
                    .collect()
            }
            Func::Uid(refs) => self
                .uid_set(refs)?
                .into_iter()
                .filter(|uid| graph.contains(*uid))
                .collect(),
        };
        Ok(uids)
    }

    fn uid_set(&self, refs: &[UidRef]) -> StoreResult<BTreeSet<Uid>> {
        let mut out = BTreeSet::new();
        for r in refs {
            match r {
                UidRef::Node(uid) => {
                    out.insert(*uid);
                }
                UidRef::Var(name) => {
                    let bound = self.vars.get(name).ok_or_else(|| {
                        StoreError::Query(format!("variable {} used but not defined", name))
                    })?;
                    out.extend(bound.iter().copied());
                }
            }
        }
        Ok(out)
    }

    fn matches_opt(&mut self, uid: Uid, filter: Option<&Filter>) -> StoreResult<bool> {
        match filter {
            Some(filter) => self.matches(uid, filter),
            None => Ok(true),
        }
    }

    fn matches(&mut self, uid: Uid, filter: &Filter) -> StoreResult<bool> {
        let graph = self.graph;
        Ok(match filter {
            Filter::Eq { predicate, value } => values_match(graph.values(uid, predicate), value),
            Filter::Ge { predicate, value } => graph
                .values(uid, predicate)
                .iter()
                .any(|actual| compare_scalars(actual, value).map_or(false, |o| o != Ordering::Less)),
            Filter::Regex {
                predicate,
                pattern,
                case_insensitive,
            } => {
                let regex = self.regex(pattern, *case_insensitive)?;
                graph
                    .values(uid, predicate)
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|s| regex.is_match(s))
            }
            Filter::Uid(refs) => self.uid_set(refs)?.contains(&uid),
            Filter::Has(predicate) => graph.has(uid, predicate),
            Filter::And(parts) => {
                for part in parts {
                    if !self.matches(uid, part)? {
                        return Ok(false);
                    }
                }
                true
            }
            Filter::Or(parts) => {
                for part in parts {
                    if self.matches(uid, part)? {
                        return Ok(true);
                    }
                }
                false
            }
            Filter::Not(inner) => !self.matches(uid, inner)?,
        })
    }

    fn regex(&mut self, pattern: &str, case_insensitive: bool) -> StoreResult<Regex> {
        let key = format!("{}/{}", case_insensitive, pattern);
        if let Some(regex) = self.regexes.get(&key) {
            return Ok(regex.clone());
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| StoreError::Query(format!("invalid regex /{}/: {}", pattern, e)))?;
        self.regexes.insert(key, regex.clone());
        Ok(regex)
    }

    fn sort(&self, nodes: &mut [Uid], order: &Order) {
        let graph = self.graph;
        nodes.sort_by(|a, b| {
            let av = graph.values(*a, &order.predicate).first();
            let bv = graph.values(*b, &order.predicate).first();
            let ordering = match (av, bv) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let natural = compare_values(x, y);
                    match order.direction {
                        SortDirection::Asc => natural,
                        SortDirection::Desc => natural.reverse(),
                    }
                }
            };
            ordering.then(a.cmp(b))
        });
    }

    fn page_arg(&self, arg: Option<&PageArg>) -> StoreResult<Option<u64>> {
        match arg {
            None => Ok(None),
            Some(PageArg::Literal(n)) => Ok(Some(*n)),
            Some(PageArg::Var(name)) => {
                let raw = self
                    .params
                    .get(name)
                    .ok_or_else(|| StoreError::Query(format!("query variable {} not bound", name)))?;
                raw.parse::<u64>()
                    .map(Some)
                    .map_err(|_| StoreError::Query(format!("query variable {} is not a count: {}", name, raw)))
            }
        }
    }

    fn hop(&mut self, uid: Uid, traversal: &Traversal) -> StoreResult<Vec<Uid>> {
        let mut reached = Vec::new();
        for target in self
            .graph
            .targets(uid, &traversal.edge.predicate, traversal.edge.reverse)
        {
            if self.matches_opt(target, traversal.filter.as_ref())? {
                reached.push(target);
            }
        }
        Ok(reached)
    }

    fn traverse(&mut self, from: &[Uid], traversal: &Traversal) -> StoreResult<()> {
        let mut reached = BTreeSet::new();
        for uid in from {
            reached.extend(self.hop(*uid, traversal)?);
        }
        if let Some(ref var) = traversal.bind {
            self.vars.entry(var.clone()).or_default().extend(reached.iter().copied());
        }
        let reached: Vec<Uid> = reached.into_iter().collect();
        for child in &traversal.children {
            self.traverse(&reached, child)?;
        }
        Ok(())
    }

    /// Expand `traversals` up to `depth` hops from `roots`
    fn recurse(
        &mut self,
        roots: &[Uid],
        traversals: &[Traversal],
        depth: u32,
        allow_loop: bool,
    ) -> StoreResult<()> {
        let mut visited: BTreeSet<Uid> = roots.iter().copied().collect();
        let mut frontier: Vec<Uid> = roots.to_vec();
        for var in traversals.iter().filter_map(|t| t.bind.as_ref()) {
            self.vars.entry(var.clone()).or_default();
        }
        for _ in 0..depth {
            let mut next = Vec::new();
            for uid in &frontier {
                for traversal in traversals {
                    for target in self.hop(*uid, traversal)? {
                        if !allow_loop && !visited.insert(target) {
                            continue;
                        }
                        if let Some(ref var) = traversal.bind {
                            self.vars.entry(var.clone()).or_default().insert(target);
                        }
                        next.push(target);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(())
    }

    fn project(&self, nodes: &[Uid], selections: &[Selection]) -> StoreResult<Vec<Value>> {
        let only_counts = !selections.is_empty()
            && selections.iter().all(|s| matches!(s, Selection::Count { .. }));
        if only_counts {
            let mut row = Map::new();
            for selection in selections {
                if let Selection::Count { alias } = selection {
                    row.insert(alias.clone(), Value::from(nodes.len() as u64));
                }
            }
            return Ok(vec![Value::Object(row)]);
        }
        Ok(nodes
            .iter()
            .map(|uid| self.project_node(*uid, selections))
            .collect())
    }

    fn project_node(&self, uid: Uid, selections: &[Selection]) -> Value {
        let graph = self.graph;
        let mut row = Map::new();
        for selection in selections {
            match selection {
                Selection::Field { alias, predicate } => {
                    if predicate == naming::UID {
                        row.insert(alias.clone(), Value::String(uid.to_string()));
                        continue;
                    }
                    let values = graph.values(uid, predicate);
                    if !values.is_empty() {
                        let value = if graph.is_list(predicate) {
                            Value::Array(values.to_vec())
                        } else {
                            values[0].clone()
                        };
                        row.insert(alias.clone(), value);
                        continue;
                    }
                    let targets = graph.targets(uid, predicate, false);
                    if !targets.is_empty() {
                        let rendered = targets.iter().map(|t| Value::String(t.to_string())).collect();
                        row.insert(alias.clone(), Value::Array(rendered));
                    }
                }
                Selection::Count { .. } => {}
                Selection::Edge {
                    alias,
                    edge,
                    selections,
                } => {
                    let nested: Vec<Value> = graph
                        .targets(uid, &edge.predicate, edge.reverse)
                        .into_iter()
                        .map(|target| self.project_node(target, selections))
                        .collect();
                    if !nested.is_empty() {
                        row.insert(alias.clone(), Value::Array(nested));
                    }
                }
            }
        }
        Value::Object(row)
    }
}

/// True when any stored value equals the expected value, or any element of
/// an expected array
fn values_match(actual: &[Value], expected: &Value) -> bool {
    match expected {
        Value::Array(candidates) => candidates
            .iter()
            .any(|c| actual.iter().any(|a| scalar_eq(a, c))),
        single => actual.iter().any(|a| scalar_eq(a, single)),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => xi == yi,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Same-kind comparison; `None` when kinds differ
fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order for sorting: bool < number < string < anything else
fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };
    compare_scalars(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

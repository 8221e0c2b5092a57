//! In-memory graph state
//!
//! Nodes hold scalar values and outgoing edges per predicate. A reverse
//! index per edge predicate answers `~predicate` hops. Uids are allocated
//! sequentially, so uid order is creation order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{Map, Value};

use crate::schema::{PredicateStatement, ScalarKind, SchemaStatement, TypeStatement};
use crate::store::Uid;

#[derive(Debug, Clone, Default)]
pub(super) struct Node {
    pub values: BTreeMap<String, Vec<Value>>,
    pub edges: BTreeMap<String, BTreeSet<Uid>>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Graph {
    next_uid: u64,
    nodes: BTreeMap<Uid, Node>,
    /// predicate → target → sources
    reverse: HashMap<String, BTreeMap<Uid, BTreeSet<Uid>>>,
    predicates: BTreeMap<String, PredicateStatement>,
    types: BTreeMap<String, TypeStatement>,
}

impl Graph {
    pub fn allocate(&mut self) -> Uid {
        self.next_uid += 1;
        let uid = Uid(self.next_uid);
        self.nodes.insert(uid, Node::default());
        uid
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.nodes.contains_key(&uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.nodes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Declared as a list, or an undeclared edge
    fn accumulates(&self, predicate: &str, is_edge: bool) -> bool {
        match self.predicates.get(predicate) {
            Some(statement) => statement.list,
            None => is_edge,
        }
    }

    pub fn is_list(&self, predicate: &str) -> bool {
        self.predicates.get(predicate).map(|s| s.list).unwrap_or(false)
    }

    pub fn values(&self, uid: Uid, predicate: &str) -> &[Value] {
        self.nodes
            .get(&uid)
            .and_then(|n| n.values.get(predicate))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has(&self, uid: Uid, predicate: &str) -> bool {
        self.nodes.get(&uid).map_or(false, |n| {
            n.values.get(predicate).map_or(false, |v| !v.is_empty())
                || n.edges.get(predicate).map_or(false, |e| !e.is_empty())
        })
    }

    pub fn targets(&self, uid: Uid, predicate: &str, reverse: bool) -> Vec<Uid> {
        if reverse {
            self.reverse
                .get(predicate)
                .and_then(|by_target| by_target.get(&uid))
                .map(|sources| sources.iter().copied().collect())
                .unwrap_or_default()
        } else {
            self.nodes
                .get(&uid)
                .and_then(|n| n.edges.get(predicate))
                .map(|targets| targets.iter().copied().collect())
                .unwrap_or_default()
        }
    }

    pub fn set_value(&mut self, uid: Uid, predicate: &str, value: Value) {
        let list = self.accumulates(predicate, false);
        if let Some(node) = self.nodes.get_mut(&uid) {
            let values = node.values.entry(predicate.to_string()).or_default();
            if list {
                if !values.contains(&value) {
                    values.push(value);
                }
            } else {
                *values = vec![value];
            }
        }
    }

    pub fn set_edge(&mut self, uid: Uid, predicate: &str, target: Uid) {
        if !self.accumulates(predicate, true) {
            self.clear_edges(uid, predicate);
        }
        if let Some(node) = self.nodes.get_mut(&uid) {
            node.edges.entry(predicate.to_string()).or_default().insert(target);
            self.reverse
                .entry(predicate.to_string())
                .or_default()
                .entry(target)
                .or_default()
                .insert(uid);
        }
    }

    pub fn remove_value(&mut self, uid: Uid, predicate: &str, value: &Value) {
        if let Some(node) = self.nodes.get_mut(&uid) {
            if let Some(values) = node.values.get_mut(predicate) {
                values.retain(|v| v != value);
                if values.is_empty() {
                    node.values.remove(predicate);
                }
            }
        }
    }

    pub fn remove_edge(&mut self, uid: Uid, predicate: &str, target: Uid) {
        if let Some(node) = self.nodes.get_mut(&uid) {
            if let Some(targets) = node.edges.get_mut(predicate) {
                targets.remove(&target);
                if targets.is_empty() {
                    node.edges.remove(predicate);
                }
            }
        }
        self.unlink_reverse(predicate, target, uid);
    }

    /// Drop every value and outgoing edge of one predicate
    pub fn clear_predicate(&mut self, uid: Uid, predicate: &str) {
        if let Some(node) = self.nodes.get_mut(&uid) {
            node.values.remove(predicate);
        }
        self.clear_edges(uid, predicate);
    }

    /// Drop every value and outgoing edge of a node
    pub fn clear_all(&mut self, uid: Uid) {
        let predicates: Vec<String> = match self.nodes.get_mut(&uid) {
            Some(node) => {
                node.values.clear();
                node.edges.keys().cloned().collect()
            }
            None => return,
        };
        for predicate in predicates {
            self.clear_edges(uid, &predicate);
        }
    }

    fn clear_edges(&mut self, uid: Uid, predicate: &str) {
        let targets = self
            .nodes
            .get_mut(&uid)
            .and_then(|n| n.edges.remove(predicate))
            .unwrap_or_default();
        for target in targets {
            self.unlink_reverse(predicate, target, uid);
        }
    }

    fn unlink_reverse(&mut self, predicate: &str, target: Uid, source: Uid) {
        if let Some(by_target) = self.reverse.get_mut(predicate) {
            if let Some(sources) = by_target.get_mut(&target) {
                sources.remove(&source);
                if sources.is_empty() {
                    by_target.remove(&target);
                }
            }
        }
    }

    /// Apply schema statements; re-applying an identical statement is a
    /// no-op.
    pub fn apply_schema(&mut self, statements: &[SchemaStatement]) -> Result<(), String> {
        for statement in statements {
            match statement {
                SchemaStatement::Predicate(p) => {
                    if let Some(existing) = self.predicates.get(&p.predicate) {
                        let was_edge = existing.kind == ScalarKind::Uid;
                        let is_edge = p.kind == ScalarKind::Uid;
                        if was_edge != is_edge {
                            return Err(format!(
                                "predicate {} cannot change between uid and scalar",
                                p.predicate
                            ));
                        }
                    }
                    self.predicates.insert(p.predicate.clone(), p.clone());
                }
                SchemaStatement::Type(t) => {
                    self.types.insert(t.name.clone(), t.clone());
                }
            }
        }
        Ok(())
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateStatement> {
        self.predicates.get(name)
    }

    pub fn type_declaration(&self, name: &str) -> Option<&TypeStatement> {
        self.types.get(name)
    }

    /// Debug view of one node: values and forward edges as uid strings
    pub fn node_json(&self, uid: Uid) -> Option<Value> {
        let node = self.nodes.get(&uid)?;
        let mut map = Map::new();
        map.insert("uid".to_string(), Value::String(uid.to_string()));
        for (predicate, values) in &node.values {
            let value = if self.is_list(predicate) || values.len() > 1 {
                Value::Array(values.clone())
            } else {
                values.first().cloned().unwrap_or(Value::Null)
            };
            map.insert(predicate.clone(), value);
        }
        for (predicate, targets) in &node.edges {
            let rendered: Vec<Value> = targets.iter().map(|t| Value::String(t.to_string())).collect();
            map.insert(predicate.clone(), Value::Array(rendered));
        }
        Some(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaCompiler;
    use serde_json::json;

    fn graph() -> Graph {
        let mut graph = Graph::default();
        graph.apply_schema(&SchemaCompiler::base_statements()).unwrap();
        graph
    }

    #[test]
    fn test_scalar_replace_and_list_append() {
        let mut g = graph();
        let a = g.allocate();
        g.set_value(a, "equipment.id", json!("S1"));
        g.set_value(a, "equipment.id", json!("S2"));
        assert_eq!(g.values(a, "equipment.id"), &[json!("S2")]);

        g.set_value(a, "scopes", json!("s1"));
        g.set_value(a, "scopes", json!("s2"));
        g.set_value(a, "scopes", json!("s1"));
        assert_eq!(g.values(a, "scopes"), &[json!("s1"), json!("s2")]);
    }

    #[test]
    fn test_single_edge_replaced_and_reverse_kept_in_sync() {
        let mut g = graph();
        let child = g.allocate();
        let p1 = g.allocate();
        let p2 = g.allocate();
        g.set_edge(child, "equipment.parent", p1);
        g.set_edge(child, "equipment.parent", p2);
        assert_eq!(g.targets(child, "equipment.parent", false), vec![p2]);
        assert!(g.targets(p1, "equipment.parent", true).is_empty());
        assert_eq!(g.targets(p2, "equipment.parent", true), vec![child]);
    }

    #[test]
    fn test_clear_all_unlinks() {
        let mut g = graph();
        let child = g.allocate();
        let parent = g.allocate();
        g.set_value(child, "equipment.id", json!("S1"));
        g.set_edge(child, "equipment.parent", parent);
        g.clear_all(child);
        assert!(!g.has(child, "equipment.id"));
        assert!(g.targets(parent, "equipment.parent", true).is_empty());
        assert!(g.contains(child));
    }

    #[test]
    fn test_schema_rejects_kind_flip() {
        let mut g = graph();
        let flip = SchemaStatement::Predicate(PredicateStatement::new("equipment.parent", ScalarKind::String));
        assert!(g.apply_schema(&[flip]).is_err());
        assert!(g.apply_schema(&SchemaCompiler::base_statements()).is_ok());
    }
}

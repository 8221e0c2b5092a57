//! Mutation application over the in-memory graph

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::graph::Graph;
use crate::store::request::{Condition, Mutation, NQuad, Object, Subject, ANY_PREDICATE};
use crate::store::{StoreError, StoreResult, Uid};

/// Applies the mutations of one request against a working copy
pub(super) struct Mutator<'a> {
    graph: &'a mut Graph,
    vars: &'a HashMap<String, BTreeSet<Uid>>,
    blanks: BTreeMap<String, Uid>,
    /// Node allocated for a variable that matched nothing
    fresh: HashMap<String, Uid>,
}

impl<'a> Mutator<'a> {
    pub fn new(graph: &'a mut Graph, vars: &'a HashMap<String, BTreeSet<Uid>>) -> Self {
        Self {
            graph,
            vars,
            blanks: BTreeMap::new(),
            fresh: HashMap::new(),
        }
    }

    pub fn apply(&mut self, mutation: &Mutation) -> StoreResult<()> {
        if let Some(ref condition) = mutation.condition {
            if !self.holds(condition) {
                return Ok(());
            }
        }
        for quad in &mutation.delete {
            self.delete(quad)?;
        }
        for quad in &mutation.set {
            self.set(quad)?;
        }
        Ok(())
    }

    pub fn into_assigned(self) -> BTreeMap<String, Uid> {
        self.blanks
    }

    fn holds(&self, condition: &Condition) -> bool {
        let len = |name: &str| self.vars.get(name).map_or(0, BTreeSet::len);
        match condition {
            Condition::Empty(var) => len(var) == 0,
            Condition::NotEmpty(var) => len(var) > 0,
        }
    }

    /// Nodes a subject names; `allocate` creates nodes for empty vars and
    /// new blank labels
    fn resolve(&mut self, subject: &Subject, allocate: bool) -> StoreResult<Vec<Uid>> {
        match subject {
            Subject::Node(uid) => {
                if self.graph.contains(*uid) {
                    Ok(vec![*uid])
                } else {
                    Err(StoreError::Mutation(format!("node {} does not exist", uid)))
                }
            }
            Subject::Blank(label) => {
                if let Some(uid) = self.blanks.get(label) {
                    return Ok(vec![*uid]);
                }
                if !allocate {
                    return Ok(Vec::new());
                }
                let uid = self.graph.allocate();
                self.blanks.insert(label.clone(), uid);
                Ok(vec![uid])
            }
            Subject::Var(name) => {
                let bound = self.vars.get(name).ok_or_else(|| {
                    StoreError::Mutation(format!("variable {} used but not defined", name))
                })?;
                if !bound.is_empty() {
                    return Ok(bound.iter().copied().collect());
                }
                if let Some(uid) = self.fresh.get(name) {
                    return Ok(vec![*uid]);
                }
                if !allocate {
                    return Ok(Vec::new());
                }
                let uid = self.graph.allocate();
                self.fresh.insert(name.clone(), uid);
                Ok(vec![uid])
            }
        }
    }

    fn set(&mut self, quad: &NQuad) -> StoreResult<()> {
        if quad.predicate == ANY_PREDICATE {
            return Err(StoreError::Mutation("wildcard predicate in set".into()));
        }
        let subjects = self.resolve(&quad.subject, true)?;
        match &quad.object {
            Object::Value(value) => {
                for uid in subjects {
                    self.graph.set_value(uid, &quad.predicate, value.clone());
                }
            }
            Object::Node(target) => {
                let targets = self.resolve(target, true)?;
                for uid in &subjects {
                    for target in &targets {
                        self.graph.set_edge(*uid, &quad.predicate, *target);
                    }
                }
            }
            Object::Any => {
                return Err(StoreError::Mutation(format!(
                    "wildcard object in set of {}",
                    quad.predicate
                )))
            }
        }
        Ok(())
    }

    fn delete(&mut self, quad: &NQuad) -> StoreResult<()> {
        let subjects = self.resolve(&quad.subject, false)?;
        for uid in subjects {
            match &quad.object {
                Object::Any if quad.predicate == ANY_PREDICATE => self.graph.clear_all(uid),
                Object::Any => self.graph.clear_predicate(uid, &quad.predicate),
                Object::Value(value) => self.graph.remove_value(uid, &quad.predicate, value),
                Object::Node(target) => {
                    for target in self.resolve(target, false)? {
                        self.graph.remove_edge(uid, &quad.predicate, target);
                    }
                }
            }
        }
        Ok(())
    }
}

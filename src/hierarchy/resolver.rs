//! Hierarchy query compilation
//!
//! Every query here is anchored on one node and carries an `Exists` block
//! counting the anchor after its type and scope filters. Interpretation
//! keeps the two empty outcomes apart:
//!
//! - anchor absent → `NotFound`
//! - anchor present, nothing reached → `NoData`

use serde::Serialize;
use serde_json::Value;

use super::topology::{Direction, Topology};
use crate::errors::{EquipError, EquipResult};
use crate::query::ast::{Block, Filter, Func, Query, QueryVars, Selection, SortDirection, Traversal};
use crate::query::render::render_query;
use crate::query::{
    EquipmentPage, QueryCompiler, QuerySpec, COUNT_BLOCK, ID_ALIAS, ROWS_BLOCK, TOTAL_ALIAS,
};
use crate::schema::naming;
use crate::schema::EquipmentTypeDefinition;
use crate::store::{QueryResponse, Uid};

pub const EXISTS_BLOCK: &str = "Exists";

const ANCHOR_VAR: &str = "Anchor";
const REACHED_VAR: &str = "Reached";

/// Generic instance and type traversals project these keys
pub const IDENTIFIER_ALIAS: &str = "EquipID";
pub const TYPE_ALIAS: &str = "Type";

/// An anchored query answering with a page of reached nodes
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredQuery {
    pub query: Query,
    pub vars: QueryVars,
    anchor: Uid,
}

impl AnchoredQuery {
    pub fn anchor(&self) -> Uid {
        self.anchor
    }

    pub fn render(&self) -> String {
        render_query(&self.query)
    }

    pub fn interpret(&self, mut response: QueryResponse) -> EquipResult<EquipmentPage> {
        if response.count(EXISTS_BLOCK, TOTAL_ALIAS) == 0 {
            return Err(EquipError::not_found(format!("equipment {}", self.anchor)));
        }
        let total = response.count(COUNT_BLOCK, TOTAL_ALIAS);
        if total == 0 {
            return Err(EquipError::no_data(format!(
                "{} of {}",
                self.query.name, self.anchor
            )));
        }
        Ok(EquipmentPage::new(total, response.take_rows(ROWS_BLOCK)))
    }
}

/// Nodes reached at one level of a fixed topology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyLevel {
    pub type_name: String,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyPath {
    pub topology: String,
    pub anchor: Uid,
    /// One entry per hop, nearest first
    pub levels: Vec<TopologyLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyQuery {
    pub query: Query,
    topology: Topology,
    anchor: Uid,
}

impl TopologyQuery {
    pub fn render(&self) -> String {
        render_query(&self.query)
    }

    pub fn interpret(&self, mut response: QueryResponse) -> EquipResult<TopologyPath> {
        if response.count(EXISTS_BLOCK, TOTAL_ALIAS) == 0 {
            return Err(EquipError::not_found(format!(
                "{} {}",
                self.topology.anchor_type(),
                self.anchor
            )));
        }
        let levels: Vec<TopologyLevel> = self
            .topology
            .levels()
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, type_name)| TopologyLevel {
                type_name: type_name.clone(),
                rows: response.take_rows(&level_block(i)),
            })
            .collect();
        if levels.iter().all(|l| l.rows.is_empty()) {
            return Err(EquipError::no_data(format!(
                "{} topology of {}",
                self.topology.name(), self.anchor
            )));
        }
        Ok(TopologyPath {
            topology: self.topology.name().to_string(),
            anchor: self.anchor,
            levels,
        })
    }
}

fn level_var(i: usize) -> String {
    format!("L{}", i)
}

fn level_block(i: usize) -> String {
    format!("Level{}", i)
}

pub struct HierarchyResolver;

impl HierarchyResolver {
    /// Depth used when the caller sets none: one hop per equipment type in
    /// scope, at least one.
    pub fn default_depth(type_count: usize) -> u32 {
        type_count.max(1) as u32
    }

    /// Walk a fixed topology from `anchor`, filtering each hop by the type
    /// expected at that level.
    pub fn compile_topology(topology: &Topology, anchor: Uid, scopes: &[String]) -> TopologyQuery {
        let scope = QueryCompiler::scope_filter(scopes);
        let level_filter = |type_name: &str| {
            Some(Filter::And(vec![
                Filter::eq(naming::EQUIPMENT_TYPE, type_name),
                scope.clone(),
            ]))
        };

        // Build the hop chain innermost first
        let mut chain: Option<Traversal> = None;
        for (i, type_name) in topology.levels().iter().enumerate().skip(1).rev() {
            let mut hop = Traversal::new(topology.direction().edge(naming::PARENT_EDGE))
                .with_filter(level_filter(type_name))
                .bind_as(level_var(i));
            if let Some(inner) = chain.take() {
                hop = hop.then(inner);
            }
            chain = Some(hop);
        }

        let mut root = Block::var(Func::uid(anchor))
            .bind_as(level_var(0))
            .with_filter(level_filter(topology.anchor_type()));
        if let Some(chain) = chain {
            root = root.traverse(chain);
        }

        let mut query = Query::new(format!("Topology_{}", topology.name()))
            .block(root)
            .block(exists_block(&level_var(0)));
        for i in 1..topology.levels().len() {
            query = query.block(reached_block(&level_block(i), &level_var(i)));
        }

        TopologyQuery {
            query,
            topology: topology.clone(),
            anchor,
        }
    }

    /// Bounded recursive traversal over equipment instances.
    pub fn compile_traversal(
        anchor: Uid,
        direction: Direction,
        depth: u32,
        scopes: &[String],
    ) -> AnchoredQuery {
        let scope = QueryCompiler::scope_filter(scopes);
        let root = Block::var(Func::uid(anchor))
            .bind_as(ANCHOR_VAR)
            .with_filter(Some(Filter::And(vec![
                Filter::eq(naming::TYPE_NAME, naming::EQUIPMENT_MARKER),
                scope.clone(),
            ])))
            .recurse(depth)
            .traverse(
                Traversal::new(direction.edge(naming::PARENT_EDGE))
                    .with_filter(Some(scope))
                    .bind_as(REACHED_VAR),
            );
        let name = match direction {
            Direction::Ancestors => "Ancestors",
            Direction::Descendants => "Descendants",
        };
        AnchoredQuery {
            query: anchored(name, root),
            vars: QueryVars::new(),
            anchor,
        }
    }

    /// Bounded recursive traversal over equipment type metadata.
    pub fn compile_type_traversal(
        type_uid: Uid,
        direction: Direction,
        depth: u32,
        scopes: &[String],
    ) -> AnchoredQuery {
        let scope = QueryCompiler::scope_filter(scopes);
        let root = Block::var(Func::uid(type_uid))
            .bind_as(ANCHOR_VAR)
            .with_filter(Some(Filter::And(vec![
                Filter::Has(naming::META_EQUIPMENT_TYPE.to_string()),
                scope.clone(),
            ])))
            .recurse(depth)
            .traverse(
                Traversal::new(direction.edge(naming::META_EQUIPMENT_PARENT))
                    .with_filter(Some(scope))
                    .bind_as(REACHED_VAR),
            );
        let rows = Block::named(ROWS_BLOCK, Func::uid_var(REACHED_VAR))
            .order_by(naming::META_EQUIPMENT_TYPE, SortDirection::Asc)
            .select(Selection::field(ID_ALIAS, naming::UID))
            .select(Selection::field(TYPE_ALIAS, naming::META_EQUIPMENT_TYPE));
        let query = Query::new("EquipmentTypeHierarchy")
            .block(root)
            .block(exists_block(ANCHOR_VAR))
            .block(count_block(REACHED_VAR))
            .block(rows);
        AnchoredQuery {
            query,
            vars: QueryVars::new(),
            anchor: type_uid,
        }
    }

    /// Parents of type `parent_type` of the `eq_type` instance `anchor`.
    pub fn compile_parents(
        eq_type: &EquipmentTypeDefinition,
        parent_type: &EquipmentTypeDefinition,
        anchor: Uid,
        scopes: &[String],
    ) -> AnchoredQuery {
        let root = Block::var(Func::uid(anchor))
            .bind_as(ANCHOR_VAR)
            .with_filter(anchor_filter(eq_type, scopes))
            .traverse(
                Traversal::new(Direction::Ancestors.edge(naming::PARENT_EDGE))
                    .with_filter(Some(Filter::And(vec![
                        Filter::eq(naming::EQUIPMENT_TYPE, parent_type.type_name.as_str()),
                        QueryCompiler::scope_filter(scopes),
                    ])))
                    .bind_as(REACHED_VAR),
            );
        let mut rows = Block::named(ROWS_BLOCK, Func::uid_var(REACHED_VAR))
            .order_by(naming::IDENTIFIER, SortDirection::Asc);
        for selection in QueryCompiler::projection(parent_type, false) {
            rows = rows.select(selection);
        }
        let query = Query::new("Parents")
            .block(root)
            .block(exists_block(ANCHOR_VAR))
            .block(count_block(REACHED_VAR))
            .block(rows);
        AnchoredQuery {
            query,
            vars: QueryVars::new(),
            anchor,
        }
    }

    /// Paginated children of type `child_type` of the `eq_type` instance
    /// `anchor`, filtered on the type-relationship path.
    pub fn compile_children(
        eq_type: &EquipmentTypeDefinition,
        child_type: &EquipmentTypeDefinition,
        anchor: Uid,
        spec: &QuerySpec,
        scopes: &[String],
    ) -> AnchoredQuery {
        let root = Block::var(Func::uid(anchor))
            .bind_as(ANCHOR_VAR)
            .with_filter(anchor_filter(eq_type, scopes))
            .traverse(
                Traversal::new(Direction::Descendants.edge(naming::PARENT_EDGE))
                    .with_filter(Some(Filter::And(vec![
                        QueryCompiler::relationship_filter(child_type, &spec.filter),
                        QueryCompiler::scope_filter(scopes),
                    ])))
                    .bind_as(REACHED_VAR),
            );
        let rows = QueryCompiler::rows_block(
            Block::named(ROWS_BLOCK, Func::uid_var(REACHED_VAR)),
            child_type,
            spec,
        );
        let query = Query::new("Children")
            .param(crate::query::OFFSET_VAR, "int")
            .param(crate::query::PAGE_SIZE_VAR, "int")
            .block(root)
            .block(exists_block(ANCHOR_VAR))
            .block(count_block(REACHED_VAR))
            .block(rows);
        AnchoredQuery {
            query,
            vars: QueryCompiler::page_vars(spec),
            anchor,
        }
    }
}

fn anchor_filter(eq_type: &EquipmentTypeDefinition, scopes: &[String]) -> Option<Filter> {
    Some(Filter::And(vec![
        Filter::eq(naming::EQUIPMENT_TYPE, eq_type.type_name.as_str()),
        QueryCompiler::scope_filter(scopes),
    ]))
}

/// Anchor block plus the standard exists/count/rows blocks over `Reached`
fn anchored(name: &str, root: Block) -> Query {
    let rows = Block::named(ROWS_BLOCK, Func::uid_var(REACHED_VAR))
        .order_by(naming::IDENTIFIER, SortDirection::Asc)
        .select(Selection::field(ID_ALIAS, naming::UID))
        .select(Selection::field(IDENTIFIER_ALIAS, naming::IDENTIFIER))
        .select(Selection::field(TYPE_ALIAS, naming::EQUIPMENT_TYPE));
    Query::new(name)
        .block(root)
        .block(exists_block(ANCHOR_VAR))
        .block(count_block(REACHED_VAR))
        .block(rows)
}

fn exists_block(var: &str) -> Block {
    Block::named(EXISTS_BLOCK, Func::uid_var(var)).select(Selection::count(TOTAL_ALIAS))
}

fn count_block(var: &str) -> Block {
    Block::named(COUNT_BLOCK, Func::uid_var(var)).select(Selection::count(TOTAL_ALIAS))
}

fn reached_block(name: &str, var: &str) -> Block {
    Block::named(name, Func::uid_var(var))
        .order_by(naming::IDENTIFIER, SortDirection::Asc)
        .select(Selection::field(ID_ALIAS, naming::UID))
        .select(Selection::field(IDENTIFIER_ALIAS, naming::IDENTIFIER))
        .select(Selection::field(TYPE_ALIAS, naming::EQUIPMENT_TYPE))
}

//! Listing query compilation
//!
//! Compiles a [`QuerySpec`] against an equipment type into one query with
//! three parts:
//!
//! - a candidate var block selecting instances of the type in scope,
//!   filtered by the request's attribute predicates
//! - a count block over the candidates, never paginated
//! - a rows block over the same candidates, sorted and paginated through
//!   the bound `$offset` / `$pagesize` variables
//!
//! Cross-entity filters compile to independent var blocks whose uid sets
//! are intersected with the candidates in both result blocks.

use serde_json::Value;
use tracing::{debug, warn};

use super::ast::{
    Block, Edge, Filter, Func, PageArg, Query, QueryVars, Selection, SortDirection, Traversal,
};
use super::page::EquipmentPage;
use super::render::render_query;
use super::spec::{AggregateFilter, FilterOperator, QuerySpec, RelatedFilters, SearchPredicate};
use crate::errors::{EquipError, EquipResult};
use crate::schema::naming;
use crate::schema::{AttributeSchema, DataType, EquipmentTypeDefinition, FieldValue};
use crate::store::QueryResponse;

pub const ROWS_BLOCK: &str = "Equipments";
pub const COUNT_BLOCK: &str = "NumOfRecords";
pub const TOTAL_ALIAS: &str = "TotalCount";
pub const OFFSET_VAR: &str = "$offset";
pub const PAGE_SIZE_VAR: &str = "$pagesize";

const CANDIDATES_VAR: &str = "EquipID";
const PRODUCT_VAR: &str = "ID_Pro";
const APPLICATION_VAR: &str = "ID_App";
const INSTANCE_VAR: &str = "ID_Ins";

/// Row key carrying the node uid
pub const ID_ALIAS: &str = "ID";

/// Which filter semantics to apply to numeric predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterPath {
    /// Instance listings: numeric equality
    Instance,
    /// Children listings: numeric greater-or-equal, searchable and
    /// displayed attributes only
    Relationship,
}

/// A compiled listing: the query plus the variables it expects
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub query: Query,
    pub vars: QueryVars,
}

impl ListQuery {
    pub fn rows_block(&self) -> Option<&Block> {
        self.query.find_block(ROWS_BLOCK)
    }

    pub fn count_block(&self) -> Option<&Block> {
        self.query.find_block(COUNT_BLOCK)
    }

    pub fn render(&self) -> String {
        render_query(&self.query)
    }

    /// Turn the store's answer into a page; an empty filtered set is
    /// `NoData`.
    pub fn interpret(&self, mut response: QueryResponse) -> EquipResult<EquipmentPage> {
        let total = response.count(COUNT_BLOCK, TOTAL_ALIAS);
        if total == 0 {
            return Err(EquipError::no_data(format!("no {} matched", self.query.name)));
        }
        Ok(EquipmentPage::new(total, response.take_rows(ROWS_BLOCK)))
    }
}

/// A compiled single-instance lookup
#[derive(Debug, Clone, PartialEq)]
pub struct GetQuery {
    pub query: Query,
    identifier: String,
}

impl GetQuery {
    pub const BLOCK: &'static str = "Equipment";

    pub fn render(&self) -> String {
        render_query(&self.query)
    }

    pub fn interpret(&self, mut response: QueryResponse) -> EquipResult<Value> {
        response
            .take_rows(Self::BLOCK)
            .into_iter()
            .next()
            .ok_or_else(|| EquipError::not_found(format!("equipment {}", self.identifier)))
    }
}

pub struct QueryCompiler;

impl QueryCompiler {
    /// Compile a paginated listing of instances of `eq_type`.
    pub fn compile_list(
        eq_type: &EquipmentTypeDefinition,
        spec: &QuerySpec,
        scopes: &[String],
    ) -> ListQuery {
        let mut query = Query::new(ROWS_BLOCK)
            .param(OFFSET_VAR, "int")
            .param(PAGE_SIZE_VAR, "int");

        let (related_blocks, related_filters) = Self::related_blocks(&spec.related, scopes);
        for block in related_blocks {
            query = query.block(block);
        }

        let mut candidate_filters = vec![Self::scope_filter(scopes)];
        candidate_filters.extend(Self::instance_filter(eq_type, &spec.filter));
        query = query.block(
            Block::var(Func::eq(naming::EQUIPMENT_TYPE, eq_type.type_name.as_str()))
                .bind_as(CANDIDATES_VAR)
                .with_filter(Filter::all(candidate_filters)),
        );

        let result_filter = Filter::all(related_filters);
        query = query
            .block(
                Block::named(COUNT_BLOCK, Func::uid_var(CANDIDATES_VAR))
                    .with_filter(result_filter.clone())
                    .select(Selection::count(TOTAL_ALIAS)),
            )
            .block(Self::rows_block(
                Block::named(ROWS_BLOCK, Func::uid_var(CANDIDATES_VAR)).with_filter(result_filter),
                eq_type,
                spec,
            ));

        ListQuery {
            query,
            vars: Self::page_vars(spec),
        }
    }

    /// Compile a lookup of one instance by identifier, projecting every
    /// attribute.
    pub fn compile_get(
        eq_type: &EquipmentTypeDefinition,
        identifier: &str,
        scopes: &[String],
    ) -> GetQuery {
        let filter = Filter::all(vec![
            Filter::eq(naming::EQUIPMENT_TYPE, eq_type.type_name.as_str()),
            Self::scope_filter(scopes),
        ]);
        let mut block =
            Block::named(GetQuery::BLOCK, Func::eq(naming::IDENTIFIER, identifier)).with_filter(filter);
        for selection in Self::projection(eq_type, true) {
            block = block.select(selection);
        }
        GetQuery {
            query: Query::new(GetQuery::BLOCK).block(block),
            identifier: identifier.to_string(),
        }
    }

    /// Count-only query over the instances of a type in scope
    pub fn compile_instance_count(type_name: &str, scopes: &[String]) -> Query {
        Query::new("InstanceCount").block(
            Block::named(COUNT_BLOCK, Func::eq(naming::EQUIPMENT_TYPE, type_name))
                .with_filter(Some(Self::scope_filter(scopes)))
                .select(Selection::count(TOTAL_ALIAS)),
        )
    }

    /// Apply sort, pagination and projection to a result block
    pub(crate) fn rows_block(
        block: Block,
        eq_type: &EquipmentTypeDefinition,
        spec: &QuerySpec,
    ) -> Block {
        let mut block = block
            .order_by(Self::resolve_sort(eq_type, &spec.sort_by), spec.sort_order)
            .paginate(
                PageArg::Var(PAGE_SIZE_VAR.to_string()),
                PageArg::Var(OFFSET_VAR.to_string()),
            );
        for selection in Self::projection(eq_type, false) {
            block = block.select(selection);
        }
        block
    }

    pub(crate) fn page_vars(spec: &QuerySpec) -> QueryVars {
        let mut vars = QueryVars::new();
        vars.insert(OFFSET_VAR.to_string(), spec.offset.to_string());
        vars.insert(PAGE_SIZE_VAR.to_string(), spec.page_size.to_string());
        vars
    }

    /// `eq(scopes, [...])`: the node belongs to any of the scopes
    pub fn scope_filter(scopes: &[String]) -> Filter {
        Filter::eq(
            naming::SCOPES,
            Value::Array(scopes.iter().cloned().map(Value::String).collect()),
        )
    }

    /// Attribute filter for instance listings: numeric equality.
    pub fn instance_filter(
        eq_type: &EquipmentTypeDefinition,
        filter: &AggregateFilter,
    ) -> Option<Filter> {
        Self::attribute_filter(eq_type, filter, FilterPath::Instance)
    }

    /// Attribute filter for type-relationship listings: numeric
    /// greater-or-equal, non-searchable or hidden attributes dropped, and
    /// an implicit equality on the equipment type.
    pub fn relationship_filter(
        eq_type: &EquipmentTypeDefinition,
        filter: &AggregateFilter,
    ) -> Filter {
        let type_filter = Filter::eq(naming::EQUIPMENT_TYPE, eq_type.type_name.as_str());
        match Self::attribute_filter(eq_type, filter, FilterPath::Relationship) {
            Some(attributes) => Filter::And(vec![type_filter, attributes]),
            None => type_filter,
        }
    }

    fn attribute_filter(
        eq_type: &EquipmentTypeDefinition,
        filter: &AggregateFilter,
        path: FilterPath,
    ) -> Option<Filter> {
        let mut clauses = Vec::new();
        for predicate in filter.ordered() {
            let attr = match eq_type.attribute(&predicate.key) {
                Some(attr) => attr,
                None => {
                    warn!(
                        equipment_type = %eq_type.type_name,
                        key = %predicate.key,
                        "dropping filter on unknown attribute"
                    );
                    continue;
                }
            };
            if attr.is_parent_identifier {
                warn!(
                    equipment_type = %eq_type.type_name,
                    key = %predicate.key,
                    "dropping filter on parent identifier"
                );
                continue;
            }
            if path == FilterPath::Relationship && !(attr.is_searchable && attr.is_displayed) {
                debug!(
                    equipment_type = %eq_type.type_name,
                    key = %predicate.key,
                    "dropping filter on attribute that is not searchable and displayed"
                );
                continue;
            }
            if let Some(clause) = Self::predicate_clause(eq_type, attr, predicate, path) {
                clauses.push(clause);
            }
        }
        Filter::all(clauses)
    }

    fn predicate_clause(
        eq_type: &EquipmentTypeDefinition,
        attr: &AttributeSchema,
        predicate: &SearchPredicate,
        path: FilterPath,
    ) -> Option<Filter> {
        let store_predicate = Self::attribute_store_predicate(eq_type, attr);
        let mut alternatives = Vec::new();
        for raw in &predicate.values {
            let value = match FieldValue::convert(attr.data_type, raw) {
                Ok(value) => value,
                Err(reason) => {
                    warn!(
                        equipment_type = %eq_type.type_name,
                        key = %predicate.key,
                        reason = %reason,
                        "dropping filter value"
                    );
                    continue;
                }
            };
            let clause = match (attr.data_type, predicate.operator) {
                (DataType::String, FilterOperator::Eq) => {
                    Filter::eq(store_predicate.as_str(), value.to_json())
                }
                (DataType::String, FilterOperator::Regex) => Filter::regex(
                    store_predicate.as_str(),
                    format!("^{}", regex::escape(&value.to_string())),
                ),
                (_, _) => match path {
                    FilterPath::Instance => Filter::eq(store_predicate.as_str(), value.to_json()),
                    FilterPath::Relationship => {
                        Filter::ge(store_predicate.as_str(), value.to_json())
                    }
                },
            };
            alternatives.push(clause);
        }
        Filter::any(alternatives)
    }

    /// Store predicate holding an attribute's values
    pub fn attribute_store_predicate(
        eq_type: &EquipmentTypeDefinition,
        attr: &AttributeSchema,
    ) -> String {
        if attr.is_identifier {
            naming::IDENTIFIER.to_string()
        } else if attr.is_parent_identifier {
            naming::PARENT_EDGE.to_string()
        } else {
            naming::attribute_predicate(&eq_type.type_name, &attr.name)
        }
    }

    /// Resolve the sort predicate, falling back to `equipment.id` when the
    /// attribute is unknown, hidden or the parent identifier.
    pub fn resolve_sort(eq_type: &EquipmentTypeDefinition, sort_by: &str) -> String {
        if sort_by.is_empty() {
            return naming::IDENTIFIER.to_string();
        }
        let reason = match eq_type.attribute(sort_by) {
            Some(attr) if attr.is_identifier => return naming::IDENTIFIER.to_string(),
            Some(attr) if attr.is_parent_identifier => "parent identifier",
            Some(attr) if !attr.is_displayed => "attribute not displayed",
            Some(attr) => return naming::attribute_predicate(&eq_type.type_name, &attr.name),
            None => "unknown attribute",
        };
        warn!(
            equipment_type = %eq_type.type_name,
            sort_by = %sort_by,
            reason = reason,
            "sorting by equipment.id instead"
        );
        naming::IDENTIFIER.to_string()
    }

    /// Row projection: the uid, the identifier, then displayed attributes
    /// (every plain attribute and the parent link when `all`).
    pub fn projection(eq_type: &EquipmentTypeDefinition, all: bool) -> Vec<Selection> {
        let mut selections = vec![Selection::field(ID_ALIAS, naming::UID)];
        for attr in &eq_type.attributes {
            let alias = naming::sanitize(&attr.name);
            if attr.is_identifier {
                selections.push(Selection::field(alias, naming::IDENTIFIER));
            } else if attr.is_parent_identifier {
                if all {
                    selections.push(Selection::edge(
                        alias,
                        Edge::forward(naming::PARENT_EDGE),
                        vec![
                            Selection::field(ID_ALIAS, naming::UID),
                            Selection::field("EquipID", naming::IDENTIFIER),
                        ],
                    ));
                }
            } else if all || attr.is_displayed {
                selections.push(Selection::field(
                    alias,
                    naming::attribute_predicate(&eq_type.type_name, &attr.name),
                ));
            }
        }
        selections
    }

    fn related_blocks(related: &RelatedFilters, scopes: &[String]) -> (Vec<Block>, Vec<Filter>) {
        let mut blocks = Vec::new();
        let mut filters = Vec::new();
        let scope = || Some(Self::scope_filter(scopes));

        if let Some(ref application) = related.application {
            blocks.push(
                Block::var(Func::eq(naming::APPLICATION_ID, application.as_str()))
                    .with_filter(scope())
                    .traverse(
                        Traversal::new(Edge::forward(naming::APPLICATION_INSTANCE))
                            .with_filter(scope())
                            .then(
                                Traversal::new(Edge::forward(naming::INSTANCE_EQUIPMENT))
                                    .bind_as(APPLICATION_VAR),
                            ),
                    ),
            );
            filters.push(Filter::uid_var(APPLICATION_VAR));
        }
        if let Some(ref product) = related.product {
            blocks.push(
                Block::var(Func::eq(naming::PRODUCT_SWIDTAG, product.as_str()))
                    .with_filter(scope())
                    .traverse(
                        Traversal::new(Edge::forward(naming::PRODUCT_EQUIPMENT))
                            .bind_as(PRODUCT_VAR),
                    ),
            );
            filters.push(Filter::uid_var(PRODUCT_VAR));
        }
        if let Some(ref instance) = related.instance {
            blocks.push(
                Block::var(Func::eq(naming::INSTANCE_ID, instance.as_str()))
                    .with_filter(scope())
                    .traverse(
                        Traversal::new(Edge::forward(naming::INSTANCE_EQUIPMENT))
                            .bind_as(INSTANCE_VAR),
                    ),
            );
            filters.push(Filter::uid_var(INSTANCE_VAR));
        }
        (blocks, filters)
    }
}

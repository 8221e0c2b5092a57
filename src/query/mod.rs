//! Query compilation
//!
//! Listing requests compile into a [`ast::Query`], rendered to text only by
//! [`render`]. Compiled queries are rebuilt on every call.

pub mod ast;
mod compiler;
mod page;
pub mod render;
mod spec;

pub use ast::{Filter, Query, QueryVars, SortDirection};
pub use compiler::{
    GetQuery, ListQuery, QueryCompiler, COUNT_BLOCK, ID_ALIAS, OFFSET_VAR, PAGE_SIZE_VAR,
    ROWS_BLOCK, TOTAL_ALIAS,
};
pub use page::EquipmentPage;
pub use spec::{AggregateFilter, FilterOperator, QuerySpec, RelatedFilters, SearchPredicate};

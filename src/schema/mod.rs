//! Equipment type schemas
//!
//! Equipment types are defined at runtime: their attributes, identifier and
//! parent relationship live in stored metadata. This module validates those
//! definitions and compiles them into storage schema statements.
//!
//! # Design Principles
//!
//! - Validation is pure and never reads the store
//! - Compilation is deterministic and purely additive
//! - Predicate naming is centralized in [`naming`]

mod compiler;
mod errors;
pub mod naming;
mod types;
pub mod validator;
mod value;

pub use compiler::{
    CompiledSchema, IndexKind, PredicateStatement, ScalarKind, SchemaCatalog, SchemaCompiler,
    SchemaStatement, TypeStatement,
};
pub use errors::{ValidationError, ValidationRule};
pub use types::{AttributeSchema, DataType, EquipmentTypeDefinition, MetadataSource, MetadataType};
pub use validator::{SchemaValidator, ValidationResult};
pub use value::FieldValue;

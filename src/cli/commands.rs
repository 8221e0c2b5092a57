//! CLI command implementations
//!
//! Commands are offline: they read definitions from files, run the schema
//! and query compilers, and report the result as JSON. No store is touched.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;

use crate::errors::EquipError;
use crate::query::{QueryCompiler, QuerySpec};
use crate::schema::validator::validate_names;
use crate::schema::{EquipmentTypeDefinition, SchemaCompiler, SchemaStatement, SchemaValidator};

use super::args::Command;
use super::errors::CliResult;
use super::io::read_json;

/// Page size used by `list-query` when no request file is given
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Run a parsed command and return its JSON payload
pub fn run_command(command: Command) -> CliResult<Value> {
    match command {
        Command::Schema { definition } => schema(definition.as_deref()),
        Command::Validate {
            definition,
            columns,
            existing,
        } => validate(&definition, &columns, existing.as_deref()),
        Command::ListQuery {
            definition,
            spec,
            scopes,
        } => list_query(&definition, spec.as_deref(), &scopes),
    }
}

fn statements_json(statements: &[SchemaStatement]) -> Value {
    let lines: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
    json!({ "statements": lines })
}

/// Schema statements of one type, or the shared base statements
pub fn schema(definition: Option<&Path>) -> CliResult<Value> {
    let Some(path) = definition else {
        return Ok(statements_json(&SchemaCompiler::base_statements()));
    };
    let def: EquipmentTypeDefinition = read_json(path)?;
    validate_names(&def).map_err(EquipError::from)?;
    let compiled = SchemaCompiler::compile_schema(&def.type_name, &def.attributes);
    debug!(
        equipment_type = %def.type_name,
        predicates = compiled.predicates.len(),
        "schema compiled"
    );
    let mut out = statements_json(&compiled.statements());
    out["type_name"] = json!(def.type_name);
    Ok(out)
}

/// Check a candidate type against the source columns and the existing types
pub fn validate(
    definition: &Path,
    columns: &[String],
    existing: Option<&Path>,
) -> CliResult<Value> {
    let candidate: EquipmentTypeDefinition = read_json(definition)?;
    let existing: Vec<EquipmentTypeDefinition> = match existing {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let available: BTreeSet<String> = columns.iter().map(|c| c.trim().to_string()).collect();

    SchemaValidator::new(&available)
        .validate_creation(&existing, &candidate)
        .map_err(EquipError::from)?;
    Ok(json!({ "type_name": candidate.type_name, "valid": true }))
}

/// Compiled listing query text and the variables it binds
pub fn list_query(definition: &Path, spec: Option<&Path>, scopes: &[String]) -> CliResult<Value> {
    let def: EquipmentTypeDefinition = read_json(definition)?;
    validate_names(&def).map_err(EquipError::from)?;
    let spec: QuerySpec = match spec {
        Some(path) => read_json(path)?,
        None => QuerySpec::new(DEFAULT_PAGE_SIZE),
    };
    let compiled = QueryCompiler::compile_list(&def, &spec, scopes);
    Ok(json!({
        "query": compiled.render(),
        "variables": compiled.vars,
    }))
}

//! Schema compilation
//!
//! Turns a validated attribute list into storage schema statements:
//! one predicate declaration per plain attribute plus a single aggregate
//! type declaration. Identifier and parent identifier attributes map to
//! the shared `equipment.id` / `equipment.parent` predicates declared once
//! by [`SchemaCompiler::base_statements`].
//!
//! Compilation is deterministic and purely additive, so replaying the
//! output of an earlier compile through [`SchemaCatalog`] yields nothing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::naming;
use super::types::{AttributeSchema, DataType};

/// Storage value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    /// Edge to another node
    Uid,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Uid => "uid",
        }
    }
}

impl From<DataType> for ScalarKind {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::String => ScalarKind::String,
            DataType::Int => ScalarKind::Int,
            DataType::Float => ScalarKind::Float,
        }
    }
}

/// Index directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Exact,
    Trigram,
    Int,
    Float,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Exact => "exact",
            IndexKind::Trigram => "trigram",
            IndexKind::Int => "int",
            IndexKind::Float => "float",
        }
    }

    /// Index used for a searchable attribute of the given type
    pub fn for_data_type(data_type: DataType) -> Vec<IndexKind> {
        match data_type {
            DataType::String => vec![IndexKind::Exact, IndexKind::Trigram],
            DataType::Int => vec![IndexKind::Int],
            DataType::Float => vec![IndexKind::Float],
        }
    }
}

/// One predicate declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateStatement {
    pub predicate: String,
    pub kind: ScalarKind,
    pub list: bool,
    pub indexes: Vec<IndexKind>,
    /// Maintain reverse edges (uid predicates only)
    pub reverse: bool,
}

impl PredicateStatement {
    pub fn new(predicate: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            predicate: predicate.into(),
            kind,
            list: false,
            indexes: Vec::new(),
            reverse: false,
        }
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn indexed(mut self, indexes: &[IndexKind]) -> Self {
        self.indexes = indexes.to_vec();
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }
}

impl fmt::Display for PredicateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "{}: [{}]", self.predicate, self.kind.as_str())?;
        } else {
            write!(f, "{}: {}", self.predicate, self.kind.as_str())?;
        }
        if !self.indexes.is_empty() {
            let names: Vec<&str> = self.indexes.iter().map(|i| i.as_str()).collect();
            write!(f, " @index({})", names.join(", "))?;
        }
        if self.reverse {
            write!(f, " @reverse")?;
        }
        write!(f, " .")
    }
}

/// Aggregate type declaration listing every predicate of a node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStatement {
    pub name: String,
    pub fields: Vec<String>,
}

impl fmt::Display for TypeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type {} {{", self.name)?;
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        write!(f, "}}")
    }
}

/// A single schema alteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "lowercase")]
pub enum SchemaStatement {
    Predicate(PredicateStatement),
    Type(TypeStatement),
}

impl SchemaStatement {
    /// Key under which the store tracks this statement
    pub fn key(&self) -> String {
        match self {
            SchemaStatement::Predicate(p) => p.predicate.clone(),
            SchemaStatement::Type(t) => format!("type {}", t.name),
        }
    }
}

impl fmt::Display for SchemaStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaStatement::Predicate(p) => write!(f, "{}", p),
            SchemaStatement::Type(t) => write!(f, "{}", t),
        }
    }
}

/// Output of compiling one equipment type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledSchema {
    pub predicates: Vec<PredicateStatement>,
    pub type_declaration: TypeStatement,
}

impl CompiledSchema {
    /// Predicate statements followed by the type declaration
    pub fn statements(&self) -> Vec<SchemaStatement> {
        let mut out: Vec<SchemaStatement> = self
            .predicates
            .iter()
            .cloned()
            .map(SchemaStatement::Predicate)
            .collect();
        out.push(SchemaStatement::Type(self.type_declaration.clone()));
        out
    }

    /// Text form accepted by the store's alter endpoint
    pub fn render(&self) -> String {
        self.statements()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Bookkeeping predicates every equipment type declaration lists first
const BOOKKEEPING_FIELDS: [&str; 5] = [
    naming::TYPE_NAME,
    naming::SCOPES,
    naming::UPDATED,
    naming::CREATED,
    naming::EQUIPMENT_USERS,
];

pub struct SchemaCompiler;

impl SchemaCompiler {
    /// Compile the schema statements for an equipment type.
    pub fn compile_schema(type_name: &str, attributes: &[AttributeSchema]) -> CompiledSchema {
        let mut predicates = Vec::new();
        for attr in attributes.iter().filter(|a| a.is_plain()) {
            let mut statement = PredicateStatement::new(
                naming::attribute_predicate(type_name, &attr.name),
                attr.data_type.into(),
            );
            if attr.is_searchable {
                statement.indexes = IndexKind::for_data_type(attr.data_type);
            }
            predicates.push(statement);
        }

        let mut fields: Vec<String> = BOOKKEEPING_FIELDS.iter().map(|f| f.to_string()).collect();
        fields.push(naming::IDENTIFIER.to_string());
        fields.push(naming::PARENT_EDGE.to_string());
        fields.extend(predicates.iter().map(|p| p.predicate.clone()));

        CompiledSchema {
            predicates,
            type_declaration: TypeStatement {
                name: naming::type_declaration(type_name),
                fields,
            },
        }
    }

    /// Shared predicates used by every equipment type, metadata and
    /// related entities.
    pub fn base_statements() -> Vec<SchemaStatement> {
        use IndexKind::{Exact, Trigram};
        use ScalarKind::{Bool, DateTime, Int, String as Str, Uid};

        let predicates = vec![
            PredicateStatement::new(naming::IDENTIFIER, Str).indexed(&[Exact, Trigram]),
            PredicateStatement::new(naming::EQUIPMENT_TYPE, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::PARENT_EDGE, Uid).reverse(),
            PredicateStatement::new(naming::EQUIPMENT_USERS, Uid).list().reverse(),
            PredicateStatement::new(naming::SCOPES, Str).list().indexed(&[Exact]),
            PredicateStatement::new(naming::TYPE_NAME, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::NODE_TYPE, Str).list().indexed(&[Exact]),
            PredicateStatement::new(naming::CREATED, DateTime),
            PredicateStatement::new(naming::UPDATED, DateTime),
            PredicateStatement::new(naming::RECYCLE, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::META_EQUIPMENT_TYPE, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::META_EQUIPMENT_PARENT, Uid).reverse(),
            PredicateStatement::new(naming::META_EQUIPMENT_SOURCE, Uid).reverse(),
            PredicateStatement::new(naming::META_EQUIPMENT_ATTRIBUTE, Uid).list(),
            PredicateStatement::new(naming::ATTR_NAME, Str),
            PredicateStatement::new(naming::ATTR_TYPE, Int),
            PredicateStatement::new(naming::ATTR_SCHEMA_NAME, Str),
            PredicateStatement::new(naming::ATTR_SEARCHABLE, Bool),
            PredicateStatement::new(naming::ATTR_DISPLAYED, Bool),
            PredicateStatement::new(naming::ATTR_IDENTIFIER, Bool),
            PredicateStatement::new(naming::ATTR_PARENT_IDENTIFIER, Bool),
            PredicateStatement::new(naming::ATTR_MAPPED_TO, Str),
            PredicateStatement::new(naming::METADATA_SOURCE, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::METADATA_TYPE, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::METADATA_ATTRIBUTES, Str).list(),
            PredicateStatement::new(naming::PRODUCT_SWIDTAG, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::PRODUCT_EQUIPMENT, Uid).list().reverse(),
            PredicateStatement::new(naming::APPLICATION_ID, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::APPLICATION_INSTANCE, Uid).list().reverse(),
            PredicateStatement::new(naming::INSTANCE_ID, Str).indexed(&[Exact]),
            PredicateStatement::new(naming::INSTANCE_EQUIPMENT, Uid).list().reverse(),
        ];

        let mut statements: Vec<SchemaStatement> =
            predicates.into_iter().map(SchemaStatement::Predicate).collect();
        statements.push(SchemaStatement::Type(TypeStatement {
            name: naming::EQUIPMENT_NODE_TYPE.to_string(),
            fields: vec![
                naming::TYPE_NAME.to_string(),
                naming::SCOPES.to_string(),
                naming::IDENTIFIER.to_string(),
                naming::EQUIPMENT_TYPE.to_string(),
                naming::PARENT_EDGE.to_string(),
            ],
        }));
        statements
    }
}

/// Applied schema statements, keyed by predicate or type name
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    applied: BTreeMap<String, SchemaStatement>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statements not yet applied in their exact form, in input order
    pub fn missing(&self, statements: &[SchemaStatement]) -> Vec<SchemaStatement> {
        statements
            .iter()
            .filter(|s| self.applied.get(&s.key()) != Some(*s))
            .cloned()
            .collect()
    }

    pub fn record(&mut self, statements: &[SchemaStatement]) {
        for statement in statements {
            self.applied.insert(statement.key(), statement.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&SchemaStatement> {
        self.applied.get(key)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

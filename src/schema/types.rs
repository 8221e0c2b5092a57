//! Equipment type definitions
//!
//! Supported attribute types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - float: 64-bit floating point

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attribute data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
}

impl DataType {
    /// Returns the type name used in schema statements and messages
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Float => "float",
        }
    }

    /// Numeric code persisted on attribute nodes
    pub fn code(&self) -> i64 {
        match self {
            DataType::String => 1,
            DataType::Int => 2,
            DataType::Float => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DataType::String),
            2 => Some(DataType::Int),
            3 => Some(DataType::Float),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

/// One field of an equipment type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Store id, empty until persisted
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_identifier: bool,
    #[serde(default)]
    pub is_parent_identifier: bool,
    #[serde(default)]
    pub is_searchable: bool,
    #[serde(default)]
    pub is_displayed: bool,
    /// Column of the metadata source this attribute is read from
    pub mapped_to: String,
}

impl AttributeSchema {
    /// Create a plain attribute; flags default to false
    pub fn new(name: impl Into<String>, data_type: DataType, mapped_to: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            data_type,
            is_identifier: false,
            is_parent_identifier: false,
            is_searchable: false,
            is_displayed: false,
            mapped_to: mapped_to.into(),
        }
    }

    /// Create a displayed string identifier
    pub fn identifier(name: impl Into<String>, mapped_to: impl Into<String>) -> Self {
        Self::new(name, DataType::String, mapped_to)
            .as_identifier()
            .displayed()
    }

    /// Create a string parent identifier
    pub fn parent_identifier(name: impl Into<String>, mapped_to: impl Into<String>) -> Self {
        Self::new(name, DataType::String, mapped_to).as_parent_identifier()
    }

    pub fn as_identifier(mut self) -> Self {
        self.is_identifier = true;
        self
    }

    pub fn as_parent_identifier(mut self) -> Self {
        self.is_parent_identifier = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.is_searchable = true;
        self
    }

    pub fn displayed(mut self) -> Self {
        self.is_displayed = true;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Plain attributes get their own per-type predicate
    pub fn is_plain(&self) -> bool {
        !self.is_identifier && !self.is_parent_identifier
    }
}

/// A user-defined equipment type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentTypeDefinition {
    #[serde(default)]
    pub id: String,
    pub type_name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parent_type_name: Option<String>,
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
}

impl EquipmentTypeDefinition {
    pub fn new(type_name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            type_name: type_name.into(),
            parent_id: None,
            parent_type_name: None,
            source_id: source_id.into(),
            source_name: String::new(),
            scopes: BTreeSet::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Parent id, treating an empty string as no parent
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }

    pub fn identifier_attribute(&self) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.is_identifier)
    }

    pub fn parent_identifier_attribute(&self) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.is_parent_identifier)
    }

    /// Exact-name attribute lookup
    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Kind of data a metadata source describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataType {
    Equipment,
}

impl MetadataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataType::Equipment => "equipment",
        }
    }
}

/// An ingestion source and the columns it provides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSource {
    #[serde(default)]
    pub id: String,
    pub source_name: String,
    pub metadata_type: MetadataType,
    pub scope: String,
    #[serde(default)]
    pub available_columns: BTreeSet<String>,
}

impl MetadataSource {
    pub fn equipment(source_name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            source_name: source_name.into(),
            metadata_type: MetadataType::Equipment,
            scope: scope.into(),
            available_columns: BTreeSet::new(),
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }
}

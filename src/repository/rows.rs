//! Stored metadata rows and their projections

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{EquipError, EquipResult};
use crate::query::ast::{Edge, Selection};
use crate::query::ID_ALIAS;
use crate::schema::naming;
use crate::schema::{
    AttributeSchema, DataType, EquipmentTypeDefinition, MetadataSource, MetadataType,
};

pub(super) fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> EquipResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(EquipError::from))
        .collect()
}

/// Selections reading an equipment type node with its source, parent and
/// attributes
pub(super) fn type_projection() -> Vec<Selection> {
    vec![
        Selection::field(ID_ALIAS, naming::UID),
        Selection::field("Type", naming::META_EQUIPMENT_TYPE),
        Selection::edge(
            "DataSource",
            Edge::forward(naming::META_EQUIPMENT_SOURCE),
            vec![
                Selection::field(ID_ALIAS, naming::UID),
                Selection::field("Source", naming::METADATA_SOURCE),
            ],
        ),
        Selection::edge(
            "Parent",
            Edge::forward(naming::META_EQUIPMENT_PARENT),
            vec![
                Selection::field(ID_ALIAS, naming::UID),
                Selection::field("TypeName", naming::META_EQUIPMENT_TYPE),
            ],
        ),
        Selection::field("Scopes", naming::SCOPES),
        Selection::edge(
            "Attributes",
            Edge::forward(naming::META_EQUIPMENT_ATTRIBUTE),
            vec![
                Selection::field(ID_ALIAS, naming::UID),
                Selection::field("Name", naming::ATTR_NAME),
                Selection::field("Type", naming::ATTR_TYPE),
                Selection::field("IsDisplayed", naming::ATTR_DISPLAYED),
                Selection::field("IsIdentifier", naming::ATTR_IDENTIFIER),
                Selection::field("IsParentIdentifier", naming::ATTR_PARENT_IDENTIFIER),
                Selection::field("IsSearchable", naming::ATTR_SEARCHABLE),
                Selection::field("MappedTo", naming::ATTR_MAPPED_TO),
            ],
        ),
    ]
}

pub(super) fn metadata_projection() -> Vec<Selection> {
    vec![
        Selection::field(ID_ALIAS, naming::UID),
        Selection::field("Source", naming::METADATA_SOURCE),
        Selection::field("Type", naming::METADATA_TYPE),
        Selection::field("Scopes", naming::SCOPES),
        Selection::field("Attributes", naming::METADATA_ATTRIBUTES),
    ]
}

#[derive(Debug, Deserialize)]
struct NodeRef {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Source", default)]
    source: String,
    #[serde(rename = "TypeName", default)]
    type_name: String,
}

#[derive(Debug, Deserialize)]
struct AttributeRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    type_code: i64,
    #[serde(rename = "IsDisplayed", default)]
    displayed: bool,
    #[serde(rename = "IsIdentifier", default)]
    identifier: bool,
    #[serde(rename = "IsParentIdentifier", default)]
    parent_identifier: bool,
    #[serde(rename = "IsSearchable", default)]
    searchable: bool,
    #[serde(rename = "MappedTo", default)]
    mapped_to: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TypeRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Type", default)]
    type_name: String,
    #[serde(rename = "DataSource", default)]
    data_source: Vec<NodeRef>,
    #[serde(rename = "Parent", default)]
    parent: Vec<NodeRef>,
    #[serde(rename = "Scopes", default)]
    scopes: Vec<String>,
    #[serde(rename = "Attributes", default)]
    attributes: Vec<AttributeRow>,
}

impl TypeRow {
    pub(super) fn into_definition(self) -> EquipResult<EquipmentTypeDefinition> {
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for row in self.attributes {
            let data_type = DataType::from_code(row.type_code).ok_or_else(|| {
                EquipError::internal(
                    "load equipment type",
                    format!("attribute {} has unknown type code {}", row.name, row.type_code),
                )
            })?;
            attributes.push(AttributeSchema {
                id: row.id,
                name: row.name,
                data_type,
                is_identifier: row.identifier,
                is_parent_identifier: row.parent_identifier,
                is_searchable: row.searchable,
                is_displayed: row.displayed,
                mapped_to: row.mapped_to,
            });
        }
        let source = self.data_source.into_iter().next();
        let parent = self.parent.into_iter().next();
        Ok(EquipmentTypeDefinition {
            id: self.id,
            type_name: self.type_name,
            parent_id: parent.as_ref().map(|p| p.id.clone()),
            parent_type_name: parent.map(|p| p.type_name),
            source_id: source.as_ref().map(|s| s.id.clone()).unwrap_or_default(),
            source_name: source.map(|s| s.source).unwrap_or_default(),
            scopes: self.scopes.into_iter().collect(),
            attributes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct MetadataRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Type", default)]
    metadata_type: String,
    #[serde(rename = "Scopes", default)]
    scopes: Vec<String>,
    #[serde(rename = "Attributes", default)]
    attributes: Vec<String>,
}

impl MetadataRow {
    pub(super) fn into_source(self) -> EquipResult<MetadataSource> {
        let metadata_type = match self.metadata_type.as_str() {
            "equipment" => MetadataType::Equipment,
            other => {
                return Err(EquipError::internal(
                    "load metadata",
                    format!("unsupported metadata type '{}' on {}", other, self.source),
                ))
            }
        };
        Ok(MetadataSource {
            id: self.id,
            source_name: self.source,
            metadata_type,
            scope: self.scopes.into_iter().next().unwrap_or_default(),
            available_columns: self.attributes.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_row_conversion() {
        let rows: Vec<TypeRow> = parse_rows(vec![json!({
            "ID": "0x5",
            "Type": "server",
            "DataSource": [{ "ID": "0x2", "Source": "servers.csv" }],
            "Parent": [{ "ID": "0x4", "TypeName": "cluster" }],
            "Scopes": ["s1"],
            "Attributes": [
                { "ID": "0x6", "Name": "server_id", "Type": 1, "IsDisplayed": true,
                  "IsIdentifier": true, "MappedTo": "id" },
                { "ID": "0x7", "Name": "cores", "Type": 2, "IsSearchable": true,
                  "IsDisplayed": true, "MappedTo": "cores" }
            ]
        })])
        .unwrap();
        let def = rows.into_iter().next().unwrap().into_definition().unwrap();
        assert_eq!(def.parent(), Some("0x4"));
        assert_eq!(def.parent_type_name.as_deref(), Some("cluster"));
        assert_eq!(def.source_name, "servers.csv");
        assert_eq!(def.identifier_attribute().map(|a| a.name.as_str()), Some("server_id"));
        assert_eq!(def.attributes[1].data_type, DataType::Int);
    }

    #[test]
    fn test_unknown_type_code() {
        let rows: Vec<TypeRow> = parse_rows(vec![json!({
            "ID": "0x5",
            "Type": "server",
            "Attributes": [{ "ID": "0x6", "Name": "x", "Type": 9 }]
        })])
        .unwrap();
        let err = rows.into_iter().next().unwrap().into_definition().unwrap_err();
        assert_eq!(err.code(), "EQP_INTERNAL");
    }

    #[test]
    fn test_metadata_row_conversion() {
        let rows: Vec<MetadataRow> = parse_rows(vec![json!({
            "ID": "0x2",
            "Source": "servers.csv",
            "Type": "equipment",
            "Scopes": ["s1"],
            "Attributes": ["id", "cores"]
        })])
        .unwrap();
        let source = rows.into_iter().next().unwrap().into_source().unwrap();
        assert_eq!(source.scope, "s1");
        assert!(source.available_columns.contains("cores"));
    }
}

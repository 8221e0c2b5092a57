//! Schema-driven record binding

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::errors::EquipResult;
use crate::query::QueryCompiler;
use crate::schema::{
    AttributeSchema, DataType, EquipmentTypeDefinition, FieldValue, ValidationError,
    ValidationRule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    Identifier,
    ParentIdentifier,
    Attribute,
}

/// How one attribute is read from a payload and where it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Payload key (the attribute's `mapped_to` column)
    pub source: String,
    pub kind: DataType,
    pub role: FieldRole,
    /// Store predicate receiving the value
    pub predicate: String,
}

impl FieldDescriptor {
    fn for_attribute(eq_type: &EquipmentTypeDefinition, attr: &AttributeSchema) -> Self {
        let role = if attr.is_identifier {
            FieldRole::Identifier
        } else if attr.is_parent_identifier {
            FieldRole::ParentIdentifier
        } else {
            FieldRole::Attribute
        };
        Self {
            name: attr.name.clone(),
            source: attr.mapped_to.clone(),
            kind: attr.data_type,
            role,
            predicate: QueryCompiler::attribute_store_predicate(eq_type, attr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundField {
    pub name: String,
    pub predicate: String,
    pub value: FieldValue,
}

/// A payload bound to an equipment type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub type_name: String,
    pub identifier: String,
    pub parent_identifier: Option<String>,
    /// Plain attribute values in attribute order; absent fields are omitted
    pub values: Vec<BoundField>,
}

impl Record {
    /// Value of a field by attribute name, identifier included
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.values
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.clone())
    }
}

/// Binds raw payloads to one equipment type
#[derive(Debug, Clone)]
pub struct RecordBinder {
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordBinder {
    /// Build the field descriptors of `eq_type`; a type without identifier
    /// cannot bind anything.
    pub fn for_type(eq_type: &EquipmentTypeDefinition) -> EquipResult<Self> {
        if eq_type.identifier_attribute().is_none() {
            return Err(ValidationError::new(
                ValidationRule::MissingIdentifier,
                "equipment type has no identifier attribute",
            )
            .on(eq_type.type_name.clone())
            .into());
        }
        let fields = eq_type
            .attributes
            .iter()
            .map(|attr| FieldDescriptor::for_attribute(eq_type, attr))
            .collect();
        Ok(Self {
            type_name: eq_type.type_name.clone(),
            fields,
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn bind(&self, raw: &Map<String, Value>) -> EquipResult<Record> {
        let mut identifier = None;
        let mut parent_identifier = None;
        let mut values = Vec::new();

        for field in &self.fields {
            let value = match raw.get(&field.source) {
                None | Some(Value::Null) => None,
                Some(raw_value) => Some(
                    FieldValue::convert(field.kind, raw_value)
                        .map_err(|reason| ValidationError::invalid_payload(&field.source, reason))?,
                ),
            };
            match field.role {
                FieldRole::Identifier => {
                    identifier = value.and_then(|v| non_empty(v.to_string()));
                }
                FieldRole::ParentIdentifier => {
                    parent_identifier = value.and_then(|v| non_empty(v.to_string()));
                }
                FieldRole::Attribute => {
                    if let Some(value) = value {
                        values.push(BoundField {
                            name: field.name.clone(),
                            predicate: field.predicate.clone(),
                            value,
                        });
                    }
                }
            }
        }

        let identifier = identifier.ok_or_else(|| {
            let source = self
                .fields
                .iter()
                .find(|f| f.role == FieldRole::Identifier)
                .map(|f| f.source.as_str())
                .unwrap_or_default();
            ValidationError::new(
                ValidationRule::MissingIdentifier,
                format!("payload has no value for identifier column '{}'", source),
            )
            .on(self.type_name.clone())
        })?;

        trace!(
            equipment_type = %self.type_name,
            identifier = %identifier,
            fields = values.len(),
            "bound record"
        );

        let mut record = Record {
            type_name: self.type_name.clone(),
            identifier,
            parent_identifier,
            values,
        };
        if let Some(id_field) = self.fields.iter().find(|f| f.role == FieldRole::Identifier) {
            record.values.insert(
                0,
                BoundField {
                    name: id_field.name.clone(),
                    predicate: id_field.predicate.clone(),
                    value: FieldValue::String(record.identifier.clone()),
                },
            );
        }
        Ok(record)
    }

    /// Bind a flat string map, as produced by CSV-like sources
    pub fn bind_strings<'a, I>(&self, raw: I) -> EquipResult<Record>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let map: Map<String, Value> = raw
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        self.bind(&map)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

//! Store predicate and type naming conventions
//!
//! These names are shared with every other service reading the same graph
//! and must not change.

/// Global identifier predicate shared by every equipment type
pub const IDENTIFIER: &str = "equipment.id";
/// Global child → parent edge
pub const PARENT_EDGE: &str = "equipment.parent";
/// Equipment type name stored on each instance
pub const EQUIPMENT_TYPE: &str = "equipment.type";
pub const EQUIPMENT_USERS: &str = "equipment.users";

pub const SCOPES: &str = "scopes";
pub const TYPE_NAME: &str = "type_name";
pub const NODE_TYPE: &str = "dgraph.type";
pub const CREATED: &str = "created";
pub const UPDATED: &str = "updated";
/// Soft-delete marker
pub const RECYCLE: &str = "Recycle";
pub const UID: &str = "uid";

/// `type_name` value carried by equipment instances
pub const EQUIPMENT_MARKER: &str = "equipment";
pub const EQUIPMENT_NODE_TYPE: &str = "Equipment";
/// `type_name` value carried by metadata sources
pub const METADATA_MARKER: &str = "metadata";
pub const METADATA_NODE_TYPE: &str = "Metadata";
pub const METADATA_EQUIPMENT_NODE_TYPE: &str = "MetadataEquipment";
pub const ATTRIBUTE_NODE_TYPE: &str = "Attribute";

// Equipment type metadata
pub const META_EQUIPMENT_TYPE: &str = "metadata.equipment.type";
pub const META_EQUIPMENT_PARENT: &str = "metadata.equipment.parent";
pub const META_EQUIPMENT_SOURCE: &str = "metadata.equipment.source";
pub const META_EQUIPMENT_ATTRIBUTE: &str = "metadata.equipment.attribute";

// Attribute nodes
pub const ATTR_NAME: &str = "attribute.name";
pub const ATTR_TYPE: &str = "attribute.type";
pub const ATTR_SCHEMA_NAME: &str = "attribute.schema_name";
pub const ATTR_SEARCHABLE: &str = "attribute.searchable";
pub const ATTR_DISPLAYED: &str = "attribute.displayed";
pub const ATTR_IDENTIFIER: &str = "attribute.identifier";
pub const ATTR_PARENT_IDENTIFIER: &str = "attribute.parentIdentifier";
pub const ATTR_MAPPED_TO: &str = "attribute.mapped_to";

// Metadata sources
pub const METADATA_SOURCE: &str = "metadata.source";
pub const METADATA_TYPE: &str = "metadata.type";
pub const METADATA_ATTRIBUTES: &str = "metadata.attributes";

// Related entities
pub const PRODUCT_SWIDTAG: &str = "product.swidtag";
pub const PRODUCT_EQUIPMENT: &str = "product.equipment";
pub const APPLICATION_ID: &str = "application.id";
pub const APPLICATION_INSTANCE: &str = "application.instance";
pub const INSTANCE_ID: &str = "instance.id";
pub const INSTANCE_EQUIPMENT: &str = "instance.equipment";

/// Trim and replace inner whitespace with underscores
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Whether `name` can be spliced into predicates and aliases as is:
/// non-empty, ASCII letters, digits, `_`, `.` and `-` only
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Per-type predicate for a plain attribute: `equipment.<type>.<name>`
pub fn attribute_predicate(type_name: &str, attribute_name: &str) -> String {
    format!("equipment.{}.{}", type_name, sanitize(attribute_name))
}

/// Aggregate type declaration name: `Equipment<type>`
pub fn type_declaration(type_name: &str) -> String {
    format!("{}{}", EQUIPMENT_NODE_TYPE, type_name)
}

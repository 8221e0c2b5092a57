//! Structural validation of equipment type definitions
//!
//! Rules enforced:
//! - Type and attribute names are predicate-safe
//! - Exactly one identifier, string and displayed
//! - At most one parent identifier, string, present iff a parent is set
//! - Attribute names unique (case-insensitive), mappings unique and known
//! - Searchable attributes are displayed
//! - Type parent graph stays a forest
//!
//! Validation is pure: it never touches the store. Callers fetch the
//! existing types, descendants and instance counts beforehand.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::errors::{ValidationError, ValidationRule};
use super::naming;
use super::types::{AttributeSchema, DataType, EquipmentTypeDefinition};

/// Result type for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Stateless validator over candidate definitions
pub struct SchemaValidator<'a> {
    available_columns: &'a BTreeSet<String>,
}

impl<'a> SchemaValidator<'a> {
    /// Creates a validator bound to the columns of a metadata source.
    pub fn new(available_columns: &'a BTreeSet<String>) -> Self {
        Self { available_columns }
    }

    /// Validates a new equipment type.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule, checked in order: type name,
    /// parent exists, identifier count, parent identifier count, then
    /// per-attribute rules.
    pub fn validate_creation(
        &self,
        existing_types: &[EquipmentTypeDefinition],
        candidate: &EquipmentTypeDefinition,
    ) -> ValidationResult<()> {
        validate_names(candidate)?;
        if let Some(parent_id) = candidate.parent() {
            if !existing_types.iter().any(|t| t.id == parent_id) {
                return Err(ValidationError::parent_not_found(parent_id));
            }
        }

        let identifiers = candidate.attributes.iter().filter(|a| a.is_identifier).count();
        let parent_keys = candidate
            .attributes
            .iter()
            .filter(|a| a.is_parent_identifier)
            .count();

        match identifiers {
            0 => {
                return Err(ValidationError::new(
                    ValidationRule::MissingIdentifier,
                    "one of the attributes must be the identifier",
                ))
            }
            1 => {}
            n => {
                return Err(ValidationError::new(
                    ValidationRule::MultipleIdentifiers,
                    format!("{} identifiers found, only one is allowed", n),
                ))
            }
        }

        match (candidate.parent().is_some(), parent_keys) {
            (false, 0) | (true, 1) => {}
            (false, _) => {
                return Err(ValidationError::new(
                    ValidationRule::ParentKeyCountMismatch,
                    "parent identifier not allowed when no parent type is selected",
                ))
            }
            (true, 0) => {
                return Err(ValidationError::new(
                    ValidationRule::ParentKeyCountMismatch,
                    "one parent identifier required when a parent type is selected",
                ))
            }
            (true, n) => {
                return Err(ValidationError::new(
                    ValidationRule::ParentKeyCountMismatch,
                    format!("{} parent identifiers found, only one is allowed", n),
                ))
            }
        }

        let mut names = NameRegistry::default();
        for attr in &candidate.attributes {
            names.register(attr, self.available_columns)?;
            validate_attribute_flags(attr)?;
        }
        Ok(())
    }

    /// Validates attributes added to an existing type, together with an
    /// optional parent assignment.
    ///
    /// `parent_id` is the parent requested by the update, if any.
    pub fn validate_update(
        &self,
        existing: &EquipmentTypeDefinition,
        parent_id: Option<&str>,
        new_attributes: &[AttributeSchema],
    ) -> ValidationResult<()> {
        let mut parent_keys = 0;
        for attr in new_attributes {
            if attr.is_identifier {
                return Err(ValidationError::new(
                    ValidationRule::IdentifierResubmitted,
                    "identifier cannot be changed once the type exists",
                )
                .on(&attr.name));
            }
            if attr.is_parent_identifier {
                parent_keys += 1;
                if attr.data_type != DataType::String {
                    return Err(parent_key_wrong_type(attr));
                }
            }
        }

        let requested_parent = parent_id.filter(|p| !p.is_empty());
        let has_parent_key = existing.parent_identifier_attribute().is_some();
        match parent_keys {
            0 => {
                if existing.parent().is_none() && requested_parent.is_some() && !has_parent_key {
                    return Err(ValidationError::new(
                        ValidationRule::ParentKeyCountMismatch,
                        "one parent identifier required",
                    ));
                }
            }
            1 => {
                if existing.parent().is_some() || has_parent_key {
                    return Err(ValidationError::new(
                        ValidationRule::ParentKeyCountMismatch,
                        "no parent identifier required when parent is already present",
                    ));
                }
                if requested_parent.is_none() {
                    return Err(ValidationError::new(
                        ValidationRule::ParentKeyCountMismatch,
                        "parent is not selected for equipment type",
                    ));
                }
            }
            n => {
                return Err(ValidationError::new(
                    ValidationRule::ParentKeyCountMismatch,
                    format!("{} parent identifiers found, only one is allowed", n),
                ))
            }
        }

        let mut names = NameRegistry::default();
        for attr in &existing.attributes {
            names.seed(attr);
        }
        for attr in new_attributes {
            names.register(attr, self.available_columns)?;
            validate_attribute_flags(attr)?;
        }
        Ok(())
    }
}

/// Checks that the type name and every attribute name can be spliced into
/// predicates; attribute names are checked after whitespace sanitizing.
pub fn validate_names(definition: &EquipmentTypeDefinition) -> ValidationResult<()> {
    if !naming::is_safe_name(&definition.type_name) {
        return Err(ValidationError::invalid_name(&definition.type_name));
    }
    for attr in &definition.attributes {
        if !naming::is_safe_name(&naming::sanitize(&attr.name)) {
            return Err(ValidationError::invalid_name(&attr.name));
        }
    }
    Ok(())
}

/// Validates a parent assignment on an existing type.
///
/// `descendant_ids` are the ids of every type below `existing`;
/// `has_instances` whether equipment of `existing` exists in scope.
pub fn validate_parent_change(
    existing: &EquipmentTypeDefinition,
    new_parent_id: &str,
    existing_types: &[EquipmentTypeDefinition],
    descendant_ids: &HashSet<String>,
    has_instances: bool,
) -> ValidationResult<()> {
    if new_parent_id == existing.id {
        return Err(ValidationError::new(
            ValidationRule::SelfParent,
            "equipment type cannot be parent of itself",
        )
        .on(&existing.type_name));
    }
    if !existing_types.iter().any(|t| t.id == new_parent_id) {
        return Err(ValidationError::parent_not_found(new_parent_id));
    }
    if descendant_ids.contains(new_parent_id) {
        return Err(ValidationError::new(
            ValidationRule::ParentIsDescendant,
            "child can not be parent",
        )
        .on(new_parent_id));
    }
    if existing.parent().is_some() && has_instances {
        return Err(ValidationError::new(
            ValidationRule::HasInstances,
            "equipment type contains equipments data",
        )
        .on(&existing.type_name));
    }
    Ok(())
}

/// Type names are unique case-insensitively within the scope.
pub fn validate_type_name_available(
    existing_types: &[EquipmentTypeDefinition],
    type_name: &str,
) -> ValidationResult<()> {
    if existing_types
        .iter()
        .any(|t| t.type_name.eq_ignore_ascii_case(type_name))
    {
        return Err(ValidationError::new(
            ValidationRule::TypeNameTaken,
            "type name is not available",
        )
        .on(type_name));
    }
    Ok(())
}

/// A metadata source backs at most one equipment type.
pub fn validate_source_unused(
    existing_types: &[EquipmentTypeDefinition],
    source_id: &str,
) -> ValidationResult<()> {
    if let Some(owner) = existing_types.iter().find(|t| t.source_id == source_id) {
        return Err(ValidationError::new(
            ValidationRule::SourceInUse,
            format!("data source is already consumed by {}", owner.type_name),
        )
        .on(source_id));
    }
    Ok(())
}

pub fn validate_deletion(
    existing: &EquipmentTypeDefinition,
    has_children: bool,
    has_instances: bool,
) -> ValidationResult<()> {
    if has_children {
        return Err(ValidationError::new(
            ValidationRule::HasChildren,
            "equipment type has children",
        )
        .on(&existing.type_name));
    }
    if has_instances {
        return Err(ValidationError::new(
            ValidationRule::HasInstances,
            "equipment type contains equipments data",
        )
        .on(&existing.type_name));
    }
    Ok(())
}

/// Tracks names (case-insensitive) and column mappings seen so far
#[derive(Default)]
struct NameRegistry {
    names: HashSet<String>,
    mappings: HashMap<String, String>,
}

impl NameRegistry {
    fn seed(&mut self, attr: &AttributeSchema) {
        self.names.insert(attr.name.to_uppercase());
        self.mappings.insert(attr.mapped_to.clone(), attr.name.clone());
    }

    fn register(
        &mut self,
        attr: &AttributeSchema,
        available_columns: &BTreeSet<String>,
    ) -> ValidationResult<()> {
        if !naming::is_safe_name(&naming::sanitize(&attr.name)) {
            return Err(ValidationError::invalid_name(&attr.name));
        }
        if !self.names.insert(attr.name.to_uppercase()) {
            return Err(ValidationError::duplicate_name(&attr.name));
        }
        if !available_columns.contains(&attr.mapped_to) {
            return Err(ValidationError::unmapped_column(&attr.mapped_to));
        }
        if let Some(owner) = self.mappings.get(&attr.mapped_to) {
            return Err(ValidationError::new(
                ValidationRule::DuplicateMapping,
                format!("source column is already mapped to {}", owner),
            )
            .on(&attr.mapped_to));
        }
        self.mappings.insert(attr.mapped_to.clone(), attr.name.clone());
        Ok(())
    }
}

fn validate_attribute_flags(attr: &AttributeSchema) -> ValidationResult<()> {
    if attr.is_identifier && attr.is_parent_identifier {
        return Err(ValidationError::new(
            ValidationRule::IdentifierAndParentKey,
            "attribute can be either identifier or parent identifier",
        )
        .on(&attr.name));
    }
    if attr.is_identifier {
        if attr.data_type != DataType::String {
            return Err(ValidationError::new(
                ValidationRule::IdentifierWrongType,
                "only string data type is allowed for identifier",
            )
            .on(&attr.name));
        }
        if !attr.is_displayed {
            return Err(ValidationError::new(
                ValidationRule::IdentifierNotDisplayed,
                "identifier should always be displayable",
            )
            .on(&attr.name));
        }
    }
    if attr.is_parent_identifier && attr.data_type != DataType::String {
        return Err(parent_key_wrong_type(attr));
    }
    if attr.is_searchable && !attr.is_displayed {
        return Err(ValidationError::new(
            ValidationRule::SearchableNotDisplayed,
            "searchable attribute should always be displayable",
        )
        .on(&attr.name));
    }
    Ok(())
}

fn parent_key_wrong_type(attr: &AttributeSchema) -> ValidationError {
    ValidationError::new(
        ValidationRule::ParentKeyWrongType,
        "only string data type is allowed for parent identifier",
    )
    .on(&attr.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> BTreeSet<String> {
        ["id", "cores", "cpu", "cluster_id", "host"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn cluster() -> EquipmentTypeDefinition {
        EquipmentTypeDefinition::new("cluster", "0x10")
            .with_id("0x1")
            .with_attribute(AttributeSchema::identifier("cluster_name", "id"))
    }

    fn server() -> EquipmentTypeDefinition {
        EquipmentTypeDefinition::new("server", "0x11")
            .with_attribute(AttributeSchema::identifier("server_id", "id"))
            .with_attribute(
                AttributeSchema::new("cores", DataType::Int, "cores")
                    .searchable()
                    .displayed(),
            )
    }

    fn rule_of(result: ValidationResult<()>) -> ValidationRule {
        result.unwrap_err().rule()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    #[test]
    fn test_valid_creation() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        assert!(validator.validate_creation(&[cluster()], &server()).is_ok());
    }

    #[test]
    fn test_creation_with_parent() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate = server()
            .with_parent("0x1")
            .with_attribute(AttributeSchema::parent_identifier("cluster", "cluster_id"));
        assert!(validator.validate_creation(&[cluster()], &candidate).is_ok());
    }

    #[test]
    fn test_creation_unknown_parent() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate = server().with_parent("0x99");
        assert_eq!(
            rule_of(validator.validate_creation(&[cluster()], &candidate)),
            ValidationRule::ParentNotFound
        );
    }

    #[test]
    fn test_creation_identifier_count() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);

        let none = EquipmentTypeDefinition::new("server", "0x11")
            .with_attribute(AttributeSchema::new("cores", DataType::Int, "cores"));
        assert_eq!(
            rule_of(validator.validate_creation(&[], &none)),
            ValidationRule::MissingIdentifier
        );

        let two = server().with_attribute(AttributeSchema::identifier("host", "host"));
        assert_eq!(
            rule_of(validator.validate_creation(&[], &two)),
            ValidationRule::MultipleIdentifiers
        );
    }

    #[test]
    fn test_creation_parent_key_without_parent() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate =
            server().with_attribute(AttributeSchema::parent_identifier("cluster", "cluster_id"));
        assert_eq!(
            rule_of(validator.validate_creation(&[], &candidate)),
            ValidationRule::ParentKeyCountMismatch
        );
    }

    #[test]
    fn test_creation_parent_without_parent_key() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate = server().with_parent("0x1");
        assert_eq!(
            rule_of(validator.validate_creation(&[cluster()], &candidate)),
            ValidationRule::ParentKeyCountMismatch
        );
    }

    #[test]
    fn test_creation_rejects_unsafe_names() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);

        let mut bad_type = server();
        bad_type.type_name = "server) { uid }".to_string();
        assert_eq!(
            rule_of(validator.validate_creation(&[], &bad_type)),
            ValidationRule::InvalidName
        );

        let bad_attr = server().with_attribute(
            AttributeSchema::new("x) { uid } evil(func: has(scopes)", DataType::String, "cpu")
                .displayed(),
        );
        let err = validator.validate_creation(&[], &bad_attr).unwrap_err();
        assert_eq!(err.rule(), ValidationRule::InvalidName);
        assert_eq!(err.subject(), Some("x) { uid } evil(func: has(scopes)"));

        // Whitespace is sanitized into the predicate, so it stays allowed
        let spaced = server().with_attribute(
            AttributeSchema::new("cpu model", DataType::String, "cpu").displayed(),
        );
        assert!(validator.validate_creation(&[], &spaced).is_ok());
    }

    #[test]
    fn test_creation_duplicate_name_case_insensitive() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate = server().with_attribute(AttributeSchema::new("CORES", DataType::Int, "cpu"));
        let err = validator.validate_creation(&[], &candidate).unwrap_err();
        assert_eq!(err.rule(), ValidationRule::DuplicateName);
        assert_eq!(err.subject(), Some("CORES"));
    }

    #[test]
    fn test_creation_mapping_rules() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);

        let unknown = server().with_attribute(AttributeSchema::new("ram", DataType::Int, "ram"));
        assert_eq!(
            rule_of(validator.validate_creation(&[], &unknown)),
            ValidationRule::UnmappedColumn
        );

        let reused = server().with_attribute(AttributeSchema::new("cpu", DataType::Int, "cores"));
        assert_eq!(
            rule_of(validator.validate_creation(&[], &reused)),
            ValidationRule::DuplicateMapping
        );
    }

    #[test]
    fn test_creation_identifier_flags() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);

        let numeric = EquipmentTypeDefinition::new("server", "0x11").with_attribute(
            AttributeSchema::new("server_id", DataType::Int, "id")
                .as_identifier()
                .displayed(),
        );
        assert_eq!(
            rule_of(validator.validate_creation(&[], &numeric)),
            ValidationRule::IdentifierWrongType
        );

        let hidden = EquipmentTypeDefinition::new("server", "0x11")
            .with_attribute(AttributeSchema::new("server_id", DataType::String, "id").as_identifier());
        assert_eq!(
            rule_of(validator.validate_creation(&[], &hidden)),
            ValidationRule::IdentifierNotDisplayed
        );
    }

    #[test]
    fn test_creation_identifier_and_parent_key() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate = EquipmentTypeDefinition::new("server", "0x11")
            .with_parent("0x1")
            .with_attribute(AttributeSchema::identifier("server_id", "id").as_parent_identifier());
        assert_eq!(
            rule_of(validator.validate_creation(&[cluster()], &candidate)),
            ValidationRule::IdentifierAndParentKey
        );
    }

    #[test]
    fn test_creation_searchable_requires_displayed() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let candidate =
            server().with_attribute(AttributeSchema::new("cpu", DataType::String, "cpu").searchable());
        assert_eq!(
            rule_of(validator.validate_creation(&[], &candidate)),
            ValidationRule::SearchableNotDisplayed
        );
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[test]
    fn test_update_adds_attribute() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let new = vec![AttributeSchema::new("cpu", DataType::String, "cpu").displayed()];
        assert!(validator.validate_update(&server(), None, &new).is_ok());
    }

    #[test]
    fn test_update_rejects_unsafe_name() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let new = vec![AttributeSchema::new("cpu\"}", DataType::String, "cpu").displayed()];
        assert_eq!(
            rule_of(validator.validate_update(&server(), None, &new)),
            ValidationRule::InvalidName
        );
    }

    #[test]
    fn test_update_rejects_identifier() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let new = vec![AttributeSchema::identifier("host", "host")];
        assert_eq!(
            rule_of(validator.validate_update(&server(), None, &new)),
            ValidationRule::IdentifierResubmitted
        );
    }

    #[test]
    fn test_update_collides_with_existing() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);

        let same_name = vec![AttributeSchema::new("Cores", DataType::Int, "cpu")];
        assert_eq!(
            rule_of(validator.validate_update(&server(), None, &same_name)),
            ValidationRule::DuplicateName
        );

        let same_column = vec![AttributeSchema::new("cpu", DataType::Int, "cores")];
        assert_eq!(
            rule_of(validator.validate_update(&server(), None, &same_column)),
            ValidationRule::DuplicateMapping
        );
    }

    #[test]
    fn test_update_parent_key_rules() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let key = vec![AttributeSchema::parent_identifier("cluster", "cluster_id")];

        // Parent requested without a key
        assert_eq!(
            rule_of(validator.validate_update(&server(), Some("0x1"), &[])),
            ValidationRule::ParentKeyCountMismatch
        );
        // Key without a parent
        assert_eq!(
            rule_of(validator.validate_update(&server(), None, &key)),
            ValidationRule::ParentKeyCountMismatch
        );
        // Key and parent together
        assert!(validator.validate_update(&server(), Some("0x1"), &key).is_ok());

        // Key when the type already has a parent
        let parented = server()
            .with_parent("0x1")
            .with_attribute(AttributeSchema::parent_identifier("cluster", "cluster_id"));
        let other_key = vec![AttributeSchema::parent_identifier("vcenter", "host")];
        assert_eq!(
            rule_of(validator.validate_update(&parented, Some("0x2"), &other_key)),
            ValidationRule::ParentKeyCountMismatch
        );
        // Re-parenting keeps the existing key
        assert!(validator.validate_update(&parented, Some("0x2"), &[]).is_ok());
    }

    #[test]
    fn test_update_parent_key_type() {
        let cols = columns();
        let validator = SchemaValidator::new(&cols);
        let key = vec![AttributeSchema::new("cluster", DataType::Int, "cluster_id").as_parent_identifier()];
        assert_eq!(
            rule_of(validator.validate_update(&server(), Some("0x1"), &key)),
            ValidationRule::ParentKeyWrongType
        );
    }

    // =========================================================================
    // Parent change, names, sources, deletion
    // =========================================================================

    #[test]
    fn test_parent_change_rules() {
        let types = vec![cluster(), server().with_id("0x2")];
        let me = server().with_id("0x2");
        let none = HashSet::new();

        assert_eq!(
            rule_of(validate_parent_change(&me, "0x2", &types, &none, false)),
            ValidationRule::SelfParent
        );
        assert_eq!(
            rule_of(validate_parent_change(&me, "0x7", &types, &none, false)),
            ValidationRule::ParentNotFound
        );

        let descendants: HashSet<String> = ["0x1".to_string()].into_iter().collect();
        assert_eq!(
            rule_of(validate_parent_change(&me, "0x1", &types, &descendants, false)),
            ValidationRule::ParentIsDescendant
        );

        assert!(validate_parent_change(&me, "0x1", &types, &none, true).is_ok());
        let parented = me.clone().with_parent("0x5");
        assert_eq!(
            rule_of(validate_parent_change(&parented, "0x1", &types, &none, true)),
            ValidationRule::HasInstances
        );
    }

    #[test]
    fn test_type_name_available() {
        let types = vec![cluster()];
        assert_eq!(
            rule_of(validate_type_name_available(&types, "Cluster")),
            ValidationRule::TypeNameTaken
        );
        assert!(validate_type_name_available(&types, "server").is_ok());
    }

    #[test]
    fn test_source_unused() {
        let types = vec![cluster()];
        assert_eq!(
            rule_of(validate_source_unused(&types, "0x10")),
            ValidationRule::SourceInUse
        );
        assert!(validate_source_unused(&types, "0x12").is_ok());
    }

    #[test]
    fn test_deletion() {
        let c = cluster();
        assert_eq!(rule_of(validate_deletion(&c, true, false)), ValidationRule::HasChildren);
        assert_eq!(rule_of(validate_deletion(&c, false, true)), ValidationRule::HasInstances);
        assert!(validate_deletion(&c, false, false).is_ok());
    }
}

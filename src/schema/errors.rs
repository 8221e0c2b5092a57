//! Validation error types for equipment type definitions
//!
//! Every rejected definition names the rule it violated. Codes are stable
//! strings so callers can branch on them without parsing messages.

use std::fmt;

use serde::Serialize;

/// Structural rules enforced over equipment type definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationRule {
    /// Referenced parent type does not exist
    ParentNotFound,
    /// Type names itself as parent
    SelfParent,
    /// Requested parent is a descendant of the type
    ParentIsDescendant,
    /// Attribute name repeated (case-insensitive)
    DuplicateName,
    /// Two attributes map to the same source column
    DuplicateMapping,
    /// Attribute maps to a column the metadata source does not have
    UnmappedColumn,
    /// No identifier attribute submitted
    MissingIdentifier,
    /// More than one identifier attribute submitted
    MultipleIdentifiers,
    /// Identifier submitted again on update
    IdentifierResubmitted,
    /// Identifier attribute is not a string
    IdentifierWrongType,
    /// Identifier attribute is not displayed
    IdentifierNotDisplayed,
    /// Parent identifier attribute is not a string
    ParentKeyWrongType,
    /// Parent identifier count does not match the parent relationship
    ParentKeyCountMismatch,
    /// One attribute flagged as both identifier and parent identifier
    IdentifierAndParentKey,
    /// Searchable attribute is not displayed
    SearchableNotDisplayed,
    /// Type name already used in the scope
    TypeNameTaken,
    /// Metadata source already backs another type
    SourceInUse,
    /// Type still has child types
    HasChildren,
    /// Type still has equipment instances
    HasInstances,
    /// Ingestion payload does not satisfy the type's schema
    InvalidPayload,
    /// Type or attribute name has characters a predicate cannot carry
    InvalidName,
}

impl ValidationRule {
    /// Returns the stable string code for this rule
    pub fn code(&self) -> &'static str {
        match self {
            ValidationRule::ParentNotFound => "EQP_PARENT_NOT_FOUND",
            ValidationRule::SelfParent => "EQP_SELF_PARENT",
            ValidationRule::ParentIsDescendant => "EQP_PARENT_IS_DESCENDANT",
            ValidationRule::DuplicateName => "EQP_DUPLICATE_NAME",
            ValidationRule::DuplicateMapping => "EQP_DUPLICATE_MAPPING",
            ValidationRule::UnmappedColumn => "EQP_UNMAPPED_COLUMN",
            ValidationRule::MissingIdentifier => "EQP_MISSING_IDENTIFIER",
            ValidationRule::MultipleIdentifiers => "EQP_MULTIPLE_IDENTIFIERS",
            ValidationRule::IdentifierResubmitted => "EQP_IDENTIFIER_RESUBMITTED",
            ValidationRule::IdentifierWrongType => "EQP_IDENTIFIER_WRONG_TYPE",
            ValidationRule::IdentifierNotDisplayed => "EQP_IDENTIFIER_NOT_DISPLAYED",
            ValidationRule::ParentKeyWrongType => "EQP_PARENT_KEY_WRONG_TYPE",
            ValidationRule::ParentKeyCountMismatch => "EQP_PARENT_KEY_COUNT_MISMATCH",
            ValidationRule::IdentifierAndParentKey => "EQP_IDENTIFIER_AND_PARENT_KEY",
            ValidationRule::SearchableNotDisplayed => "EQP_SEARCHABLE_NOT_DISPLAYED",
            ValidationRule::TypeNameTaken => "EQP_TYPE_NAME_TAKEN",
            ValidationRule::SourceInUse => "EQP_SOURCE_IN_USE",
            ValidationRule::HasChildren => "EQP_HAS_CHILDREN",
            ValidationRule::HasInstances => "EQP_HAS_INSTANCES",
            ValidationRule::InvalidPayload => "EQP_INVALID_PAYLOAD",
            ValidationRule::InvalidName => "EQP_INVALID_NAME",
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A rejected definition or payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    rule: ValidationRule,
    message: String,
    /// Attribute, type or field the rule fired on
    subject: Option<String>,
}

impl ValidationError {
    pub fn new(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
            subject: None,
        }
    }

    /// Attach the name of the offending attribute or type
    pub fn on(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn parent_not_found(parent_id: &str) -> Self {
        Self::new(ValidationRule::ParentNotFound, "parent type does not exist").on(parent_id)
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(ValidationRule::DuplicateName, "attribute name is already used").on(name)
    }

    pub fn duplicate_mapping(mapped_to: &str) -> Self {
        Self::new(ValidationRule::DuplicateMapping, "source column is already mapped").on(mapped_to)
    }

    pub fn unmapped_column(mapped_to: &str) -> Self {
        Self::new(
            ValidationRule::UnmappedColumn,
            "source column does not exist in metadata",
        )
        .on(mapped_to)
    }

    pub fn invalid_name(name: &str) -> Self {
        Self::new(
            ValidationRule::InvalidName,
            "only letters, digits, '_', '.' and '-' are allowed in names",
        )
        .on(name)
    }

    pub fn invalid_payload(field: &str, message: impl Into<String>) -> Self {
        Self::new(ValidationRule::InvalidPayload, message).on(field)
    }

    pub fn rule(&self) -> ValidationRule {
        self.rule
    }

    pub fn code(&self) -> &'static str {
        self.rule.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule.code(), self.message)?;
        if let Some(ref subject) = self.subject {
            write!(f, " ({})", subject)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

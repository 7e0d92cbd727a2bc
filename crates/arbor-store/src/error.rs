use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation failure kinds. Each is tied to the field the caller supplied,
/// so a resolver layer can render field-level messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Item id is not a well-formed identifier.
    InvalidItemId,
    /// Parent id is not a well-formed identifier.
    InvalidParentId,
    /// Target item does not exist.
    ItemNotFound,
    /// Referenced parent does not exist.
    ParentNotFound,
    /// Item exists but belongs to a different owner.
    ItemOwnershipMismatch,
    /// Parent exists but belongs to a different owner.
    ParentOwnershipMismatch,
    /// Update targeted a soft-deleted item; deleted items are immutable.
    ItemDeleted,
    /// Requested parent is a descendant of the item being moved.
    CyclicParent,
    /// Update carried no mutable field.
    NoChanges,
}

/// A single field-tagged validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All violations found while validating one operation. Independent checks
/// are collected rather than short-circuited, so a caller can surface every
/// field problem at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<Violation>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors from the item store.
///
/// Validation errors never open a transaction; storage errors propagate
/// verbatim from the datastore and are never retried here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn from_violations(violations: Vec<Violation>) -> Self {
        StoreError::Validation(ValidationErrors(violations))
    }

    /// Violations carried by a validation error; empty for storage errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            StoreError::Validation(errors) => &errors.0,
            StoreError::Storage(_) => &[],
        }
    }

    /// True when the error contains a violation of the given kind.
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations().iter().any(|v| v.kind == kind)
    }
}

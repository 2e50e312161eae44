//! Error types for school server operations.
//!
//! [`SchoolError`] is the single error surfaced by every operation in this
//! crate. Each variant maps to one transport status via
//! [`SchoolError::status_code`], and [`SchoolError::to_body`] renders a body
//! that names offending fields without ever revealing whether a record exists
//! in some other tenant.

use crate::storage::StorageError;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Main error type for school server operations.
#[derive(Debug, thiserror::Error)]
pub enum SchoolError {
    /// No usable bearer credential was presented, or it did not resolve.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// An authenticated principal carries no tenant association.
    #[error("Principal {principal_id} has no tenant association")]
    TenantMissing { principal_id: String },

    /// A write tried to attach the record to, or reference, another tenant.
    #[error("Cross-tenant reference rejected on field '{field}'")]
    CrossTenantViolation { field: String },

    /// The record does not exist in the caller's tenant.
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    /// A unique constraint within the owning scope would be broken.
    #[error("{resource_type} conflicts on ({})", .fields.join(", "))]
    Conflict {
        resource_type: String,
        fields: Vec<String>,
    },

    /// Field-level validation failures.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Login failed. Deliberately says nothing about which part was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A reset token did not match, or no reset was pending for the e-mail.
    #[error("Invalid password reset token")]
    InvalidResetToken,

    /// A reset token existed but outlived its TTL; it has been removed.
    #[error("Password reset token expired")]
    ResetTokenExpired,

    /// An e-mail verification link did not match.
    #[error("Invalid verification link")]
    InvalidVerificationLink,

    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl SchoolError {
    /// Create a new NotFound error.
    pub fn not_found(resource_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a new CrossTenantViolation error naming the offending field.
    pub fn cross_tenant(field: impl Into<String>) -> Self {
        Self::CrossTenantViolation {
            field: field.into(),
        }
    }

    /// Create a new Conflict error.
    pub fn conflict(resource_type: impl Into<String>, fields: &[&str]) -> Self {
        Self::Conflict {
            resource_type: resource_type.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Create a new Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The transport status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            SchoolError::Unauthenticated | SchoolError::InvalidCredentials => 401,
            SchoolError::TenantMissing { .. } => 403,
            SchoolError::NotFound { .. } => 404,
            SchoolError::Conflict { .. } => 409,
            SchoolError::CrossTenantViolation { .. } | SchoolError::Validation(_) => 422,
            SchoolError::InvalidResetToken
            | SchoolError::ResetTokenExpired
            | SchoolError::InvalidVerificationLink => 400,
            SchoolError::Storage(_) | SchoolError::Json(_) | SchoolError::Internal { .. } => 500,
        }
    }

    /// Field-level messages, for the variants that carry them.
    pub fn field_errors(&self) -> Option<BTreeMap<String, Vec<String>>> {
        match self {
            SchoolError::Validation(err) => Some(err.fields().clone()),
            SchoolError::CrossTenantViolation { field } => Some(BTreeMap::from([(
                field.clone(),
                vec![format!("The selected {} is invalid.", field)],
            )])),
            SchoolError::Conflict { fields, .. } => Some(
                fields
                    .iter()
                    .map(|f| (f.clone(), vec![format!("The {} has already been taken.", f)]))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Message safe to show to an API caller.
    pub fn public_message(&self) -> String {
        match self {
            SchoolError::Unauthenticated => "Unauthenticated.".to_string(),
            SchoolError::TenantMissing { .. } => {
                "The authenticated user has no school assigned.".to_string()
            }
            SchoolError::NotFound { resource_type, .. } => {
                format!("{} not found.", resource_type)
            }
            SchoolError::CrossTenantViolation { .. }
            | SchoolError::Validation(_)
            | SchoolError::Conflict { .. } => "The given data was invalid.".to_string(),
            SchoolError::InvalidCredentials => {
                "The provided credentials are incorrect.".to_string()
            }
            SchoolError::InvalidResetToken => "This password reset token is invalid.".to_string(),
            SchoolError::ResetTokenExpired => "This password reset token has expired.".to_string(),
            SchoolError::InvalidVerificationLink => "Invalid verification link.".to_string(),
            SchoolError::Storage(_) | SchoolError::Json(_) | SchoolError::Internal { .. } => {
                "Internal server error.".to_string()
            }
        }
    }

    /// JSON body for a response carrying this error.
    pub fn to_body(&self) -> Value {
        match self.field_errors() {
            Some(errors) => json!({"message": self.public_message(), "errors": errors}),
            None => json!({"message": self.public_message()}),
        }
    }
}

impl From<StorageError> for SchoolError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UniqueViolation {
                resource_type,
                fields,
                ..
            } => SchoolError::Conflict {
                resource_type,
                fields,
            },
            StorageError::ResourceAlreadyExists { resource_type, .. } => SchoolError::Conflict {
                resource_type,
                fields: vec!["id".to_string()],
            },
            StorageError::ResourceNotFound {
                resource_type, id, ..
            } => SchoolError::NotFound { resource_type, id },
            other => SchoolError::Storage(other),
        }
    }
}

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// A validation error with a single message.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.add(field, message);
        err
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Record a message when `failed` holds.
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", names.join(", "))
    }
}

impl std::error::Error for ValidationError {}

// Convenience type aliases
pub type SchoolResult<T> = Result<T, SchoolError>;
pub type ValidationResult<T> = Result<T, ValidationError>;

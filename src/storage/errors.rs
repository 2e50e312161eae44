//! Storage-specific error types for pure data operations.
//!
//! These errors describe persistence failures only. They carry no knowledge of
//! tenancy rules or of the HTTP-facing error taxonomy; the crate-level
//! [`SchoolError`](crate::error::SchoolError) maps them onto that.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The record addressed by a replace was not present.
    ResourceNotFound {
        partition: String,
        resource_type: String,
        id: String,
    },

    /// An insert addressed a key that is already occupied.
    ResourceAlreadyExists {
        partition: String,
        resource_type: String,
        id: String,
    },

    /// A unique constraint declared for the record type would be broken.
    UniqueViolation {
        partition: String,
        resource_type: String,
        constraint: String,
        fields: Vec<String>,
    },

    /// The transaction was already finished or its state was poisoned.
    TransactionClosed { message: String },

    /// Serialization or deserialization error.
    Serialization {
        message: String,
        data_type: Option<String>,
    },

    /// Generic internal storage error.
    Internal { message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ResourceNotFound {
                partition,
                resource_type,
                id,
            } => {
                write!(
                    f,
                    "Resource not found: {}/{}/{}",
                    partition, resource_type, id
                )
            }
            StorageError::ResourceAlreadyExists {
                partition,
                resource_type,
                id,
            } => {
                write!(
                    f,
                    "Resource already exists: {}/{}/{}",
                    partition, resource_type, id
                )
            }
            StorageError::UniqueViolation {
                partition,
                resource_type,
                constraint,
                fields,
            } => {
                write!(
                    f,
                    "Unique constraint '{}' violated in {}/{} on ({})",
                    constraint,
                    partition,
                    resource_type,
                    fields.join(", ")
                )
            }
            StorageError::TransactionClosed { message } => {
                write!(f, "Transaction closed: {}", message)
            }
            StorageError::Serialization { message, data_type } => {
                if let Some(dtype) = data_type {
                    write!(f, "Serialization error: {} (type: {})", message, dtype)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            StorageError::Internal { message } => {
                write!(f, "Internal storage error: {}", message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl StorageError {
    /// Create a new ResourceNotFound error.
    pub fn resource_not_found(
        partition: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::ResourceNotFound {
            partition: partition.into(),
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create a new ResourceAlreadyExists error.
    pub fn resource_already_exists(
        partition: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::ResourceAlreadyExists {
            partition: partition.into(),
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create a new UniqueViolation error.
    pub fn unique_violation(
        partition: impl Into<String>,
        resource_type: impl Into<String>,
        constraint: impl Into<String>,
        fields: &[&str],
    ) -> Self {
        Self::UniqueViolation {
            partition: partition.into(),
            resource_type: resource_type.into(),
            constraint: constraint.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Create a new Serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            data_type: None,
        }
    }

    /// Create a new Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Name of the violated constraint, when this is a unique violation.
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            StorageError::UniqueViolation { constraint, .. } => Some(constraint),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            data_type: Some("JSON".to_string()),
        }
    }
}

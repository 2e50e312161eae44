//! Storage abstraction layer for tenant-partitioned records.
//!
//! This module keeps storage concerns apart from tenancy rules. The
//! [`StorageProvider`] trait defines pure data operations on JSON documents
//! addressed by `partition` → `resource_type` → `resource_id`. Tenant-owned
//! records live in a partition named after their tenant; records that exist
//! outside any tenant (tenants themselves, the global e-mail index, reset
//! tokens, access tokens) live in [`GLOBAL_PARTITION`].
//!
//! # Architecture
//!
//! The storage layer is responsible for:
//! - PUT/GET/DELETE operations on JSON data
//! - Enforcing declared unique constraints atomically with the write
//! - Transactions spanning several writes
//!
//! The storage layer is NOT responsible for:
//! - Deciding which partition a caller may address
//! - Timestamps, tombstones or validation
//!
//! # Example Usage
//!
//! ```rust
//! use school_server::storage::{InMemoryStorage, StorageKey, StorageProvider, UniqueConstraint};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! const BY_NAME: &[UniqueConstraint] = &[UniqueConstraint::new("level_name", &["name"])];
//! let storage = InMemoryStorage::new();
//!
//! let key = StorageKey::new("tenant-a", "Level", "1");
//! storage.insert(key.clone(), json!({"name": "Primaria"}), BY_NAME).await?;
//!
//! // Same name in the same partition is rejected by the store itself
//! let clash = StorageKey::new("tenant-a", "Level", "2");
//! assert!(storage.insert(clash, json!({"name": "Primaria"}), BY_NAME).await.is_err());
//!
//! // ...but another partition is unaffected
//! let other = StorageKey::new("tenant-b", "Level", "3");
//! storage.insert(other, json!({"name": "Primaria"}), BY_NAME).await?;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;

pub use errors::StorageError;
pub use in_memory::{InMemoryStorage, InMemoryStorageStats, InMemoryTransaction};

use serde_json::Value;
use std::fmt;
use std::future::Future;

/// Partition holding records that belong to no tenant.
pub const GLOBAL_PARTITION: &str = "_global";

/// A hierarchical key for identifying records in storage.
///
/// Records are organized as: `partition` → `resource_type` → `resource_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    partition: String,
    resource_type: String,
    resource_id: String,
}

impl StorageKey {
    /// Create a new storage key.
    pub fn new(
        partition: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Create a key in the global partition.
    pub fn global(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self::new(GLOBAL_PARTITION, resource_type, resource_id)
    }

    /// Get the partition name.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Get the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Get the resource ID.
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Create a prefix key for listing records of a type within a partition.
    pub fn prefix(partition: impl Into<String>, resource_type: impl Into<String>) -> StoragePrefix {
        StoragePrefix {
            partition: partition.into(),
            resource_type: resource_type.into(),
        }
    }

    /// The prefix this key lives under.
    pub fn to_prefix(&self) -> StoragePrefix {
        Self::prefix(self.partition.clone(), self.resource_type.clone())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.partition, self.resource_type, self.resource_id
        )
    }
}

/// A prefix for querying records by partition and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePrefix {
    partition: String,
    resource_type: String,
}

impl StoragePrefix {
    /// Get the partition name.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Get the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl fmt::Display for StoragePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.resource_type)
    }
}

/// A unique constraint over one or more top-level fields of a record type.
///
/// Constraints apply within a single partition: two records of the same type in
/// the same partition may not share values for every listed field. Records whose
/// value for any listed field is missing or `null` do not participate, and
/// neither do records carrying a non-null `deleted_at` (a partial index over
/// live rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueConstraint {
    name: &'static str,
    fields: &'static [&'static str],
}

impl UniqueConstraint {
    /// Declare a constraint. `name` is reported back on violation.
    pub const fn new(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// The participating values of `record`, or `None` when it takes no part.
    pub(crate) fn values<'v>(&self, record: &'v Value) -> Option<Vec<&'v Value>> {
        if record.get("deleted_at").is_some_and(|v| !v.is_null()) {
            return None;
        }
        self.fields
            .iter()
            .map(|field| record.get(*field).filter(|v| !v.is_null()))
            .collect()
    }
}

/// Core trait for storage providers that handle pure data persistence.
///
/// # Key Design Decisions
///
/// - `put` overwrites unconditionally and checks nothing.
/// - `insert` and `replace` distinguish create from update at the storage level
///   so that unique constraints can be checked under the same lock as the write.
///   Application code relies on these, not on read-then-write pre-checks.
/// - `delete` returns whether the record existed.
pub trait StorageProvider: Send + Sync {
    /// Store data at the specified key, replacing whatever was there.
    fn put(
        &self,
        key: StorageKey,
        data: Value,
    ) -> impl Future<Output = Result<Value, StorageError>> + Send;

    /// Store data at a key that must be vacant, enforcing `constraints`.
    ///
    /// Fails with [`StorageError::ResourceAlreadyExists`] when the key is taken
    /// and [`StorageError::UniqueViolation`] when another record in the same
    /// partition collides on a constraint.
    fn insert(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> impl Future<Output = Result<Value, StorageError>> + Send;

    /// Overwrite the record at an occupied key, enforcing `constraints`
    /// against every other record in the partition.
    fn replace(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> impl Future<Output = Result<Value, StorageError>> + Send;

    /// Retrieve data by key.
    fn get(
        &self,
        key: StorageKey,
    ) -> impl Future<Output = Result<Option<Value>, StorageError>> + Send;

    /// Delete data by key. Returns `true` if the record existed.
    fn delete(&self, key: StorageKey) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// List records under a prefix, ordered by resource id.
    ///
    /// If `offset` exceeds the total count, or `limit` is 0, the result is empty.
    fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<(StorageKey, Value)>, StorageError>> + Send;

    /// Find records under a prefix whose attribute equals `value`.
    ///
    /// Supports nested attributes using dot notation and matches on the string
    /// rendering of scalars.
    fn find_by_attribute(
        &self,
        prefix: StoragePrefix,
        attribute: &str,
        value: &str,
    ) -> impl Future<Output = Result<Vec<(StorageKey, Value)>, StorageError>> + Send;

    /// Check if a record exists.
    fn exists(&self, key: StorageKey) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Count the records under a prefix.
    fn count(&self, prefix: StoragePrefix)
    -> impl Future<Output = Result<usize, StorageError>> + Send;
}

/// A storage provider able to group several writes into one atomic unit.
pub trait TransactionalStorage: StorageProvider {
    /// The transaction handle. It is itself a [`StorageProvider`], so any code
    /// written against the provider trait runs unchanged inside a transaction.
    type Transaction: StorageTransaction;

    /// Begin a transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, StorageError>> + Send;
}

/// An open transaction.
///
/// Writes become visible to other readers only on [`commit`](Self::commit).
/// Dropping the handle without committing discards every staged write.
pub trait StorageTransaction: StorageProvider {
    fn commit(self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Extract a nested attribute value from JSON data using dot notation.
pub(crate) fn extract_attribute_value(data: &Value, attribute_path: &str) -> Option<String> {
    let mut current = data;

    for part in attribute_path.split('.') {
        if let Ok(index) = part.parse::<usize>() {
            current = current.get(index)?;
        } else {
            current = current.get(part)?;
        }
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn storage_key_display() {
        let key = StorageKey::new("t1", "Level", "abc");
        assert_eq!(key.to_string(), "t1/Level/abc");
        assert_eq!(key.to_prefix().to_string(), "t1/Level");
        assert_eq!(StorageKey::global("Tenant", "x").partition(), GLOBAL_PARTITION);
    }

    #[test]
    fn constraint_values_skip_nulls_and_tombstones() {
        let c = UniqueConstraint::new("period_number", &["cycle_id", "number"]);
        let live = json!({"cycle_id": "c1", "number": 2});
        let partial = json!({"cycle_id": "c1", "number": null});
        let gone = json!({"cycle_id": "c1", "number": 2, "deleted_at": "2024-01-01T00:00:00Z"});

        assert_eq!(c.values(&live).map(|v| v.len()), Some(2));
        assert!(c.values(&partial).is_none());
        assert!(c.values(&gone).is_none());
    }

    #[test]
    fn attribute_extraction_handles_nesting() {
        let data = json!({"a": {"b": [{"c": 7}]}, "flag": true});
        assert_eq!(extract_attribute_value(&data, "a.b.0.c"), Some("7".into()));
        assert_eq!(extract_attribute_value(&data, "flag"), Some("true".into()));
        assert_eq!(extract_attribute_value(&data, "a.missing"), None);
    }
}

//! In-memory storage implementation.
//!
//! This module provides a thread-safe in-memory implementation of
//! [`StorageProvider`] and [`TransactionalStorage`] using nested `HashMap`s
//! behind a tokio `RwLock`. It is designed for tests, development and
//! single-process deployments where persistence is not required.
//!
//! # Transactions
//!
//! [`InMemoryStorage::begin`] takes the write lock for the lifetime of the
//! transaction and works on a private copy of the tables. Commit swaps the copy
//! in; dropping the handle releases the lock and leaves the tables untouched.
//! Transactions are therefore fully serialized with every other access, and code
//! holding a transaction must not touch the parent storage until it is finished.
//!
//! # Performance Characteristics
//!
//! * PUT/GET/DELETE: O(1) average case
//! * INSERT/REPLACE: O(n) in the size of the type's partition when constraints are given
//! * LIST / FIND_BY_ATTRIBUTE: O(n) where n is records under the prefix
//! * BEGIN: O(total records) for the snapshot copy

use crate::storage::{
    StorageError, StorageKey, StoragePrefix, StorageProvider, StorageTransaction,
    TransactionalStorage, UniqueConstraint, extract_attribute_value,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

// partition -> resource_type -> resource_id -> data
type Tables = HashMap<String, HashMap<String, HashMap<String, Value>>>;

/// Thread-safe in-memory storage implementation.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    /// Create a new empty in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get storage statistics for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryStorageStats {
        let data_guard = self.data.read().await;
        let mut stats = InMemoryStorageStats::default();

        for tenant_data in data_guard.values() {
            stats.partition_count += 1;
            for type_data in tenant_data.values() {
                stats.resource_type_count += 1;
                stats.total_records += type_data.len();
            }
        }

        stats
    }

    /// Clear all data (useful for testing).
    pub async fn clear(&self) {
        self.data.write().await.clear();
    }
}

impl StorageProvider for InMemoryStorage {
    async fn put(&self, key: StorageKey, data: Value) -> Result<Value, StorageError> {
        let mut tables = self.data.write().await;
        Ok(tables::put(&mut tables, key, data))
    }

    async fn insert(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        let mut tables = self.data.write().await;
        tables::insert(&mut tables, key, data, constraints)
    }

    async fn replace(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        let mut tables = self.data.write().await;
        tables::replace(&mut tables, key, data, constraints)
    }

    async fn get(&self, key: StorageKey) -> Result<Option<Value>, StorageError> {
        let tables = self.data.read().await;
        Ok(tables::get(&tables, &key).cloned())
    }

    async fn delete(&self, key: StorageKey) -> Result<bool, StorageError> {
        let mut tables = self.data.write().await;
        Ok(tables::delete(&mut tables, &key))
    }

    async fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(StorageKey, Value)>, StorageError> {
        let tables = self.data.read().await;
        Ok(tables::list(&tables, &prefix, offset, limit))
    }

    async fn find_by_attribute(
        &self,
        prefix: StoragePrefix,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<(StorageKey, Value)>, StorageError> {
        let tables = self.data.read().await;
        Ok(tables::find_by_attribute(&tables, &prefix, attribute, value))
    }

    async fn exists(&self, key: StorageKey) -> Result<bool, StorageError> {
        let tables = self.data.read().await;
        Ok(tables::get(&tables, &key).is_some())
    }

    async fn count(&self, prefix: StoragePrefix) -> Result<usize, StorageError> {
        let tables = self.data.read().await;
        Ok(tables::count(&tables, &prefix))
    }
}

impl TransactionalStorage for InMemoryStorage {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StorageError> {
        let guard = Arc::clone(&self.data).write_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction {
            state: Mutex::new(TransactionState { guard, staged }),
        })
    }
}

/// An open transaction over [`InMemoryStorage`].
pub struct InMemoryTransaction {
    state: Mutex<TransactionState>,
}

struct TransactionState {
    guard: OwnedRwLockWriteGuard<Tables>,
    staged: Tables,
}

impl InMemoryTransaction {
    fn state(&self) -> Result<MutexGuard<'_, TransactionState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::TransactionClosed {
            message: "transaction state poisoned".to_string(),
        })
    }
}

impl StorageProvider for InMemoryTransaction {
    async fn put(&self, key: StorageKey, data: Value) -> Result<Value, StorageError> {
        let mut state = self.state()?;
        Ok(tables::put(&mut state.staged, key, data))
    }

    async fn insert(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        let mut state = self.state()?;
        tables::insert(&mut state.staged, key, data, constraints)
    }

    async fn replace(
        &self,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        let mut state = self.state()?;
        tables::replace(&mut state.staged, key, data, constraints)
    }

    async fn get(&self, key: StorageKey) -> Result<Option<Value>, StorageError> {
        let state = self.state()?;
        Ok(tables::get(&state.staged, &key).cloned())
    }

    async fn delete(&self, key: StorageKey) -> Result<bool, StorageError> {
        let mut state = self.state()?;
        Ok(tables::delete(&mut state.staged, &key))
    }

    async fn list(
        &self,
        prefix: StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(StorageKey, Value)>, StorageError> {
        let state = self.state()?;
        Ok(tables::list(&state.staged, &prefix, offset, limit))
    }

    async fn find_by_attribute(
        &self,
        prefix: StoragePrefix,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<(StorageKey, Value)>, StorageError> {
        let state = self.state()?;
        Ok(tables::find_by_attribute(
            &state.staged,
            &prefix,
            attribute,
            value,
        ))
    }

    async fn exists(&self, key: StorageKey) -> Result<bool, StorageError> {
        let state = self.state()?;
        Ok(tables::get(&state.staged, &key).is_some())
    }

    async fn count(&self, prefix: StoragePrefix) -> Result<usize, StorageError> {
        let state = self.state()?;
        Ok(tables::count(&state.staged, &prefix))
    }
}

impl StorageTransaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), StorageError> {
        let TransactionState { mut guard, staged } =
            self.state
                .into_inner()
                .map_err(|_| StorageError::TransactionClosed {
                    message: "transaction state poisoned".to_string(),
                })?;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        // Dropping the guard releases the lock with the tables untouched.
        drop(self);
        Ok(())
    }
}

/// Statistics about the current state of in-memory storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryStorageStats {
    /// Number of partitions with data
    pub partition_count: usize,
    /// Number of resource types across all partitions
    pub resource_type_count: usize,
    /// Total number of individual records
    pub total_records: usize,
}

mod tables {
    use super::*;

    pub(super) fn get<'t>(tables: &'t Tables, key: &StorageKey) -> Option<&'t Value> {
        tables
            .get(key.partition())
            .and_then(|partition| partition.get(key.resource_type()))
            .and_then(|type_data| type_data.get(key.resource_id()))
    }

    pub(super) fn put(tables: &mut Tables, key: StorageKey, data: Value) -> Value {
        tables
            .entry(key.partition().to_string())
            .or_default()
            .entry(key.resource_type().to_string())
            .or_default()
            .insert(key.resource_id().to_string(), data.clone());
        data
    }

    pub(super) fn insert(
        tables: &mut Tables,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        if get(tables, &key).is_some() {
            return Err(StorageError::resource_already_exists(
                key.partition(),
                key.resource_type(),
                key.resource_id(),
            ));
        }
        check_constraints(tables, &key, &data, constraints)?;
        Ok(put(tables, key, data))
    }

    pub(super) fn replace(
        tables: &mut Tables,
        key: StorageKey,
        data: Value,
        constraints: &[UniqueConstraint],
    ) -> Result<Value, StorageError> {
        if get(tables, &key).is_none() {
            return Err(StorageError::resource_not_found(
                key.partition(),
                key.resource_type(),
                key.resource_id(),
            ));
        }
        check_constraints(tables, &key, &data, constraints)?;
        Ok(put(tables, key, data))
    }

    pub(super) fn delete(tables: &mut Tables, key: &StorageKey) -> bool {
        tables
            .get_mut(key.partition())
            .and_then(|partition| partition.get_mut(key.resource_type()))
            .is_some_and(|type_data| type_data.remove(key.resource_id()).is_some())
    }

    pub(super) fn list(
        tables: &Tables,
        prefix: &StoragePrefix,
        offset: usize,
        limit: usize,
    ) -> Vec<(StorageKey, Value)> {
        if limit == 0 {
            return Vec::new();
        }

        let Some(type_data) = type_data(tables, prefix) else {
            return Vec::new();
        };

        let mut keys: Vec<_> = type_data.keys().collect();
        keys.sort();

        keys.into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|resource_id| {
                type_data.get(resource_id).map(|data| {
                    (
                        StorageKey::new(prefix.partition(), prefix.resource_type(), resource_id),
                        data.clone(),
                    )
                })
            })
            .collect()
    }

    pub(super) fn find_by_attribute(
        tables: &Tables,
        prefix: &StoragePrefix,
        attribute: &str,
        value: &str,
    ) -> Vec<(StorageKey, Value)> {
        let Some(type_data) = type_data(tables, prefix) else {
            return Vec::new();
        };

        let mut results: Vec<_> = type_data
            .iter()
            .filter(|(_, data)| {
                extract_attribute_value(data, attribute).is_some_and(|found| found == value)
            })
            .map(|(resource_id, data)| {
                (
                    StorageKey::new(prefix.partition(), prefix.resource_type(), resource_id),
                    data.clone(),
                )
            })
            .collect();

        results.sort_by(|a, b| a.0.resource_id().cmp(b.0.resource_id()));
        results
    }

    pub(super) fn count(tables: &Tables, prefix: &StoragePrefix) -> usize {
        type_data(tables, prefix).map_or(0, HashMap::len)
    }

    fn type_data<'t>(
        tables: &'t Tables,
        prefix: &StoragePrefix,
    ) -> Option<&'t HashMap<String, Value>> {
        tables
            .get(prefix.partition())
            .and_then(|partition| partition.get(prefix.resource_type()))
    }

    fn check_constraints(
        tables: &Tables,
        key: &StorageKey,
        data: &Value,
        constraints: &[UniqueConstraint],
    ) -> Result<(), StorageError> {
        let Some(type_data) = type_data(tables, &key.to_prefix()) else {
            return Ok(());
        };

        for constraint in constraints {
            let Some(wanted) = constraint.values(data) else {
                continue;
            };
            let clash = type_data.iter().any(|(resource_id, existing)| {
                resource_id != key.resource_id()
                    && constraint.values(existing).is_some_and(|have| have == wanted)
            });
            if clash {
                return Err(StorageError::unique_violation(
                    key.partition(),
                    key.resource_type(),
                    constraint.name(),
                    constraint.fields(),
                ));
            }
        }

        Ok(())
    }
}

//! The tenant-owned entity contract.

use crate::error::ValidationError;
use crate::storage::UniqueConstraint;
use crate::tenant::{Principal, Role, TenantId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bookkeeping fields every tenant-owned record carries.
///
/// Flattened into the entity's JSON, so `tenant_id` and `deleted_at` sit at the
/// top level where storage constraints and attribute filters can see them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RecordMeta {
    /// Fresh metadata with a random id and no tenant yet.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A foreign key held by an entity, checked against the acting tenant on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub resource_type: &'static str,
    pub id: Uuid,
    /// Set when the target must be an active principal with this role.
    pub role: Option<Role>,
}

impl Reference {
    /// Reference to an entity of type `E` through `field`.
    pub fn to<E: TenantOwned>(field: &'static str, id: Uuid) -> Self {
        Self {
            field,
            resource_type: E::RESOURCE_TYPE,
            id,
            role: None,
        }
    }

    /// Reference to an active principal holding `role`.
    pub fn principal_with_role(field: &'static str, id: Uuid, role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::to::<Principal>(field, id)
        }
    }
}

/// An entity stored inside a tenant's partition and reachable only through
/// [`ScopedRepository`](crate::scoping::ScopedRepository).
pub trait TenantOwned: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Storage resource type, also used in error messages.
    const RESOURCE_TYPE: &'static str;

    /// Natural keys unique within a tenant.
    const UNIQUE: &'static [UniqueConstraint] = &[];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Foreign keys to other tenant-owned entities. Optional keys that are
    /// unset are simply left out.
    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }

    /// Field-level checks run before every write.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        self.meta().tenant_id
    }
}

//! The tenant (school) record.
//!
//! Tenants are the root of isolation, so they are not themselves tenant-owned:
//! they live in the global partition, and code only ever reads the tenant whose
//! id it already holds, either from a [`TenantContext`](crate::tenant::TenantContext)
//! or from a principal resolved by a bypass flow.

use crate::error::SchoolResult;
use crate::registration::OnboardingProgress;
use crate::storage::{StorageKey, StorageProvider, UniqueConstraint};
use crate::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub(crate) const TENANT: &str = "Tenant";

const TENANT_UNIQUE: &[UniqueConstraint] = &[
    UniqueConstraint::new("tenant_slug", &["slug"]),
    UniqueConstraint::new("tenant_code", &["code"]),
];

/// A school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    /// Registration code (CCT), or a provisional code after express signup.
    pub code: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub active: bool,
    pub onboarding: OnboardingProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Whether the registration code is still the provisional one.
    pub fn has_provisional_code(&self, prefix: &str) -> bool {
        self.code.as_deref().is_none_or(|code| code.starts_with(prefix))
    }
}

/// Access to tenant records by id.
pub(crate) struct TenantRecords<'a, S> {
    storage: &'a S,
}

impl<'a, S: StorageProvider> TenantRecords<'a, S> {
    pub(crate) fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    fn key(id: TenantId) -> StorageKey {
        StorageKey::global(TENANT, id.to_string())
    }

    pub(crate) async fn get(&self, id: TenantId) -> SchoolResult<Option<Tenant>> {
        match self.storage.get(Self::key(id)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Insert a new tenant. Slug and code collisions surface as storage unique violations.
    pub(crate) async fn insert(&self, tenant: &Tenant) -> SchoolResult<()> {
        self.storage
            .insert(
                Self::key(tenant.id),
                serde_json::to_value(tenant)?,
                TENANT_UNIQUE,
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn replace(&self, tenant: &Tenant) -> SchoolResult<()> {
        self.storage
            .replace(
                Self::key(tenant.id),
                serde_json::to_value(tenant)?,
                TENANT_UNIQUE,
            )
            .await?;
        Ok(())
    }
}

//! The unscoped query type.
//!
//! [`UnscopedLookup`] is the only way to read a principal without already
//! knowing its tenant. Its constructor is crate-private, each construction is
//! written to the audit log with the flow that asked for it, and it can return
//! nothing but a [`Principal`] and that principal's own [`Tenant`].

use crate::error::SchoolResult;
use crate::storage::{StorageKey, StorageProvider};
use crate::tenant::record::TenantRecords;
use crate::tenant::{Principal, Tenant, normalize_email};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Log target for scope bypasses.
pub const AUDIT_TARGET: &str = "school_server::audit";

pub(crate) const PRINCIPAL_EMAIL: &str = "PrincipalEmail";

/// Why the tenant scope is being bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Login,
    PasswordResetRequest,
    PasswordResetConsume,
    EmailVerification,
}

impl fmt::Display for BypassReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BypassReason::Login => "login",
            BypassReason::PasswordResetRequest => "password-reset-request",
            BypassReason::PasswordResetConsume => "password-reset-consume",
            BypassReason::EmailVerification => "email-verification",
        })
    }
}

/// Deployment-wide e-mail index entry: which partition holds the principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct EmailIndexEntry {
    pub email: String,
    pub partition: String,
    pub principal_id: Uuid,
}

impl EmailIndexEntry {
    pub(crate) fn key(email: &str) -> StorageKey {
        StorageKey::global(PRINCIPAL_EMAIL, normalize_email(email))
    }
}

/// Principal lookup by globally unique e-mail, outside any tenant scope.
pub struct UnscopedLookup<'a, S> {
    storage: &'a S,
    reason: BypassReason,
}

impl<'a, S: StorageProvider> UnscopedLookup<'a, S> {
    pub(crate) fn without_tenant_scope(storage: &'a S, reason: BypassReason) -> Self {
        info!(target: AUDIT_TARGET, "Tenant scope bypassed for {}", reason);
        Self { storage, reason }
    }

    pub fn reason(&self) -> BypassReason {
        self.reason
    }

    /// Find the principal registered under `email`, whatever its tenant.
    ///
    /// The principal is returned as stored; a missing tenant association is
    /// left for the caller to reject.
    pub async fn find_principal_by_email_globally(
        &self,
        email: &str,
    ) -> SchoolResult<Option<Principal>> {
        let Some(entry) = self.storage.get(EmailIndexEntry::key(email)).await? else {
            debug!("No principal indexed for e-mail during {}", self.reason);
            return Ok(None);
        };
        let entry: EmailIndexEntry = serde_json::from_value(entry)?;

        let key = StorageKey::new(
            entry.partition.as_str(),
            <Principal as crate::scoping::TenantOwned>::RESOURCE_TYPE,
            entry.principal_id.to_string(),
        );
        let Some(value) = self.storage.get(key).await? else {
            warn!(
                "E-mail index points at missing principal {} in partition {}",
                entry.principal_id, entry.partition
            );
            return Ok(None);
        };

        let principal: Principal = serde_json::from_value(value)?;
        if principal.email != entry.email {
            warn!(
                "E-mail index entry is stale for principal {}",
                entry.principal_id
            );
            return Ok(None);
        }

        info!(
            target: AUDIT_TARGET,
            "Resolved principal {} during {}", principal.meta.id, self.reason
        );
        Ok(Some(principal))
    }

    /// The tenant owning `principal`, if it has one.
    pub async fn tenant_of(&self, principal: &Principal) -> SchoolResult<Option<Tenant>> {
        match principal.meta.tenant_id {
            Some(tenant_id) => TenantRecords::new(self.storage).get(tenant_id).await,
            None => Ok(None),
        }
    }
}

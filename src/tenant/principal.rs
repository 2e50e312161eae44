//! The principal entity.

use crate::error::ValidationError;
use crate::scoping::{RecordMeta, TenantOwned};
use crate::storage::UniqueConstraint;
use crate::tenant::{PrincipalId, Role, TenantId, normalize_email};
use crate::validation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An actor belonging to exactly one tenant.
///
/// The stored form carries the password hash; use [`PrincipalView`] for
/// anything that leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    #[serde(default = "validation::default_true")]
    pub active: bool,
    #[serde(default)]
    pub email_verified_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub(crate) fn from_new(input: NewPrincipal, password_hash: String) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            password_hash,
            role: input.role,
            active: true,
            email_verified_at: None,
        }
    }

    pub fn id(&self) -> PrincipalId {
        PrincipalId::from_uuid(self.meta.id)
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.meta.tenant_id
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Whether the principal may log in at all.
    pub fn can_authenticate(&self) -> bool {
        self.active && self.meta.deleted_at.is_none()
    }

    pub fn view(&self) -> PrincipalView {
        PrincipalView::from(self)
    }
}

impl TenantOwned for Principal {
    const RESOURCE_TYPE: &'static str = "Principal";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("principal_email", &["email"])];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 255);
        errors.check(!validation::is_email(&self.email), "email", "must be a valid e-mail address");
        errors.check(self.password_hash.is_empty(), "password", "is required");
        errors.into_result()
    }
}

/// Input for creating a principal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrincipal {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl NewPrincipal {
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 255);
        errors.check(!validation::is_email(&self.email), "email", "must be a valid e-mail address");
        validation::password(&mut errors, "password", &self.password);
        errors.into_result()
    }
}

/// Outward-facing representation of a principal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrincipalView {
    pub id: PrincipalId,
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Principal> for PrincipalView {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id(),
            tenant_id: p.meta.tenant_id,
            name: p.name.clone(),
            email: p.email.clone(),
            role: p.role,
            active: p.active,
            email_verified_at: p.email_verified_at,
            created_at: p.meta.created_at,
        }
    }
}

//! Immutable per-request tenant context.

use crate::auth::AuthenticationWitness;
use crate::tenant::{Principal, PrincipalId, Role, TenantId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The acting principal and its tenant for one request.
///
/// Can only be produced from an [`AuthenticationWitness`], is never mutated
/// after construction (apart from tagging the request id), and is meant to be
/// dropped when the request ends. Each concurrent request owns its own value.
#[derive(Debug, Clone)]
pub struct TenantContext {
    request_id: String,
    tenant_id: TenantId,
    principal: Principal,
    credential_hash: Option<String>,
    established_at: DateTime<Utc>,
}

impl TenantContext {
    /// Establish the context from proof of authentication.
    pub fn from_witness(witness: AuthenticationWitness) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tenant_id: witness.tenant_id,
            principal: witness.principal,
            credential_hash: witness.credential_hash,
            established_at: witness.validated_at,
        }
    }

    /// Tag the context with the transport's request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id()
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    /// The acting principal, as it was when the request was authenticated.
    pub fn current(&self) -> &Principal {
        &self.principal
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Digest of the bearer token behind this context, if any.
    pub(crate) fn credential_hash(&self) -> Option<&str> {
        self.credential_hash.as_deref()
    }
}

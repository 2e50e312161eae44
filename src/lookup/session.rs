//! Login and the session operations that follow it.

use crate::auth::{AuthenticationWitness, sha256_hex};
use crate::error::{SchoolError, SchoolResult};
use crate::lookup::AccountService;
use crate::scoping::{BypassReason, ScopedRepository, UnscopedLookup};
use crate::storage::TransactionalStorage;
use crate::tenant::record::TenantRecords;
use crate::tenant::{Principal, PrincipalView, Tenant, TenantContext};
use log::{debug, error, info};
use serde::Serialize;

/// Result of a successful login.
///
/// `context` is the tenant context the new token will resolve to, so the
/// caller can keep working in the same request without re-authenticating.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub principal: PrincipalView,
    pub tenant: Tenant,
    pub token: String,
    #[serde(skip)]
    pub context: TenantContext,
}

/// The acting principal and its school.
#[derive(Debug, Clone, Serialize)]
pub struct Me {
    pub principal: PrincipalView,
    pub tenant: Tenant,
}

impl<S: TransactionalStorage> AccountService<'_, S> {
    /// Verify an e-mail and password pair and open a session.
    ///
    /// The tenant comes from the principal record, never from the caller.
    /// Unknown e-mails, wrong passwords and inactive accounts all fail the same
    /// way.
    pub async fn login(&self, email: &str, password: &str) -> SchoolResult<LoginOutcome> {
        let storage = self.server.storage();
        let lookup = UnscopedLookup::without_tenant_scope(storage, BypassReason::Login);

        let Some(principal) = lookup.find_principal_by_email_globally(email).await? else {
            self.server
                .hasher()
                .verify(password, self.server.decoy_hash())?;
            debug!("Login rejected: unknown e-mail");
            return Err(SchoolError::InvalidCredentials);
        };
        if !self.server.hasher().verify(password, &principal.password_hash)? {
            debug!("Login rejected for principal {}: bad password", principal.meta.id);
            return Err(SchoolError::InvalidCredentials);
        }
        if !principal.can_authenticate() {
            debug!("Login rejected for principal {}: inactive", principal.meta.id);
            return Err(SchoolError::InvalidCredentials);
        }

        let now = self.server.clock().now();
        // Rejects a principal without a tenant before any token exists.
        AuthenticationWitness::for_principal(principal.clone(), None, now)?;

        let Some(tenant) = lookup.tenant_of(&principal).await? else {
            error!(
                "Principal {} refers to tenant {:?} which has no record",
                principal.meta.id, principal.meta.tenant_id
            );
            return Err(SchoolError::TenantMissing {
                principal_id: principal.meta.id.to_string(),
            });
        };
        if !tenant.active {
            debug!("Login rejected: tenant {} is inactive", tenant.id);
            return Err(SchoolError::InvalidCredentials);
        }

        let issued = self.server.tokens(storage).issue(&principal).await?;
        let witness = AuthenticationWitness::for_principal(
            principal,
            Some(sha256_hex(&issued.plain_text)),
            now,
        )?;
        let context = TenantContext::from_witness(witness);

        info!(
            "Principal {} logged in to tenant {}",
            context.principal_id(),
            context.tenant_id()
        );
        Ok(LoginOutcome {
            principal: context.current().view(),
            tenant,
            token: issued.plain_text,
            context,
        })
    }

    /// Revoke the token the context was established with.
    pub async fn logout(&self, ctx: &TenantContext) -> SchoolResult<()> {
        let Some(digest) = ctx.credential_hash() else {
            return Err(SchoolError::Unauthenticated);
        };
        self.server.tokens(self.server.storage()).revoke(digest).await?;
        info!(
            "Principal {} logged out of tenant {}",
            ctx.principal_id(),
            ctx.tenant_id()
        );
        Ok(())
    }

    /// Fresh copy of the acting principal and its school.
    pub async fn me(&self, ctx: &TenantContext) -> SchoolResult<Me> {
        let storage = self.server.storage();
        let principal = ScopedRepository::<S, Principal>::new(storage, ctx)
            .find(ctx.principal_id().as_uuid())
            .await?;
        let Some(tenant) = TenantRecords::new(storage).get(ctx.tenant_id()).await? else {
            error!("Tenant {} of an active session has no record", ctx.tenant_id());
            return Err(SchoolError::TenantMissing {
                principal_id: ctx.principal_id().to_string(),
            });
        };
        Ok(Me {
            principal: principal.view(),
            tenant,
        })
    }
}

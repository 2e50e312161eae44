//! E-mail verification.

use crate::auth::constant_time_eq;
use crate::error::{SchoolError, SchoolResult};
use crate::lookup::{AccountService, verification_hash, verification_notice};
use crate::scoping::{BypassReason, Scope, ScopedRepository, UnscopedLookup};
use crate::storage::TransactionalStorage;
use crate::tenant::{Principal, TenantContext};
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationOutcome {
    /// A verification message was dispatched.
    Sent,
    Verified,
    /// Nothing to do; the address was verified before.
    AlreadyVerified,
}

impl<S: TransactionalStorage> AccountService<'_, S> {
    /// Mark an e-mail verified from the link's e-mail and hash.
    pub async fn verify_email(&self, email: &str, hash: &str) -> SchoolResult<VerificationOutcome> {
        let expected = verification_hash(&self.server.config().verification_secret, email);
        if !constant_time_eq(hash, &expected) {
            return Err(SchoolError::InvalidVerificationLink);
        }

        let storage = self.server.storage();
        let lookup = UnscopedLookup::without_tenant_scope(storage, BypassReason::EmailVerification);
        let Some(principal) = lookup.find_principal_by_email_globally(email).await? else {
            return Err(SchoolError::InvalidVerificationLink);
        };
        let Some(tenant_id) = principal.meta.tenant_id else {
            log::error!("Verification target principal {} has no tenant", principal.meta.id);
            return Err(SchoolError::TenantMissing {
                principal_id: principal.meta.id.to_string(),
            });
        };
        if principal.is_verified() {
            debug!("Principal {} already verified", principal.meta.id);
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        let now = self.server.clock().now();
        ScopedRepository::<S, Principal>::with_scope(
            storage,
            Scope::reentered(tenant_id, "email-verification"),
        )
        .update_with(principal.meta.id, move |p| {
            p.email_verified_at = Some(now);
            Ok(())
        })
        .await?;

        info!("E-mail verified for principal {}", principal.meta.id);
        Ok(VerificationOutcome::Verified)
    }

    /// Send the verification message again to the acting principal.
    pub async fn resend_verification(&self, ctx: &TenantContext) -> SchoolResult<VerificationOutcome> {
        let principal = ScopedRepository::<S, Principal>::new(self.server.storage(), ctx)
            .find(ctx.principal_id().as_uuid())
            .await?;
        if principal.is_verified() {
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        match verification_notice(self.server.config(), &principal) {
            Some(notice) => {
                self.server.notifier().dispatch(notice);
                Ok(VerificationOutcome::Sent)
            }
            None => Err(SchoolError::TenantMissing {
                principal_id: principal.meta.id.to_string(),
            }),
        }
    }
}

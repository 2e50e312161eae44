//! Password reset.
//!
//! Reset tokens are single-use, stored as a SHA-256 digest in the global
//! partition keyed by the normalized e-mail, and expire after the configured
//! window. A newer request replaces an older token. Consumption and the first
//! failed expiry check both delete the record.

use crate::auth::{constant_time_eq, sha256_hex};
use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::lookup::AccountService;
use crate::notify::Notification;
use crate::scoping::{BypassReason, Scope, ScopedRepository, UnscopedLookup};
use crate::storage::{StorageKey, StorageProvider, StorageTransaction, TransactionalStorage};
use crate::tenant::{Principal, normalize_email};
use crate::validation;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub(crate) const PASSWORD_RESET_TOKEN: &str = "PasswordResetToken";

/// Response to every reset request, whether or not the e-mail is known.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If the e-mail is registered, a password reset link has been sent";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PasswordResetRecord {
    email: String,
    token_hash: String,
    created_at: DateTime<Utc>,
}

impl PasswordResetRecord {
    fn key(email: &str) -> StorageKey {
        StorageKey::global(PASSWORD_RESET_TOKEN, normalize_email(email))
    }
}

/// Uniform answer to a reset request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordResetRequested {
    pub message: &'static str,
    /// Only populated when the deployment exposes reset tokens for development.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Reset consumption input.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPassword {
    pub email: String,
    pub token: String,
    pub password: String,
}

impl<S: TransactionalStorage> AccountService<'_, S> {
    /// Issue a reset token and hand it to the notifier.
    ///
    /// The response never reveals whether the e-mail belongs to anyone.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> SchoolResult<PasswordResetRequested> {
        let storage = self.server.storage();
        let uniform = PasswordResetRequested {
            message: RESET_REQUESTED_MESSAGE,
            token: None,
        };

        let lookup =
            UnscopedLookup::without_tenant_scope(storage, BypassReason::PasswordResetRequest);
        let Some(principal) = lookup.find_principal_by_email_globally(email).await? else {
            return Ok(uniform);
        };
        if !principal.can_authenticate() || principal.meta.tenant_id.is_none() {
            debug!(
                "Reset not issued for principal {}: cannot authenticate",
                principal.meta.id
            );
            return Ok(uniform);
        }

        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let token = URL_SAFE_NO_PAD.encode(secret);

        let record = PasswordResetRecord {
            email: principal.email.clone(),
            token_hash: sha256_hex(&token),
            created_at: self.server.clock().now(),
        };
        storage
            .put(
                PasswordResetRecord::key(&principal.email),
                serde_json::to_value(&record)?,
            )
            .await?;

        self.server.notifier().dispatch(Notification::PasswordReset {
            principal_id: principal.id(),
            email: principal.email.clone(),
            link: self.server.config().reset_link(&token, &principal.email),
            token: token.clone(),
        });
        info!("Password reset issued for principal {}", principal.meta.id);

        Ok(PasswordResetRequested {
            token: self.server.config().expose_reset_token.then_some(token),
            ..uniform
        })
    }

    /// Consume a reset token and set a new password.
    ///
    /// The token is read, checked and deleted on one transaction, so two
    /// requests racing with the same token cannot both succeed. Every access
    /// token of the principal is revoked in that same transaction.
    pub async fn reset_password(&self, input: ResetPassword) -> SchoolResult<()> {
        let mut errors = ValidationError::new();
        validation::password(&mut errors, "password", &input.password);
        errors.into_result()?;

        let password_hash = self.server.hasher().hash(&input.password)?;
        let key = PasswordResetRecord::key(&input.email);
        let tx = self.server.storage().begin().await?;

        let Some(value) = tx.get(key.clone()).await? else {
            return Err(SchoolError::InvalidResetToken);
        };
        let record: PasswordResetRecord = serde_json::from_value(value)?;

        let ttl = Duration::minutes(self.server.config().password_reset_ttl_minutes);
        if record.created_at + ttl <= self.server.clock().now() {
            tx.delete(key).await?;
            tx.commit().await?;
            debug!("Expired reset token removed");
            return Err(SchoolError::ResetTokenExpired);
        }
        if !constant_time_eq(&sha256_hex(&input.token), &record.token_hash) {
            warn!("Reset token mismatch");
            return Err(SchoolError::InvalidResetToken);
        }

        let lookup = UnscopedLookup::without_tenant_scope(&tx, BypassReason::PasswordResetConsume);
        let Some(principal) = lookup.find_principal_by_email_globally(&input.email).await? else {
            tx.delete(key).await?;
            tx.commit().await?;
            return Err(SchoolError::InvalidResetToken);
        };
        let Some(tenant_id) = principal.meta.tenant_id else {
            log::error!("Reset target principal {} has no tenant", principal.meta.id);
            return Err(SchoolError::TenantMissing {
                principal_id: principal.meta.id.to_string(),
            });
        };

        if !tx.delete(key).await? {
            return Err(SchoolError::InvalidResetToken);
        }
        ScopedRepository::<_, Principal>::with_scope(
            &tx,
            Scope::reentered(tenant_id, "password-reset"),
        )
        .update_with(principal.meta.id, move |p| {
            p.password_hash = password_hash;
            Ok(())
        })
        .await?;
        let revoked = self.server.tokens(&tx).revoke_all(principal.id()).await?;
        tx.commit().await?;

        info!(
            "Password reset for principal {} in tenant {}; {} token(s) revoked",
            principal.meta.id, tenant_id, revoked
        );
        Ok(())
    }
}

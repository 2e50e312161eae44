//! Opaque bearer tokens.
//!
//! A token is `<token id>|<random secret>`. Only the SHA-256 digest of the full
//! token is stored, in the global partition, so a leaked store does not leak
//! usable credentials. Each record remembers the principal and tenant it was
//! issued for.

use crate::auth::{Clock, Credential, Unauthenticated, sha256_hex};
use crate::error::SchoolResult;
use crate::storage::{GLOBAL_PARTITION, StorageKey, StorageProvider};
use crate::tenant::{Principal, PrincipalId, TenantId};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const ACCESS_TOKEN: &str = "AccessToken";

/// Stored form of an issued access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    pub token_id: Uuid,
    pub principal_id: PrincipalId,
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly issued token. `plain_text` is shown to the caller once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub plain_text: String,
    pub record: AccessTokenRecord,
}

/// Issues, resolves and revokes access tokens against any storage provider,
/// including an open transaction.
pub struct AccessTokenStore<'a, S> {
    storage: &'a S,
    clock: &'a dyn Clock,
    ttl: Option<Duration>,
}

impl<'a, S: StorageProvider> AccessTokenStore<'a, S> {
    pub fn new(storage: &'a S, clock: &'a dyn Clock, ttl_minutes: Option<i64>) -> Self {
        Self {
            storage,
            clock,
            ttl: ttl_minutes.map(Duration::minutes),
        }
    }

    /// Issue a new token for `principal`.
    pub async fn issue(&self, principal: &Principal) -> SchoolResult<IssuedToken> {
        let token_id = Uuid::new_v4();
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let plain_text = format!("{}|{}", token_id.simple(), URL_SAFE_NO_PAD.encode(secret));

        let now = self.clock.now();
        let record = AccessTokenRecord {
            token_id,
            principal_id: principal.id(),
            tenant_id: principal.meta.tenant_id,
            created_at: now,
            expires_at: self.ttl.map(|ttl| now + ttl),
        };

        self.storage
            .insert(
                StorageKey::global(ACCESS_TOKEN, sha256_hex(&plain_text)),
                serde_json::to_value(&record)?,
                &[],
            )
            .await?;

        debug!(
            "Issued access token {} for principal {}",
            token_id, record.principal_id
        );
        Ok(IssuedToken { plain_text, record })
    }

    /// Resolve a presented credential to its record.
    ///
    /// Unknown and expired tokens both resolve to `None`; expired ones are removed.
    pub async fn lookup(
        &self,
        credential: &Credential<Unauthenticated>,
    ) -> SchoolResult<Option<AccessTokenRecord>> {
        let key = StorageKey::global(ACCESS_TOKEN, credential.digest());
        let Some(value) = self.storage.get(key.clone()).await? else {
            return Ok(None);
        };
        let record: AccessTokenRecord = serde_json::from_value(value)?;

        if record
            .expires_at
            .is_some_and(|expires_at| expires_at <= self.clock.now())
        {
            debug!("Access token {} expired; removing", record.token_id);
            self.storage.delete(key).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Revoke a single token by the digest of its plain text.
    pub async fn revoke(&self, digest: &str) -> SchoolResult<bool> {
        Ok(self
            .storage
            .delete(StorageKey::global(ACCESS_TOKEN, digest))
            .await?)
    }

    /// Revoke every token issued to `principal_id`. Returns how many were removed.
    pub async fn revoke_all(&self, principal_id: PrincipalId) -> SchoolResult<usize> {
        let tokens = self
            .storage
            .find_by_attribute(
                StorageKey::prefix(GLOBAL_PARTITION, ACCESS_TOKEN),
                "principal_id",
                &principal_id.to_string(),
            )
            .await?;

        let mut revoked = 0;
        for (key, _) in tokens {
            if self.storage.delete(key).await? {
                revoked += 1;
            }
        }

        info!(
            "Revoked {} access token(s) for principal {}",
            revoked, principal_id
        );
        Ok(revoked)
    }
}

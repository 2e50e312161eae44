//! Authentication primitives with type-level proofs.
//!
//! Authentication state is tracked in the type system:
//!
//! * [`Credential<Unauthenticated>`]: a raw bearer value exactly as presented
//! * [`LinearCredential`]: a move-only wrapper so a presented credential is
//!   resolved at most once per request
//! * [`AuthenticationWitness`]: proof that a credential (or a password check)
//!   succeeded and that the principal carries a tenant. Only this crate can
//!   build one, and a [`TenantContext`](crate::tenant::TenantContext) can only
//!   be built from one.
//!
//! The submodules provide the collaborators the flows need: opaque bearer
//! tokens stored hashed ([`token`]), Argon2id password hashing ([`password`])
//! and a clock seam for expiry rules ([`clock`]).
//!
//! # Example Usage
//!
//! ```rust
//! use school_server::auth::LinearCredential;
//!
//! let credential = LinearCredential::from_authorization_header("Bearer 1|abc").unwrap();
//! let raw = credential.consume();
//! assert_eq!(raw.raw_value(), "1|abc");
//!
//! assert!(LinearCredential::from_authorization_header("Basic Zm9v").is_err());
//! ```

pub mod clock;
pub mod password;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use password::{Argon2Hasher, CredentialHasher};
pub use token::{AccessTokenRecord, AccessTokenStore, IssuedToken};

use crate::error::{SchoolError, SchoolResult};
use crate::tenant::{Principal, TenantId};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::marker::PhantomData;

/// Type-level authentication states using phantom types
pub trait AuthState: Send + Sync + 'static {}

/// Phantom type for unauthenticated state
#[derive(Debug, Clone, Copy)]
pub struct Unauthenticated;
impl AuthState for Unauthenticated {}

/// Phantom type for authenticated state
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;
impl AuthState for Authenticated {}

/// Credential with compile-time authentication state
#[derive(Debug, Clone)]
pub struct Credential<S: AuthState> {
    pub(crate) value: String,
    pub(crate) _phantom: PhantomData<S>,
}

impl Credential<Unauthenticated> {
    /// Create a new unauthenticated credential
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _phantom: PhantomData,
        }
    }

    /// Get the raw credential value (only available for unauthenticated)
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    /// Stable digest used to look the credential up without storing it.
    pub fn digest(&self) -> String {
        sha256_hex(&self.value)
    }
}

/// Bearer credential that can only be consumed once.
#[derive(Debug)]
pub struct LinearCredential {
    inner: Credential<Unauthenticated>,
}

impl LinearCredential {
    /// Create a new linear credential
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: Credential::new(value),
        }
    }

    /// Parse an `Authorization` header value of the form `Bearer <token>`.
    ///
    /// The scheme is matched case-insensitively. A missing or empty token is
    /// `Unauthenticated`.
    pub fn from_authorization_header(header: &str) -> SchoolResult<Self> {
        let header = header.trim();
        let (scheme, token) = header.split_once(' ').ok_or(SchoolError::Unauthenticated)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(SchoolError::Unauthenticated);
        }
        Ok(Self::new(token))
    }

    /// Consume this credential for authentication.
    pub fn consume(self) -> Credential<Unauthenticated> {
        self.inner
    }
}

/// Witness type proving successful authentication
///
/// This type can only be constructed inside the crate and serves as proof
/// that validation occurred and that the principal has a tenant.
#[derive(Debug, Clone)]
pub struct AuthenticationWitness {
    pub(crate) principal: Principal,
    pub(crate) tenant_id: TenantId,
    pub(crate) credential_hash: Option<String>,
    pub(crate) validated_at: DateTime<Utc>,
}

impl AuthenticationWitness {
    /// Build a witness for a principal whose credential has been checked.
    ///
    /// Fails with `TenantMissing` when the principal has no tenant. That is a
    /// data fault, so it is logged at error level.
    pub(crate) fn for_principal(
        principal: Principal,
        credential_hash: Option<String>,
        validated_at: DateTime<Utc>,
    ) -> SchoolResult<Self> {
        let Some(tenant_id) = principal.meta.tenant_id else {
            log::error!(
                "Authenticated principal {} has no tenant association",
                principal.meta.id
            );
            return Err(SchoolError::TenantMissing {
                principal_id: principal.meta.id.to_string(),
            });
        };

        Ok(Self {
            principal,
            tenant_id,
            credential_hash,
            validated_at,
        })
    }

    /// The authenticated principal
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The tenant the principal belongs to
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Get validation timestamp
    pub fn validated_at(&self) -> DateTime<Utc> {
        self.validated_at
    }

    /// Digest of the bearer token that produced this witness, if any
    pub fn credential_hash(&self) -> Option<&str> {
        self.credential_hash.as_deref()
    }
}

/// Hex-encoded SHA-256 of `value`.
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare two strings without short-circuiting on the first difference.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{NewPrincipal, Role};

    fn principal(tenant: Option<TenantId>) -> Principal {
        let mut p = Principal::from_new(
            NewPrincipal {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                password: "secret123".into(),
                role: Role::Director,
            },
            "hash".into(),
        );
        p.meta.tenant_id = tenant;
        p
    }

    #[test]
    fn bearer_header_parsing() {
        let cred = LinearCredential::from_authorization_header("bearer  tok ").unwrap();
        assert_eq!(cred.consume().raw_value(), "tok");

        assert!(LinearCredential::from_authorization_header("Bearer").is_err());
        assert!(LinearCredential::from_authorization_header("Bearer   ").is_err());
        assert!(LinearCredential::from_authorization_header("Token abc").is_err());
    }

    #[test]
    fn witness_requires_tenant() {
        let err = AuthenticationWitness::for_principal(principal(None), None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SchoolError::TenantMissing { .. }));

        let tenant = TenantId::new();
        let witness =
            AuthenticationWitness::for_principal(principal(Some(tenant)), None, Utc::now())
                .unwrap();
        assert_eq!(witness.tenant_id(), tenant);
        assert!(witness.credential_hash().is_none());
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = Credential::new("abc").digest();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(constant_time_eq(&digest, &sha256_hex("abc")));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}

//! Account flows: the three that run before a tenant is known, and the
//! session operations that run under an established context.
//!
//! Login, password reset and e-mail verification each build an
//! [`UnscopedLookup`](crate::scoping::UnscopedLookup) with their own
//! [`BypassReason`](crate::scoping::BypassReason), resolve exactly one
//! principal by e-mail, and re-enter the scoped repository with that
//! principal's tenant for every write that follows.

mod reset;
mod session;
mod verification;

pub use reset::{PasswordResetRequested, ResetPassword};
pub use session::{LoginOutcome, Me};
pub use verification::VerificationOutcome;

use crate::auth::sha256_hex;
use crate::config::SchoolConfig;
use crate::notify::Notification;
use crate::school_server::SchoolServer;
use crate::tenant::{Principal, normalize_email};

/// Expected verification hash for `email` under `secret`.
pub fn verification_hash(secret: &str, email: &str) -> String {
    sha256_hex(&format!("{}:{}", secret, normalize_email(email)))
}

/// Verification message for `principal`, or `None` when it has no tenant.
pub(crate) fn verification_notice(config: &SchoolConfig, principal: &Principal) -> Option<Notification> {
    let tenant_id = principal.meta.tenant_id?;
    let hash = verification_hash(&config.verification_secret, &principal.email);
    Some(Notification::VerifyEmail {
        tenant_id,
        principal_id: principal.id(),
        email: principal.email.clone(),
        link: config.verification_link(&principal.email, &hash),
    })
}

/// Login, logout, password reset and e-mail verification.
pub struct AccountService<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S> AccountService<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }
}

//! Tenant resolution from bearer credentials.
//!
//! This maps an inbound request to the [`TenantContext`] it runs under. It is
//! the only place an ordinary request acquires a tenant, so every failure here
//! is final: unknown, expired or revoked tokens, inactive principals and
//! inactive schools are `Unauthenticated`. A token whose tenant is unset or has
//! no record is `TenantMissing`.

use crate::auth::{AuthenticationWitness, LinearCredential};
use crate::error::{SchoolError, SchoolResult};
use crate::school_server::SchoolServer;
use crate::scoping::{Scope, ScopedRepository};
use crate::storage::TransactionalStorage;
use crate::tenant::record::TenantRecords;
use crate::tenant::{Principal, TenantContext};
use log::{debug, error};
use std::future::Future;

/// Trait for resolving tenant contexts from authentication credentials.
///
/// # Security Considerations
///
/// * Consume the credential exactly once
/// * Never fall back to a default tenant
/// * Treat a principal without a tenant as a data fault, not a user error
pub trait TenantResolver: Send + Sync {
    /// Resolve the context a credential authenticates into.
    fn resolve(
        &self,
        credential: LinearCredential,
    ) -> impl Future<Output = SchoolResult<TenantContext>> + Send;
}

/// Resolver backed by the access-token store.
pub struct TokenTenantResolver<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> TokenTenantResolver<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }
}

impl<S: TransactionalStorage> TenantResolver for TokenTenantResolver<'_, S> {
    async fn resolve(&self, credential: LinearCredential) -> SchoolResult<TenantContext> {
        let raw = credential.consume();
        let tokens = self.server.tokens(self.server.storage());

        let Some(record) = tokens.lookup(&raw).await? else {
            debug!("Bearer token did not resolve");
            return Err(SchoolError::Unauthenticated);
        };

        let Some(tenant_id) = record.tenant_id else {
            error!(
                "Access token {} belongs to principal {} without a tenant",
                record.token_id, record.principal_id
            );
            return Err(SchoolError::TenantMissing {
                principal_id: record.principal_id.to_string(),
            });
        };

        let Some(tenant) = TenantRecords::new(self.server.storage()).get(tenant_id).await? else {
            error!(
                "Access token {} refers to tenant {} which has no record",
                record.token_id, tenant_id
            );
            return Err(SchoolError::TenantMissing {
                principal_id: record.principal_id.to_string(),
            });
        };
        if !tenant.active {
            debug!("Tenant {} is inactive", tenant_id);
            return Err(SchoolError::Unauthenticated);
        }

        let principals = ScopedRepository::<S, Principal>::with_scope(
            self.server.storage(),
            Scope::reentered(tenant_id, "token"),
        );
        let principal = match principals.find(record.principal_id.as_uuid()).await {
            Ok(principal) => principal,
            Err(SchoolError::NotFound { .. }) => {
                debug!(
                    "Token {} refers to a principal no longer in tenant {}",
                    record.token_id, tenant_id
                );
                return Err(SchoolError::Unauthenticated);
            }
            Err(e) => return Err(e),
        };

        if !principal.can_authenticate() {
            debug!("Principal {} is inactive", principal.meta.id);
            return Err(SchoolError::Unauthenticated);
        }

        let witness = AuthenticationWitness::for_principal(
            principal,
            Some(raw.digest()),
            self.server.clock().now(),
        )?;
        Ok(TenantContext::from_witness(witness))
    }
}

//! Principal provisioning.
//!
//! Principal e-mails are unique across the whole deployment. The per-tenant
//! `principal_email` constraint still holds, and a global index record keyed by
//! the normalized e-mail backs the deployment-wide rule. Both records are
//! written in the same transaction, so the two can never disagree.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::school_server::SchoolServer;
use crate::scoping::unscoped::EmailIndexEntry;
use crate::scoping::{ListFilter, Page, Scope, ScopedRepository};
use crate::storage::{StorageError, StorageProvider, StorageTransaction, TransactionalStorage};
use crate::tenant::{NewPrincipal, Principal, TenantContext};
use log::info;
use serde_json::Value;
use uuid::Uuid;

/// Attributes a patch may not touch. The e-mail is tied to the global index
/// and the hash only changes through a password reset.
const PROTECTED_FIELDS: [&str; 4] = ["email", "password", "password_hash", "email_verified_at"];

/// Insert `principal` into `scope` together with its e-mail index entry.
///
/// Atomic only when `storage` is a transaction; callers always pass one.
pub(crate) async fn insert_principal<T: StorageProvider>(
    storage: &T,
    scope: &Scope,
    principal: Principal,
) -> SchoolResult<Principal> {
    let entry = EmailIndexEntry {
        email: principal.email.clone(),
        partition: scope.tenant_id().partition(),
        principal_id: principal.meta.id,
    };

    storage
        .insert(
            EmailIndexEntry::key(&principal.email),
            serde_json::to_value(&entry)?,
            &[],
        )
        .await
        .map_err(|e| match e {
            StorageError::ResourceAlreadyExists { .. } => {
                SchoolError::conflict("Principal", &["email"])
            }
            other => other.into(),
        })?;

    ScopedRepository::<T, Principal>::with_scope(storage, scope.clone())
        .create(principal)
        .await
}

/// Creates and manages principals inside the acting tenant.
pub struct PrincipalDirectory<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> PrincipalDirectory<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }

    /// Create a principal in the acting tenant.
    pub async fn create(&self, ctx: &TenantContext, input: NewPrincipal) -> SchoolResult<Principal> {
        input.validate()?;
        let password_hash = self.server.hasher().hash(&input.password)?;
        let principal = Principal::from_new(input, password_hash);

        let tx = self.server.storage().begin().await?;
        let created = insert_principal(&tx, &Scope::from(ctx), principal).await?;
        tx.commit().await?;

        info!(
            "Principal {} ({}) created in tenant {} by {}",
            created.meta.id,
            created.role,
            ctx.tenant_id(),
            ctx.principal_id()
        );
        Ok(created)
    }

    /// Find a principal of the acting tenant.
    pub async fn find(&self, ctx: &TenantContext, id: Uuid) -> SchoolResult<Principal> {
        ScopedRepository::<S, Principal>::new(self.server.storage(), ctx)
            .find(id)
            .await
    }

    /// Principals of the acting tenant.
    pub async fn list(&self, ctx: &TenantContext, filter: &ListFilter) -> SchoolResult<Page<Principal>> {
        ScopedRepository::<S, Principal>::new(self.server.storage(), ctx)
            .list(filter)
            .await
    }

    /// Merge a patch of profile attributes into a principal.
    pub async fn update(&self, ctx: &TenantContext, id: Uuid, patch: Value) -> SchoolResult<Principal> {
        if let Value::Object(fields) = &patch {
            let mut errors = ValidationError::new();
            for field in PROTECTED_FIELDS {
                errors.check(fields.contains_key(field), field, "cannot be changed here");
            }
            errors.into_result()?;
        }

        let tx = self.server.storage().begin().await?;
        let principal = ScopedRepository::<_, Principal>::new(&tx, ctx)
            .merge(id, patch)
            .await?;
        if !principal.active {
            self.server.tokens(&tx).revoke_all(principal.id()).await?;
        }
        tx.commit().await?;
        Ok(principal)
    }

    /// Tombstone a principal and revoke its tokens.
    pub async fn remove(&self, ctx: &TenantContext, id: Uuid) -> SchoolResult<()> {
        let tx = self.server.storage().begin().await?;
        let principals = ScopedRepository::<_, Principal>::new(&tx, ctx);
        let principal = principals.find(id).await?;
        principals.delete(id).await?;
        self.server.tokens(&tx).revoke_all(principal.id()).await?;
        tx.commit().await?;

        info!("Principal {} removed from tenant {}", id, ctx.tenant_id());
        Ok(())
    }

    /// Deactivate a principal and revoke its tokens.
    pub async fn deactivate(&self, ctx: &TenantContext, id: Uuid) -> SchoolResult<Principal> {
        let tx = self.server.storage().begin().await?;
        let principal = ScopedRepository::<_, Principal>::new(&tx, ctx)
            .update_with(id, |p| {
                p.active = false;
                Ok(())
            })
            .await?;
        self.server.tokens(&tx).revoke_all(principal.id()).await?;
        tx.commit().await?;

        info!(
            "Principal {} deactivated in tenant {}",
            principal.meta.id,
            ctx.tenant_id()
        );
        Ok(principal)
    }
}

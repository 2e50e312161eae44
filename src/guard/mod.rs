//! Cross-tenant integrity guard.
//!
//! No write may link records of two tenants. Entity foreign keys are checked by
//! [`verify_references`] from inside the scoped repository. Join records are
//! written by [`RelationService`], which re-resolves both endpoints through the
//! scoped repository and then calls [`assert_same_tenant`] before persisting
//! anything.
//!
//! Failures are always [`SchoolError::CrossTenantViolation`] naming only the
//! offending field. An id that is unknown and an id owned by another tenant are
//! reported the same way.

pub mod records;
pub mod relations;

pub use records::{
    AttendanceEntry, AttendanceReport, RecordService, ReportCard, ReportCardLine,
};
pub use relations::{GroupSubject, RelationService, StudentGuardian, StudentEnrollment};

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::scoping::repository::resolve_in_scope;
use crate::scoping::{Reference, Scope, ScopedRepository, TenantOwned};
use crate::storage::StorageProvider;
use crate::tenant::{Role, TenantId};
use log::{trace, warn};
use serde_json::Value;
use uuid::Uuid;

/// Check that every reference resolves to a live record of the scope's tenant.
pub(crate) async fn verify_references<S: StorageProvider>(
    storage: &S,
    scope: &Scope,
    references: &[Reference],
) -> SchoolResult<()> {
    for reference in references {
        let Some(resolved) =
            resolve_in_scope(storage, scope, reference.resource_type, reference.id).await?
        else {
            warn!(
                "Rejected reference {} -> {} '{}' outside tenant '{}' (request: '{}')",
                reference.field,
                reference.resource_type,
                reference.id,
                scope.tenant_id(),
                scope.request_id()
            );
            return Err(SchoolError::cross_tenant(reference.field));
        };
        if let Some(role) = reference.role {
            holds_role(&resolved, role, reference.field)?;
        }
        trace!("Reference {} verified", reference.field);
    }
    Ok(())
}

/// A referenced principal must be active and hold `role`.
fn holds_role(principal: &Value, role: Role, field: &str) -> SchoolResult<()> {
    let has_role = principal.get("role").and_then(Value::as_str) == Some(role.as_str());
    let active = principal
        .get("active")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    if has_role && active {
        return Ok(());
    }
    warn!("Rejected {} reference to a principal that is not an active {}", field, role);
    Err(ValidationError::single(field, format!("must be an active {}", role)).into())
}

/// Both entities must be owned by the same tenant. Returns that tenant.
///
/// An entity without a tenant never matches, not even another one without.
pub fn assert_same_tenant<A: TenantOwned, B: TenantOwned>(
    a: &A,
    b: &B,
    field: &str,
) -> SchoolResult<TenantId> {
    match (a.tenant_id(), b.tenant_id()) {
        (Some(left), Some(right)) if left == right => Ok(left),
        (left, right) => {
            warn!(
                "Rejected relation {} between {} '{}' ({:?}) and {} '{}' ({:?})",
                field,
                A::RESOURCE_TYPE,
                a.id(),
                left,
                B::RESOURCE_TYPE,
                b.id(),
                right
            );
            Err(SchoolError::cross_tenant(field))
        }
    }
}

/// Re-resolve one endpoint of a relation inside `scope`.
///
/// A miss is a cross-tenant violation on `field`, never `NotFound`: the caller
/// is writing a link, and the id it supplied is not one it may link to.
pub(crate) async fn resolve_endpoint<T: StorageProvider, E: TenantOwned>(
    storage: &T,
    scope: &Scope,
    field: &str,
    id: Uuid,
) -> SchoolResult<E> {
    match ScopedRepository::<T, E>::with_scope(storage, scope.clone())
        .find(id)
        .await
    {
        Ok(entity) => Ok(entity),
        Err(SchoolError::NotFound { .. }) => {
            warn!(
                "Relation endpoint {} '{}' did not resolve in tenant '{}' (request: '{}')",
                field,
                id,
                scope.tenant_id(),
                scope.request_id()
            );
            Err(SchoolError::cross_tenant(field))
        }
        Err(e) => Err(e),
    }
}

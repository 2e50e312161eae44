//! The scoped repository: every tenant-owned read and write goes through here.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::guard;
use crate::scoping::TenantOwned;
use crate::storage::{StorageKey, StorageProvider};
use crate::tenant::{TenantContext, TenantId};
use chrono::Utc;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use uuid::Uuid;

/// The tenant a repository is bound to, plus the request it serves.
///
/// Built from a [`TenantContext`] for ordinary requests. The crate can also
/// re-enter a tenant's scope after a bypass flow has resolved the principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    tenant_id: TenantId,
    request_id: String,
}

impl Scope {
    /// Scope for a flow that resolved the tenant without a request context.
    pub(crate) fn reentered(tenant_id: TenantId, flow: &str) -> Self {
        Self {
            tenant_id,
            request_id: format!("{}-{}", flow, Uuid::new_v4().simple()),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl From<&TenantContext> for Scope {
    fn from(ctx: &TenantContext) -> Self {
        Self {
            tenant_id: ctx.tenant_id(),
            request_id: ctx.request_id().to_string(),
        }
    }
}

/// Query options for [`ScopedRepository::list`]. The tenant restriction is
/// always added on top of whatever is set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub attribute: Option<String>,
    pub value: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub include_deleted: bool,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records whose `attribute` renders as `value`.
    pub fn where_eq(mut self, attribute: impl Into<String>, value: impl ToString) -> Self {
        self.attribute = Some(attribute.into());
        self.value = Some(value.to_string());
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Also return tombstoned records.
    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Repository for one entity type, bound to one tenant.
///
/// Holding a `ScopedRepository` is the static proof that a data access is
/// tenant-filtered: there is no method here that reaches outside
/// `scope.tenant_id()`.
pub struct ScopedRepository<'a, S, E> {
    storage: &'a S,
    scope: Scope,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, S: StorageProvider, E: TenantOwned> ScopedRepository<'a, S, E> {
    /// Repository scoped to the tenant of `ctx`.
    pub fn new(storage: &'a S, ctx: &TenantContext) -> Self {
        Self::with_scope(storage, Scope::from(ctx))
    }

    pub(crate) fn with_scope(storage: &'a S, scope: Scope) -> Self {
        Self {
            storage,
            scope,
            _entity: PhantomData,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn key(&self, id: Uuid) -> StorageKey {
        StorageKey::new(self.scope.tenant_id.partition(), E::RESOURCE_TYPE, id.to_string())
    }

    /// Persist a new entity owned by the scope's tenant.
    ///
    /// An unset `tenant_id` is filled in; a different one is rejected. Every
    /// reference the entity holds must resolve inside the same tenant.
    pub async fn create(&self, mut entity: E) -> SchoolResult<E> {
        info!(
            "Creating {} for tenant '{}' (request: '{}')",
            E::RESOURCE_TYPE,
            self.scope.tenant_id,
            self.scope.request_id
        );

        match entity.meta().tenant_id {
            None => entity.meta_mut().tenant_id = Some(self.scope.tenant_id),
            Some(tenant_id) if tenant_id == self.scope.tenant_id => {}
            Some(tenant_id) => {
                warn!(
                    "Rejected {} create for tenant '{}' carrying tenant_id '{}' (request: '{}')",
                    E::RESOURCE_TYPE,
                    self.scope.tenant_id,
                    tenant_id,
                    self.scope.request_id
                );
                return Err(SchoolError::cross_tenant("tenant_id"));
            }
        }

        let now = Utc::now();
        let meta = entity.meta_mut();
        meta.created_at = now;
        meta.updated_at = now;
        meta.deleted_at = None;

        entity.validate()?;
        guard::verify_references(self.storage, &self.scope, &entity.references()).await?;

        let id = entity.id();
        self.storage
            .insert(self.key(id), serde_json::to_value(&entity)?, E::UNIQUE)
            .await?;

        debug!("Created {} '{}'", E::RESOURCE_TYPE, id);
        Ok(entity)
    }

    /// Fetch a live entity. Missing, tombstoned and foreign ids all give `NotFound`.
    pub async fn find(&self, id: Uuid) -> SchoolResult<E> {
        debug!(
            "Getting {} '{}' for tenant '{}' (request: '{}')",
            E::RESOURCE_TYPE,
            id,
            self.scope.tenant_id,
            self.scope.request_id
        );

        match self.load(id).await? {
            Some(entity) if !entity.meta().is_deleted() => {
                trace!("{} found", E::RESOURCE_TYPE);
                Ok(entity)
            }
            _ => Err(SchoolError::not_found(E::RESOURCE_TYPE, id)),
        }
    }

    /// Whether a live entity with `id` exists in scope.
    pub async fn exists(&self, id: Uuid) -> SchoolResult<bool> {
        Ok(self
            .load(id)
            .await?
            .is_some_and(|entity| !entity.meta().is_deleted()))
    }

    /// List entities in scope, oldest first.
    pub async fn list(&self, filter: &ListFilter) -> SchoolResult<Page<E>> {
        debug!(
            "Listing {} for tenant '{}' (request: '{}')",
            E::RESOURCE_TYPE,
            self.scope.tenant_id,
            self.scope.request_id
        );

        let prefix = StorageKey::prefix(self.scope.tenant_id.partition(), E::RESOURCE_TYPE);
        let rows = match (&filter.attribute, &filter.value) {
            (Some(attribute), Some(value)) => {
                self.storage
                    .find_by_attribute(prefix, attribute, value)
                    .await?
            }
            (None, None) => self.storage.list(prefix, 0, usize::MAX).await?,
            _ => {
                return Err(ValidationError::single(
                    "filter",
                    "attribute and value must be given together",
                )
                .into());
            }
        };

        let mut items: Vec<E> = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_value::<E>(value) {
                Ok(entity) => {
                    if self.owns(&entity) && (filter.include_deleted || !entity.meta().is_deleted())
                    {
                        items.push(entity);
                    }
                }
                Err(e) => warn!("Failed to deserialize {} during list: {}", key, e),
            }
        }
        items.sort_by(|a, b| {
            (a.meta().created_at, a.meta().id).cmp(&(b.meta().created_at, b.meta().id))
        });

        let total = items.len();
        let items = items
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(Page {
            items,
            total,
            offset: filter.offset,
            limit: filter.limit,
        })
    }

    /// Number of live entities in scope.
    pub async fn count(&self) -> SchoolResult<usize> {
        Ok(self.list(&ListFilter::new()).await?.total)
    }

    /// Apply `change` to a live entity and persist it.
    ///
    /// The closure may not move the entity to another tenant or give it another
    /// id. Timestamps are maintained here regardless of what the closure does.
    pub async fn update_with<F>(&self, id: Uuid, change: F) -> SchoolResult<E>
    where
        F: FnOnce(&mut E) -> SchoolResult<()> + Send,
    {
        info!(
            "Updating {} '{}' for tenant '{}' (request: '{}')",
            E::RESOURCE_TYPE,
            id,
            self.scope.tenant_id,
            self.scope.request_id
        );

        let current = self.find(id).await?;
        let mut updated = current.clone();
        change(&mut updated)?;

        if updated.meta().tenant_id != Some(self.scope.tenant_id) {
            warn!(
                "Rejected {} '{}' update moving it out of tenant '{}' (request: '{}')",
                E::RESOURCE_TYPE,
                id,
                self.scope.tenant_id,
                self.scope.request_id
            );
            return Err(SchoolError::cross_tenant("tenant_id"));
        }
        if updated.meta().id != id {
            return Err(ValidationError::single("id", "cannot be changed").into());
        }

        let meta = updated.meta_mut();
        meta.created_at = current.meta().created_at;
        meta.deleted_at = None;
        meta.updated_at = Utc::now();

        updated.validate()?;
        guard::verify_references(self.storage, &self.scope, &updated.references()).await?;

        self.storage
            .replace(self.key(id), serde_json::to_value(&updated)?, E::UNIQUE)
            .await?;

        debug!("Updated {} '{}'", E::RESOURCE_TYPE, id);
        Ok(updated)
    }

    /// Merge a JSON object of attributes into a live entity.
    pub async fn merge(&self, id: Uuid, patch: Value) -> SchoolResult<E> {
        let Value::Object(patch) = patch else {
            return Err(ValidationError::single("body", "must be a JSON object").into());
        };

        self.update_with(id, move |entity| {
            let mut value = serde_json::to_value(&*entity)?;
            if let Value::Object(fields) = &mut value {
                fields.extend(patch);
            }
            *entity = serde_json::from_value(value)
                .map_err(|e| ValidationError::single("body", e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Tombstone a live entity. It stays in storage but disappears from reads.
    pub async fn delete(&self, id: Uuid) -> SchoolResult<()> {
        info!(
            "Deleting {} '{}' for tenant '{}' (request: '{}')",
            E::RESOURCE_TYPE,
            id,
            self.scope.tenant_id,
            self.scope.request_id
        );

        let mut entity = self.find(id).await?;
        let now = Utc::now();
        entity.meta_mut().deleted_at = Some(now);
        entity.meta_mut().updated_at = now;

        self.storage
            .replace(self.key(id), serde_json::to_value(&entity)?, &[])
            .await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> SchoolResult<Option<E>> {
        let Some(value) = self.storage.get(self.key(id)).await? else {
            trace!("{} '{}' not present in partition", E::RESOURCE_TYPE, id);
            return Ok(None);
        };

        let entity: E = serde_json::from_value(value)?;
        if !self.owns(&entity) {
            warn!(
                "{} '{}' stored in partition of tenant '{}' but owned by {:?}; hiding it",
                E::RESOURCE_TYPE,
                id,
                self.scope.tenant_id,
                entity.meta().tenant_id
            );
            return Ok(None);
        }
        Ok(Some(entity))
    }

    fn owns(&self, entity: &E) -> bool {
        entity.meta().tenant_id == Some(self.scope.tenant_id)
    }
}

/// Resolve a record of any tenant-owned type by id inside `scope`.
///
/// Used for foreign-key checks, where the referenced type is only known by
/// name. Tombstoned and foreign records resolve to `None`.
pub(crate) async fn resolve_in_scope<S: StorageProvider>(
    storage: &S,
    scope: &Scope,
    resource_type: &str,
    id: Uuid,
) -> SchoolResult<Option<Value>> {
    let key = StorageKey::new(scope.tenant_id.partition(), resource_type, id.to_string());
    let Some(value) = storage.get(key).await? else {
        return Ok(None);
    };

    let owned = value
        .get("tenant_id")
        .and_then(Value::as_str)
        .is_some_and(|tenant| tenant == scope.tenant_id.to_string());
    let live = value.get("deleted_at").is_none_or(Value::is_null);

    Ok((owned && live).then_some(value))
}

//! Generic CRUD handlers for every tenant-owned entity kind.
//!
//! Writes run in a transaction so that a failed reference check leaves
//! nothing behind. Principals go through the
//! [`PrincipalDirectory`](crate::tenant::PrincipalDirectory) instead, which
//! hashes passwords, maintains the e-mail index and never returns the hash.

use crate::error::SchoolResult;
use crate::handler::core::{
    OperationResponse, ResourceAction, ResourceKind, SchoolOperationHandler, created, describe,
    no_content, ok, parse_body, parse_id, to_json,
};
use crate::school::{
    Attendance, ChargeConcept, Cycle, Grade, GradeRecord, Group, Level, Parent, Period, Student,
    Subject,
};
use crate::scoping::{Page, ScopedRepository, TenantOwned};
use crate::storage::{StorageTransaction, TransactionalStorage};
use crate::tenant::{NewPrincipal, Principal, PrincipalView, TenantContext};
use log::debug;

pub async fn handle<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    kind: ResourceKind,
    action: ResourceAction,
) -> SchoolResult<OperationResponse> {
    debug!("{:?} request from {}", kind, describe(ctx));
    match kind {
        ResourceKind::Principal => principals(handler, ctx, action).await,
        ResourceKind::Level => entity::<S, Level>(handler, ctx, action).await,
        ResourceKind::Grade => entity::<S, Grade>(handler, ctx, action).await,
        ResourceKind::Group => entity::<S, Group>(handler, ctx, action).await,
        ResourceKind::Subject => entity::<S, Subject>(handler, ctx, action).await,
        ResourceKind::Student => entity::<S, Student>(handler, ctx, action).await,
        ResourceKind::Parent => entity::<S, Parent>(handler, ctx, action).await,
        ResourceKind::Cycle => entity::<S, Cycle>(handler, ctx, action).await,
        ResourceKind::Period => entity::<S, Period>(handler, ctx, action).await,
        ResourceKind::ChargeConcept => entity::<S, ChargeConcept>(handler, ctx, action).await,
        ResourceKind::GradeRecord => entity::<S, GradeRecord>(handler, ctx, action).await,
        ResourceKind::Attendance => entity::<S, Attendance>(handler, ctx, action).await,
    }
}

async fn entity<S: TransactionalStorage, E: TenantOwned>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    action: ResourceAction,
) -> SchoolResult<OperationResponse> {
    let storage = handler.server().storage();
    let request_id = ctx.request_id();

    match action {
        ResourceAction::Create(data) => {
            let entity: E = parse_body(data)?;
            let tx = storage.begin().await?;
            let entity = ScopedRepository::<_, E>::new(&tx, ctx).create(entity).await?;
            tx.commit().await?;
            Ok(created(to_json(&entity)?, request_id))
        }
        ResourceAction::Get(id) => {
            let id = parse_id(E::RESOURCE_TYPE, &id)?;
            let entity = ScopedRepository::<S, E>::new(storage, ctx).find(id).await?;
            Ok(ok(to_json(&entity)?, request_id))
        }
        ResourceAction::List(filter) => {
            let page = ScopedRepository::<S, E>::new(storage, ctx).list(&filter).await?;
            Ok(ok(to_json(&page)?, request_id))
        }
        ResourceAction::Update(id, patch) => {
            let id = parse_id(E::RESOURCE_TYPE, &id)?;
            let tx = storage.begin().await?;
            let entity = ScopedRepository::<_, E>::new(&tx, ctx).merge(id, patch).await?;
            tx.commit().await?;
            Ok(ok(to_json(&entity)?, request_id))
        }
        ResourceAction::Delete(id) => {
            let id = parse_id(E::RESOURCE_TYPE, &id)?;
            let tx = storage.begin().await?;
            ScopedRepository::<_, E>::new(&tx, ctx).delete(id).await?;
            tx.commit().await?;
            Ok(no_content(request_id))
        }
    }
}

async fn principals<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    action: ResourceAction,
) -> SchoolResult<OperationResponse> {
    let directory = handler.server().directory();
    let request_id = ctx.request_id();
    let resource_type = <Principal as TenantOwned>::RESOURCE_TYPE;

    match action {
        ResourceAction::Create(data) => {
            let input: NewPrincipal = parse_body(data)?;
            let principal = directory.create(ctx, input).await?;
            Ok(created(to_json(&principal.view())?, request_id))
        }
        ResourceAction::Get(id) => {
            let principal = directory.find(ctx, parse_id(resource_type, &id)?).await?;
            Ok(ok(to_json(&principal.view())?, request_id))
        }
        ResourceAction::List(filter) => {
            let page = directory.list(ctx, &filter).await?;
            let views = Page {
                items: page.items.iter().map(PrincipalView::from).collect::<Vec<_>>(),
                total: page.total,
                offset: page.offset,
                limit: page.limit,
            };
            Ok(ok(to_json(&views)?, request_id))
        }
        ResourceAction::Update(id, patch) => {
            let principal = directory
                .update(ctx, parse_id(resource_type, &id)?, patch)
                .await?;
            Ok(ok(to_json(&principal.view())?, request_id))
        }
        ResourceAction::Delete(id) => {
            directory.remove(ctx, parse_id(resource_type, &id)?).await?;
            Ok(no_content(request_id))
        }
    }
}

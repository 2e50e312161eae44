//! Onboarding handlers.

use crate::error::{SchoolError, SchoolResult};
use crate::handler::core::{
    Operation, OperationResponse, SchoolOperationHandler, ok, parse_body, to_json,
};
use crate::registration::SchoolData;
use crate::storage::TransactionalStorage;
use crate::tenant::TenantContext;

pub async fn handle<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    operation: Operation,
) -> SchoolResult<OperationResponse> {
    let onboarding = handler.server().onboarding();
    let body = match operation {
        Operation::OnboardingStatus => to_json(&onboarding.status(ctx).await?)?,
        Operation::CompleteSchoolData(data) => {
            let data: SchoolData = parse_body(data)?;
            to_json(&onboarding.complete_school_data(ctx, data).await?)?
        }
        Operation::CompleteStructure => to_json(&onboarding.complete_structure(ctx).await?)?,
        Operation::CompleteOnboarding => to_json(&onboarding.complete(ctx).await?)?,
        Operation::SkipOnboarding => to_json(&onboarding.skip(ctx).await?)?,
        _ => return Err(SchoolError::internal("not an onboarding operation")),
    };
    Ok(ok(body, ctx.request_id()))
}

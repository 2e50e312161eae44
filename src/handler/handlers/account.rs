//! Registration, login, password reset, verification and session handlers.

use crate::error::{SchoolError, SchoolResult};
use crate::handler::core::{
    Operation, OperationResponse, SchoolOperationHandler, created, ok, parse_body, to_json,
};
use crate::lookup::ResetPassword;
use crate::registration::{RegisterExpress, RegisterSchool};
use crate::storage::TransactionalStorage;
use crate::tenant::TenantContext;
use serde_json::json;

/// Operations that run before a tenant context exists.
pub async fn handle_public<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    operation: Operation,
    request_id: &str,
) -> SchoolResult<OperationResponse> {
    let server = handler.server();
    match operation {
        Operation::Register(data) => {
            let input: RegisterSchool = parse_body(data)?;
            let registered = server.registration().register(input).await?;
            Ok(created(to_json(&registered)?, request_id))
        }
        Operation::RegisterExpress(data) => {
            let input: RegisterExpress = parse_body(data)?;
            let registered = server.registration().register_express(input).await?;
            Ok(created(to_json(&registered)?, request_id))
        }
        Operation::Login { email, password } => {
            let outcome = server.accounts().login(&email, &password).await?;
            Ok(ok(to_json(&outcome)?, request_id))
        }
        Operation::ForgotPassword { email } => {
            let requested = server.accounts().request_password_reset(&email).await?;
            Ok(ok(to_json(&requested)?, request_id))
        }
        Operation::ResetPassword(data) => {
            let input: ResetPassword = parse_body(data)?;
            server.accounts().reset_password(input).await?;
            Ok(ok(
                json!({"message": "Password has been reset"}),
                request_id,
            ))
        }
        Operation::VerifyEmail { email, hash } => {
            let outcome = server.accounts().verify_email(&email, &hash).await?;
            Ok(ok(json!({"status": outcome}), request_id))
        }
        _ => Err(SchoolError::internal("operation is not public")),
    }
}

/// Operations on the caller's own session.
pub async fn handle_session<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    operation: Operation,
) -> SchoolResult<OperationResponse> {
    let accounts = handler.server().accounts();
    match operation {
        Operation::Logout => {
            accounts.logout(ctx).await?;
            Ok(ok(json!({"message": "Logged out"}), ctx.request_id()))
        }
        Operation::Me => {
            let me = accounts.me(ctx).await?;
            Ok(ok(to_json(&me)?, ctx.request_id()))
        }
        Operation::ResendVerification => {
            let outcome = accounts.resend_verification(ctx).await?;
            Ok(ok(json!({"status": outcome}), ctx.request_id()))
        }
        _ => Err(SchoolError::internal("not a session operation")),
    }
}

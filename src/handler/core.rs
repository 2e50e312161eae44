//! Core operation handler infrastructure
//!
//! The request, operation and response types, and the dispatcher that turns an
//! [`OperationRequest`] into an [`OperationResponse`].

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::school_server::SchoolServer;
use crate::scoping::ListFilter;
use crate::storage::TransactionalStorage;
use crate::tenant::TenantContext;
use log::{debug, info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// Transport-agnostic handler for school operations.
///
/// Owns a [`SchoolServer`] and nothing else. Every call authenticates its own
/// request, so the handler can be shared by concurrent requests of different
/// tenants.
pub struct SchoolOperationHandler<S> {
    pub(super) server: SchoolServer<S>,
}

/// One inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    /// Raw `Authorization` header, if any.
    pub authorization: Option<String>,
    /// Request ID for tracing and correlation
    pub request_id: Option<String>,
    pub operation: Operation,
}

impl OperationRequest {
    /// A request without credentials.
    pub fn public(operation: Operation) -> Self {
        Self {
            authorization: None,
            request_id: None,
            operation,
        }
    }

    /// A request carrying `token` as a bearer credential.
    pub fn bearer(token: &str, operation: Operation) -> Self {
        Self {
            authorization: Some(format!("Bearer {}", token)),
            request_id: None,
            operation,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Entity kinds reachable through the generic resource operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Principal,
    Level,
    Grade,
    Group,
    Subject,
    Student,
    Parent,
    Cycle,
    Period,
    ChargeConcept,
    GradeRecord,
    Attendance,
}

/// Generic CRUD actions. Ids arrive as text, as they would in a URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceAction {
    Create(Value),
    Get(String),
    List(ListFilter),
    Update(String, Value),
    Delete(String),
}

/// Every operation the handler can perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // Public: no bearer credential required.
    Register(Value),
    RegisterExpress(Value),
    Login { email: String, password: String },
    ForgotPassword { email: String },
    ResetPassword(Value),
    VerifyEmail { email: String, hash: String },

    // Session.
    Logout,
    Me,
    ResendVerification,

    // Onboarding of the caller's school.
    OnboardingStatus,
    CompleteSchoolData(Value),
    CompleteStructure,
    CompleteOnboarding,
    SkipOnboarding,

    Resource {
        kind: ResourceKind,
        action: ResourceAction,
    },

    // Relations.
    EnrollStudent(Value),
    AttachParent { student_id: String, data: Value },
    DetachParent { student_id: String, parent_id: String },
    ReplaceParents { student_id: String, data: Value },
    ListParents { student_id: String },
    AssignSubject { group_id: String, subject_id: String, data: Value },
    UpdateAssignment { group_id: String, subject_id: String, data: Value },
    UnassignSubject { group_id: String, subject_id: String },
    ListGroupSubjects { group_id: String },
    AssignTeacher { group_id: String, teacher_id: Option<String> },

    // Records.
    ReportCard { student_id: String, period_id: String },
    /// Body: `{"date": "YYYY-MM-DD", "entries": [{"student_id", "status", "notes"?}]}`.
    RecordGroupAttendance { group_id: String, data: Value },
    AttendanceReport { student_id: String, from: String, to: String },
}

impl Operation {
    /// Whether the operation runs before any tenant context exists.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Operation::Register(_)
                | Operation::RegisterExpress(_)
                | Operation::Login { .. }
                | Operation::ForgotPassword { .. }
                | Operation::ResetPassword(_)
                | Operation::VerifyEmail { .. }
        )
    }
}

/// Status-coded response.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub status: u16,
    pub body: Value,
    pub request_id: String,
}

impl OperationResponse {
    pub(super) fn new(status: u16, body: Value, request_id: &str) -> Self {
        Self {
            status,
            body,
            request_id: request_id.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<S: TransactionalStorage> SchoolOperationHandler<S> {
    pub fn new(server: SchoolServer<S>) -> Self {
        Self { server }
    }

    /// Handle one request. Failures become error responses, never panics.
    pub async fn handle_operation(&self, request: OperationRequest) -> OperationResponse {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        info!(
            "School operation handler processing {} (request: '{}')",
            operation_name(&request.operation),
            request_id
        );

        let result = self.dispatch(request, &request_id).await;
        match result {
            Ok(response) => {
                debug!(
                    "School operation completed with {} (request: '{}')",
                    response.status, request_id
                );
                response
            }
            Err(e) => {
                warn!("School operation failed: {} (request: '{}')", e, request_id);
                super::errors::create_error_response(e, &request_id)
            }
        }
    }

    async fn dispatch(
        &self,
        request: OperationRequest,
        request_id: &str,
    ) -> SchoolResult<OperationResponse> {
        use super::handlers::{account, onboarding, records, relations, resources};

        if request.operation.is_public() {
            return account::handle_public(self, request.operation, request_id).await;
        }

        let ctx = self
            .server
            .authenticate(request.authorization.as_deref())
            .await?
            .with_request_id(request_id);

        match request.operation {
            Operation::Logout | Operation::Me | Operation::ResendVerification => {
                account::handle_session(self, &ctx, request.operation).await
            }
            Operation::OnboardingStatus
            | Operation::CompleteSchoolData(_)
            | Operation::CompleteStructure
            | Operation::CompleteOnboarding
            | Operation::SkipOnboarding => onboarding::handle(self, &ctx, request.operation).await,
            Operation::Resource { kind, action } => {
                resources::handle(self, &ctx, kind, action).await
            }
            Operation::ReportCard { .. }
            | Operation::RecordGroupAttendance { .. }
            | Operation::AttendanceReport { .. } => {
                records::handle(self, &ctx, request.operation).await
            }
            other => relations::handle(self, &ctx, other).await,
        }
    }

    /// Get access to the underlying school server.
    pub fn server(&self) -> &SchoolServer<S> {
        &self.server
    }
}

/// Parse a request body, reporting shape errors as a validation failure.
pub(super) fn parse_body<T: DeserializeOwned>(data: Value) -> SchoolResult<T> {
    serde_json::from_value(data)
        .map_err(|e| SchoolError::Validation(ValidationError::single("body", e.to_string())))
}

/// Parse an id taken from a path. Malformed ids cannot name anything, so they
/// are reported as not found.
pub(super) fn parse_id(resource_type: &str, id: &str) -> SchoolResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| SchoolError::not_found(resource_type, id))
}

/// Parse an id naming the other end of a relation.
pub(super) fn parse_reference(field: &str, id: &str) -> SchoolResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| SchoolError::cross_tenant(field))
}

pub(super) fn to_json<T: serde::Serialize>(value: &T) -> SchoolResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub(super) fn ok(body: Value, request_id: &str) -> OperationResponse {
    OperationResponse::new(200, body, request_id)
}

pub(super) fn created(body: Value, request_id: &str) -> OperationResponse {
    OperationResponse::new(201, body, request_id)
}

pub(super) fn no_content(request_id: &str) -> OperationResponse {
    OperationResponse::new(204, Value::Null, request_id)
}

/// Context-free operation label for logs.
fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Register(_) => "register",
        Operation::RegisterExpress(_) => "register-express",
        Operation::Login { .. } => "login",
        Operation::ForgotPassword { .. } => "forgot-password",
        Operation::ResetPassword(_) => "reset-password",
        Operation::VerifyEmail { .. } => "verify-email",
        Operation::Logout => "logout",
        Operation::Me => "me",
        Operation::ResendVerification => "resend-verification",
        Operation::OnboardingStatus => "onboarding-status",
        Operation::CompleteSchoolData(_) => "onboarding-school-data",
        Operation::CompleteStructure => "onboarding-structure",
        Operation::CompleteOnboarding => "onboarding-complete",
        Operation::SkipOnboarding => "onboarding-skip",
        Operation::Resource { action, .. } => match action {
            ResourceAction::Create(_) => "resource-create",
            ResourceAction::Get(_) => "resource-get",
            ResourceAction::List(_) => "resource-list",
            ResourceAction::Update(..) => "resource-update",
            ResourceAction::Delete(_) => "resource-delete",
        },
        Operation::EnrollStudent(_) => "enroll-student",
        Operation::AttachParent { .. } => "attach-parent",
        Operation::DetachParent { .. } => "detach-parent",
        Operation::ReplaceParents { .. } => "replace-parents",
        Operation::ListParents { .. } => "list-parents",
        Operation::AssignSubject { .. } => "assign-subject",
        Operation::UpdateAssignment { .. } => "update-assignment",
        Operation::UnassignSubject { .. } => "unassign-subject",
        Operation::ListGroupSubjects { .. } => "list-group-subjects",
        Operation::AssignTeacher { .. } => "assign-teacher",
        Operation::ReportCard { .. } => "report-card",
        Operation::RecordGroupAttendance { .. } => "record-group-attendance",
        Operation::AttendanceReport { .. } => "attendance-report",
    }
}

/// Context tag used in logs by the handlers.
pub(super) fn describe(ctx: &TenantContext) -> String {
    format!("tenant '{}' principal '{}'", ctx.tenant_id(), ctx.principal_id())
}

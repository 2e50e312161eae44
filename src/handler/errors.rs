//! Error responses.

use crate::error::SchoolError;
use crate::handler::core::OperationResponse;
use log::{error, warn};

/// Render `err` as a status-coded response.
///
/// The body carries only the public message and field errors. Server-side
/// failures are logged in full here, since the caller never sees them.
pub fn create_error_response(err: SchoolError, request_id: &str) -> OperationResponse {
    let status = err.status_code();
    match &err {
        SchoolError::TenantMissing { principal_id } => error!(
            "Principal {} without tenant reached the handler (request: '{}')",
            principal_id, request_id
        ),
        _ if status >= 500 => error!("Internal failure: {} (request: '{}')", err, request_id),
        SchoolError::CrossTenantViolation { field } => warn!(
            "Cross-tenant write rejected on '{}' (request: '{}')",
            field, request_id
        ),
        _ => {}
    }
    OperationResponse::new(status, err.to_body(), request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    #[test]
    fn not_found_body_is_generic() {
        let response =
            create_error_response(SchoolError::not_found("Student", "42"), "req-1");
        assert_eq!(response.status, 404);
        assert_eq!(response.body["message"], "Student not found.");
        assert_eq!(response.request_id, "req-1");
    }

    #[test]
    fn storage_failures_hide_details() {
        let response = create_error_response(
            SchoolError::Storage(StorageError::internal("disk on fire")),
            "req-2",
        );
        assert_eq!(response.status, 500);
        assert!(!response.body.to_string().contains("disk"));
    }
}

//! Transport-agnostic operation handler.
//!
//! Turns a structured request (bearer header, request id, operation) into a
//! status-coded JSON response. An HTTP or RPC layer only has to map its routes
//! onto [`Operation`] values and copy [`OperationResponse::status`] and
//! [`OperationResponse::body`] back out.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use school_server::handler::{Operation, OperationRequest, ResourceAction, ResourceKind, SchoolOperationHandler};
//! use school_server::storage::InMemoryStorage;
//! use school_server::SchoolServer;
//! use serde_json::json;
//!
//! # async fn example(token: &str) -> school_server::SchoolResult<()> {
//! let handler = SchoolOperationHandler::new(SchoolServer::new(InMemoryStorage::new())?);
//! let response = handler
//!     .handle_operation(OperationRequest::bearer(
//!         token,
//!         Operation::Resource {
//!             kind: ResourceKind::Level,
//!             action: ResourceAction::Create(json!({"name": "Primaria", "order": 2})),
//!         },
//!     ))
//!     .await;
//! assert_eq!(response.status, 201);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod errors;
pub mod handlers;

pub use self::core::{
    Operation, OperationRequest, OperationResponse, ResourceAction, ResourceKind,
    SchoolOperationHandler,
};
pub use errors::create_error_response;

//! Multi-tenant school management core.
//!
//! Every school is a tenant. Its principals, academic structure, people,
//! calendar, billing concepts and records live in a partition that only a
//! [`TenantContext`] for that school can read or write. The crate enforces
//! that boundary in one place, the [`ScopedRepository`](scoping::ScopedRepository),
//! and checks every cross-entity reference and relation write against it.
//!
//! # Core Components
//!
//! - [`SchoolServer`] - Entry point wiring storage, hashing, notification and clock
//! - [`TenantContext`] - The per-request proof of who is acting and for which school
//! - [`scoping`] - Tenant-scoped repositories and the audited unscoped lookups
//! - [`guard`] - Reference and relation checks across tenant boundaries
//! - [`handler`] - Transport-agnostic operation dispatch with status-coded responses
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use school_server::registration::RegisterExpress;
//! use school_server::storage::InMemoryStorage;
//! use school_server::SchoolServer;
//!
//! # async fn example() -> school_server::SchoolResult<()> {
//! let server = SchoolServer::new(InMemoryStorage::new())?;
//! let registered = server
//!     .registration()
//!     .register_express(RegisterExpress {
//!         school_name: "Colegio Hidalgo".to_string(),
//!         email: "director@hidalgo.mx".to_string(),
//!         password: "s3cret-pass".to_string(),
//!         director_name: None,
//!     })
//!     .await?;
//! let ctx = server.authenticate(Some(&format!("Bearer {}", registered.token))).await?;
//! assert_eq!(ctx.tenant_id(), registered.tenant.id);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod guard;
pub mod handler;
pub mod lookup;
pub mod notify;
pub mod registration;
pub mod school;
pub mod school_server;
pub mod scoping;
pub mod storage;
pub mod tenant;
pub mod validation;

// Re-export commonly used types for convenience
pub use config::{HashingConfig, SchoolConfig};
pub use error::{SchoolError, SchoolResult, ValidationError};
pub use school_server::{SchoolServer, SchoolServerBuilder};
pub use scoping::{ListFilter, Page, ScopedRepository, TenantOwned};
pub use tenant::{Principal, PrincipalId, Role, Tenant, TenantContext, TenantId};

pub use handler::{OperationRequest, OperationResponse, SchoolOperationHandler};

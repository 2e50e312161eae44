//! Tenant-scoping engine.
//!
//! Two query types exist and they are deliberately different types:
//!
//! * [`ScopedRepository`] is bound to one tenant when it is built and
//!   injects/filters that tenant on every create, find, list, update and delete.
//! * [`UnscopedLookup`] reads principals by e-mail across tenants. Only the
//!   login, password-reset and e-mail-verification flows can build one, and
//!   every construction is audited.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use school_server::scoping::{ListFilter, ScopedRepository};
//! use school_server::school::Level;
//! use school_server::storage::InMemoryStorage;
//! use school_server::tenant::TenantContext;
//!
//! # async fn example(storage: InMemoryStorage, ctx: TenantContext) -> school_server::SchoolResult<()> {
//! let levels = ScopedRepository::<_, Level>::new(&storage, &ctx);
//! let primaria = levels.create(Level::new("Primaria", 2)).await?;
//! assert_eq!(primaria.meta.tenant_id, Some(ctx.tenant_id()));
//!
//! let page = levels.list(&ListFilter::new()).await?;
//! assert_eq!(page.total, 1);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod repository;
pub mod unscoped;

pub use entity::{RecordMeta, Reference, TenantOwned};
pub use repository::{ListFilter, Page, Scope, ScopedRepository};
pub use unscoped::{AUDIT_TARGET, BypassReason, UnscopedLookup};

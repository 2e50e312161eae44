//! The school server: storage plus collaborators, and the entry points to
//! every service.
//!
//! [`SchoolServer`] owns nothing request-specific. Services borrow it, and each
//! request brings its own [`TenantContext`], so one server value can be cloned
//! into as many concurrent tasks as needed.
//!
//! # Example Usage
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
//!         school_name: "Colegio Hidalgo".into(),
//!         email: "direccion@hidalgo.edu.mx".into(),
//!         password: "s3cret-pass".into(),
//!         director_name: None,
//!     })
//!     .await?;
//!
//! let ctx = server
//!     .authenticate(Some(&format!("Bearer {}", registered.token)))
//!     .await?;
//! assert_eq!(ctx.tenant_id(), registered.tenant.id);
//! # Ok(())
//! # }
//! ```

pub mod builder;

pub use builder::SchoolServerBuilder;

use crate::auth::{AccessTokenStore, Clock, CredentialHasher, LinearCredential};
use crate::config::SchoolConfig;
use crate::error::{SchoolError, SchoolResult};
use crate::guard::{RecordService, RelationService};
use crate::lookup::AccountService;
use crate::notify::Notifier;
use crate::registration::{OnboardingService, RegistrationService};
use crate::scoping::{ScopedRepository, TenantOwned};
use crate::storage::{StorageProvider, TransactionalStorage};
use crate::tenant::{PrincipalDirectory, TenantContext, TenantResolver, TokenTenantResolver};
use std::sync::Arc;

/// Multi-tenant school server.
#[derive(Clone)]
pub struct SchoolServer<S> {
    storage: S,
    config: Arc<SchoolConfig>,
    hasher: Arc<dyn CredentialHasher>,
    /// Hash of a random password, verified against when no account matches.
    decoy_hash: Arc<str>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S: TransactionalStorage> SchoolServer<S> {
    /// Server with default configuration and collaborators.
    pub fn new(storage: S) -> SchoolResult<Self> {
        SchoolServerBuilder::new(storage).build()
    }

    pub fn builder(storage: S) -> SchoolServerBuilder<S> {
        SchoolServerBuilder::new(storage)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &SchoolConfig {
        &self.config
    }

    pub fn hasher(&self) -> &dyn CredentialHasher {
        self.hasher.as_ref()
    }

    pub(crate) fn decoy_hash(&self) -> &str {
        &self.decoy_hash
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Access-token store over `storage`, which may be an open transaction.
    pub fn tokens<'t, T: StorageProvider>(&'t self, storage: &'t T) -> AccessTokenStore<'t, T> {
        AccessTokenStore::new(storage, self.clock(), self.config.access_token_ttl_minutes)
    }

    /// Establish the request's tenant context from an `Authorization` header.
    pub async fn authenticate(&self, authorization: Option<&str>) -> SchoolResult<TenantContext> {
        let header = authorization.ok_or(SchoolError::Unauthenticated)?;
        let credential = LinearCredential::from_authorization_header(header)?;
        self.resolver().resolve(credential).await
    }

    pub fn resolver(&self) -> TokenTenantResolver<'_, S> {
        TokenTenantResolver::new(self)
    }

    /// Scoped repository for `E` in the acting tenant.
    pub fn repository<E: TenantOwned>(&self, ctx: &TenantContext) -> ScopedRepository<'_, S, E> {
        ScopedRepository::new(&self.storage, ctx)
    }

    pub fn accounts(&self) -> AccountService<'_, S> {
        AccountService::new(self)
    }

    pub fn registration(&self) -> RegistrationService<'_, S> {
        RegistrationService::new(self)
    }

    pub fn onboarding(&self) -> OnboardingService<'_, S> {
        OnboardingService::new(self)
    }

    pub fn relations(&self) -> RelationService<'_, S> {
        RelationService::new(self)
    }

    /// Report cards, roll calls and attendance reports.
    pub fn records(&self) -> RecordService<'_, S> {
        RecordService::new(self)
    }

    pub fn directory(&self) -> PrincipalDirectory<'_, S> {
        PrincipalDirectory::new(self)
    }
}

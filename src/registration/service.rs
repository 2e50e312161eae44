//! School registration, full and express.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::lookup::verification_notice;
use crate::registration::{OnboardingProgress, slugify};
use crate::school_server::SchoolServer;
use crate::scoping::Scope;
use crate::storage::{StorageTransaction, TransactionalStorage};
use crate::tenant::directory::insert_principal;
use crate::tenant::record::TenantRecords;
use crate::tenant::{NewPrincipal, Principal, PrincipalView, Role, Tenant, TenantId, normalize_email};
use crate::validation;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// Slug and provisional-code collisions tolerated before express registration gives up.
const MAX_EXPRESS_ATTEMPTS: usize = 50;

/// Full registration input.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSchool {
    pub school_name: String,
    pub slug: String,
    /// Registration code (CCT).
    pub code: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    pub school_email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub director_name: String,
    pub director_email: String,
    pub password: String,
}

impl RegisterSchool {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "school_name", &self.school_name, 255);
        errors.check(
            !validation::is_slug(&self.slug),
            "slug",
            "may only contain lowercase letters, digits and dashes",
        );
        errors.check(
            !validation::is_cct(&self.code),
            "code",
            "must be 2 digits, 3 letters, 4 digits and 1 letter",
        );
        if let Some(tax_id) = &self.tax_id {
            errors.check(!validation::is_rfc(tax_id), "tax_id", "must be a valid RFC");
        }
        if let Some(postal_code) = &self.postal_code {
            errors.check(
                !validation::is_postal_code(postal_code),
                "postal_code",
                "must be 5 digits",
            );
        }
        errors.check(
            !validation::is_email(&self.school_email),
            "school_email",
            "must be a valid e-mail address",
        );
        validation::required(&mut errors, "director_name", &self.director_name, 255);
        errors.check(
            !validation::is_email(&self.director_email),
            "director_email",
            "must be a valid e-mail address",
        );
        validation::password(&mut errors, "password", &self.password);
        errors.into_result()
    }
}

/// Express registration input: just enough to open an account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterExpress {
    pub school_name: String,
    pub email: String,
    pub password: String,
    /// Defaults to the local part of `email`.
    #[serde(default)]
    pub director_name: Option<String>,
}

impl RegisterExpress {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "school_name", &self.school_name, 255);
        errors.check(
            !validation::is_email(&self.email),
            "email",
            "must be a valid e-mail address",
        );
        validation::password(&mut errors, "password", &self.password);
        if let Some(name) = &self.director_name {
            validation::required(&mut errors, "director_name", name, 255);
        }
        errors.into_result()
    }

    fn director_name(&self) -> String {
        match &self.director_name {
            Some(name) => name.trim().to_string(),
            None => normalize_email(&self.email)
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// A freshly registered school, its director and the director's token.
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    pub tenant: Tenant,
    pub director: PrincipalView,
    pub token: String,
}

/// Provisions tenants.
pub struct RegistrationService<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> RegistrationService<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }

    /// Register a school with its full data.
    pub async fn register(&self, input: RegisterSchool) -> SchoolResult<Registered> {
        input.validate()?;
        let now = self.server.clock().now();
        let tenant = Tenant {
            id: TenantId::new(),
            name: input.school_name.trim().to_string(),
            slug: input.slug.clone(),
            code: Some(input.code.clone()),
            tax_id: input.tax_id.clone(),
            email: Some(normalize_email(&input.school_email)),
            phone: input.phone.clone(),
            postal_code: input.postal_code.clone(),
            address: input.address.clone(),
            active: true,
            onboarding: OnboardingProgress::full(now),
            created_at: now,
            updated_at: now,
        };
        let director = NewPrincipal {
            name: input.director_name,
            email: input.director_email,
            password: input.password,
            role: Role::Director,
        };

        let password_hash = self.server.hasher().hash(&director.password)?;
        let tx = self.server.storage().begin().await?;
        TenantRecords::new(&tx).insert(&tenant).await?;
        self.finish(tx, tenant, director, password_hash).await
    }

    /// Register a school from a name, an e-mail and a password.
    ///
    /// The slug is derived from the name and suffixed `-1`, `-2`, ... until it
    /// is free. The registration code is provisional until onboarding replaces
    /// it.
    pub async fn register_express(&self, input: RegisterExpress) -> SchoolResult<Registered> {
        input.validate()?;
        let now = self.server.clock().now();
        let director = NewPrincipal {
            name: input.director_name(),
            email: input.email.clone(),
            password: input.password.clone(),
            role: Role::Director,
        };

        let password_hash = self.server.hasher().hash(&director.password)?;
        let tx = self.server.storage().begin().await?;
        let tenant = self.insert_express_tenant(&tx, &input, now).await?;
        self.finish(tx, tenant, director, password_hash).await
    }

    async fn insert_express_tenant(
        &self,
        tx: &S::Transaction,
        input: &RegisterExpress,
        now: DateTime<Utc>,
    ) -> SchoolResult<Tenant> {
        let base_slug = slugify(&input.school_name);
        let mut tenant = Tenant {
            id: TenantId::new(),
            name: input.school_name.trim().to_string(),
            slug: base_slug.clone(),
            code: Some(self.provisional_code()),
            tax_id: None,
            email: Some(normalize_email(&input.email)),
            phone: None,
            postal_code: None,
            address: None,
            active: true,
            onboarding: OnboardingProgress::express(now),
            created_at: now,
            updated_at: now,
        };

        let records = TenantRecords::new(tx);
        let mut suffix = 0;
        for _ in 0..MAX_EXPRESS_ATTEMPTS {
            match records.insert(&tenant).await {
                Ok(()) => return Ok(tenant),
                Err(SchoolError::Conflict { fields, .. }) if fields.iter().any(|f| f == "slug") => {
                    suffix += 1;
                    tenant.slug = format!("{}-{}", base_slug, suffix);
                }
                Err(SchoolError::Conflict { fields, .. }) if fields.iter().any(|f| f == "code") => {
                    warn!("Provisional code collision; drawing another");
                    tenant.code = Some(self.provisional_code());
                }
                Err(e) => return Err(e),
            }
        }

        error!(
            "Express registration for '{}' exhausted {} slug/code attempts",
            base_slug, MAX_EXPRESS_ATTEMPTS
        );
        Err(SchoolError::internal("could not allocate a school slug"))
    }

    /// Create the director and the first token, then commit and notify.
    async fn finish(
        &self,
        tx: S::Transaction,
        tenant: Tenant,
        director: NewPrincipal,
        password_hash: String,
    ) -> SchoolResult<Registered> {
        let scope = Scope::reentered(tenant.id, "registration");
        let director = insert_principal(
            &tx,
            &scope,
            Principal::from_new(director, password_hash),
        )
        .await?;
        let issued = self.server.tokens(&tx).issue(&director).await?;
        tx.commit().await?;

        info!(
            "Registered school '{}' ({}) as tenant {} with director {}",
            tenant.name, tenant.slug, tenant.id, director.meta.id
        );
        if let Some(notice) = verification_notice(self.server.config(), &director) {
            self.server.notifier().dispatch(notice);
        }

        Ok(Registered {
            tenant,
            director: director.view(),
            token: issued.plain_text,
        })
    }

    fn provisional_code(&self) -> String {
        format!(
            "{}{:06}",
            self.server.config().provisional_code_prefix,
            OsRng.next_u32() % 1_000_000
        )
    }
}

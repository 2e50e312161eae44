//! Onboarding steps for the acting principal's own school.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::registration::OnboardingStage;
use crate::school_server::SchoolServer;
use crate::storage::{StorageTransaction, TransactionalStorage};
use crate::tenant::record::TenantRecords;
use crate::tenant::{Tenant, TenantContext, TenantId, normalize_email};
use crate::validation;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

/// School data collected by the first onboarding step.
#[derive(Debug, Clone, Deserialize)]
pub struct SchoolData {
    pub code: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    pub school_email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl SchoolData {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        errors.check(
            !validation::is_cct(&self.code),
            "code",
            "must be 2 digits, 3 letters, 4 digits and 1 letter",
        );
        if let Some(tax_id) = &self.tax_id {
            errors.check(!validation::is_rfc(tax_id), "tax_id", "must be a valid RFC");
        }
        errors.check(
            !validation::is_email(&self.school_email),
            "school_email",
            "must be a valid e-mail address",
        );
        if let Some(phone) = &self.phone {
            errors.check(phone.chars().count() > 15, "phone", "may not be greater than 15 characters");
        }
        if let Some(postal_code) = &self.postal_code {
            errors.check(
                !validation::is_postal_code(postal_code),
                "postal_code",
                "must be 5 digits",
            );
        }
        errors.into_result()
    }
}

/// Snapshot of a tenant's onboarding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnboardingStatus {
    pub tenant_id: TenantId,
    pub stage: OnboardingStage,
    pub completed: bool,
    pub express: bool,
    pub registered_at: DateTime<Utc>,
    pub skipped: bool,
    pub provisional_code: bool,
}

impl OnboardingStatus {
    fn of(tenant: &Tenant, prefix: &str) -> Self {
        Self {
            tenant_id: tenant.id,
            stage: tenant.onboarding.stage,
            completed: tenant.onboarding.is_completed(),
            express: tenant.onboarding.express,
            registered_at: tenant.onboarding.registered_at,
            skipped: tenant.onboarding.skipped,
            provisional_code: tenant.has_provisional_code(prefix),
        }
    }
}

/// Drives the onboarding state machine of the context's tenant.
pub struct OnboardingService<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> OnboardingService<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }

    pub async fn status(&self, ctx: &TenantContext) -> SchoolResult<OnboardingStatus> {
        let tenant = own_tenant(self.server.storage(), ctx).await?;
        Ok(OnboardingStatus::of(
            &tenant,
            &self.server.config().provisional_code_prefix,
        ))
    }

    /// Replace the provisional registration code and contact data.
    ///
    /// The code must be unused by every other school.
    pub async fn complete_school_data(
        &self,
        ctx: &TenantContext,
        data: SchoolData,
    ) -> SchoolResult<Tenant> {
        data.validate()?;
        self.update(ctx, move |tenant, now| {
            tenant.onboarding.advance(OnboardingStage::SchoolDataCompleted, now)?;
            tenant.code = Some(data.code);
            tenant.tax_id = data.tax_id;
            tenant.email = Some(normalize_email(&data.school_email));
            tenant.phone = data.phone;
            tenant.postal_code = data.postal_code;
            Ok(())
        })
        .await
    }

    pub async fn complete_structure(&self, ctx: &TenantContext) -> SchoolResult<Tenant> {
        self.update(ctx, |tenant, now| {
            Ok(tenant
                .onboarding
                .advance(OnboardingStage::StructureCompleted, now)?)
        })
        .await
    }

    pub async fn complete(&self, ctx: &TenantContext) -> SchoolResult<Tenant> {
        self.update(ctx, |tenant, now| {
            Ok(tenant
                .onboarding
                .advance(OnboardingStage::OnboardingCompleted, now)?)
        })
        .await
    }

    /// Postpone onboarding. The stage does not change.
    pub async fn skip(&self, ctx: &TenantContext) -> SchoolResult<Tenant> {
        self.update(ctx, |tenant, now| {
            tenant.onboarding.skip(now);
            Ok(())
        })
        .await
    }

    async fn update<F>(&self, ctx: &TenantContext, change: F) -> SchoolResult<Tenant>
    where
        F: FnOnce(&mut Tenant, DateTime<Utc>) -> SchoolResult<()> + Send,
    {
        let now = self.server.clock().now();
        let tx = self.server.storage().begin().await?;

        let mut tenant = own_tenant(&tx, ctx).await?;
        let before = tenant.onboarding.stage;
        change(&mut tenant, now)?;
        tenant.updated_at = now;
        TenantRecords::new(&tx).replace(&tenant).await?;
        tx.commit().await?;

        info!(
            "Tenant {} onboarding {} -> {} (request: '{}')",
            tenant.id,
            before,
            tenant.onboarding.stage,
            ctx.request_id()
        );
        Ok(tenant)
    }
}

async fn own_tenant<T: crate::storage::StorageProvider>(
    storage: &T,
    ctx: &TenantContext,
) -> SchoolResult<Tenant> {
    match TenantRecords::new(storage).get(ctx.tenant_id()).await? {
        Some(tenant) => Ok(tenant),
        None => {
            error!(
                "Principal {} is scoped to tenant {} which has no record",
                ctx.principal_id(),
                ctx.tenant_id()
            );
            Err(SchoolError::TenantMissing {
                principal_id: ctx.principal_id().to_string(),
            })
        }
    }
}

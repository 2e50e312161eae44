//! Students and their parents or guardians.

use crate::error::ValidationError;
use crate::school::Group;
use crate::scoping::{RecordMeta, Reference, TenantOwned};
use crate::storage::UniqueConstraint;
use crate::tenant::normalize_email;
use crate::validation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student, optionally placed in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub first_name: String,
    pub last_name: String,
    /// Population registry code; unique per tenant when present.
    #[serde(default)]
    pub curp: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Student {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            curp: None,
            birth_date: None,
            group_id: None,
            active: true,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl TenantOwned for Student {
    const RESOURCE_TYPE: &'static str = "Student";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("student_curp", &["curp"])];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        self.group_id
            .map(|id| Reference::to::<Group>("group_id", id))
            .into_iter()
            .collect()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "first_name", &self.first_name, 100);
        validation::required(&mut errors, "last_name", &self.last_name, 100);
        if let Some(curp) = &self.curp {
            errors.check(!validation::is_curp(curp), "curp", "must be a valid CURP");
        }
        errors.into_result()
    }
}

/// A parent or guardian. E-mail is unique per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Parent {
    pub fn new(full_name: impl Into<String>, email: &str) -> Self {
        Self {
            meta: RecordMeta::new(),
            full_name: full_name.into(),
            email: normalize_email(email),
            phone: None,
            tax_id: None,
            active: true,
        }
    }
}

impl TenantOwned for Parent {
    const RESOURCE_TYPE: &'static str = "Parent";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("parent_email", &["email"])];

    record_meta!();

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "full_name", &self.full_name, 255);
        errors.check(!validation::is_email(&self.email), "email", "must be a valid e-mail address");
        if let Some(tax_id) = &self.tax_id {
            errors.check(!validation::is_rfc(tax_id), "tax_id", "must be a valid RFC");
        }
        errors.into_result()
    }
}

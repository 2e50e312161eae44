//! Billing concepts. Charging and payment collection live elsewhere.

use crate::error::ValidationError;
use crate::school::{Grade, Level};
use crate::scoping::{RecordMeta, Reference, TenantOwned};
use crate::validation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    Unico,
    Mensual,
    Bimestral,
    Semestral,
    Anual,
}

/// Something the school charges for, optionally restricted to a level or grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeConcept {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price_cents: i64,
    pub periodicity: Periodicity,
    #[serde(default)]
    pub level_id: Option<Uuid>,
    #[serde(default)]
    pub grade_id: Option<Uuid>,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl ChargeConcept {
    pub fn new(name: impl Into<String>, base_price_cents: i64, periodicity: Periodicity) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.into(),
            description: None,
            base_price_cents,
            periodicity,
            level_id: None,
            grade_id: None,
            active: true,
        }
    }
}

impl TenantOwned for ChargeConcept {
    const RESOURCE_TYPE: &'static str = "ChargeConcept";

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        if let Some(level_id) = self.level_id {
            refs.push(Reference::to::<Level>("level_id", level_id));
        }
        if let Some(grade_id) = self.grade_id {
            refs.push(Reference::to::<Grade>("grade_id", grade_id));
        }
        refs
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 100);
        errors.check(self.base_price_cents < 0, "base_price_cents", "may not be negative");
        errors.into_result()
    }
}

//! School cycles and their evaluation periods.

use crate::error::ValidationError;
use crate::scoping::{RecordMeta, Reference, TenantOwned};
use crate::storage::UniqueConstraint;
use crate::validation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A school year, e.g. "2025-2026".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Cycle {
    pub fn new(name: impl Into<String>, starts_on: NaiveDate, ends_on: NaiveDate) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.into(),
            starts_on,
            ends_on,
            active: true,
        }
    }
}

impl TenantOwned for Cycle {
    const RESOURCE_TYPE: &'static str = "Cycle";
    const UNIQUE: &'static [UniqueConstraint] = &[UniqueConstraint::new("cycle_name", &["name"])];

    record_meta!();

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 50);
        errors.check(
            self.ends_on <= self.starts_on,
            "ends_on",
            "must be after the start date",
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Bimestre,
    Trimestre,
    Cuatrimestre,
    Semestre,
    Anual,
}

/// An evaluation period inside a cycle. Numbers are unique per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub cycle_id: Uuid,
    pub name: String,
    pub number: u32,
    pub kind: PeriodKind,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl Period {
    pub fn new(
        cycle_id: Uuid,
        number: u32,
        kind: PeriodKind,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Self {
        Self {
            meta: RecordMeta::new(),
            cycle_id,
            name: format!("Periodo {}", number),
            number,
            kind,
            starts_on,
            ends_on,
        }
    }
}

impl TenantOwned for Period {
    const RESOURCE_TYPE: &'static str = "Period";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("period_number", &["cycle_id", "number"])];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to::<Cycle>("cycle_id", self.cycle_id)]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 50);
        errors.check(self.number == 0, "number", "must be at least 1");
        errors.check(
            self.ends_on <= self.starts_on,
            "ends_on",
            "must be after the start date",
        );
        errors.into_result()
    }
}

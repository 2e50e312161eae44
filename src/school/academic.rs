//! Academic structure: levels, grades, groups and subjects.

use crate::error::ValidationError;
use crate::scoping::{RecordMeta, Reference, TenantOwned};
use crate::storage::UniqueConstraint;
use crate::tenant::Role;
use crate::validation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Level names a school may offer, compared case-insensitively.
pub const LEVEL_NAMES: [&str; 4] = ["preescolar", "primaria", "secundaria", "preparatoria"];

const DEFAULT_GROUP_CAPACITY: u32 = 30;

fn default_capacity() -> u32 {
    DEFAULT_GROUP_CAPACITY
}

/// An educational level offered by the school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Level {
    pub fn new(name: impl Into<String>, order: u32) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.into(),
            order,
            active: true,
        }
    }
}

impl TenantOwned for Level {
    const RESOURCE_TYPE: &'static str = "Level";
    const UNIQUE: &'static [UniqueConstraint] = &[UniqueConstraint::new("level_name", &["name"])];

    record_meta!();

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        let known = LEVEL_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(self.name.trim()));
        errors.check(
            !known,
            "name",
            "must be one of preescolar, primaria, secundaria, preparatoria",
        );
        errors.into_result()
    }
}

/// A grade within a level, e.g. "3°" of primaria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub level_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Grade {
    pub fn new(level_id: Uuid, name: impl Into<String>, order: u32) -> Self {
        Self {
            meta: RecordMeta::new(),
            level_id,
            name: name.into(),
            order,
            active: true,
        }
    }
}

impl TenantOwned for Grade {
    const RESOURCE_TYPE: &'static str = "Grade";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("grade_name", &["level_id", "name"])];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to::<Level>("level_id", self.level_id)]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 50);
        errors.into_result()
    }
}

/// A class group inside a grade, optionally with a homeroom teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub grade_id: Uuid,
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Group {
    pub fn new(grade_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(),
            grade_id,
            name: name.into(),
            capacity: DEFAULT_GROUP_CAPACITY,
            teacher_id: None,
            active: true,
        }
    }
}

impl TenantOwned for Group {
    const RESOURCE_TYPE: &'static str = "Group";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("group_name", &["grade_id", "name"])];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![Reference::to::<Grade>("grade_id", self.grade_id)];
        if let Some(teacher_id) = self.teacher_id {
            refs.push(Reference::principal_with_role(
                "teacher_id",
                teacher_id,
                Role::Teacher,
            ));
        }
        refs
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 50);
        errors.check(
            self.capacity == 0 || self.capacity > 100,
            "capacity",
            "must be between 1 and 100",
        );
        errors.into_result()
    }
}

/// A subject taught in the school. Names are unique per tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "validation::default_true")]
    pub active: bool,
}

impl Subject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(),
            name: name.into(),
            key: None,
            description: None,
            color: None,
            active: true,
        }
    }
}

impl TenantOwned for Subject {
    const RESOURCE_TYPE: &'static str = "Subject";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("subject_name", &["name"])];

    record_meta!();

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        validation::required(&mut errors, "name", &self.name, 100);
        if let Some(color) = &self.color {
            errors.check(
                !validation::is_color(color),
                "color",
                "must be a hex color like #1A2B3C",
            );
        }
        if let Some(key) = &self.key {
            errors.check(key.chars().count() > 20, "key", "may not be greater than 20 characters");
        }
        errors.into_result()
    }
}

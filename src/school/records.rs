//! Scores and attendance.

use crate::error::ValidationError;
use crate::school::{Group, Period, Student, Subject};
use crate::scoping::{RecordMeta, Reference, TenantOwned};
use crate::storage::UniqueConstraint;
use crate::tenant::Role;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A student's score in one subject for one period, on a 0 to 10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub period_id: Uuid,
    pub score: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
}

impl GradeRecord {
    pub fn new(student_id: Uuid, subject_id: Uuid, period_id: Uuid, score: f64) -> Self {
        Self {
            meta: RecordMeta::new(),
            student_id,
            subject_id,
            period_id,
            score,
            notes: None,
            teacher_id: None,
        }
    }
}

impl TenantOwned for GradeRecord {
    const RESOURCE_TYPE: &'static str = "GradeRecord";
    const UNIQUE: &'static [UniqueConstraint] = &[UniqueConstraint::new(
        "grade_record_period",
        &["student_id", "subject_id", "period_id"],
    )];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        let mut refs = vec![
            Reference::to::<Student>("student_id", self.student_id),
            Reference::to::<Subject>("subject_id", self.subject_id),
            Reference::to::<Period>("period_id", self.period_id),
        ];
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
        errors.check(
            !self.score.is_finite() || !(0.0..=10.0).contains(&self.score),
            "score",
            "must be between 0 and 10",
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Presente,
    Falta,
    Retardo,
    Justificada,
}

/// One student's attendance on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendance {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub student_id: Uuid,
    pub group_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Attendance {
    pub fn new(student_id: Uuid, group_id: Uuid, date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            meta: RecordMeta::new(),
            student_id,
            group_id,
            date,
            status,
            notes: None,
        }
    }
}

impl TenantOwned for Attendance {
    const RESOURCE_TYPE: &'static str = "Attendance";
    const UNIQUE: &'static [UniqueConstraint] =
        &[UniqueConstraint::new("attendance_day", &["student_id", "date"])];

    record_meta!();

    fn references(&self) -> Vec<Reference> {
        vec![
            Reference::to::<Student>("student_id", self.student_id),
            Reference::to::<Group>("group_id", self.group_id),
        ]
    }
}

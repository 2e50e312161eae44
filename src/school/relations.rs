//! Join records between two tenant-owned entities.
//!
//! A join record has no tenant of its own. It is stored in the partition of
//! the tenant that owns both endpoints and is only ever written after both
//! endpoints were re-resolved in that tenant.

use crate::storage::StorageKey;
use crate::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub(crate) const STUDENT_PARENT: &str = "StudentParent";
pub(crate) const SUBJECT_ASSIGNMENT: &str = "SubjectAssignment";

pub const MAX_WEEKLY_HOURS: u8 = 50;

/// Links a student to a parent or guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentParent {
    pub student_id: Uuid,
    pub parent_id: Uuid,
    /// Free text such as "madre", "padre" or "tutor".
    pub kinship: String,
    #[serde(default)]
    pub pays_tuition: bool,
    #[serde(default)]
    pub emergency_contact: bool,
    pub created_at: DateTime<Utc>,
}

impl StudentParent {
    pub(crate) fn key(tenant_id: TenantId, student_id: Uuid, parent_id: Uuid) -> StorageKey {
        StorageKey::new(
            tenant_id.partition(),
            STUDENT_PARENT,
            format!("{}:{}", student_id, parent_id),
        )
    }
}

/// Payload for attaching a parent to a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_id: Uuid,
    pub kinship: String,
    #[serde(default)]
    pub pays_tuition: bool,
    #[serde(default)]
    pub emergency_contact: bool,
}

impl ParentLink {
    pub fn new(parent_id: Uuid, kinship: impl Into<String>) -> Self {
        Self {
            parent_id,
            kinship: kinship.into(),
            pays_tuition: false,
            emergency_contact: false,
        }
    }
}

/// Assigns a subject to a group, optionally with the teacher who gives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAssignment {
    pub subject_id: Uuid,
    pub group_id: Uuid,
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    pub weekly_hours: u8,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl SubjectAssignment {
    pub(crate) fn key(tenant_id: TenantId, subject_id: Uuid, group_id: Uuid) -> StorageKey {
        StorageKey::new(
            tenant_id.partition(),
            SUBJECT_ASSIGNMENT,
            format!("{}:{}", subject_id, group_id),
        )
    }
}

/// Payload for assigning a subject to a group or changing an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTerms {
    #[serde(default)]
    pub teacher_id: Option<Uuid>,
    pub weekly_hours: u8,
    #[serde(default = "crate::validation::default_true")]
    pub active: bool,
}

impl AssignmentTerms {
    pub fn new(weekly_hours: u8) -> Self {
        Self {
            teacher_id: None,
            weekly_hours,
            active: true,
        }
    }

    pub fn with_teacher(mut self, teacher_id: Uuid) -> Self {
        self.teacher_id = Some(teacher_id);
        self
    }
}

//! Relation writes: student to parent, subject to group, teacher to group.
//!
//! Every operation runs in one transaction. Both endpoints are re-resolved on
//! that transaction through the scoped repository, checked with
//! [`assert_same_tenant`], and only then is the join record written.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::guard::{assert_same_tenant, resolve_endpoint};
use crate::school::relations::{MAX_WEEKLY_HOURS, STUDENT_PARENT, SUBJECT_ASSIGNMENT};
use crate::school::{
    AssignmentTerms, Group, Parent, ParentLink, Student, StudentParent, Subject, SubjectAssignment,
};
use crate::school_server::SchoolServer;
use crate::scoping::{Scope, ScopedRepository};
use crate::storage::{
    StorageError, StorageKey, StorageProvider, StorageTransaction, TransactionalStorage,
};
use crate::tenant::{Principal, Role, TenantContext};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// A parent linked to a student, with the link's terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentGuardian {
    pub link: StudentParent,
    pub parent: Parent,
}

/// A subject given to a group, with the assignment's terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSubject {
    pub assignment: SubjectAssignment,
    pub subject: Subject,
}

/// A newly created student and the parents attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentEnrollment {
    pub student: Student,
    pub parents: Vec<StudentParent>,
}

/// Writes and reads join records for the acting tenant.
pub struct RelationService<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> RelationService<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }

    /// Attach a parent to a student.
    pub async fn attach_parent(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
        link: ParentLink,
    ) -> SchoolResult<StudentParent> {
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;
        let record = attach(&tx, &scope, student_id, link, self.server.clock().now()).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Remove a parent from a student.
    pub async fn detach_parent(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
        parent_id: Uuid,
    ) -> SchoolResult<()> {
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;
        let student: Student = resolve_endpoint(&tx, &scope, "student_id", student_id).await?;
        let parent: Parent = resolve_endpoint(&tx, &scope, "parent_id", parent_id).await?;
        let tenant_id = assert_same_tenant(&student, &parent, "parent_id")?;

        if !tx
            .delete(StudentParent::key(tenant_id, student_id, parent_id))
            .await?
        {
            return Err(SchoolError::not_found(STUDENT_PARENT, parent_id));
        }
        tx.commit().await?;

        info!(
            "Parent {} detached from student {} in tenant {}",
            parent_id, student_id, tenant_id
        );
        Ok(())
    }

    /// Parents of a student. Tombstoned parents are left out.
    pub async fn parents_of(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
    ) -> SchoolResult<Vec<StudentGuardian>> {
        let storage = self.server.storage();
        let scope = Scope::from(ctx);
        ScopedRepository::<S, Student>::with_scope(storage, scope.clone())
            .find(student_id)
            .await?;

        let parents = ScopedRepository::<S, Parent>::with_scope(storage, scope.clone());
        let mut guardians = Vec::new();
        for link in links::<_, StudentParent>(storage, &scope, STUDENT_PARENT, "student_id", student_id)
            .await?
        {
            match parents.find(link.parent_id).await {
                Ok(parent) => guardians.push(StudentGuardian { link, parent }),
                Err(SchoolError::NotFound { .. }) => {
                    debug!("Skipping link to unavailable parent {}", link.parent_id)
                }
                Err(e) => return Err(e),
            }
        }
        guardians.sort_by(|a, b| a.link.created_at.cmp(&b.link.created_at));
        Ok(guardians)
    }

    /// Create a student together with its parent links, all or nothing.
    pub async fn enroll_student(
        &self,
        ctx: &TenantContext,
        student: Student,
        parents: Vec<ParentLink>,
    ) -> SchoolResult<StudentEnrollment> {
        let scope = Scope::from(ctx);
        let now = self.server.clock().now();
        let tx = self.server.storage().begin().await?;

        let student = ScopedRepository::<_, Student>::with_scope(&tx, scope.clone())
            .create(student)
            .await?;
        let mut links = Vec::with_capacity(parents.len());
        for link in parents {
            links.push(attach(&tx, &scope, student.meta.id, link, now).await?);
        }
        tx.commit().await?;

        info!(
            "Student {} enrolled with {} parent(s) in tenant {}",
            student.meta.id,
            links.len(),
            ctx.tenant_id()
        );
        Ok(StudentEnrollment {
            student,
            parents: links,
        })
    }

    /// Replace every parent link of a student.
    pub async fn replace_parents(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
        parents: Vec<ParentLink>,
    ) -> SchoolResult<Vec<StudentParent>> {
        let scope = Scope::from(ctx);
        let now = self.server.clock().now();
        let tx = self.server.storage().begin().await?;

        let student: Student = resolve_endpoint(&tx, &scope, "student_id", student_id).await?;
        let prefix = StorageKey::prefix(scope.tenant_id().partition(), STUDENT_PARENT);
        for (key, _) in tx
            .find_by_attribute(prefix, "student_id", &student.meta.id.to_string())
            .await?
        {
            tx.delete(key).await?;
        }

        let mut links = Vec::with_capacity(parents.len());
        for link in parents {
            links.push(attach(&tx, &scope, student_id, link, now).await?);
        }
        tx.commit().await?;
        Ok(links)
    }

    /// Assign a subject to a group.
    pub async fn assign_subject(
        &self,
        ctx: &TenantContext,
        subject_id: Uuid,
        group_id: Uuid,
        terms: AssignmentTerms,
    ) -> SchoolResult<SubjectAssignment> {
        validate_terms(&terms)?;
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;

        let tenant_id = resolve_assignment(&tx, &scope, subject_id, group_id, &terms).await?;
        let assignment = SubjectAssignment {
            subject_id,
            group_id,
            teacher_id: terms.teacher_id,
            weekly_hours: terms.weekly_hours,
            active: terms.active,
            created_at: self.server.clock().now(),
        };
        tx.insert(
            SubjectAssignment::key(tenant_id, subject_id, group_id),
            serde_json::to_value(&assignment)?,
            &[],
        )
        .await
        .map_err(|e| pair_conflict(e, SUBJECT_ASSIGNMENT, &["subject_id", "group_id"]))?;
        tx.commit().await?;

        info!(
            "Subject {} assigned to group {} in tenant {}",
            subject_id, group_id, tenant_id
        );
        Ok(assignment)
    }

    /// Change the teacher, hours or status of an existing assignment.
    pub async fn update_assignment(
        &self,
        ctx: &TenantContext,
        subject_id: Uuid,
        group_id: Uuid,
        terms: AssignmentTerms,
    ) -> SchoolResult<SubjectAssignment> {
        validate_terms(&terms)?;
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;

        let tenant_id = resolve_assignment(&tx, &scope, subject_id, group_id, &terms).await?;
        let key = SubjectAssignment::key(tenant_id, subject_id, group_id);
        let Some(current) = tx.get(key.clone()).await? else {
            return Err(SchoolError::not_found(SUBJECT_ASSIGNMENT, subject_id));
        };
        let mut assignment: SubjectAssignment = serde_json::from_value(current)?;
        assignment.teacher_id = terms.teacher_id;
        assignment.weekly_hours = terms.weekly_hours;
        assignment.active = terms.active;

        tx.replace(key, serde_json::to_value(&assignment)?, &[]).await?;
        tx.commit().await?;
        Ok(assignment)
    }

    /// Remove a subject from a group.
    pub async fn unassign_subject(
        &self,
        ctx: &TenantContext,
        subject_id: Uuid,
        group_id: Uuid,
    ) -> SchoolResult<()> {
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;
        let subject: Subject = resolve_endpoint(&tx, &scope, "subject_id", subject_id).await?;
        let group: Group = resolve_endpoint(&tx, &scope, "group_id", group_id).await?;
        let tenant_id = assert_same_tenant(&subject, &group, "group_id")?;

        if !tx
            .delete(SubjectAssignment::key(tenant_id, subject_id, group_id))
            .await?
        {
            return Err(SchoolError::not_found(SUBJECT_ASSIGNMENT, subject_id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// Subjects assigned to a group. Tombstoned subjects are left out.
    pub async fn subjects_of_group(
        &self,
        ctx: &TenantContext,
        group_id: Uuid,
    ) -> SchoolResult<Vec<GroupSubject>> {
        let storage = self.server.storage();
        let scope = Scope::from(ctx);
        ScopedRepository::<S, Group>::with_scope(storage, scope.clone())
            .find(group_id)
            .await?;

        let subjects = ScopedRepository::<S, Subject>::with_scope(storage, scope.clone());
        let mut given = Vec::new();
        for assignment in
            links::<_, SubjectAssignment>(storage, &scope, SUBJECT_ASSIGNMENT, "group_id", group_id)
                .await?
        {
            match subjects.find(assignment.subject_id).await {
                Ok(subject) => given.push(GroupSubject {
                    assignment,
                    subject,
                }),
                Err(SchoolError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        given.sort_by(|a, b| a.subject.name.cmp(&b.subject.name));
        Ok(given)
    }

    /// Set or clear the homeroom teacher of a group.
    pub async fn assign_teacher(
        &self,
        ctx: &TenantContext,
        group_id: Uuid,
        teacher_id: Option<Uuid>,
    ) -> SchoolResult<Group> {
        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;

        let group: Group = resolve_endpoint(&tx, &scope, "group_id", group_id).await?;
        if let Some(teacher_id) = teacher_id {
            let teacher = resolve_teacher(&tx, &scope, teacher_id).await?;
            assert_same_tenant(&group, &teacher, "teacher_id")?;
        }

        let group = ScopedRepository::<_, Group>::with_scope(&tx, scope)
            .update_with(group.meta.id, move |group| {
                group.teacher_id = teacher_id;
                Ok(())
            })
            .await?;
        tx.commit().await?;
        Ok(group)
    }
}

async fn attach<T: StorageProvider>(
    storage: &T,
    scope: &Scope,
    student_id: Uuid,
    link: ParentLink,
    now: DateTime<Utc>,
) -> SchoolResult<StudentParent> {
    let mut errors = ValidationError::new();
    crate::validation::required(&mut errors, "kinship", &link.kinship, 50);
    errors.into_result()?;

    let student: Student = resolve_endpoint(storage, scope, "student_id", student_id).await?;
    let parent: Parent = resolve_endpoint(storage, scope, "parent_id", link.parent_id).await?;
    let tenant_id = assert_same_tenant(&student, &parent, "parent_id")?;

    let record = StudentParent {
        student_id,
        parent_id: link.parent_id,
        kinship: link.kinship.trim().to_string(),
        pays_tuition: link.pays_tuition,
        emergency_contact: link.emergency_contact,
        created_at: now,
    };
    storage
        .insert(
            StudentParent::key(tenant_id, student_id, link.parent_id),
            serde_json::to_value(&record)?,
            &[],
        )
        .await
        .map_err(|e| pair_conflict(e, STUDENT_PARENT, &["student_id", "parent_id"]))?;

    debug!("Parent {} attached to student {}", link.parent_id, student_id);
    Ok(record)
}

async fn resolve_assignment<T: StorageProvider>(
    storage: &T,
    scope: &Scope,
    subject_id: Uuid,
    group_id: Uuid,
    terms: &AssignmentTerms,
) -> SchoolResult<crate::tenant::TenantId> {
    let subject: Subject = resolve_endpoint(storage, scope, "subject_id", subject_id).await?;
    let group: Group = resolve_endpoint(storage, scope, "group_id", group_id).await?;
    let tenant_id = assert_same_tenant(&subject, &group, "group_id")?;
    if let Some(teacher_id) = terms.teacher_id {
        let teacher = resolve_teacher(storage, scope, teacher_id).await?;
        assert_same_tenant(&group, &teacher, "teacher_id")?;
    }
    Ok(tenant_id)
}

async fn resolve_teacher<T: StorageProvider>(
    storage: &T,
    scope: &Scope,
    teacher_id: Uuid,
) -> SchoolResult<Principal> {
    let teacher: Principal = resolve_endpoint(storage, scope, "teacher_id", teacher_id).await?;
    if teacher.role != Role::Teacher || !teacher.active {
        warn!("Principal {} is not an active teacher", teacher_id);
        return Err(ValidationError::single("teacher_id", "must be an active teacher").into());
    }
    Ok(teacher)
}

/// Join records in scope whose `attribute` equals `id`.
async fn links<T: StorageProvider, R: DeserializeOwned>(
    storage: &T,
    scope: &Scope,
    resource_type: &str,
    attribute: &str,
    id: Uuid,
) -> SchoolResult<Vec<R>> {
    let prefix = StorageKey::prefix(scope.tenant_id().partition(), resource_type);
    let mut records = Vec::new();
    for (key, value) in storage
        .find_by_attribute(prefix, attribute, &id.to_string())
        .await?
    {
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Failed to deserialize {}: {}", key, e),
        }
    }
    Ok(records)
}

fn validate_terms(terms: &AssignmentTerms) -> SchoolResult<()> {
    let mut errors = ValidationError::new();
    errors.check(
        terms.weekly_hours == 0 || terms.weekly_hours > MAX_WEEKLY_HOURS,
        "weekly_hours",
        "must be between 1 and 50",
    );
    Ok(errors.into_result()?)
}

fn pair_conflict(err: StorageError, resource_type: &str, fields: &[&str]) -> SchoolError {
    match err {
        StorageError::ResourceAlreadyExists { .. } => SchoolError::conflict(resource_type, fields),
        other => other.into(),
    }
}

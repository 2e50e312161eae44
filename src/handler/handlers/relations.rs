//! Relation handlers: enrollment, parent links, subject assignments and
//! homeroom teachers.

use crate::error::{SchoolError, SchoolResult};
use crate::handler::core::{
    Operation, OperationResponse, SchoolOperationHandler, created, no_content, ok, parse_body,
    parse_id, parse_reference, to_json,
};
use crate::school::{AssignmentTerms, ParentLink, Student};
use crate::storage::TransactionalStorage;
use crate::tenant::TenantContext;
use serde::Deserialize;

#[derive(Deserialize)]
struct Enrollment {
    student: Student,
    #[serde(default)]
    parents: Vec<ParentLink>,
}

#[derive(Deserialize)]
struct ParentLinks {
    parents: Vec<ParentLink>,
}

pub async fn handle<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    operation: Operation,
) -> SchoolResult<OperationResponse> {
    let relations = handler.server().relations();
    let request_id = ctx.request_id();

    match operation {
        Operation::EnrollStudent(data) => {
            let input: Enrollment = parse_body(data)?;
            let enrollment = relations
                .enroll_student(ctx, input.student, input.parents)
                .await?;
            Ok(created(to_json(&enrollment)?, request_id))
        }
        Operation::AttachParent { student_id, data } => {
            let link: ParentLink = parse_body(data)?;
            let student_id = parse_reference("student_id", &student_id)?;
            let record = relations.attach_parent(ctx, student_id, link).await?;
            Ok(created(to_json(&record)?, request_id))
        }
        Operation::DetachParent {
            student_id,
            parent_id,
        } => {
            relations
                .detach_parent(
                    ctx,
                    parse_reference("student_id", &student_id)?,
                    parse_reference("parent_id", &parent_id)?,
                )
                .await?;
            Ok(no_content(request_id))
        }
        Operation::ReplaceParents { student_id, data } => {
            let input: ParentLinks = parse_body(data)?;
            let links = relations
                .replace_parents(
                    ctx,
                    parse_reference("student_id", &student_id)?,
                    input.parents,
                )
                .await?;
            Ok(ok(to_json(&links)?, request_id))
        }
        Operation::ListParents { student_id } => {
            let guardians = relations
                .parents_of(ctx, parse_id("Student", &student_id)?)
                .await?;
            Ok(ok(to_json(&guardians)?, request_id))
        }
        Operation::AssignSubject {
            group_id,
            subject_id,
            data,
        } => {
            let terms: AssignmentTerms = parse_body(data)?;
            let assignment = relations
                .assign_subject(
                    ctx,
                    parse_reference("subject_id", &subject_id)?,
                    parse_reference("group_id", &group_id)?,
                    terms,
                )
                .await?;
            Ok(created(to_json(&assignment)?, request_id))
        }
        Operation::UpdateAssignment {
            group_id,
            subject_id,
            data,
        } => {
            let terms: AssignmentTerms = parse_body(data)?;
            let assignment = relations
                .update_assignment(
                    ctx,
                    parse_reference("subject_id", &subject_id)?,
                    parse_reference("group_id", &group_id)?,
                    terms,
                )
                .await?;
            Ok(ok(to_json(&assignment)?, request_id))
        }
        Operation::UnassignSubject {
            group_id,
            subject_id,
        } => {
            relations
                .unassign_subject(
                    ctx,
                    parse_reference("subject_id", &subject_id)?,
                    parse_reference("group_id", &group_id)?,
                )
                .await?;
            Ok(no_content(request_id))
        }
        Operation::ListGroupSubjects { group_id } => {
            let subjects = relations
                .subjects_of_group(ctx, parse_id("Group", &group_id)?)
                .await?;
            Ok(ok(to_json(&subjects)?, request_id))
        }
        Operation::AssignTeacher {
            group_id,
            teacher_id,
        } => {
            let teacher_id = teacher_id
                .map(|id| parse_reference("teacher_id", &id))
                .transpose()?;
            let group = relations
                .assign_teacher(ctx, parse_reference("group_id", &group_id)?, teacher_id)
                .await?;
            Ok(ok(to_json(&group)?, request_id))
        }
        _ => Err(SchoolError::internal("not a relation operation")),
    }
}

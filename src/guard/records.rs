//! Record reads and bulk writes: report cards, group roll calls and attendance
//! reports.
//!
//! Reads anchor on a student of the acting tenant; an unknown or foreign
//! anchor is not found. The roll call re-resolves every listed student inside
//! the tenant before anything is written, and writes all or nothing.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::guard::resolve_endpoint;
use crate::school::{Attendance, AttendanceStatus, GradeRecord, Group, Period, Student, Subject};
use crate::school_server::SchoolServer;
use crate::scoping::{ListFilter, Scope, ScopedRepository};
use crate::storage::{StorageTransaction, TransactionalStorage};
use crate::tenant::TenantContext;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A graded subject on a report card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCardLine {
    pub record: GradeRecord,
    pub subject: Subject,
}

/// A student's grades for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCard {
    pub student: Student,
    pub period: Period,
    pub lines: Vec<ReportCardLine>,
    /// Mean score over `lines`; `None` when nothing was graded.
    pub average: Option<f64>,
}

/// One student's mark in a group roll call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Attendance counts for one student over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceReport {
    pub student_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    /// Share of days present, in percent with two decimals. Zero without records.
    pub attendance_percentage: f64,
}

pub struct RecordService<'a, S> {
    server: &'a SchoolServer<S>,
}

impl<'a, S: TransactionalStorage> RecordService<'a, S> {
    pub fn new(server: &'a SchoolServer<S>) -> Self {
        Self { server }
    }

    /// Grades of a student for one period, one line per subject.
    ///
    /// Records whose subject was removed are left out, and do not count
    /// towards the average.
    pub async fn report_card(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
        period_id: Uuid,
    ) -> SchoolResult<ReportCard> {
        let storage = self.server.storage();
        let scope = Scope::from(ctx);
        let student = ScopedRepository::<S, Student>::with_scope(storage, scope.clone())
            .find(student_id)
            .await?;
        let period = ScopedRepository::<S, Period>::with_scope(storage, scope.clone())
            .find(period_id)
            .await?;

        let records = ScopedRepository::<S, GradeRecord>::with_scope(storage, scope.clone())
            .list(&ListFilter::new().where_eq("student_id", student_id))
            .await?
            .items;
        let subjects = ScopedRepository::<S, Subject>::with_scope(storage, scope);

        let mut lines = Vec::new();
        for record in records.into_iter().filter(|r| r.period_id == period_id) {
            match subjects.find(record.subject_id).await {
                Ok(subject) => lines.push(ReportCardLine { record, subject }),
                Err(SchoolError::NotFound { .. }) => {
                    debug!("Skipping grade {} of unavailable subject", record.meta.id)
                }
                Err(e) => return Err(e),
            }
        }
        lines.sort_by(|a, b| a.subject.name.cmp(&b.subject.name));

        let average = (!lines.is_empty()).then(|| {
            lines.iter().map(|line| line.record.score).sum::<f64>() / lines.len() as f64
        });

        Ok(ReportCard {
            student,
            period,
            lines,
            average,
        })
    }

    /// Record a roll call for `group_id` on `date`.
    ///
    /// Each entry replaces the student's attendance for that day if one
    /// exists, and creates it otherwise. A student that does not resolve in
    /// the acting tenant rejects the whole call, naming its position.
    pub async fn record_group_attendance(
        &self,
        ctx: &TenantContext,
        group_id: Uuid,
        date: NaiveDate,
        entries: Vec<AttendanceEntry>,
    ) -> SchoolResult<Vec<Attendance>> {
        if entries.is_empty() {
            return Err(ValidationError::single("entries", "must not be empty").into());
        }

        let scope = Scope::from(ctx);
        let tx = self.server.storage().begin().await?;
        let group: Group = resolve_endpoint(&tx, &scope, "group_id", group_id).await?;
        let days = ScopedRepository::<_, Attendance>::with_scope(&tx, scope.clone());

        let mut written = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let field = format!("entries.{}.student_id", position);
            let student: Student = resolve_endpoint(&tx, &scope, &field, entry.student_id).await?;

            let existing = days
                .list(&ListFilter::new().where_eq("student_id", student.meta.id))
                .await?
                .items
                .into_iter()
                .find(|day| day.date == date);

            let group_id = group.meta.id;
            let AttendanceEntry { status, notes, .. } = entry;
            let attendance = match existing {
                Some(day) => {
                    days.update_with(day.meta.id, move |day| {
                        day.group_id = group_id;
                        day.status = status;
                        day.notes = notes;
                        Ok(())
                    })
                    .await?
                }
                None => {
                    let mut day = Attendance::new(student.meta.id, group_id, date, status);
                    day.notes = notes;
                    days.create(day).await?
                }
            };
            written.push(attendance);
        }
        tx.commit().await?;

        info!(
            "Recorded attendance of {} students for group {} on {} in tenant {}",
            written.len(),
            group.meta.id,
            date,
            ctx.tenant_id()
        );
        Ok(written)
    }

    /// Attendance counts for a student between `from` and `to`, both included.
    pub async fn attendance_report(
        &self,
        ctx: &TenantContext,
        student_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> SchoolResult<AttendanceReport> {
        let mut errors = ValidationError::new();
        errors.check(to < from, "to", "must not be before from");
        errors.into_result()?;

        let storage = self.server.storage();
        let scope = Scope::from(ctx);
        ScopedRepository::<S, Student>::with_scope(storage, scope.clone())
            .find(student_id)
            .await?;

        let statuses: Vec<AttendanceStatus> =
            ScopedRepository::<S, Attendance>::with_scope(storage, scope)
                .list(&ListFilter::new().where_eq("student_id", student_id))
                .await?
                .items
                .into_iter()
                .filter(|day| (from..=to).contains(&day.date))
                .map(|day| day.status)
                .collect();

        let count = |status: AttendanceStatus| statuses.iter().filter(|s| **s == status).count();
        let total = statuses.len();
        let present = count(AttendanceStatus::Presente);

        Ok(AttendanceReport {
            student_id,
            from,
            to,
            total,
            present,
            absent: count(AttendanceStatus::Falta),
            late: count(AttendanceStatus::Retardo),
            excused: count(AttendanceStatus::Justificada),
            attendance_percentage: percentage(present, total),
        })
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(1, 8), 12.5);
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[test]
    fn roll_call_entries_parse_lowercase_statuses() {
        let entry: AttendanceEntry = serde_json::from_value(serde_json::json!({
            "student_id": Uuid::nil(),
            "status": "retardo"
        }))
        .unwrap();
        assert_eq!(entry.status, AttendanceStatus::Retardo);
        assert_eq!(entry.notes, None);
    }
}

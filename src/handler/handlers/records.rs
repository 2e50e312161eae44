//! Record handlers: report cards, group roll calls and attendance reports.

use crate::error::{SchoolError, SchoolResult, ValidationError};
use crate::guard::AttendanceEntry;
use crate::handler::core::{
    Operation, OperationResponse, SchoolOperationHandler, ok, parse_body, parse_id,
    parse_reference, to_json,
};
use crate::storage::TransactionalStorage;
use crate::tenant::TenantContext;
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Deserialize)]
struct RollCall {
    date: NaiveDate,
    entries: Vec<AttendanceEntry>,
}

fn parse_date(field: &str, value: &str) -> SchoolResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::single(field, "must be a date as YYYY-MM-DD").into())
}

pub async fn handle<S: TransactionalStorage>(
    handler: &SchoolOperationHandler<S>,
    ctx: &TenantContext,
    operation: Operation,
) -> SchoolResult<OperationResponse> {
    let records = handler.server().records();
    let request_id = ctx.request_id();

    match operation {
        Operation::ReportCard {
            student_id,
            period_id,
        } => {
            let card = records
                .report_card(
                    ctx,
                    parse_id("Student", &student_id)?,
                    parse_id("Period", &period_id)?,
                )
                .await?;
            Ok(ok(to_json(&card)?, request_id))
        }
        Operation::RecordGroupAttendance { group_id, data } => {
            let input: RollCall = parse_body(data)?;
            let written = records
                .record_group_attendance(
                    ctx,
                    parse_reference("group_id", &group_id)?,
                    input.date,
                    input.entries,
                )
                .await?;
            Ok(ok(to_json(&written)?, request_id))
        }
        Operation::AttendanceReport {
            student_id,
            from,
            to,
        } => {
            let student_id = parse_id("Student", &student_id)?;
            let from = parse_date("from", &from)?;
            let to = parse_date("to", &to)?;
            let report = records.attendance_report(ctx, student_id, from, to).await?;
            Ok(ok(to_json(&report)?, request_id))
        }
        _ => Err(SchoolError::internal("not a record operation")),
    }
}

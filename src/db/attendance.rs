//! Report and attendance storage with tenant scoping
//!
//! One report per (cell, civil date, type). Writes are upserts keyed on that
//! triple, backed by a unique index, with attendance rows replaced wholesale.

use chrono::NaiveDate;
use diesel::prelude::*;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{attendances, reports};
use super::models::{format_timestamp, Attendance, NewReport, Report, ReportType};
use crate::error::ServiceError;
use crate::time_window::{day_window, format_civil_date, TimeRange};

/// Report write for one meeting occurrence
#[derive(Debug, Clone)]
pub struct ReportWrite<'a> {
    pub cell_id: &'a str,
    pub date: NaiveDate,
    pub report_type: ReportType,
    pub offer_amount: Option<f64>,
    pub present_member_ids: &'a [String],
}

/// Upsert the report for (cell, date, type) and replace its attendance
///
/// Callers run this inside an immediate transaction so the key is written
/// by one writer at a time.
pub fn upsert_report(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    write: &ReportWrite<'_>,
) -> Result<Report, ServiceError> {
    let id = Uuid::new_v4().to_string();
    let report_date = format_civil_date(write.date);
    let created_at = format_timestamp(day_window(write.date).start);

    diesel::insert_into(reports::table)
        .values(&NewReport {
            id: &id,
            matrix_id: &ctx.matrix_id,
            cell_id: write.cell_id,
            report_type: write.report_type.as_str(),
            report_date: &report_date,
            created_at: &created_at,
            offer_amount: write.offer_amount,
        })
        .on_conflict((reports::matrix_id, reports::cell_id, reports::report_date, reports::report_type))
        .do_update()
        .set((
            reports::offer_amount.eq(write.offer_amount),
            reports::created_at.eq(&created_at),
        ))
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Report upsert failed: {}", e)))?;

    let report = find_report(conn, ctx, write.cell_id, write.date, write.report_type)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve saved report".into()))?;

    diesel::delete(
        attendances::table
            .filter(attendances::matrix_id.eq(&ctx.matrix_id))
            .filter(attendances::report_id.eq(&report.id)),
    )
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Attendance delete failed: {}", e)))?;

    let rows: Vec<Attendance> = write
        .present_member_ids
        .iter()
        .map(|member_id| Attendance {
            report_id: report.id.clone(),
            member_id: member_id.clone(),
            matrix_id: ctx.matrix_id.clone(),
        })
        .collect();

    if !rows.is_empty() {
        diesel::insert_into(attendances::table)
            .values(&rows)
            .execute(conn)
            .map_err(|e| ServiceError::Internal(format!("Attendance insert failed: {}", e)))?;
    }

    Ok(report)
}

pub fn find_report(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    date: NaiveDate,
    report_type: ReportType,
) -> Result<Option<Report>, ServiceError> {
    reports::table
        .filter(reports::matrix_id.eq(&ctx.matrix_id))
        .filter(reports::cell_id.eq(cell_id))
        .filter(reports::report_date.eq(format_civil_date(date)))
        .filter(reports::report_type.eq(report_type.as_str()))
        .select(Report::as_select())
        .first(conn)
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
}

/// Reports of both types for the given cells whose instant lies in `window`
pub fn reports_in_window(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_ids: &[String],
    window: &TimeRange,
) -> Result<Vec<Report>, ServiceError> {
    if cell_ids.is_empty() {
        return Ok(vec![]);
    }

    reports::table
        .filter(reports::matrix_id.eq(&ctx.matrix_id))
        .filter(reports::cell_id.eq_any(cell_ids))
        .filter(reports::created_at.ge(format_timestamp(window.start)))
        .filter(reports::created_at.le(format_timestamp(window.end)))
        .order(reports::created_at.asc())
        .select(Report::as_select())
        .load(conn)
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
}

pub fn attendance_for_reports(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    report_ids: &[String],
) -> Result<Vec<Attendance>, ServiceError> {
    if report_ids.is_empty() {
        return Ok(vec![]);
    }

    attendances::table
        .filter(attendances::matrix_id.eq(&ctx.matrix_id))
        .filter(attendances::report_id.eq_any(report_ids))
        .select(Attendance::as_select())
        .load(conn)
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
}

pub fn count_reports_for_key(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    date: NaiveDate,
    report_type: ReportType,
) -> Result<i64, ServiceError> {
    reports::table
        .filter(reports::matrix_id.eq(&ctx.matrix_id))
        .filter(reports::cell_id.eq(cell_id))
        .filter(reports::report_date.eq(format_civil_date(date)))
        .filter(reports::report_type.eq(report_type.as_str()))
        .count()
        .get_result(conn)
        .map_err(|e| ServiceError::Internal(format!("Count query failed: {}", e)))
}

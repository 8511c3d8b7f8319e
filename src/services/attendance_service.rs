//! Attendance service - monthly reconstruction and the report write path
//!
//! A month's date list is rebuilt on every read: the standard dates of the
//! meeting type (the cell's weekday, or Sundays for services) unioned with
//! every date that actually has a report. Absence is never stored; it is the
//! cell's current membership minus the attendance rows of that date.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use diesel::SqliteConnection;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::db::attendance::{self, ReportWrite};
use crate::db::members;
use crate::db::models::{parse_timestamp, Cell, Member, Report, ReportType};
use crate::db::org_graph::{self, OrgUnit};
use crate::db::{Database, TenantContext};
use crate::error::ServiceError;
use crate::time_window::{month_dates, month_window, parse_civil_date, to_civil_date};

use super::access;
use super::events::{EventBus, OrgEvent};
use super::scope::{resolve_scope, AccessScope};

const SUNDAY: u32 = 0;

// ============================================================================
// Result types
// ============================================================================

/// One meeting date of a cell within a month
#[derive(Debug, Clone)]
pub struct DateAttendance {
    pub date: NaiveDate,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u32,
    pub present: Vec<Member>,
    pub absent: Vec<Member>,
    pub has_report: bool,
    pub is_standard_day: bool,
    pub report_type: ReportType,
    pub report_id: Option<String>,
    pub offer_amount: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CellMonthlyReport {
    pub cell: Cell,
    pub dates: Vec<DateAttendance>,
    pub all_members: Vec<Member>,
}

#[derive(Debug, Clone)]
pub struct ScopeMonthlyReport {
    pub year: i32,
    pub month: u32,
    pub report_type: ReportType,
    pub cells: Vec<CellMonthlyReport>,
    /// Members of every selected cell, ordered by name
    pub all_members: Vec<Member>,
}

/// Hierarchy filter for multi-cell reports; the most specific id wins
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFilter {
    #[serde(default)]
    pub congregation_id: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub discipleship_id: Option<String>,
    #[serde(default)]
    pub cell_id: Option<String>,
}

impl ScopeFilter {
    pub fn most_specific(&self) -> Option<OrgUnit> {
        if let Some(id) = &self.cell_id {
            Some(OrgUnit::Cell(id.clone()))
        } else if let Some(id) = &self.discipleship_id {
            Some(OrgUnit::Discipleship(id.clone()))
        } else if let Some(id) = &self.network_id {
            Some(OrgUnit::Network(id.clone()))
        } else {
            self.congregation_id.clone().map(OrgUnit::Congregation)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReportInput {
    /// Civil date, `YYYY-MM-DD`
    pub date: String,
    #[serde(default, rename = "type")]
    pub report_type: ReportType,
    #[serde(default)]
    pub offer_amount: Option<f64>,
    #[serde(default)]
    pub present_member_ids: Vec<String>,
}

// ============================================================================
// Date reconstruction
// ============================================================================

/// Whether `weekday` matches the recurrence rule of the meeting type
///
/// A cell without a configured weekday treats every day as standard for
/// regular meetings.
pub fn is_standard_day(report_type: ReportType, weekday: u32, cell_weekday: Option<i32>) -> bool {
    match report_type {
        ReportType::Service => weekday == SUNDAY,
        ReportType::Cell => cell_weekday.map_or(true, |day| day == weekday as i32),
    }
}

/// Dates in the month that follow the standing recurrence
fn standard_dates(dates: &[NaiveDate], report_type: ReportType, cell_weekday: Option<i32>) -> Vec<NaiveDate> {
    let target = match report_type {
        ReportType::Service => Some(SUNDAY as i32),
        ReportType::Cell => cell_weekday,
    };
    let Some(target) = target else {
        return vec![];
    };
    dates
        .iter()
        .copied()
        .filter(|d| d.weekday().num_days_from_sunday() as i32 == target)
        .collect()
}

/// Rebuild one cell's month from its standard dates and stored reports
///
/// `reports` may hold both meeting types; only `report_type` is used.
/// `attendance` maps report id to the member ids recorded present.
pub fn reconstruct_month(
    cell: &Cell,
    members: &[Member],
    month: &[NaiveDate],
    reports: &[Report],
    attendance: &HashMap<String, HashSet<String>>,
    report_type: ReportType,
) -> Result<Vec<DateAttendance>, ServiceError> {
    let mut by_date: BTreeMap<NaiveDate, Option<&Report>> = standard_dates(month, report_type, cell.weekday)
        .into_iter()
        .map(|d| (d, None))
        .collect();

    for report in reports {
        if report.cell_id != cell.id || report.kind()? != report_type {
            continue;
        }
        let civil = to_civil_date(parse_timestamp(&report.created_at)?);
        if let Some(date) = civil.date() {
            by_date.insert(date, Some(report));
        }
    }

    let empty = HashSet::new();
    let entries = by_date
        .into_iter()
        .map(|(date, report)| {
            let weekday = date.weekday().num_days_from_sunday();
            let is_standard_day = is_standard_day(report_type, weekday, cell.weekday);
            match report {
                Some(report) => {
                    let present_ids = attendance.get(&report.id).unwrap_or(&empty);
                    let (present, absent): (Vec<Member>, Vec<Member>) =
                        members.iter().cloned().partition(|m| present_ids.contains(&m.id));
                    DateAttendance {
                        date,
                        weekday,
                        present,
                        absent,
                        has_report: true,
                        is_standard_day,
                        report_type,
                        report_id: Some(report.id.clone()),
                        offer_amount: report.offer_amount,
                    }
                }
                None => DateAttendance {
                    date,
                    weekday,
                    present: vec![],
                    absent: members.to_vec(),
                    has_report: false,
                    is_standard_day,
                    report_type,
                    report_id: None,
                    offer_amount: None,
                },
            }
        })
        .collect();

    Ok(entries)
}

// ============================================================================
// Aggregation over the store
// ============================================================================

fn group_attendance(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    reports: &[Report],
) -> Result<HashMap<String, HashSet<String>>, ServiceError> {
    let report_ids: Vec<String> = reports.iter().map(|r| r.id.clone()).collect();
    let mut grouped: HashMap<String, HashSet<String>> = HashMap::new();
    for row in attendance::attendance_for_reports(conn, ctx, &report_ids)? {
        grouped.entry(row.report_id).or_default().insert(row.member_id);
    }
    Ok(grouped)
}

/// A filter naming a unit the tenant does not have is `NotFound`, not an empty report
fn ensure_unit_exists(conn: &mut SqliteConnection, ctx: &TenantContext, unit: &OrgUnit) -> Result<(), ServiceError> {
    let (kind, id, exists) = match unit {
        OrgUnit::Cell(id) => ("cell", id, org_graph::find_cell(conn, ctx, id)?.is_some()),
        OrgUnit::Discipleship(id) => ("discipleship", id, org_graph::find_discipleship(conn, ctx, id)?.is_some()),
        OrgUnit::Network(id) => ("network", id, org_graph::find_network(conn, ctx, id)?.is_some()),
        OrgUnit::Congregation(id) => ("congregation", id, org_graph::find_congregation(conn, ctx, id)?.is_some()),
    };
    if exists {
        Ok(())
    } else {
        Err(ServiceError::not_found(kind, id))
    }
}

/// Monthly attendance of one cell
pub fn cell_monthly_report(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    year: i32,
    month: u32,
    report_type: ReportType,
) -> Result<CellMonthlyReport, ServiceError> {
    let window = month_window(year, month)?;
    let dates = month_dates(year, month)?;

    let cell = org_graph::find_cell(conn, ctx, cell_id)?.ok_or_else(|| ServiceError::not_found("cell", cell_id))?;
    let all_members = org_graph::members_of_cell(conn, ctx, cell_id)?;
    let reports = attendance::reports_in_window(conn, ctx, std::slice::from_ref(&cell.id), &window)?;
    let grouped = group_attendance(conn, ctx, &reports)?;

    let dates = reconstruct_month(&cell, &all_members, &dates, &reports, &grouped, report_type)?;
    Ok(CellMonthlyReport {
        cell,
        dates,
        all_members,
    })
}

/// Monthly attendance of every cell a scope may see, narrowed by `filter`
///
/// `all` skips scope narrowing; only admins and congregation-level roles may
/// ask for it.
#[allow(clippy::too_many_arguments)]
pub fn scope_monthly_report(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    scope: &AccessScope,
    filter: &ScopeFilter,
    all: bool,
    year: i32,
    month: u32,
    report_type: ReportType,
) -> Result<ScopeMonthlyReport, ServiceError> {
    if all && !scope.has_congregation_role() {
        return Err(ServiceError::Forbidden("all=true requires a congregation-level role".into()));
    }

    let window = month_window(year, month)?;
    let dates = month_dates(year, month)?;

    let unit = filter.most_specific();
    if let Some(unit) = &unit {
        ensure_unit_exists(conn, ctx, unit)?;
    }
    let mut cells = org_graph::cells_under(conn, ctx, unit.as_ref())?;
    if !(scope.is_admin || all) {
        cells.retain(|c| scope.cell_ids.contains(&c.id));
    }

    let cell_ids: Vec<String> = cells.iter().map(|c| c.id.clone()).collect();
    let all_members = org_graph::members_of_cells(conn, ctx, &cell_ids)?;
    let reports = attendance::reports_in_window(conn, ctx, &cell_ids, &window)?;
    let grouped = group_attendance(conn, ctx, &reports)?;

    let mut cell_reports = Vec::with_capacity(cells.len());
    for cell in cells {
        let members: Vec<Member> = all_members
            .iter()
            .filter(|m| m.cell_id.as_deref() == Some(cell.id.as_str()))
            .cloned()
            .collect();
        let cell_dates = reconstruct_month(&cell, &members, &dates, &reports, &grouped, report_type)?;
        cell_reports.push(CellMonthlyReport {
            cell,
            dates: cell_dates,
            all_members: members,
        });
    }

    debug!(
        matrix_id = %ctx.matrix_id,
        cells = cell_reports.len(),
        reports = reports.len(),
        year,
        month,
        "Built scope monthly report"
    );

    Ok(ScopeMonthlyReport {
        year,
        month,
        report_type,
        cells: cell_reports,
        all_members,
    })
}

// ============================================================================
// Service
// ============================================================================

/// Attendance service for report reads and writes
pub struct AttendanceService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl AttendanceService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Monthly report of one cell, visible to members whose scope holds it
    pub fn monthly_report(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        cell_id: &str,
        year: i32,
        month: u32,
        report_type: ReportType,
    ) -> Result<CellMonthlyReport, ServiceError> {
        self.db.with_snapshot(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            if org_graph::find_cell(conn, ctx, cell_id)?.is_none() {
                return Err(ServiceError::not_found("cell", cell_id));
            }
            if !access::can_view(&scope, cell_id) {
                return Err(ServiceError::Forbidden(format!("cell {} is outside your scope", cell_id)));
            }
            cell_monthly_report(conn, ctx, cell_id, year, month, report_type)
        })
    }

    /// Monthly report over the caller's scope
    #[allow(clippy::too_many_arguments)]
    pub fn monthly_report_for_scope(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        filter: &ScopeFilter,
        all: bool,
        year: i32,
        month: u32,
        report_type: ReportType,
    ) -> Result<ScopeMonthlyReport, ServiceError> {
        self.db.with_snapshot(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            scope_monthly_report(conn, ctx, &scope, filter, all, year, month, report_type)
        })
    }

    /// Create or replace the report for (cell, date, type)
    ///
    /// Present ids that are not current members of the cell are dropped.
    pub fn save_report(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        cell_id: &str,
        input: SaveReportInput,
    ) -> Result<Report, ServiceError> {
        let date = parse_civil_date(&input.date)?;
        if let Some(amount) = input.offer_amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ServiceError::InvalidInput(format!("offer amount must be a non-negative number, got {}", amount)));
            }
        }

        let (report, grant, present_count) = self.db.with_transaction(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            if org_graph::find_cell(conn, ctx, cell_id)?.is_none() {
                return Err(ServiceError::not_found("cell", cell_id));
            }
            let grant = access::require_manage(conn, ctx, &scope, member_id, cell_id).inspect_err(|_| {
                warn!(matrix_id = %ctx.matrix_id, member_id = %member_id, cell_id = %cell_id, "Report write rejected");
            })?;

            let present = members::filter_members_in_cell(conn, ctx, cell_id, &input.present_member_ids)?;
            let report = attendance::upsert_report(
                conn,
                ctx,
                &ReportWrite {
                    cell_id,
                    date,
                    report_type: input.report_type,
                    offer_amount: input.offer_amount,
                    present_member_ids: &present,
                },
            )?;
            Ok((report, grant, present.len()))
        })?;

        self.events.emit(OrgEvent::ManageGranted {
            matrix_id: ctx.matrix_id.clone(),
            member_id: member_id.to_string(),
            cell_id: cell_id.to_string(),
            grant,
        });
        self.events.emit(OrgEvent::ReportSaved {
            matrix_id: ctx.matrix_id.clone(),
            cell_id: cell_id.to_string(),
            report_id: report.id.clone(),
            date: report.report_date.clone(),
            report_type: report.report_type.clone(),
            present_count,
        });

        Ok(report)
    }
}

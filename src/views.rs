//! View types for HTTP API boundary
//!
//! These types use camelCase serialization for TypeScript clients.
//! Model types in db/models.rs mirror the snake_case tables.
//!
//! Pattern:
//! - Service layer returns model and result types (Cell, CellMonthlyReport, ...)
//! - HTTP layer converts to View types (CellView, CellMonthlyReportView, ...)
//! - ts-rs generates camelCase TypeScript from View types
//!
//! SQLite stores flags as i32; views expose proper bools. Dates cross the
//! boundary as `YYYY-MM-DD` civil strings.

use serde::Serialize;
use ts_rs::TS;

use crate::db::models::{Cell, Congregation, Member, Network, Report};
use crate::services::access::{CellAccess, ManageGrant};
use crate::services::attendance_service::{CellMonthlyReport, DateAttendance, ScopeMonthlyReport};
use crate::services::split_service::SplitResult;
use crate::time_window::format_civil_date;

// ============================================================================
// Organization Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub cell_id: Option<String>,
}

impl From<Member> for MemberView {
    fn from(m: Member) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            gender: m.gender,
            cell_id: m.cell_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CellView {
    pub id: String,
    pub discipleship_id: String,
    pub name: String,
    pub leader_id: Option<String>,
    pub vice_leader_id: Option<String>,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: Option<i32>,
    /// HH:mm
    pub time: Option<String>,
    pub parallel_cell_id: Option<String>,
}

impl From<Cell> for CellView {
    fn from(c: Cell) -> Self {
        Self {
            id: c.id,
            discipleship_id: c.discipleship_id,
            name: c.name,
            leader_id: c.leader_id,
            vice_leader_id: c.vice_leader_id,
            weekday: c.weekday,
            time: c.meeting_time,
            parallel_cell_id: c.parallel_cell_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CongregationView {
    pub id: String,
    pub name: String,
    pub is_principal: bool,
    pub government_pastor_id: Option<String>,
    pub vice_president_id: Option<String>,
}

impl From<Congregation> for CongregationView {
    fn from(c: Congregation) -> Self {
        Self {
            id: c.id,
            name: c.name,
            is_principal: c.is_principal != 0,
            government_pastor_id: c.government_pastor_id,
            vice_president_id: c.vice_president_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct NetworkView {
    pub id: String,
    pub congregation_id: String,
    pub name: String,
    pub pastor_id: Option<String>,
    pub is_kids: bool,
}

impl From<Network> for NetworkView {
    fn from(n: Network) -> Self {
        let is_kids = n.is_kids();
        Self {
            id: n.id,
            congregation_id: n.congregation_id,
            name: n.name,
            pastor_id: n.pastor_id,
            is_kids,
        }
    }
}

// ============================================================================
// Attendance Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ReportView {
    pub id: String,
    pub cell_id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub date: String,
    pub created_at: String,
    pub offer_amount: Option<f64>,
}

impl From<Report> for ReportView {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            cell_id: r.cell_id,
            report_type: r.report_type,
            date: r.report_date,
            created_at: r.created_at,
            offer_amount: r.offer_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DateEntryView {
    /// Civil date, `YYYY-MM-DD`
    pub date: String,
    pub weekday: u32,
    pub present: Vec<MemberView>,
    pub absent: Vec<MemberView>,
    pub has_report: bool,
    pub is_standard_day: bool,
    #[serde(rename = "type")]
    pub report_type: String,
    pub report_id: Option<String>,
    pub offer_amount: Option<f64>,
}

impl From<DateAttendance> for DateEntryView {
    fn from(d: DateAttendance) -> Self {
        Self {
            date: format_civil_date(d.date),
            weekday: d.weekday,
            present: d.present.into_iter().map(Into::into).collect(),
            absent: d.absent.into_iter().map(Into::into).collect(),
            has_report: d.has_report,
            is_standard_day: d.is_standard_day,
            report_type: d.report_type.to_string(),
            report_id: d.report_id,
            offer_amount: d.offer_amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CellMonthlyReportView {
    pub cell: CellView,
    pub dates: Vec<DateEntryView>,
    pub all_members: Vec<MemberView>,
}

impl From<CellMonthlyReport> for CellMonthlyReportView {
    fn from(r: CellMonthlyReport) -> Self {
        Self {
            cell: r.cell.into(),
            dates: r.dates.into_iter().map(Into::into).collect(),
            all_members: r.all_members.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct ScopeMonthlyReportView {
    pub year: i32,
    pub month: u32,
    #[serde(rename = "type")]
    pub report_type: String,
    pub cells: Vec<CellMonthlyReportView>,
    pub all_members: Vec<MemberView>,
}

impl From<ScopeMonthlyReport> for ScopeMonthlyReportView {
    fn from(r: ScopeMonthlyReport) -> Self {
        Self {
            year: r.year,
            month: r.month,
            report_type: r.report_type.to_string(),
            cells: r.cells.into_iter().map(Into::into).collect(),
            all_members: r.all_members.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Workflow / Access Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SplitResultView {
    pub new_cell: CellView,
    pub moved_count: usize,
    pub moved_member_ids: Vec<String>,
}

impl From<SplitResult> for SplitResultView {
    fn from(r: SplitResult) -> Self {
        Self {
            new_cell: r.new_cell.into(),
            moved_count: r.moved_count,
            moved_member_ids: r.moved_member_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct CellAccessView {
    pub can_view: bool,
    pub can_manage: bool,
    pub grant: Option<ManageGrant>,
}

impl From<CellAccess> for CellAccessView {
    fn from(a: CellAccess) -> Self {
        Self {
            can_view: a.can_view,
            can_manage: a.can_manage,
            grant: a.grant,
        }
    }
}

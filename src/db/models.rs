//! Diesel model definitions for database tables
//!
//! All models include `matrix_id` for tenant scoping.
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)

use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;
use crate::error::ServiceError;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Fixed-width UTC format; lexicographic order matches chronological order
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_timestamp(instant: chrono::DateTime<chrono::Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, ServiceError> {
    chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| ServiceError::Internal(format!("Bad stored timestamp '{}': {}", value, e)))
}

/// Get current UTC timestamp for SQLite TEXT columns
pub fn current_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

// ============================================================================
// Ministry ranks
// ============================================================================

/// Ordered ministry qualification; variant order is the rank order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinistryKind {
    Visitor,
    RegularAttendee,
    Member,
    LeaderInTraining,
    Leader,
    Discipulador,
    Pastor,
}

impl MinistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visitor => "visitor",
            Self::RegularAttendee => "regular_attendee",
            Self::Member => "member",
            Self::LeaderInTraining => "leader_in_training",
            Self::Leader => "leader",
            Self::Discipulador => "discipulador",
            Self::Pastor => "pastor",
        }
    }
}

impl FromStr for MinistryKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(Self::Visitor),
            "regular_attendee" => Ok(Self::RegularAttendee),
            "member" => Ok(Self::Member),
            "leader_in_training" => Ok(Self::LeaderInTraining),
            "leader" => Ok(Self::Leader),
            "discipulador" => Ok(Self::Discipulador),
            "pastor" => Ok(Self::Pastor),
            other => Err(ServiceError::InvalidInput(format!("Unknown ministry kind: {}", other))),
        }
    }
}

impl fmt::Display for MinistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Report types
// ============================================================================

/// Meeting kind a report records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Regular weekly cell meeting; standard on the cell's weekday
    #[default]
    Cell,
    /// Congregational service; standard on Sundays
    Service,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cell => "cell",
            Self::Service => "service",
        }
    }
}

impl FromStr for ReportType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cell" => Ok(Self::Cell),
            "service" => Ok(Self::Service),
            other => Err(ServiceError::InvalidInput(format!("Unknown report type: {}", other))),
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Organization Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = congregations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Congregation {
    pub id: String,
    pub matrix_id: String,
    pub name: String,
    pub is_principal: i32,
    pub government_pastor_id: Option<String>,
    pub vice_president_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = congregations)]
pub struct NewCongregation<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub name: &'a str,
    pub is_principal: i32,
    pub government_pastor_id: Option<&'a str>,
    pub vice_president_id: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = congregation_kids_leaders)]
pub struct NewKidsLeader<'a> {
    pub congregation_id: &'a str,
    pub member_id: &'a str,
    pub matrix_id: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = networks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Network {
    pub id: String,
    pub matrix_id: String,
    pub congregation_id: String,
    pub name: String,
    pub pastor_id: Option<String>,
    pub is_kids: i32,
}

impl Network {
    pub fn is_kids(&self) -> bool {
        self.is_kids != 0
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = networks)]
pub struct NewNetwork<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub congregation_id: &'a str,
    pub name: &'a str,
    pub pastor_id: Option<&'a str>,
    pub is_kids: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = discipleships)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Discipleship {
    pub id: String,
    pub matrix_id: String,
    pub network_id: String,
    pub name: String,
    pub discipulador_id: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = discipleships)]
pub struct NewDiscipleship<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub network_id: &'a str,
    pub name: &'a str,
    pub discipulador_id: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = cells)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Cell {
    pub id: String,
    pub matrix_id: String,
    pub discipleship_id: String,
    pub name: String,
    pub leader_id: Option<String>,
    pub vice_leader_id: Option<String>,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: Option<i32>,
    /// HH:mm
    pub meeting_time: Option<String>,
    pub parallel_cell_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cells)]
pub struct NewCell<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub discipleship_id: &'a str,
    pub name: &'a str,
    pub leader_id: Option<&'a str>,
    pub vice_leader_id: Option<&'a str>,
    pub weekday: Option<i32>,
    pub meeting_time: Option<&'a str>,
    pub parallel_cell_id: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = cell_leaders_in_training)]
pub struct NewLeaderInTraining<'a> {
    pub cell_id: &'a str,
    pub member_id: &'a str,
    pub matrix_id: &'a str,
}

// ============================================================================
// Membership Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Member {
    pub id: String,
    pub matrix_id: String,
    pub name: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub cell_id: Option<String>,
    pub ministry_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = members)]
pub struct NewMember<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub gender: Option<&'a str>,
    pub cell_id: Option<&'a str>,
    pub ministry_id: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = ministries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Ministry {
    pub id: String,
    pub matrix_id: String,
    pub name: String,
    pub kind: String,
}

impl Ministry {
    pub fn rank(&self) -> Result<MinistryKind, ServiceError> {
        self.kind.parse()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ministries)]
pub struct NewMinistry<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = roles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Role {
    pub id: String,
    pub matrix_id: String,
    pub name: String,
    pub is_admin: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = roles)]
pub struct NewRole<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub name: &'a str,
    pub is_admin: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = member_roles)]
pub struct NewMemberRole<'a> {
    pub member_id: &'a str,
    pub role_id: &'a str,
    pub matrix_id: &'a str,
}

// ============================================================================
// Report Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = reports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Report {
    pub id: String,
    pub matrix_id: String,
    pub cell_id: String,
    pub report_type: String,
    /// Civil date (YYYY-MM-DD)
    pub report_date: String,
    /// UTC instant of the civil day's start
    pub created_at: String,
    pub offer_amount: Option<f64>,
}

impl Report {
    pub fn kind(&self) -> Result<ReportType, ServiceError> {
        self.report_type.parse()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport<'a> {
    pub id: &'a str,
    pub matrix_id: &'a str,
    pub cell_id: &'a str,
    pub report_type: &'a str,
    pub report_date: &'a str,
    pub created_at: &'a str,
    pub offer_amount: Option<f64>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = attendances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attendance {
    pub report_id: String,
    pub member_id: String,
    pub matrix_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ministry_rank_order() {
        assert!(MinistryKind::Visitor < MinistryKind::RegularAttendee);
        assert!(MinistryKind::Member < MinistryKind::LeaderInTraining);
        assert!(MinistryKind::LeaderInTraining < MinistryKind::Leader);
        assert!(MinistryKind::Leader < MinistryKind::Discipulador);
        assert!(MinistryKind::Discipulador < MinistryKind::Pastor);
    }

    #[test]
    fn test_ministry_kind_parse() {
        assert_eq!("leader_in_training".parse::<MinistryKind>().unwrap(), MinistryKind::LeaderInTraining);
        assert!("bishop".parse::<MinistryKind>().is_err());
    }

    #[test]
    fn test_report_type_parse() {
        assert_eq!("service".parse::<ReportType>().unwrap(), ReportType::Service);
        assert_eq!(ReportType::default(), ReportType::Cell);
        assert!(matches!("mass".parse::<ReportType>(), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_timestamp_roundtrip_keeps_millis() {
        let ts = "2024-04-02T03:00:00.000Z";
        let parsed = parse_timestamp(ts).unwrap();
        assert_eq!(format_timestamp(parsed), ts);
    }
}

//! Seeding helpers shared by unit tests

use std::sync::Arc;

use diesel::prelude::*;

use super::cells::{self, CreateCellInput};
use super::context::TenantContext;
use super::members::{self, CreateMemberInput};
use super::attendance::{self, ReportWrite};
use super::models::{Cell, Member, MinistryKind, Report, ReportType};
use super::organization::{self, CreateDiscipleshipInput, CreateNetworkInput};
use super::Database;
use crate::error::ServiceError;

pub const TEST_MATRIX_ID: &str = "matrix-1";

pub struct Fixture {
    pub db: Arc<Database>,
    pub ctx: TenantContext,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            db: Arc::new(Database::open_in_memory().expect("Failed to open in-memory database")),
            ctx: TenantContext::new(TEST_MATRIX_ID),
        }
    }

    pub fn run<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError>,
    {
        self.db.with_conn(f)
    }

    pub fn congregation(&self, id: &str, name: &str) {
        self.run(|conn| organization::insert_congregation(conn, &self.ctx, id, name))
            .expect("insert congregation");
    }

    pub fn network(&self, id: &str, congregation_id: &str, is_kids: bool) {
        self.run(|conn| {
            organization::insert_network(
                conn,
                &self.ctx,
                CreateNetworkInput {
                    id: Some(id.into()),
                    congregation_id: congregation_id.into(),
                    name: format!("Network {}", id),
                    pastor_id: None,
                    is_kids,
                },
            )
        })
        .expect("insert network");
    }

    pub fn discipleship(&self, id: &str, network_id: &str) {
        self.run(|conn| {
            organization::insert_discipleship(
                conn,
                &self.ctx,
                CreateDiscipleshipInput {
                    id: Some(id.into()),
                    network_id: network_id.into(),
                    name: format!("Discipleship {}", id),
                    discipulador_id: None,
                },
            )
        })
        .expect("insert discipleship");
    }

    pub fn cell(&self, id: &str, discipleship_id: &str, weekday: Option<i32>) -> Cell {
        self.run(|conn| {
            cells::insert_cell(
                conn,
                &self.ctx,
                CreateCellInput {
                    id: Some(id.into()),
                    discipleship_id: discipleship_id.into(),
                    name: format!("Cell {}", id),
                    leader_id: None,
                    weekday,
                    meeting_time: Some("20:00".into()),
                },
            )
        })
        .expect("insert cell")
    }

    /// Congregation → network → discipleship → cell chain with the given ids
    pub fn chain(&self, congregation: &str, network: &str, discipleship: &str, cell: &str, weekday: Option<i32>) -> Cell {
        self.congregation(congregation, congregation);
        self.network(network, congregation, false);
        self.discipleship(discipleship, network);
        self.cell(cell, discipleship, weekday)
    }

    pub fn member(&self, id: &str, cell_id: Option<&str>) -> Member {
        self.member_with(id, cell_id, None, None)
    }

    pub fn member_with(
        &self,
        id: &str,
        cell_id: Option<&str>,
        ministry_id: Option<&str>,
        gender: Option<&str>,
    ) -> Member {
        self.run(|conn| {
            members::insert_member(
                conn,
                &self.ctx,
                CreateMemberInput {
                    id: Some(id.into()),
                    name: format!("Member {}", id),
                    email: None,
                    gender: gender.map(Into::into),
                    cell_id: cell_id.map(Into::into),
                    ministry_id: ministry_id.map(Into::into),
                },
            )
        })
        .expect("insert member")
    }

    pub fn ministry(&self, id: &str, kind: MinistryKind) {
        self.run(|conn| members::insert_ministry(conn, &self.ctx, id, kind.as_str(), kind))
            .expect("insert ministry");
    }

    /// Every ministry rank, with ids equal to the kind names
    pub fn all_ministries(&self) {
        for kind in [
            MinistryKind::Visitor,
            MinistryKind::RegularAttendee,
            MinistryKind::Member,
            MinistryKind::LeaderInTraining,
            MinistryKind::Leader,
            MinistryKind::Discipulador,
            MinistryKind::Pastor,
        ] {
            self.ministry(kind.as_str(), kind);
        }
    }

    pub fn role(&self, id: &str, is_admin: bool) {
        self.run(|conn| members::insert_role(conn, &self.ctx, id, id, is_admin))
            .expect("insert role");
    }

    pub fn grant_role(&self, member_id: &str, role_id: &str) {
        self.run(|conn| members::grant_role(conn, &self.ctx, member_id, role_id))
            .expect("grant role");
    }

    pub fn admin(&self, member_id: &str) {
        self.member(member_id, None);
        self.role("admin", true);
        self.grant_role(member_id, "admin");
    }

    pub fn set_leader(&self, cell_id: &str, member_id: &str) {
        self.run(|conn| cells::set_leader(conn, &self.ctx, cell_id, member_id))
            .expect("set leader");
    }

    pub fn set_vice_leader(&self, cell_id: &str, member_id: &str) {
        self.run(|conn| cells::set_vice_leader(conn, &self.ctx, cell_id, Some(member_id)))
            .expect("set vice leader");
    }

    pub fn leader_in_training(&self, cell_id: &str, member_id: &str) {
        self.run(|conn| cells::add_leader_in_training(conn, &self.ctx, cell_id, member_id))
            .expect("add leader in training");
    }

    pub fn set_discipulador(&self, discipleship_id: &str, member_id: &str) {
        self.run(|conn| organization::set_discipulador(conn, &self.ctx, discipleship_id, Some(member_id)))
            .expect("set discipulador");
    }

    pub fn set_pastor(&self, network_id: &str, member_id: &str) {
        self.run(|conn| organization::set_network_pastor(conn, &self.ctx, network_id, Some(member_id)))
            .expect("set pastor");
    }

    pub fn set_government(&self, congregation_id: &str, pastor: Option<&str>, vice_president: Option<&str>) {
        self.run(|conn| {
            organization::set_congregation_government(conn, &self.ctx, congregation_id, pastor, vice_president)
        })
        .expect("set government");
    }

    pub fn kids_leader(&self, congregation_id: &str, member_id: &str) {
        self.run(|conn| organization::add_kids_leader(conn, &self.ctx, congregation_id, member_id))
            .expect("add kids leader");
    }

    /// Upsert a report for a civil date (`YYYY-MM-DD`)
    pub fn report(&self, cell_id: &str, date: &str, report_type: ReportType, present: &[&str]) -> Report {
        let present: Vec<String> = present.iter().map(|s| s.to_string()).collect();
        let date = crate::time_window::parse_civil_date(date).expect("valid date");
        self.db
            .with_transaction(|conn| {
                attendance::upsert_report(
                    conn,
                    &self.ctx,
                    &ReportWrite {
                        cell_id,
                        date,
                        report_type,
                        offer_amount: None,
                        present_member_ids: &present,
                    },
                )
            })
            .expect("upsert report")
    }
}

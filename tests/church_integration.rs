//! Integration tests against a file-backed database
//!
//! Seeds a tenant through the public repository functions and drives the
//! services the way the HTTP layer does, including from several threads
//! against the same keys.

use std::sync::Arc;

use chrono::NaiveDate;
use ekklesia::db::attendance;
use ekklesia::db::cells::{self, CreateCellInput};
use ekklesia::db::members::{self, CreateMemberInput};
use ekklesia::db::models::{MinistryKind, ReportType};
use ekklesia::db::organization::{self, CreateDiscipleshipInput, CreateNetworkInput};
use ekklesia::services::{resolve_scope, SaveReportInput, ScopeFilter, SplitCellInput};
use ekklesia::{Database, ServiceError, Services, TenantContext};
use tempfile::TempDir;

fn open_db() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(&temp_dir.path().join("ekklesia.db"), 4).unwrap();
    (Arc::new(db), temp_dir)
}

fn member(id: &str, cell_id: Option<&str>, ministry_id: Option<&str>) -> CreateMemberInput {
    CreateMemberInput {
        id: Some(id.into()),
        name: format!("Member {}", id),
        cell_id: cell_id.map(Into::into),
        ministry_id: ministry_id.map(Into::into),
        ..Default::default()
    }
}

/// One congregation with a network, a discipleship and a Tuesday cell
fn seed_tenant(db: &Database, ctx: &TenantContext) {
    db.with_transaction(|conn| {
        for kind in [MinistryKind::Member, MinistryKind::LeaderInTraining, MinistryKind::Leader] {
            members::insert_ministry(conn, ctx, kind.as_str(), kind.as_str(), kind)?;
        }

        organization::insert_congregation(conn, ctx, "cong", "Central")?;
        organization::insert_network(
            conn,
            ctx,
            CreateNetworkInput {
                id: Some("net".into()),
                congregation_id: "cong".into(),
                name: "Young Adults".into(),
                ..Default::default()
            },
        )?;
        organization::insert_discipleship(
            conn,
            ctx,
            CreateDiscipleshipInput {
                id: Some("disc".into()),
                network_id: "net".into(),
                name: "Discipleship".into(),
                ..Default::default()
            },
        )?;
        cells::insert_cell(
            conn,
            ctx,
            CreateCellInput {
                id: Some("cell".into()),
                discipleship_id: "disc".into(),
                name: "Cell One".into(),
                weekday: Some(2),
                meeting_time: Some("20:00".into()),
                ..Default::default()
            },
        )?;

        members::insert_member(conn, ctx, member("leader", None, Some("leader")))?;
        members::insert_member(conn, ctx, member("trainee", Some("cell"), Some("leader_in_training")))?;
        members::insert_member(conn, ctx, member("discipulador", None, None))?;
        for id in ["m1", "m2", "m3", "m4"] {
            members::insert_member(conn, ctx, member(id, Some("cell"), Some("member")))?;
        }

        cells::set_leader(conn, ctx, "cell", "leader")?;
        organization::set_discipulador(conn, ctx, "disc", Some("discipulador"))?;
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_tenants_do_not_see_each_other() {
    let (db, _temp) = open_db();
    let north = TenantContext::new("north");
    let south = TenantContext::new("south");
    seed_tenant(&db, &north);

    let scope = db
        .with_snapshot(|conn| resolve_scope(conn, &north, "discipulador"))
        .unwrap();
    assert!(scope.cell_ids.contains("cell"));
    assert!(scope.discipleship_ids.contains("disc"));

    let services = Services::new(db.clone());
    let input = SaveReportInput {
        date: "2024-06-04".into(),
        report_type: ReportType::Cell,
        offer_amount: Some(12.5),
        present_member_ids: vec!["m1".into(), "m2".into()],
    };
    services.attendance.save_report(&north, "leader", "cell", input).unwrap();

    let north_month = services
        .attendance
        .monthly_report(&north, "leader", "cell", 2024, 6, ReportType::Cell)
        .unwrap();
    assert_eq!(north_month.dates.len(), 4);
    assert_eq!(north_month.dates.iter().filter(|d| d.has_report).count(), 1);

    let south_month = services
        .attendance
        .monthly_report(&south, "leader", "cell", 2024, 6, ReportType::Cell);
    assert!(matches!(south_month, Err(ServiceError::NotFound(_))));

    let south_scope = db.with_snapshot(|conn| resolve_scope(conn, &south, "discipulador"));
    assert!(matches!(south_scope, Err(ServiceError::NotFound(_))));
}

#[test]
fn test_report_edits_replace_attendance() {
    let (db, _temp) = open_db();
    let ctx = TenantContext::new("north");
    seed_tenant(&db, &ctx);
    let services = Services::new(db.clone());

    let save = |present: &[&str]| SaveReportInput {
        date: "2024-06-11".into(),
        report_type: ReportType::Cell,
        offer_amount: None,
        present_member_ids: present.iter().map(|s| s.to_string()).collect(),
    };
    let first = services.attendance.save_report(&ctx, "leader", "cell", save(&["m1", "m2", "m3"])).unwrap();
    let second = services.attendance.save_report(&ctx, "leader", "cell", save(&["m4"])).unwrap();
    assert_eq!(first.id, second.id);

    let month = services
        .attendance
        .monthly_report(&ctx, "discipulador", "cell", 2024, 6, ReportType::Cell)
        .unwrap();
    let entry = month.dates.iter().find(|d| d.has_report).unwrap();
    let present: Vec<&str> = entry.present.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(present, vec!["m4"]);
    assert_eq!(entry.present.len() + entry.absent.len(), month.all_members.len());
}

#[test]
fn test_split_then_scope_report() {
    let (db, _temp) = open_db();
    let ctx = TenantContext::new("north");
    seed_tenant(&db, &ctx);
    let services = Services::new(db.clone());

    let result = services
        .split
        .split(
            &ctx,
            "discipulador",
            "cell",
            SplitCellInput {
                member_ids: vec!["m3".into(), "m4".into(), "ghost".into()],
                new_cell_name: "Cell Two".into(),
                new_leader_member_id: Some("trainee".into()),
                old_leader_member_id: Some("leader".into()),
            },
        )
        .unwrap();
    assert_eq!(result.moved_count, 2);
    assert_eq!(result.new_cell.leader_id.as_deref(), Some("leader"));

    let report = services
        .attendance
        .monthly_report_for_scope(&ctx, "discipulador", &ScopeFilter::default(), false, 2024, 6, ReportType::Cell)
        .unwrap();
    assert_eq!(report.cells.len(), 2);
    assert_eq!(report.all_members.len(), 4);

    let original = report.cells.iter().find(|c| c.cell.id == "cell").unwrap();
    assert_eq!(original.cell.leader_id.as_deref(), Some("trainee"));
    let ids: Vec<&str> = original.all_members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"m1") && ids.contains(&"m2"));

    // The trainee now leads and may split again, but only with real members
    let empty = services.split.split(
        &ctx,
        "trainee",
        "cell",
        SplitCellInput {
            member_ids: vec!["m3".into()],
            new_cell_name: "Cell Three".into(),
            new_leader_member_id: Some("m1".into()),
            old_leader_member_id: Some("trainee".into()),
        },
    );
    assert!(matches!(empty, Err(ServiceError::Conflict(_))));
    assert_eq!(db.stats().unwrap().cell_count, 2);
}

#[test]
fn test_outsider_cannot_manage() {
    let (db, _temp) = open_db();
    let ctx = TenantContext::new("north");
    seed_tenant(&db, &ctx);
    let services = Services::new(db.clone());

    let access = services.access.cell_access(&ctx, "m1", "cell").unwrap();
    assert!(!access.can_view);
    assert!(!access.can_manage);

    let denied = services.attendance.save_report(
        &ctx,
        "m1",
        "cell",
        SaveReportInput {
            date: "2024-06-04".into(),
            report_type: ReportType::Cell,
            offer_amount: None,
            present_member_ids: vec![],
        },
    );
    assert!(matches!(denied, Err(ServiceError::Forbidden(_))));
}

#[test]
fn test_parallel_report_writes_keep_one_row_per_key() {
    let (db, _temp) = open_db();
    let ctx = TenantContext::new("north");
    seed_tenant(&db, &ctx);
    let services = Services::new(db.clone());
    let roster = ["m1", "m2", "m3", "m4"];

    let errors: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let services = &services;
                let ctx = &ctx;
                s.spawn(move || {
                    let mut failed = 0;
                    for round in 0..15 {
                        let present = vec![roster[(worker + round) % roster.len()].to_string()];
                        let input = SaveReportInput {
                            date: "2024-06-18".into(),
                            report_type: ReportType::Cell,
                            offer_amount: Some(round as f64),
                            present_member_ids: present,
                        };
                        if services.attendance.save_report(ctx, "leader", "cell", input).is_err() {
                            failed += 1;
                        }
                    }
                    failed
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(errors, 0);

    let date = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap();
    let count = db
        .with_conn(|conn| attendance::count_reports_for_key(conn, &ctx, "cell", date, ReportType::Cell))
        .unwrap();
    assert_eq!(count, 1);

    let month = services
        .attendance
        .monthly_report(&ctx, "leader", "cell", 2024, 6, ReportType::Cell)
        .unwrap();
    let entry = month.dates.iter().find(|d| d.has_report).unwrap();
    assert_eq!(entry.present.len(), 1);
}

#[test]
fn test_parallel_splits_of_one_cell_commit_in_turn() {
    let (db, _temp) = open_db();
    let ctx = TenantContext::new("north");
    seed_tenant(&db, &ctx);
    db.with_transaction(|conn| {
        for id in ["l1", "l2", "l3"] {
            members::insert_member(conn, &ctx, member(id, None, Some("leader")))?;
        }
        Ok(())
    })
    .unwrap();
    let services = Services::new(db.clone());

    let results: Vec<Result<usize, ServiceError>> = std::thread::scope(|s| {
        let handles: Vec<_> = [("m1", "l1"), ("m2", "l2"), ("m3", "l3")]
            .into_iter()
            .enumerate()
            .map(|(i, (moved, old_leader))| {
                let services = &services;
                let ctx = &ctx;
                s.spawn(move || {
                    services
                        .split
                        .split(
                            ctx,
                            "discipulador",
                            "cell",
                            SplitCellInput {
                                member_ids: vec![moved.into()],
                                new_cell_name: format!("Split {}", i),
                                new_leader_member_id: Some("leader".into()),
                                old_leader_member_id: Some(old_leader.into()),
                            },
                        )
                        .map(|result| result.moved_count)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|r| matches!(r, Ok(1))), "{:?}", results);
    assert_eq!(db.stats().unwrap().cell_count, 4);

    let month = services
        .attendance
        .monthly_report(&ctx, "discipulador", "cell", 2024, 6, ReportType::Cell)
        .unwrap();
    let mut remaining: Vec<&str> = month.all_members.iter().map(|m| m.id.as_str()).collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec!["m4", "trainee"]);
    assert_eq!(month.cell.leader_id.as_deref(), Some("leader"));
}

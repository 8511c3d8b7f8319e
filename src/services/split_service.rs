//! Cell multiplication (split) workflow
//!
//! Splitting hands the original cell to a new leader while the old leader
//! takes the freshly created cell together with a subset of the members.
//! The direction is asymmetric: the NEW cell is led by the OLD leader.
//! Every step runs in one immediate transaction; any failure leaves the
//! store untouched.

use std::sync::Arc;

use diesel::SqliteConnection;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::cells::{self, CreateCellInput};
use crate::db::members;
use crate::db::models::{Cell, Member, Ministry, MinistryKind};
use crate::db::{org_graph, Database, TenantContext};
use crate::error::ServiceError;

use super::access::{self, ManageGrant};
use super::events::{EventBus, OrgEvent};
use super::scope::resolve_scope;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitCellInput {
    #[serde(default)]
    pub member_ids: Vec<String>,
    pub new_cell_name: String,
    #[serde(default)]
    pub new_leader_member_id: Option<String>,
    #[serde(default)]
    pub old_leader_member_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SplitResult {
    pub new_cell: Cell,
    pub moved_count: usize,
    pub moved_member_ids: Vec<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ServiceError> {
    match value.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ServiceError::InvalidInput(format!("{} is required", field))),
    }
}

fn load_member(conn: &mut SqliteConnection, ctx: &TenantContext, member_id: &str) -> Result<Member, ServiceError> {
    org_graph::find_member(conn, ctx, member_id)?.ok_or_else(|| ServiceError::not_found("member", member_id))
}

/// Promotions a split needs, checked against tenant configuration up front
struct Promotions {
    leader_ministry: Option<Ministry>,
    new_leader: bool,
    old_leader: bool,
}

fn plan_promotions(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    new_leader: &Member,
    old_leader: &Member,
) -> Result<Promotions, ServiceError> {
    let new_rank = members::member_rank(conn, ctx, new_leader)?;
    let old_rank = members::member_rank(conn, ctx, old_leader)?;

    let promote_new = new_rank.map_or(true, |rank| rank < MinistryKind::Leader);
    let promote_old = old_rank == Some(MinistryKind::LeaderInTraining);

    let leader_ministry = if promote_new || promote_old {
        let ministry = members::find_ministry_by_kind(conn, ctx, MinistryKind::Leader)?.ok_or_else(|| {
            ServiceError::FatalConfiguration(format!("tenant {} has no '{}' ministry", ctx.matrix_id, MinistryKind::Leader))
        })?;
        Some(ministry)
    } else {
        None
    };

    Ok(Promotions {
        leader_ministry,
        new_leader: promote_new,
        old_leader: promote_old,
    })
}

/// Run the split against an open transaction
///
/// Validation happens before the first write. Callers own the transaction so
/// that a `Conflict` from an empty member subset rolls back the new cell.
pub fn split_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    original_cell_id: &str,
    input: &SplitCellInput,
) -> Result<SplitResult, ServiceError> {
    let new_leader_id = required(&input.new_leader_member_id, "newLeaderMemberId")?;
    let old_leader_id = required(&input.old_leader_member_id, "oldLeaderMemberId")?;
    let name = input.new_cell_name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput("newCellName is required".into()));
    }

    let original = org_graph::find_cell(conn, ctx, original_cell_id)?
        .ok_or_else(|| ServiceError::not_found("cell", original_cell_id))?;
    let new_leader = load_member(conn, ctx, new_leader_id)?;
    let old_leader = load_member(conn, ctx, old_leader_id)?;
    let promotions = plan_promotions(conn, ctx, &new_leader, &old_leader)?;

    // 1. New cell, led by the old leader
    let new_cell = cells::insert_cell(
        conn,
        ctx,
        CreateCellInput {
            id: None,
            discipleship_id: original.discipleship_id.clone(),
            name: name.to_string(),
            leader_id: Some(old_leader.id.clone()),
            weekday: original.weekday,
            meeting_time: original.meeting_time.clone(),
        },
    )?;

    // 2. Original cell goes to the new leader
    cells::set_leader(conn, ctx, &original.id, &new_leader.id)?;

    // 3. Leaders stop being rank-and-file members of the original cell
    for leader in [&old_leader, &new_leader] {
        if leader.cell_id.as_deref() == Some(original.id.as_str()) {
            members::set_member_cell(conn, ctx, &leader.id, None)?;
        }
    }

    // 4. Rank promotions
    if let Some(ministry) = &promotions.leader_ministry {
        if promotions.new_leader {
            members::set_member_ministry(conn, ctx, &new_leader.id, &ministry.id)?;
        }
        if promotions.old_leader {
            members::set_member_ministry(conn, ctx, &old_leader.id, &ministry.id)?;
        }
    }

    // 5. Only current members of the original cell move
    let valid = members::filter_members_in_cell(conn, ctx, &original.id, &input.member_ids)?;
    if valid.is_empty() {
        return Err(ServiceError::Conflict(format!(
            "none of the given members belong to cell {}",
            original.id
        )));
    }

    // 6. Move them
    let moved_count = members::move_members(conn, ctx, &valid, &original.id, &new_cell.id)?;

    Ok(SplitResult {
        new_cell,
        moved_count,
        moved_member_ids: valid,
    })
}

/// Split service: access checks, transaction boundary and events
pub struct SplitService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl SplitService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    pub fn split(
        &self,
        ctx: &TenantContext,
        member_id: &str,
        original_cell_id: &str,
        input: SplitCellInput,
    ) -> Result<SplitResult, ServiceError> {
        let outcome: Result<(SplitResult, ManageGrant), ServiceError> = self.db.with_transaction(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            if org_graph::find_cell(conn, ctx, original_cell_id)?.is_none() {
                return Err(ServiceError::not_found("cell", original_cell_id));
            }
            let grant = access::require_manage(conn, ctx, &scope, member_id, original_cell_id)?;
            let result = split_cell(conn, ctx, original_cell_id, &input)?;
            Ok((result, grant))
        });

        let (result, grant) = outcome.inspect_err(|e| {
            warn!(
                matrix_id = %ctx.matrix_id,
                member_id = %member_id,
                cell_id = %original_cell_id,
                error = %e,
                "Cell split rejected"
            );
        })?;

        info!(
            matrix_id = %ctx.matrix_id,
            original = %original_cell_id,
            new_cell = %result.new_cell.id,
            moved = result.moved_count,
            "Cell split committed"
        );

        self.events.emit(OrgEvent::ManageGranted {
            matrix_id: ctx.matrix_id.clone(),
            member_id: member_id.to_string(),
            cell_id: original_cell_id.to_string(),
            grant,
        });
        self.events.emit(OrgEvent::CellSplit {
            matrix_id: ctx.matrix_id.clone(),
            original_cell_id: original_cell_id.to_string(),
            new_cell_id: result.new_cell.id.clone(),
            moved_count: result.moved_count,
        });

        Ok(result)
    }
}

//! Access evaluation over a resolved scope
//!
//! `can_view*` are pure set checks. `can_manage` and the `is_*` checks look
//! relationships up live, because a direct role on one cell can be narrower
//! than the member's full scope. Any matching relationship grants access;
//! there is no explicit deny.

use std::fmt;
use std::sync::Arc;

use diesel::SqliteConnection;
use serde::Serialize;
use tracing::debug;
use ts_rs::TS;

use super::scope::{resolve_scope, AccessScope};
use crate::db::{org_graph, Database, TenantContext};
use crate::error::ServiceError;

/// Relationship that satisfied a manage check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ManageGrant {
    Admin,
    NetworkPastor,
    Discipulador,
    Leader,
    ViceLeader,
    /// Cell is in scope but no direct relationship matched
    ScopeFallback,
}

impl ManageGrant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::NetworkPastor => "networkPastor",
            Self::Discipulador => "discipulador",
            Self::Leader => "leader",
            Self::ViceLeader => "viceLeader",
            Self::ScopeFallback => "scopeFallback",
        }
    }
}

impl fmt::Display for ManageGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_view(scope: &AccessScope, cell_id: &str) -> bool {
    scope.is_admin || scope.cell_ids.contains(cell_id)
}

pub fn can_view_discipleship(scope: &AccessScope, discipleship_id: &str) -> bool {
    scope.is_admin || scope.discipleship_ids.contains(discipleship_id)
}

pub fn can_view_network(scope: &AccessScope, network_id: &str) -> bool {
    scope.is_admin || scope.network_ids.contains(network_id)
}

pub fn can_view_congregation(scope: &AccessScope, congregation_id: &str) -> bool {
    scope.is_admin || scope.congregation_ids.contains(congregation_id)
}

pub fn require_admin(scope: &AccessScope) -> Result<(), ServiceError> {
    if scope.is_admin {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("administrator role required".into()))
    }
}

// ============================================================================
// Relationship checks (live lookups)
// ============================================================================

pub fn is_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    cell_id: &str,
) -> Result<bool, ServiceError> {
    Ok(org_graph::find_cell(conn, ctx, cell_id)?
        .and_then(|cell| cell.leader_id)
        .is_some_and(|leader| leader == member_id))
}

pub fn is_vice_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    cell_id: &str,
) -> Result<bool, ServiceError> {
    Ok(org_graph::find_cell(conn, ctx, cell_id)?
        .and_then(|cell| cell.vice_leader_id)
        .is_some_and(|vice| vice == member_id))
}

/// Whether the member owns the discipleship group containing the cell
pub fn is_discipulador_of_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    cell_id: &str,
) -> Result<bool, ServiceError> {
    let Some(cell) = org_graph::find_cell(conn, ctx, cell_id)? else {
        return Ok(false);
    };
    Ok(org_graph::find_discipleship(conn, ctx, &cell.discipleship_id)?
        .and_then(|d| d.discipulador_id)
        .is_some_and(|owner| owner == member_id))
}

/// Whether the member pastors the network containing the cell
pub fn is_pastor_of_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    cell_id: &str,
) -> Result<bool, ServiceError> {
    let Some(cell) = org_graph::find_cell(conn, ctx, cell_id)? else {
        return Ok(false);
    };
    Ok(org_graph::network_of_cell(conn, ctx, &cell)?
        .and_then(|n| n.pastor_id)
        .is_some_and(|pastor| pastor == member_id))
}

/// First relationship that lets `member_id` manage the cell, if any
pub fn can_manage(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    scope: &AccessScope,
    member_id: &str,
    cell_id: &str,
) -> Result<Option<ManageGrant>, ServiceError> {
    if scope.is_admin {
        return Ok(Some(ManageGrant::Admin));
    }
    if is_pastor_of_cell(conn, ctx, member_id, cell_id)? {
        return Ok(Some(ManageGrant::NetworkPastor));
    }
    if is_discipulador_of_cell(conn, ctx, member_id, cell_id)? {
        return Ok(Some(ManageGrant::Discipulador));
    }
    if is_leader(conn, ctx, member_id, cell_id)? {
        return Ok(Some(ManageGrant::Leader));
    }
    if is_vice_leader(conn, ctx, member_id, cell_id)? {
        return Ok(Some(ManageGrant::ViceLeader));
    }
    if scope.cell_ids.contains(cell_id) {
        debug!(
            matrix_id = %ctx.matrix_id,
            member_id = %member_id,
            cell_id = %cell_id,
            "Manage access via scope fallback"
        );
        return Ok(Some(ManageGrant::ScopeFallback));
    }
    Ok(None)
}

/// `can_manage`, turning a miss into `Forbidden`
pub fn require_manage(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    scope: &AccessScope,
    member_id: &str,
    cell_id: &str,
) -> Result<ManageGrant, ServiceError> {
    can_manage(conn, ctx, scope, member_id, cell_id)?
        .ok_or_else(|| ServiceError::Forbidden(format!("member {} cannot manage cell {}", member_id, cell_id)))
}

/// Outcome of checking one member against one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellAccess {
    pub can_view: bool,
    pub can_manage: bool,
    pub grant: Option<ManageGrant>,
}

/// Scope resolution and access decisions for request handlers
pub struct AccessService {
    db: Arc<Database>,
}

impl AccessService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn resolve(&self, ctx: &TenantContext, member_id: &str) -> Result<AccessScope, ServiceError> {
        self.db.with_snapshot(|conn| resolve_scope(conn, ctx, member_id))
    }

    pub fn cell_access(&self, ctx: &TenantContext, member_id: &str, cell_id: &str) -> Result<CellAccess, ServiceError> {
        self.db.with_snapshot(|conn| {
            let scope = resolve_scope(conn, ctx, member_id)?;
            if org_graph::find_cell(conn, ctx, cell_id)?.is_none() {
                return Err(ServiceError::not_found("cell", cell_id));
            }
            let grant = can_manage(conn, ctx, &scope, member_id, cell_id)?;
            Ok(CellAccess {
                can_view: can_view(&scope, cell_id),
                can_manage: grant.is_some(),
                grant,
            })
        })
    }
}

//! Hierarchical scope resolution
//!
//! A member's scope is never stored. It is derived on every request from the
//! role edges the member holds, walking each edge down the hierarchy
//! (congregation → network → discipleship → cell) and unioning the results.

use std::collections::HashSet;

use diesel::SqliteConnection;
use tracing::debug;

use crate::db::{org_graph, TenantContext};
use crate::error::ServiceError;

/// Entities a member may act upon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    pub is_admin: bool,
    pub cell_ids: HashSet<String>,
    pub network_ids: HashSet<String>,
    pub discipleship_ids: HashSet<String>,
    pub congregation_ids: HashSet<String>,
}

impl AccessScope {
    /// Whether any congregation-level role contributed to this scope
    pub fn has_congregation_role(&self) -> bool {
        self.is_admin || !self.congregation_ids.is_empty()
    }

    fn add_networks(&mut self, conn: &mut SqliteConnection, ctx: &TenantContext, network_ids: Vec<String>) -> Result<(), ServiceError> {
        let discipleship_ids = org_graph::discipleships_of_networks(conn, ctx, &network_ids)?;
        self.network_ids.extend(network_ids);
        self.add_discipleships(conn, ctx, discipleship_ids)
    }

    fn add_discipleships(
        &mut self,
        conn: &mut SqliteConnection,
        ctx: &TenantContext,
        discipleship_ids: Vec<String>,
    ) -> Result<(), ServiceError> {
        let cell_ids = org_graph::cells_of_discipleships(conn, ctx, &discipleship_ids)?;
        self.discipleship_ids.extend(discipleship_ids);
        self.cell_ids.extend(cell_ids);
        Ok(())
    }
}

/// Resolve the scope of `member_id` within the tenant
///
/// Admins get every id of the tenant. Everyone else gets the union of their
/// independent role contributions; the order of contributions is irrelevant.
pub fn resolve_scope(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<AccessScope, ServiceError> {
    if org_graph::find_member(conn, ctx, member_id)?.is_none() {
        return Err(ServiceError::not_found("member", member_id));
    }

    if org_graph::member_is_admin(conn, ctx, member_id)? {
        debug!(matrix_id = %ctx.matrix_id, member_id = %member_id, "Resolved admin scope");
        return Ok(AccessScope {
            is_admin: true,
            cell_ids: org_graph::all_cell_ids(conn, ctx)?.into_iter().collect(),
            network_ids: org_graph::all_network_ids(conn, ctx)?.into_iter().collect(),
            discipleship_ids: org_graph::all_discipleship_ids(conn, ctx)?.into_iter().collect(),
            congregation_ids: org_graph::all_congregation_ids(conn, ctx)?.into_iter().collect(),
        });
    }

    let mut scope = AccessScope::default();

    scope.cell_ids.extend(org_graph::cells_led_by(conn, ctx, member_id)?);
    scope.cell_ids.extend(org_graph::cells_vice_led_by(conn, ctx, member_id)?);
    scope.cell_ids.extend(org_graph::cells_in_training_for(conn, ctx, member_id)?);

    let owned = org_graph::discipleships_owned_by(conn, ctx, member_id)?;
    scope.add_discipleships(conn, ctx, owned)?;

    let pastored = org_graph::networks_pastored_by(conn, ctx, member_id)?;
    scope.add_networks(conn, ctx, pastored)?;

    let governed = org_graph::congregations_governed_by(conn, ctx, member_id)?;
    let governed_networks = org_graph::networks_of_congregations(conn, ctx, &governed, false)?;
    scope.congregation_ids.extend(governed);
    scope.add_networks(conn, ctx, governed_networks)?;

    // Kids leaders reach only the kids networks of their congregations
    let kids_congregations = org_graph::congregations_with_kids_leader(conn, ctx, member_id)?;
    let kids_networks = org_graph::networks_of_congregations(conn, ctx, &kids_congregations, true)?;
    scope.add_networks(conn, ctx, kids_networks)?;

    debug!(
        matrix_id = %ctx.matrix_id,
        member_id = %member_id,
        cells = scope.cell_ids.len(),
        networks = scope.network_ids.len(),
        "Resolved member scope"
    );

    Ok(scope)
}

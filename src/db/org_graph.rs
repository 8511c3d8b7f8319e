//! Read-only traversal primitives over the congregation hierarchy
//!
//! Congregation → network → discipleship → cell → member, plus the role
//! edges members hold on each level. Every query is scoped by tenant.
//! Higher layers (scope resolution, access checks, attendance) compose
//! these primitives; nothing here mutates.

use diesel::prelude::*;

use super::context::TenantContext;
use super::diesel_schema::{
    cell_leaders_in_training, cells, congregation_kids_leaders, congregations, discipleships,
    member_roles, members, networks, roles,
};
use super::models::{Cell, Congregation, Discipleship, Member, Network};
use crate::error::ServiceError;

fn query_failed(e: diesel::result::Error) -> ServiceError {
    ServiceError::Internal(format!("Query failed: {}", e))
}

/// One level of the hierarchy, used to narrow cell queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgUnit {
    Congregation(String),
    Network(String),
    Discipleship(String),
    Cell(String),
}

// ============================================================================
// Lookups by id
// ============================================================================

pub fn find_member(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Option<Member>, ServiceError> {
    members::table
        .filter(members::matrix_id.eq(&ctx.matrix_id))
        .filter(members::id.eq(member_id))
        .select(Member::as_select())
        .first(conn)
        .optional()
        .map_err(query_failed)
}

pub fn find_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
) -> Result<Option<Cell>, ServiceError> {
    cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .filter(cells::id.eq(cell_id))
        .select(Cell::as_select())
        .first(conn)
        .optional()
        .map_err(query_failed)
}

pub fn find_discipleship(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    discipleship_id: &str,
) -> Result<Option<Discipleship>, ServiceError> {
    discipleships::table
        .filter(discipleships::matrix_id.eq(&ctx.matrix_id))
        .filter(discipleships::id.eq(discipleship_id))
        .select(Discipleship::as_select())
        .first(conn)
        .optional()
        .map_err(query_failed)
}

pub fn find_network(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    network_id: &str,
) -> Result<Option<Network>, ServiceError> {
    networks::table
        .filter(networks::matrix_id.eq(&ctx.matrix_id))
        .filter(networks::id.eq(network_id))
        .select(Network::as_select())
        .first(conn)
        .optional()
        .map_err(query_failed)
}

pub fn find_congregation(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    congregation_id: &str,
) -> Result<Option<Congregation>, ServiceError> {
    congregations::table
        .filter(congregations::matrix_id.eq(&ctx.matrix_id))
        .filter(congregations::id.eq(congregation_id))
        .select(Congregation::as_select())
        .first(conn)
        .optional()
        .map_err(query_failed)
}

/// Walk a cell up to its network (cell → discipleship → network)
pub fn network_of_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell: &Cell,
) -> Result<Option<Network>, ServiceError> {
    match find_discipleship(conn, ctx, &cell.discipleship_id)? {
        Some(discipleship) => find_network(conn, ctx, &discipleship.network_id),
        None => Ok(None),
    }
}

// ============================================================================
// Role edges held by a member
// ============================================================================

/// Whether the member holds any role flagged as admin
pub fn member_is_admin(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<bool, ServiceError> {
    let role_ids: Vec<String> = member_roles::table
        .filter(member_roles::matrix_id.eq(&ctx.matrix_id))
        .filter(member_roles::member_id.eq(member_id))
        .select(member_roles::role_id)
        .load(conn)
        .map_err(query_failed)?;

    if role_ids.is_empty() {
        return Ok(false);
    }

    let admin_roles: i64 = roles::table
        .filter(roles::matrix_id.eq(&ctx.matrix_id))
        .filter(roles::id.eq_any(&role_ids))
        .filter(roles::is_admin.ne(0))
        .count()
        .get_result(conn)
        .map_err(query_failed)?;

    Ok(admin_roles > 0)
}

pub fn cells_led_by(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .filter(cells::leader_id.eq(member_id))
        .select(cells::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn cells_vice_led_by(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .filter(cells::vice_leader_id.eq(member_id))
        .select(cells::id)
        .load(conn)
        .map_err(query_failed)
}

/// Cells where the member is registered as a leader in training
pub fn cells_in_training_for(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    cell_leaders_in_training::table
        .filter(cell_leaders_in_training::matrix_id.eq(&ctx.matrix_id))
        .filter(cell_leaders_in_training::member_id.eq(member_id))
        .select(cell_leaders_in_training::cell_id)
        .load(conn)
        .map_err(query_failed)
}

pub fn discipleships_owned_by(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    discipleships::table
        .filter(discipleships::matrix_id.eq(&ctx.matrix_id))
        .filter(discipleships::discipulador_id.eq(member_id))
        .select(discipleships::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn networks_pastored_by(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    networks::table
        .filter(networks::matrix_id.eq(&ctx.matrix_id))
        .filter(networks::pastor_id.eq(member_id))
        .select(networks::id)
        .load(conn)
        .map_err(query_failed)
}

/// Congregations where the member is government pastor or vice-president
pub fn congregations_governed_by(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    congregations::table
        .filter(congregations::matrix_id.eq(&ctx.matrix_id))
        .filter(
            congregations::government_pastor_id
                .eq(member_id)
                .or(congregations::vice_president_id.eq(member_id)),
        )
        .select(congregations::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn congregations_with_kids_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
) -> Result<Vec<String>, ServiceError> {
    congregation_kids_leaders::table
        .filter(congregation_kids_leaders::matrix_id.eq(&ctx.matrix_id))
        .filter(congregation_kids_leaders::member_id.eq(member_id))
        .select(congregation_kids_leaders::congregation_id)
        .load(conn)
        .map_err(query_failed)
}

// ============================================================================
// Downward traversal
// ============================================================================

/// Networks under the given congregations; `kids_only` keeps `is_kids` networks
pub fn networks_of_congregations(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    congregation_ids: &[String],
    kids_only: bool,
) -> Result<Vec<String>, ServiceError> {
    if congregation_ids.is_empty() {
        return Ok(vec![]);
    }

    let mut query = networks::table
        .filter(networks::matrix_id.eq(&ctx.matrix_id))
        .filter(networks::congregation_id.eq_any(congregation_ids))
        .into_boxed();

    if kids_only {
        query = query.filter(networks::is_kids.ne(0));
    }

    query.select(networks::id).load(conn).map_err(query_failed)
}

pub fn discipleships_of_networks(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    network_ids: &[String],
) -> Result<Vec<String>, ServiceError> {
    if network_ids.is_empty() {
        return Ok(vec![]);
    }

    discipleships::table
        .filter(discipleships::matrix_id.eq(&ctx.matrix_id))
        .filter(discipleships::network_id.eq_any(network_ids))
        .select(discipleships::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn cells_of_discipleships(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    discipleship_ids: &[String],
) -> Result<Vec<String>, ServiceError> {
    if discipleship_ids.is_empty() {
        return Ok(vec![]);
    }

    cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .filter(cells::discipleship_id.eq_any(discipleship_ids))
        .select(cells::id)
        .load(conn)
        .map_err(query_failed)
}

/// Cells under one hierarchy unit, ordered by name
pub fn cells_under(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    unit: Option<&OrgUnit>,
) -> Result<Vec<Cell>, ServiceError> {
    let mut query = cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .into_boxed();

    match unit {
        None => {}
        Some(OrgUnit::Cell(id)) => {
            query = query.filter(cells::id.eq(id.clone()));
        }
        Some(OrgUnit::Discipleship(id)) => {
            query = query.filter(cells::discipleship_id.eq(id.clone()));
        }
        Some(OrgUnit::Network(id)) => {
            let discipleship_ids = discipleships_of_networks(conn, ctx, std::slice::from_ref(id))?;
            query = query.filter(cells::discipleship_id.eq_any(discipleship_ids));
        }
        Some(OrgUnit::Congregation(id)) => {
            let network_ids = networks_of_congregations(conn, ctx, std::slice::from_ref(id), false)?;
            let discipleship_ids = discipleships_of_networks(conn, ctx, &network_ids)?;
            query = query.filter(cells::discipleship_id.eq_any(discipleship_ids));
        }
    }

    query
        .order((cells::name.asc(), cells::id.asc()))
        .select(Cell::as_select())
        .load(conn)
        .map_err(query_failed)
}

// ============================================================================
// Tenant-wide id listings (admin universal scope)
// ============================================================================

pub fn all_cell_ids(conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Vec<String>, ServiceError> {
    cells::table
        .filter(cells::matrix_id.eq(&ctx.matrix_id))
        .select(cells::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn all_discipleship_ids(conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Vec<String>, ServiceError> {
    discipleships::table
        .filter(discipleships::matrix_id.eq(&ctx.matrix_id))
        .select(discipleships::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn all_network_ids(conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Vec<String>, ServiceError> {
    networks::table
        .filter(networks::matrix_id.eq(&ctx.matrix_id))
        .select(networks::id)
        .load(conn)
        .map_err(query_failed)
}

pub fn all_congregation_ids(conn: &mut SqliteConnection, ctx: &TenantContext) -> Result<Vec<String>, ServiceError> {
    congregations::table
        .filter(congregations::matrix_id.eq(&ctx.matrix_id))
        .select(congregations::id)
        .load(conn)
        .map_err(query_failed)
}

// ============================================================================
// Membership
// ============================================================================

/// Current members of a cell, ordered by name
pub fn members_of_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
) -> Result<Vec<Member>, ServiceError> {
    members::table
        .filter(members::matrix_id.eq(&ctx.matrix_id))
        .filter(members::cell_id.eq(cell_id))
        .order((members::name.asc(), members::id.asc()))
        .select(Member::as_select())
        .load(conn)
        .map_err(query_failed)
}

/// Current members of several cells, ordered by name
pub fn members_of_cells(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_ids: &[String],
) -> Result<Vec<Member>, ServiceError> {
    if cell_ids.is_empty() {
        return Ok(vec![]);
    }

    members::table
        .filter(members::matrix_id.eq(&ctx.matrix_id))
        .filter(members::cell_id.eq_any(cell_ids))
        .order((members::name.asc(), members::id.asc()))
        .select(Member::as_select())
        .load(conn)
        .map_err(query_failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::Fixture;

    fn ids(cells: Vec<Cell>) -> Vec<String> {
        cells.into_iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_lookups_are_tenant_scoped() {
        let fx = Fixture::new();
        fx.chain("cong", "net", "disc", "cell", Some(2));

        let other = TenantContext::new("other-matrix");
        assert!(fx.run(|conn| find_cell(conn, &fx.ctx, "cell")).unwrap().is_some());
        assert!(fx.run(|conn| find_cell(conn, &other, "cell")).unwrap().is_none());
        assert!(fx.run(|conn| find_congregation(conn, &other, "cong")).unwrap().is_none());
    }

    #[test]
    fn test_cells_under_each_level() {
        let fx = Fixture::new();
        fx.congregation("cong", "Central");
        fx.network("net-a", "cong", false);
        fx.network("net-b", "cong", true);
        fx.discipleship("disc-a", "net-a");
        fx.discipleship("disc-b", "net-b");
        fx.cell("cell-a1", "disc-a", Some(1));
        fx.cell("cell-a2", "disc-a", Some(3));
        fx.cell("cell-b1", "disc-b", Some(6));

        let all = fx.run(|conn| cells_under(conn, &fx.ctx, None)).unwrap();
        assert_eq!(all.len(), 3);

        let unit = OrgUnit::Congregation("cong".into());
        let by_cong = fx.run(|conn| cells_under(conn, &fx.ctx, Some(&unit))).unwrap();
        assert_eq!(by_cong.len(), 3);

        let unit = OrgUnit::Network("net-b".into());
        let by_net = fx.run(|conn| cells_under(conn, &fx.ctx, Some(&unit))).unwrap();
        assert_eq!(ids(by_net), vec!["cell-b1"]);

        let unit = OrgUnit::Discipleship("disc-a".into());
        let by_disc = fx.run(|conn| cells_under(conn, &fx.ctx, Some(&unit))).unwrap();
        assert_eq!(ids(by_disc), vec!["cell-a1", "cell-a2"]);

        let unit = OrgUnit::Cell("cell-a2".into());
        let by_cell = fx.run(|conn| cells_under(conn, &fx.ctx, Some(&unit))).unwrap();
        assert_eq!(ids(by_cell), vec!["cell-a2"]);
    }

    #[test]
    fn test_kids_only_network_listing() {
        let fx = Fixture::new();
        fx.congregation("cong", "Central");
        fx.network("adults", "cong", false);
        fx.network("kids", "cong", true);
        let congs = vec!["cong".to_string()];

        let all = fx.run(|conn| networks_of_congregations(conn, &fx.ctx, &congs, false)).unwrap();
        assert_eq!(all.len(), 2);

        let kids = fx.run(|conn| networks_of_congregations(conn, &fx.ctx, &congs, true)).unwrap();
        assert_eq!(kids, vec!["kids".to_string()]);
    }

    #[test]
    fn test_admin_marker_requires_admin_role() {
        let fx = Fixture::new();
        fx.member("alice", None);
        fx.member("bob", None);
        fx.role("secretary", false);
        fx.role("admin", true);
        fx.grant_role("alice", "admin");
        fx.grant_role("bob", "secretary");

        assert!(fx.run(|conn| member_is_admin(conn, &fx.ctx, "alice")).unwrap());
        assert!(!fx.run(|conn| member_is_admin(conn, &fx.ctx, "bob")).unwrap());
    }

    #[test]
    fn test_network_of_cell() {
        let fx = Fixture::new();
        let cell = fx.chain("cong", "net", "disc", "cell", None);

        let network = fx.run(|conn| network_of_cell(conn, &fx.ctx, &cell)).unwrap().unwrap();
        assert_eq!(network.id, "net");
    }

    #[test]
    fn test_members_of_cell_excludes_other_cells() {
        let fx = Fixture::new();
        fx.chain("cong", "net", "disc", "cell-1", Some(1));
        fx.cell("cell-2", "disc", Some(2));
        fx.member("a", Some("cell-1"));
        fx.member("b", Some("cell-2"));
        fx.member("c", None);

        let members = fx.run(|conn| members_of_cell(conn, &fx.ctx, "cell-1")).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, "a");

        let cell_ids = vec!["cell-1".to_string(), "cell-2".to_string()];
        let both = fx.run(|conn| members_of_cells(conn, &fx.ctx, &cell_ids)).unwrap();
        assert_eq!(both.len(), 2);
    }
}

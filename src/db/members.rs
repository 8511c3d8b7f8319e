//! Member, ministry rank and role operations with tenant scoping

use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{member_roles, members, ministries, roles};
use super::models::{current_timestamp, Member, Ministry, MinistryKind, NewMember, NewMemberRole, NewMinistry, NewRole};
use super::org_graph;
use crate::error::ServiceError;

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemberInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// "M" or "F"
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub cell_id: Option<String>,
    #[serde(default)]
    pub ministry_id: Option<String>,
}

// ============================================================================
// Members
// ============================================================================

pub fn insert_member(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: CreateMemberInput,
) -> Result<Member, ServiceError> {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = current_timestamp();

    diesel::insert_into(members::table)
        .values(&NewMember {
            id: &id,
            matrix_id: &ctx.matrix_id,
            name: &input.name,
            email: input.email.as_deref(),
            gender: input.gender.as_deref(),
            cell_id: input.cell_id.as_deref(),
            ministry_id: input.ministry_id.as_deref(),
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    org_graph::find_member(conn, ctx, &id)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve created member".into()))
}

/// Set or clear a member's current cell
pub fn set_member_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    cell_id: Option<&str>,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        members::table
            .filter(members::matrix_id.eq(&ctx.matrix_id))
            .filter(members::id.eq(member_id)),
    )
    .set((members::cell_id.eq(cell_id), members::updated_at.eq(current_timestamp())))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

/// Of the given ids, those whose current cell is `cell_id` (input order kept)
pub fn filter_members_in_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    member_ids: &[String],
) -> Result<Vec<String>, ServiceError> {
    if member_ids.is_empty() {
        return Ok(vec![]);
    }

    let found: Vec<String> = members::table
        .filter(members::matrix_id.eq(&ctx.matrix_id))
        .filter(members::cell_id.eq(cell_id))
        .filter(members::id.eq_any(member_ids))
        .select(members::id)
        .load(conn)
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    let mut valid = Vec::with_capacity(found.len());
    for id in member_ids {
        if found.contains(id) && !valid.contains(id) {
            valid.push(id.clone());
        }
    }
    Ok(valid)
}

/// Move members from one cell to another; rows not in `from_cell` are untouched
pub fn move_members(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_ids: &[String],
    from_cell: &str,
    to_cell: &str,
) -> Result<usize, ServiceError> {
    if member_ids.is_empty() {
        return Ok(0);
    }

    diesel::update(
        members::table
            .filter(members::matrix_id.eq(&ctx.matrix_id))
            .filter(members::cell_id.eq(from_cell))
            .filter(members::id.eq_any(member_ids)),
    )
    .set((members::cell_id.eq(to_cell), members::updated_at.eq(current_timestamp())))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))
}

pub fn set_member_ministry(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    ministry_id: &str,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        members::table
            .filter(members::matrix_id.eq(&ctx.matrix_id))
            .filter(members::id.eq(member_id)),
    )
    .set((members::ministry_id.eq(ministry_id), members::updated_at.eq(current_timestamp())))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

// ============================================================================
// Ministries (rank configuration per tenant)
// ============================================================================

pub fn insert_ministry(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
    name: &str,
    kind: MinistryKind,
) -> Result<(), ServiceError> {
    diesel::insert_into(ministries::table)
        .values(&NewMinistry {
            id,
            matrix_id: &ctx.matrix_id,
            name,
            kind: kind.as_str(),
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;
    Ok(())
}

/// The tenant's ministry record for a rank, if configured
pub fn find_ministry_by_kind(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    kind: MinistryKind,
) -> Result<Option<Ministry>, ServiceError> {
    ministries::table
        .filter(ministries::matrix_id.eq(&ctx.matrix_id))
        .filter(ministries::kind.eq(kind.as_str()))
        .order(ministries::id.asc())
        .select(Ministry::as_select())
        .first(conn)
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
}

/// Rank of a member; `None` when no ministry position is assigned
pub fn member_rank(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member: &Member,
) -> Result<Option<MinistryKind>, ServiceError> {
    let Some(ministry_id) = member.ministry_id.as_deref() else {
        return Ok(None);
    };

    let ministry: Option<Ministry> = ministries::table
        .filter(ministries::matrix_id.eq(&ctx.matrix_id))
        .filter(ministries::id.eq(ministry_id))
        .select(Ministry::as_select())
        .first(conn)
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))?;

    ministry.map(|m| m.rank()).transpose()
}

// ============================================================================
// Roles
// ============================================================================

pub fn insert_role(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
    name: &str,
    is_admin: bool,
) -> Result<(), ServiceError> {
    diesel::insert_into(roles::table)
        .values(&NewRole {
            id,
            matrix_id: &ctx.matrix_id,
            name,
            is_admin: if is_admin { 1 } else { 0 },
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;
    Ok(())
}

pub fn grant_role(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    member_id: &str,
    role_id: &str,
) -> Result<(), ServiceError> {
    diesel::insert_into(member_roles::table)
        .values(&NewMemberRole {
            member_id,
            role_id,
            matrix_id: &ctx.matrix_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;
    Ok(())
}

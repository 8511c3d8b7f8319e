//! Congregation, network and discipleship writes with tenant scoping
//!
//! Plain single-entity inserts used by seeding and the administrative layer,
//! plus the role-edge assignments the organization service gates.

use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{congregation_kids_leaders, congregations, discipleships, networks};
use super::models::{
    current_timestamp, Congregation, Discipleship, Network, NewCongregation, NewDiscipleship,
    NewKidsLeader, NewNetwork,
};
use super::org_graph;
use crate::error::ServiceError;

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNetworkInput {
    #[serde(default)]
    pub id: Option<String>,
    pub congregation_id: String,
    pub name: String,
    #[serde(default)]
    pub pastor_id: Option<String>,
    #[serde(default)]
    pub is_kids: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscipleshipInput {
    #[serde(default)]
    pub id: Option<String>,
    pub network_id: String,
    pub name: String,
    #[serde(default)]
    pub discipulador_id: Option<String>,
}

// ============================================================================
// Congregations
// ============================================================================

pub fn insert_congregation(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
    name: &str,
) -> Result<Congregation, ServiceError> {
    let now = current_timestamp();

    diesel::insert_into(congregations::table)
        .values(&NewCongregation {
            id,
            matrix_id: &ctx.matrix_id,
            name,
            is_principal: 0,
            government_pastor_id: None,
            vice_president_id: None,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    org_graph::find_congregation(conn, ctx, id)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve created congregation".into()))
}

/// Set government pastor and vice-president (either may be cleared)
pub fn set_congregation_government(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    congregation_id: &str,
    government_pastor_id: Option<&str>,
    vice_president_id: Option<&str>,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        congregations::table
            .filter(congregations::matrix_id.eq(&ctx.matrix_id))
            .filter(congregations::id.eq(congregation_id)),
    )
    .set((
        congregations::government_pastor_id.eq(government_pastor_id),
        congregations::vice_president_id.eq(vice_president_id),
        congregations::updated_at.eq(current_timestamp()),
    ))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

/// Make one congregation the tenant's principal, clearing every other flag
pub fn set_principal_congregation(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    congregation_id: &str,
) -> Result<bool, ServiceError> {
    let now = current_timestamp();

    diesel::update(
        congregations::table
            .filter(congregations::matrix_id.eq(&ctx.matrix_id))
            .filter(congregations::id.ne(congregation_id))
            .filter(congregations::is_principal.ne(0)),
    )
    .set((congregations::is_principal.eq(0), congregations::updated_at.eq(&now)))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    let updated = diesel::update(
        congregations::table
            .filter(congregations::matrix_id.eq(&ctx.matrix_id))
            .filter(congregations::id.eq(congregation_id)),
    )
    .set((congregations::is_principal.eq(1), congregations::updated_at.eq(&now)))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

pub fn principal_congregations(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
) -> Result<Vec<String>, ServiceError> {
    congregations::table
        .filter(congregations::matrix_id.eq(&ctx.matrix_id))
        .filter(congregations::is_principal.ne(0))
        .select(congregations::id)
        .load(conn)
        .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
}

pub fn add_kids_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    congregation_id: &str,
    member_id: &str,
) -> Result<(), ServiceError> {
    diesel::insert_into(congregation_kids_leaders::table)
        .values(&NewKidsLeader {
            congregation_id,
            member_id,
            matrix_id: &ctx.matrix_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;
    Ok(())
}

// ============================================================================
// Networks
// ============================================================================

pub fn insert_network(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: CreateNetworkInput,
) -> Result<Network, ServiceError> {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    diesel::insert_into(networks::table)
        .values(&NewNetwork {
            id: &id,
            matrix_id: &ctx.matrix_id,
            congregation_id: &input.congregation_id,
            name: &input.name,
            pastor_id: input.pastor_id.as_deref(),
            is_kids: if input.is_kids { 1 } else { 0 },
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    org_graph::find_network(conn, ctx, &id)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve created network".into()))
}

pub fn set_network_pastor(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    network_id: &str,
    pastor_id: Option<&str>,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        networks::table
            .filter(networks::matrix_id.eq(&ctx.matrix_id))
            .filter(networks::id.eq(network_id)),
    )
    .set(networks::pastor_id.eq(pastor_id))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

// ============================================================================
// Discipleship groups
// ============================================================================

pub fn insert_discipleship(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: CreateDiscipleshipInput,
) -> Result<Discipleship, ServiceError> {
    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());

    diesel::insert_into(discipleships::table)
        .values(&NewDiscipleship {
            id: &id,
            matrix_id: &ctx.matrix_id,
            network_id: &input.network_id,
            name: &input.name,
            discipulador_id: input.discipulador_id.as_deref(),
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    org_graph::find_discipleship(conn, ctx, &id)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve created discipleship".into()))
}

pub fn set_discipulador(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    discipleship_id: &str,
    discipulador_id: Option<&str>,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        discipleships::table
            .filter(discipleships::matrix_id.eq(&ctx.matrix_id))
            .filter(discipleships::id.eq(discipleship_id)),
    )
    .set(discipleships::discipulador_id.eq(discipulador_id))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

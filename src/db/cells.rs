//! Cell operations with tenant scoping
//!
//! A cell's standing recurrence is a weekday (0 = Sunday) plus an `HH:mm`
//! time. Both are validated on every insert.

use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{cell_leaders_in_training, cells};
use super::models::{current_timestamp, Cell, NewCell, NewLeaderInTraining};
use super::org_graph;
use crate::error::ServiceError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCellInput {
    #[serde(default)]
    pub id: Option<String>,
    pub discipleship_id: String,
    pub name: String,
    #[serde(default)]
    pub leader_id: Option<String>,
    #[serde(default)]
    pub weekday: Option<i32>,
    #[serde(default)]
    pub meeting_time: Option<String>,
}

/// Check a weekday (0..=6) and an `HH:mm` time
pub fn validate_schedule(weekday: Option<i32>, meeting_time: Option<&str>) -> Result<(), ServiceError> {
    if let Some(day) = weekday {
        if !(0..=6).contains(&day) {
            return Err(ServiceError::InvalidInput(format!(
                "weekday must be between 0 (Sunday) and 6 (Saturday), got {}",
                day
            )));
        }
    }

    if let Some(time) = meeting_time {
        let valid = time.len() == 5
            && time.as_bytes()[2] == b':'
            && chrono::NaiveTime::parse_from_str(time, "%H:%M").is_ok();
        if !valid {
            return Err(ServiceError::InvalidInput(format!("time must be HH:mm, got '{}'", time)));
        }
    }

    Ok(())
}

pub fn insert_cell(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    input: CreateCellInput,
) -> Result<Cell, ServiceError> {
    validate_schedule(input.weekday, input.meeting_time.as_deref())?;

    if input.name.trim().is_empty() {
        return Err(ServiceError::InvalidInput("cell name is required".into()));
    }

    let id = input.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = current_timestamp();

    diesel::insert_into(cells::table)
        .values(&NewCell {
            id: &id,
            matrix_id: &ctx.matrix_id,
            discipleship_id: &input.discipleship_id,
            name: &input.name,
            leader_id: input.leader_id.as_deref(),
            vice_leader_id: None,
            weekday: input.weekday,
            meeting_time: input.meeting_time.as_deref(),
            parallel_cell_id: None,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;

    org_graph::find_cell(conn, ctx, &id)?
        .ok_or_else(|| ServiceError::Internal("Failed to retrieve created cell".into()))
}

pub fn set_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    leader_id: &str,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        cells::table
            .filter(cells::matrix_id.eq(&ctx.matrix_id))
            .filter(cells::id.eq(cell_id)),
    )
    .set((cells::leader_id.eq(leader_id), cells::updated_at.eq(current_timestamp())))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

pub fn set_vice_leader(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    vice_leader_id: Option<&str>,
) -> Result<bool, ServiceError> {
    let updated = diesel::update(
        cells::table
            .filter(cells::matrix_id.eq(&ctx.matrix_id))
            .filter(cells::id.eq(cell_id)),
    )
    .set((cells::vice_leader_id.eq(vice_leader_id), cells::updated_at.eq(current_timestamp())))
    .execute(conn)
    .map_err(|e| ServiceError::Internal(format!("Update failed: {}", e)))?;

    Ok(updated > 0)
}

pub fn add_leader_in_training(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    cell_id: &str,
    member_id: &str,
) -> Result<(), ServiceError> {
    diesel::insert_into(cell_leaders_in_training::table)
        .values(&NewLeaderInTraining {
            cell_id,
            member_id,
            matrix_id: &ctx.matrix_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .map_err(|e| ServiceError::Internal(format!("Insert failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::Fixture;

    #[test]
    fn test_validate_schedule() {
        assert!(validate_schedule(Some(0), Some("07:30")).is_ok());
        assert!(validate_schedule(Some(6), Some("23:59")).is_ok());
        assert!(validate_schedule(None, None).is_ok());

        assert!(matches!(validate_schedule(Some(7), None), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_schedule(Some(-1), None), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_schedule(None, Some("24:00")), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_schedule(None, Some("7:30")), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_schedule(None, Some("19h30")), Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_insert_cell_rejects_bad_weekday() {
        let fx = Fixture::new();
        fx.chain("cong", "net", "disc", "cell", Some(2));

        let result = fx.run(|conn| {
            insert_cell(
                conn,
                &fx.ctx,
                CreateCellInput {
                    discipleship_id: "disc".into(),
                    name: "Broken".into(),
                    weekday: Some(9),
                    ..Default::default()
                },
            )
        });
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn test_leaders_in_training_edge() {
        let fx = Fixture::new();
        fx.chain("cong", "net", "disc", "cell", Some(2));
        fx.member("m", None);
        fx.leader_in_training("cell", "m");
        fx.leader_in_training("cell", "m");

        let cells = fx.run(|conn| org_graph::cells_in_training_for(conn, &fx.ctx, "m")).unwrap();
        assert_eq!(cells, vec!["cell".to_string()]);
    }
}

//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::ServiceError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), ServiceError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, ServiceError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| ServiceError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let row: Option<VersionRow> = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result(conn)
        .optional()
        .map_err(|e| ServiceError::Internal(format!("Failed to read schema_version: {}", e)))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), ServiceError> {
    conn.batch_execute(&format!(
        "DELETE FROM schema_version; INSERT INTO schema_version (version) VALUES ({});",
        version
    ))
    .map_err(|e| ServiceError::Internal(format!("Failed to set schema_version: {}", e)))
}

fn create_tables(conn: &mut SqliteConnection) -> Result<(), ServiceError> {
    conn.batch_execute(ORGANIZATION_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create organization tables: {}", e)))?;

    conn.batch_execute(MEMBERSHIP_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create membership tables: {}", e)))?;

    conn.batch_execute(REPORTS_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create report tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Congregation → network → discipleship → cell hierarchy
const ORGANIZATION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS congregations (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    name TEXT NOT NULL,
    is_principal INTEGER NOT NULL DEFAULT 0,
    government_pastor_id TEXT,
    vice_president_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS congregation_kids_leaders (
    congregation_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    matrix_id TEXT NOT NULL,
    PRIMARY KEY (congregation_id, member_id),
    FOREIGN KEY (congregation_id) REFERENCES congregations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS networks (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    congregation_id TEXT NOT NULL,
    name TEXT NOT NULL,
    pastor_id TEXT,
    is_kids INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (congregation_id) REFERENCES congregations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS discipleships (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    network_id TEXT NOT NULL,
    name TEXT NOT NULL,
    discipulador_id TEXT,
    FOREIGN KEY (network_id) REFERENCES networks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS discipleship_disciples (
    discipleship_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    matrix_id TEXT NOT NULL,
    PRIMARY KEY (discipleship_id, member_id),
    FOREIGN KEY (discipleship_id) REFERENCES discipleships(id) ON DELETE CASCADE
);

-- weekday: 0 = Sunday .. 6 = Saturday; meeting_time: HH:mm
CREATE TABLE IF NOT EXISTS cells (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    discipleship_id TEXT NOT NULL,
    name TEXT NOT NULL,
    leader_id TEXT,
    vice_leader_id TEXT,
    weekday INTEGER,
    meeting_time TEXT,
    parallel_cell_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (discipleship_id) REFERENCES discipleships(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS cell_leaders_in_training (
    cell_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    matrix_id TEXT NOT NULL,
    PRIMARY KEY (cell_id, member_id),
    FOREIGN KEY (cell_id) REFERENCES cells(id) ON DELETE CASCADE
);
"#;

/// Members, ministry ranks and roles
const MEMBERSHIP_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ministries (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT,
    gender TEXT,
    cell_id TEXT,
    ministry_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (cell_id) REFERENCES cells(id) ON DELETE SET NULL,
    FOREIGN KEY (ministry_id) REFERENCES ministries(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    name TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS member_roles (
    member_id TEXT NOT NULL,
    role_id TEXT NOT NULL,
    matrix_id TEXT NOT NULL,
    PRIMARY KEY (member_id, role_id),
    FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE,
    FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
);
"#;

/// Meeting reports and attendance
const REPORTS_SCHEMA: &str = r#"
-- report_date is the civil (UTC-3) date; created_at is the UTC instant of its start
CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY NOT NULL,
    matrix_id TEXT NOT NULL,
    cell_id TEXT NOT NULL,
    report_type TEXT NOT NULL,
    report_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    offer_amount REAL,
    FOREIGN KEY (cell_id) REFERENCES cells(id) ON DELETE CASCADE
);

-- Absence is never stored; it is the complement against cell membership
CREATE TABLE IF NOT EXISTS attendances (
    report_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    matrix_id TEXT NOT NULL,
    PRIMARY KEY (report_id, member_id),
    FOREIGN KEY (report_id) REFERENCES reports(id) ON DELETE CASCADE,
    FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_unique_day
    ON reports(matrix_id, cell_id, report_date, report_type);
CREATE INDEX IF NOT EXISTS idx_reports_cell_created ON reports(cell_id, created_at);

CREATE INDEX IF NOT EXISTS idx_networks_congregation ON networks(matrix_id, congregation_id);
CREATE INDEX IF NOT EXISTS idx_discipleships_network ON discipleships(matrix_id, network_id);
CREATE INDEX IF NOT EXISTS idx_cells_discipleship ON cells(matrix_id, discipleship_id);
CREATE INDEX IF NOT EXISTS idx_cells_leader ON cells(matrix_id, leader_id);
CREATE INDEX IF NOT EXISTS idx_members_cell ON members(matrix_id, cell_id);
CREATE INDEX IF NOT EXISTS idx_ministries_kind ON ministries(matrix_id, kind);
"#;

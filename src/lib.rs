//! Ekklesia - Cell-church hierarchy service
//!
//! Serves one church tenant (a *matrix*) or many from a single SQLite file.
//! Every row carries its `matrix_id` and every query filters on it.
//!
//! ## Hierarchy
//!
//! ```text
//! Congregation
//! └── Network (kids networks are flagged)
//!     └── Discipleship
//!         └── Cell
//!             └── Members
//! ```
//!
//! ## What it does
//!
//! - **Scopes**: which units a member may see, derived from every role edge
//! - **Access**: `canView` / `canManage` checks per cell
//! - **Attendance**: monthly per-date presence, reconstructed from reports
//! - **Multiplication**: splitting one cell into two, atomically
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.ekklesia/
//! ├── ekklesia.db            # SQLite database (Diesel)
//! └── config.toml            # Configuration
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod services;
pub mod time_window;
pub mod views;

// Re-exports
pub use config::Config;
pub use db::{Database, TenantContext};
pub use error::ServiceError;
pub use http::HttpServer;
pub use services::{AccessScope, EventBus, OrgEvent, Services};

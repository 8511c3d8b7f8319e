//! Service layer for ekklesia
//!
//! Services encapsulate business logic between HTTP handlers and repositories.
//! Each service wraps database operations with:
//! - Scope resolution and access checks for the calling member
//! - Transaction boundaries
//! - Event emission for audit trails
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (scope, access, aggregation, workflows)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod access;
pub mod attendance_service;
pub mod events;
pub mod organization_service;
pub mod response;
pub mod scope;
pub mod split_service;

// Re-exports
pub use access::{AccessService, CellAccess, ManageGrant};
pub use attendance_service::{AttendanceService, SaveReportInput, ScopeFilter};
pub use events::{EventBus, EventListener, OrgEvent};
pub use organization_service::{AssignPastorInput, OrganizationService};
pub use scope::{resolve_scope, AccessScope};
pub use split_service::{SplitCellInput, SplitResult, SplitService};

use crate::db::Database;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with a shared database pool and event bus.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub access: Arc<AccessService>,
    pub attendance: Arc<AttendanceService>,
    pub split: Arc<SplitService>,
    pub organization: Arc<OrganizationService>,
    pub events: Arc<EventBus>,
}

impl Services {
    pub fn new(db: Arc<Database>) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            access: Arc::new(AccessService::new(db.clone())),
            attendance: Arc::new(AttendanceService::new(db.clone(), events.clone())),
            split: Arc::new(SplitService::new(db.clone(), events.clone())),
            organization: Arc::new(OrganizationService::new(db, events.clone())),
            events,
        }
    }
}

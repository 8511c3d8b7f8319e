//! Event system for organization operations
//!
//! Provides an event bus for notifying listeners about mutations and access
//! grants. Useful for:
//! - Audit logging
//! - Cache invalidation in front-ends

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::access::ManageGrant;

/// Events emitted by services
#[derive(Debug, Clone)]
pub enum OrgEvent {
    CellSplit {
        matrix_id: String,
        original_cell_id: String,
        new_cell_id: String,
        moved_count: usize,
    },
    ReportSaved {
        matrix_id: String,
        cell_id: String,
        report_id: String,
        date: String,
        report_type: String,
        present_count: usize,
    },
    PrincipalCongregationChanged {
        matrix_id: String,
        congregation_id: String,
    },
    NetworkPastorAssigned {
        matrix_id: String,
        network_id: String,
        pastor_id: Option<String>,
    },
    ManageGranted {
        matrix_id: String,
        member_id: String,
        cell_id: String,
        grant: ManageGrant,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &OrgEvent);
}

/// Event bus for broadcasting organization events
pub struct EventBus {
    sender: broadcast::Sender<OrgEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: OrgEvent) {
        trace!(event = ?event, "Emitting org event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrgEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &OrgEvent) {
        match event {
            OrgEvent::CellSplit {
                matrix_id,
                original_cell_id,
                new_cell_id,
                moved_count,
            } => {
                info!(
                    matrix_id = %matrix_id,
                    original = %original_cell_id,
                    new_cell = %new_cell_id,
                    moved = moved_count,
                    "Cell split"
                );
            }
            OrgEvent::ReportSaved {
                matrix_id,
                cell_id,
                date,
                report_type,
                present_count,
                ..
            } => {
                debug!(
                    matrix_id = %matrix_id,
                    cell_id = %cell_id,
                    date = %date,
                    report_type = %report_type,
                    present = present_count,
                    "Report saved"
                );
            }
            OrgEvent::PrincipalCongregationChanged { matrix_id, congregation_id } => {
                info!(matrix_id = %matrix_id, congregation_id = %congregation_id, "Principal congregation changed");
            }
            OrgEvent::NetworkPastorAssigned {
                matrix_id,
                network_id,
                pastor_id,
            } => {
                info!(
                    matrix_id = %matrix_id,
                    network_id = %network_id,
                    pastor_id = ?pastor_id,
                    "Network pastor assigned"
                );
            }
            OrgEvent::ManageGranted {
                matrix_id,
                member_id,
                cell_id,
                grant,
            } => {
                debug!(
                    matrix_id = %matrix_id,
                    member_id = %member_id,
                    cell_id = %cell_id,
                    grant = %grant,
                    "Manage access granted"
                );
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

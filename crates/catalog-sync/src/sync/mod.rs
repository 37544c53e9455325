//! Sync orchestration: scheduling, status tracking and reconciliation.

pub mod events;
pub mod reconcile;
pub mod service;
pub mod status;

pub use events::{SyncEvent, SyncEventBroadcaster};
pub use reconcile::{reconcile_components, ReconcileSummary};
pub use service::SyncService;
pub use status::{SourceStatus, SyncStatus};

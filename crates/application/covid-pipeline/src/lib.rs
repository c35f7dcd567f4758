pub mod blocking;
pub mod clock;
pub mod inventory;
pub mod sync;
pub mod tracker;

// Re-export core engine components
pub use sync::{
    default_engine, DefaultSyncEngine, FailureReason, FreshnessCheck, ItemFailure, SkipReason,
    SkippedItem, SyncError, SyncEvent, SyncOptions, SyncRequest, SyncResult, VaccinationsOutcome,
};
pub use tracker::{ProgressTracker, TransferSnapshot};

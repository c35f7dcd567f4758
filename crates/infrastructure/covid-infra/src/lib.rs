pub mod fs;
pub mod net;

// Re-exports for convenience
pub use fs::{ensure_dir, write_atomic, write_atomic_sync, StagingError};
pub use net::{default_http_client, fetch_json, fetch_table, FetchError, FetchOutcome};

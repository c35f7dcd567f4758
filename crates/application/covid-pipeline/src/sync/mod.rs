use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use covid_core::{FreshnessMarker, WorkKey};
use std::fmt;

pub mod engine;
pub mod execute;
pub mod freshness;
pub mod planner;
pub mod remote;
pub mod storage;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on concurrent fetches.
    pub parallelism: usize,
    /// Verbose diagnostics; forces sequential execution so output stays ordered.
    pub verbose: bool,
    pub show_progress: bool,
}

impl SyncOptions {
    pub fn effective_parallelism(&self) -> usize {
        if self.verbose {
            1
        } else {
            covid_config::clamp_parallelism(self.parallelism)
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            parallelism: covid_config::default_parallelism(),
            verbose: false,
            show_progress: true,
        }
    }
}

/// Immutable input to one synchronization run. `start` and `end` only apply
/// to date-series datasets.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub target_dir: Utf8PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub force: bool,
    pub options: SyncOptions,
}

impl SyncRequest {
    pub fn new(target_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            start: None,
            end: None,
            force: false,
            options: SyncOptions::default(),
        }
    }

    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file was already on disk and `force` was not set.
    AlreadyPresent,
    /// Today's file is not published yet.
    NotPublishedYet,
    /// Today's file could not be fetched; retried on the next run.
    TodayUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub path: Utf8PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NotFound,
    Transport(String),
    Write(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => f.write_str("not found"),
            FailureReason::Transport(detail) => write!(f, "transport error: {detail}"),
            FailureReason::Write(detail) => write!(f, "write error: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub key: WorkKey,
    pub url: String,
    pub path: Utf8PathBuf,
    pub reason: FailureReason,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.key, self.url, self.reason)
    }
}

/// Per-call report; produced once and not retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    pub written: Vec<Utf8PathBuf>,
    pub skipped: Vec<SkippedItem>,
    pub failures: Vec<ItemFailure>,
}

impl SyncResult {
    /// Number of items a fetch was attempted for.
    pub fn fetched(&self) -> usize {
        let tolerated = self
            .skipped
            .iter()
            .filter(|s| s.reason != SkipReason::AlreadyPresent)
            .count();
        self.written.len() + self.failures.len() + tolerated
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn skipped_with(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|s| &s.reason == reason).count()
    }

    pub(crate) fn record_present<'a>(&mut self, present: impl IntoIterator<Item = &'a Utf8Path>) {
        self.skipped.extend(present.into_iter().map(|p| SkippedItem {
            path: p.to_owned(),
            reason: SkipReason::AlreadyPresent,
        }));
    }
}

/// Outcome of a fixed-file (vaccinations) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaccinationsOutcome {
    /// The remote marker is not newer than the local one; nothing was touched.
    UpToDate { local: FreshnessMarker },
    Synced {
        result: SyncResult,
        marker: FreshnessMarker,
        /// `false` when the pass succeeded but recording the marker failed.
        /// The next run re-fetches; the data on disk is intact.
        marker_persisted: bool,
    },
}

/// High-level error type for sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Remote fetch error: {0}")]
    Remote(String),
    #[error("Local state error: {0}")]
    Local(String),
    #[error("Freshness marker error: {0}")]
    Marker(String),
    #[error("Download of {key} from {url} failed: {reason}")]
    Fetch {
        key: WorkKey,
        url: String,
        reason: FailureReason,
    },
    #[error("{} of {} downloads failed", .0.failures.len(), .0.fetched())]
    Incomplete(Box<SyncResult>),
}

impl From<covid_core::CoreError> for SyncError {
    fn from(e: covid_core::CoreError) -> Self {
        SyncError::InvalidRequest(e.to_string())
    }
}

impl From<covid_infra::StagingError> for SyncError {
    fn from(e: covid_infra::StagingError) -> Self {
        SyncError::Local(e.to_string())
    }
}

pub use engine::DefaultSyncEngine;
pub use execute::{FailurePolicy, ItemStatus, SyncEvent};
pub use freshness::FreshnessCheck;

/// Convenience constructor for the default engine.
pub fn default_engine(client: reqwest::Client) -> DefaultSyncEngine {
    DefaultSyncEngine::new(client)
}

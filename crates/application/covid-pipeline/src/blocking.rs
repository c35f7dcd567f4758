//! Synchronous entry points for callers without an async runtime.
//!
//! Every call blocks until the pass completes or fails. Calling one from
//! inside a tokio runtime is refused with [`SyncError::Local`].

use camino::Utf8Path;
use chrono::NaiveDate;
use covid_config::Settings;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing::info;

use crate::sync::{
    DefaultSyncEngine, SyncError, SyncEvent, SyncOptions, SyncRequest, SyncResult,
    VaccinationsOutcome,
};
use crate::tracker::ProgressTracker;

static RUNTIME: OnceLock<Result<tokio::runtime::Runtime, String>> = OnceLock::new();

fn runtime() -> Result<&'static tokio::runtime::Runtime, SyncError> {
    // block_on panics when nested in another runtime.
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(SyncError::Local(
            "blocking sync called from inside an async runtime".into(),
        ));
    }
    match RUNTIME.get_or_init(|| tokio::runtime::Runtime::new().map_err(|e| e.to_string())) {
        Ok(rt) => Ok(rt),
        Err(message) => Err(SyncError::Local(format!("async runtime: {message}"))),
    }
}

fn engine(settings: &Settings) -> Result<DefaultSyncEngine, SyncError> {
    let client = covid_infra::net::default_http_client()
        .map_err(|e| SyncError::Remote(format!("http client: {e}")))?;
    Ok(DefaultSyncEngine::with_base_urls(
        client,
        &settings.contagions_base_url,
        &settings.vaccinations_base_url,
    ))
}

fn options(show_progress: bool) -> SyncOptions {
    SyncOptions {
        show_progress,
        ..SyncOptions::default()
    }
}

type ProgressLogger = (
    Option<mpsc::Sender<SyncEvent>>,
    Option<tokio::task::JoinHandle<()>>,
);

/// Logs a line per finished item while the pass runs.
fn progress_logger(enabled: bool) -> ProgressLogger {
    if !enabled {
        return (None, None);
    }
    let (tx, mut rx) = mpsc::channel::<SyncEvent>(100);
    let handle = tokio::spawn(async move {
        let mut tracker = ProgressTracker::new();
        while let Some(event) = rx.recv().await {
            let completed = matches!(event, SyncEvent::Completed { .. });
            tracker.update(event);
            if completed {
                let snap = tracker.get_snapshot();
                info!("{}/{} files", snap.completed_items(), snap.total_items);
            }
        }
    });
    (Some(tx), Some(handle))
}

/// Sync the contagions dataset from the official mirror.
pub fn sync_contagions(
    target_dir: &Utf8Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
    show_progress: bool,
) -> Result<SyncResult, SyncError> {
    sync_contagions_with(&Settings::default(), target_dir, start, end, force, show_progress)
}

/// Sync the contagions dataset from the mirror named in `settings`.
/// `settings.data_dir` is ignored in favour of `target_dir`.
pub fn sync_contagions_with(
    settings: &Settings,
    target_dir: &Utf8Path,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
    show_progress: bool,
) -> Result<SyncResult, SyncError> {
    let rt = runtime()?;
    let engine = engine(settings)?;
    let req = SyncRequest::new(target_dir)
        .with_range(start, end)
        .with_force(force)
        .with_options(options(show_progress));

    rt.block_on(async {
        let (tx, logger) = progress_logger(req.options.show_progress);
        let result = engine.sync_contagions(&req, tx).await;
        if let Some(handle) = logger {
            let _ = handle.await;
        }
        result
    })
}

/// Sync the vaccinations dataset from the official mirror.
pub fn sync_vaccinations(
    target_dir: &Utf8Path,
    force: bool,
    show_progress: bool,
) -> Result<VaccinationsOutcome, SyncError> {
    sync_vaccinations_with(&Settings::default(), target_dir, force, show_progress)
}

pub fn sync_vaccinations_with(
    settings: &Settings,
    target_dir: &Utf8Path,
    force: bool,
    show_progress: bool,
) -> Result<VaccinationsOutcome, SyncError> {
    let rt = runtime()?;
    let engine = engine(settings)?;
    let req = SyncRequest::new(target_dir)
        .with_force(force)
        .with_options(options(show_progress));

    rt.block_on(async {
        let (tx, logger) = progress_logger(req.options.show_progress);
        let result = engine.sync_vaccinations(&req, tx).await;
        if let Some(handle) = logger {
            let _ = handle.await;
        }
        result
    })
}

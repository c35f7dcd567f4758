use camino::Utf8Path;
use covid_core::plan::parse_day;
use covid_core::{DatasetSpec, FileLayout, SyncPlan};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::sync::execute::{DefaultPlanExecutor, FailurePolicy, PlanExecutor, SyncEvent};
use crate::sync::freshness::{check_freshness, FreshnessCheck};
use crate::sync::planner::{plan_date_series, plan_fixed};
use crate::sync::remote::{HttpTableSource, TableSource};
use crate::sync::storage::{FileMarkerStore, MarkerStore};
use crate::sync::{SyncError, SyncRequest, SyncResult, VaccinationsOutcome};

pub struct DefaultSyncEngine {
    contagions: DatasetSpec,
    vaccinations: DatasetSpec,
    source: Arc<dyn TableSource>,
    executor: Box<dyn PlanExecutor>,
    marker_store: Arc<dyn MarkerStore>,
    clock: Arc<dyn Clock>,
}

impl DefaultSyncEngine {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_urls(
            client,
            covid_config::CONTAGIONS_BASE_URL,
            covid_config::VACCINATIONS_BASE_URL,
        )
    }

    /// Same as [`DefaultSyncEngine::new`] but pointed at other mirrors.
    pub fn with_base_urls(
        client: reqwest::Client,
        contagions_base: &str,
        vaccinations_base: &str,
    ) -> Self {
        let source: Arc<dyn TableSource> = Arc::new(HttpTableSource::new(client));
        Self::with_components(
            DatasetSpec::contagions(contagions_base),
            DatasetSpec::vaccinations(
                vaccinations_base,
                covid_config::vaccination_files(),
                covid_config::VACCINATIONS_MARKER_FILE,
            ),
            source.clone(),
            Box::new(DefaultPlanExecutor::new(source)),
            Arc::new(FileMarkerStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_components(
        contagions: DatasetSpec,
        vaccinations: DatasetSpec,
        source: Arc<dyn TableSource>,
        executor: Box<dyn PlanExecutor>,
        marker_store: Arc<dyn MarkerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            contagions,
            vaccinations,
            source,
            executor,
            marker_store,
            clock,
        }
    }

    /// Pure planning step for the contagions dataset. Reads the disk, no network.
    pub fn plan_contagions(&self, req: &SyncRequest) -> Result<SyncPlan, SyncError> {
        let default_start = parse_day(covid_config::CONTAGIONS_START_DATE)?;
        plan_date_series(&self.contagions, req, default_start, self.clock.today())
    }

    /// Fetch every missing daily file of the contagions dataset.
    ///
    /// Failures on past dates are collected and reported together through
    /// [`SyncError::Incomplete`]; files written by the same run stay on disk.
    pub async fn sync_contagions(
        &self,
        req: &SyncRequest,
        progress_tx: Option<Sender<SyncEvent>>,
    ) -> Result<SyncResult, SyncError> {
        prepare_dirs(&req.target_dir, &self.contagions).await?;

        let plan = self.plan_contagions(req)?;
        notify_planned(&progress_tx, &plan).await;

        let mut result = if plan.is_empty() {
            SyncResult::default()
        } else {
            self.executor
                .execute(
                    plan.pending,
                    req.options.effective_parallelism(),
                    FailurePolicy::Aggregate,
                    progress_tx,
                )
                .await?
        };
        result.record_present(plan.present.iter().map(|p| p.as_path()));

        info!(
            "Contagions: {} written, {} skipped, {} failed",
            result.written.len(),
            result.skipped.len(),
            result.failures.len()
        );

        if !result.is_clean() {
            return Err(SyncError::Incomplete(Box::new(result)));
        }
        Ok(result)
    }

    /// Compare the remote marker against the local one without touching data files.
    pub async fn check_vaccinations(&self, req: &SyncRequest) -> Result<FreshnessCheck, SyncError> {
        let (remote_url, local_path) = self.marker_locations(&req.target_dir)?;
        check_freshness(
            &*self.source,
            &*self.marker_store,
            &remote_url,
            &local_path,
        )
        .await
    }

    /// Refresh the vaccinations dataset when the remote marker is newer.
    ///
    /// All files must be fetched before the marker is recorded. The first
    /// failure aborts the pass and the marker stays untouched, so the next
    /// run retries.
    pub async fn sync_vaccinations(
        &self,
        req: &SyncRequest,
        progress_tx: Option<Sender<SyncEvent>>,
    ) -> Result<VaccinationsOutcome, SyncError> {
        prepare_dirs(&req.target_dir, &self.vaccinations).await?;

        let (remote_url, local_path) = self.marker_locations(&req.target_dir)?;
        let check = check_freshness(
            &*self.source,
            &*self.marker_store,
            &remote_url,
            &local_path,
        )
        .await?;

        if !check.should_proceed(req.force) {
            info!("Vaccinations are up to date ({})", check.local.timestamp);
            return Ok(VaccinationsOutcome::UpToDate { local: check.local });
        }

        let plan = plan_fixed(&self.vaccinations, req, &check.remote)?;
        notify_planned(&progress_tx, &plan).await;

        let mut result = if plan.is_empty() {
            SyncResult::default()
        } else {
            self.executor
                .execute(
                    plan.pending,
                    req.options.effective_parallelism(),
                    FailurePolicy::FailFast,
                    progress_tx,
                )
                .await?
        };
        result.record_present(plan.present.iter().map(|p| p.as_path()));

        let marker_persisted = match self.marker_store.save_marker(&local_path, &check.remote) {
            Ok(()) => true,
            Err(e) => {
                warn!("Vaccinations synced but the marker was not saved: {}", e);
                false
            }
        };

        info!(
            "Vaccinations: {} written, {} skipped, marker {}",
            result.written.len(),
            result.skipped.len(),
            check.remote.timestamp
        );

        Ok(VaccinationsOutcome::Synced {
            result,
            marker: check.remote,
            marker_persisted,
        })
    }

    fn marker_locations(
        &self,
        target_dir: &Utf8Path,
    ) -> Result<(String, camino::Utf8PathBuf), SyncError> {
        let FileLayout::Fixed { marker, .. } = &self.vaccinations.layout else {
            return Err(SyncError::InvalidRequest(
                "vaccinations dataset has no freshness marker".into(),
            ));
        };
        let url = self
            .vaccinations
            .marker_url()
            .ok_or_else(|| SyncError::InvalidRequest("missing marker url".into()))?;
        Ok((url, target_dir.join(marker)))
    }
}

/// Create the target directory and the per-scope subdirectories before any
/// fetch is scheduled.
async fn prepare_dirs(root: &Utf8Path, spec: &DatasetSpec) -> Result<(), SyncError> {
    covid_infra::fs::ensure_dir(root).await?;
    if let FileLayout::DateSeries { scopes } = &spec.layout {
        for scope in scopes {
            covid_infra::fs::ensure_dir(&root.join(scope.subdir())).await?;
        }
    }
    Ok(())
}

async fn notify_planned(tx: &Option<Sender<SyncEvent>>, plan: &SyncPlan) {
    if let Some(t) = tx {
        let _ = t
            .send(SyncEvent::Planned {
                pending: plan.pending.len(),
                present: plan.present.len(),
            })
            .await;
    }
}

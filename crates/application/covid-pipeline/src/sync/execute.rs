use camino::Utf8PathBuf;
use covid_core::{WorkItem, WorkKey};
use covid_infra::net::FetchOutcome;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, warn};

use crate::sync::remote::TableSource;
use crate::sync::{FailureReason, ItemFailure, SkipReason, SkippedItem, SyncError, SyncResult};

/// How the executor reacts to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure, finish the other items, report everything at the end.
    Aggregate,
    /// Abort on the first failure; in-flight siblings are dropped.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Written { bytes: u64 },
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Planned { pending: usize, present: usize },
    Started { id: usize, key: WorkKey },
    Completed { id: usize, status: ItemStatus },
}

#[async_trait::async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute(
        &self,
        items: Vec<WorkItem>,
        parallelism: usize,
        policy: FailurePolicy,
        progress_tx: Option<Sender<SyncEvent>>,
    ) -> Result<SyncResult, SyncError>;
}

/// Fetch-then-persist executor over a bounded pool of concurrent fetches.
pub struct DefaultPlanExecutor {
    source: Arc<dyn TableSource>,
}

impl DefaultPlanExecutor {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self { source }
    }
}

enum ItemOutcome {
    Written(Utf8PathBuf),
    Skipped(SkippedItem),
    Failed(ItemFailure),
}

#[async_trait::async_trait]
impl PlanExecutor for DefaultPlanExecutor {
    async fn execute(
        &self,
        items: Vec<WorkItem>,
        parallelism: usize,
        policy: FailurePolicy,
        progress_tx: Option<Sender<SyncEvent>>,
    ) -> Result<SyncResult, SyncError> {
        let source = &*self.source;
        let mut outcomes = stream::iter(items.into_iter().enumerate())
            .map(move |(id, item)| {
                let tx = progress_tx.clone();
                async move { run_item(source, id, item, tx).await }
            })
            .buffer_unordered(parallelism.max(1));

        // Single owner of the aggregate; workers only hand back their outcome.
        let mut result = SyncResult::default();
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                ItemOutcome::Written(path) => result.written.push(path),
                ItemOutcome::Skipped(skipped) => result.skipped.push(skipped),
                ItemOutcome::Failed(failure) => {
                    if policy == FailurePolicy::FailFast {
                        return Err(SyncError::Fetch {
                            key: failure.key,
                            url: failure.url,
                            reason: failure.reason,
                        });
                    }
                    result.failures.push(failure);
                }
            }
        }

        Ok(result)
    }
}

async fn run_item(
    source: &dyn TableSource,
    id: usize,
    item: WorkItem,
    tx: Option<Sender<SyncEvent>>,
) -> ItemOutcome {
    if let Some(ref t) = tx {
        let _ = t
            .send(SyncEvent::Started {
                id,
                key: item.key.clone(),
            })
            .await;
    }

    let (outcome, status) = match source.fetch_table(&item.url).await {
        FetchOutcome::Success(table) => {
            match covid_infra::fs::write_atomic(&item.local_path, &table.bytes).await {
                Ok(()) => {
                    debug!(
                        "New file '{}' ({} rows)",
                        item.local_path, table.rows
                    );
                    let bytes = table.len_bytes();
                    (
                        ItemOutcome::Written(item.local_path),
                        ItemStatus::Written { bytes },
                    )
                }
                Err(e) => {
                    error!("Unable to write '{}': {}", item.local_path, e);
                    (
                        failed(item, FailureReason::Write(e.to_string())),
                        ItemStatus::Failed,
                    )
                }
            }
        }
        FetchOutcome::NotFound if item.is_today => {
            debug!("'{}' not published yet, will retry on next run", item.url);
            (
                skipped(item, SkipReason::NotPublishedYet),
                ItemStatus::Skipped,
            )
        }
        FetchOutcome::TransportError(detail) if item.is_today => {
            warn!("Unable to download '{}': {}", item.url, detail);
            (
                skipped(item, SkipReason::TodayUnavailable(detail)),
                ItemStatus::Skipped,
            )
        }
        FetchOutcome::NotFound => {
            error!("Unable to download '{}': not found", item.url);
            (failed(item, FailureReason::NotFound), ItemStatus::Failed)
        }
        FetchOutcome::TransportError(detail) => {
            error!("Unable to download '{}': {}", item.url, detail);
            (
                failed(item, FailureReason::Transport(detail)),
                ItemStatus::Failed,
            )
        }
    };

    if let Some(ref t) = tx {
        let _ = t.send(SyncEvent::Completed { id, status }).await;
    }

    outcome
}

fn skipped(item: WorkItem, reason: SkipReason) -> ItemOutcome {
    ItemOutcome::Skipped(SkippedItem {
        path: item.local_path,
        reason,
    })
}

fn failed(item: WorkItem, reason: FailureReason) -> ItemOutcome {
    ItemOutcome::Failed(ItemFailure {
        key: item.key,
        url: item.url,
        path: item.local_path,
        reason,
    })
}

use crate::sync::remote::TableSource;
use crate::sync::storage::MarkerStore;
use crate::sync::SyncError;
use camino::Utf8Path;
use covid_core::FreshnessMarker;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessCheck {
    pub remote: FreshnessMarker,
    /// Epoch sentinel when no marker was ever persisted.
    pub local: FreshnessMarker,
}

impl FreshnessCheck {
    /// Work is needed only when forced or when the remote is strictly newer.
    pub fn should_proceed(&self, force: bool) -> bool {
        force || self.remote.is_newer_than(&self.local)
    }
}

/// Fetch the remote marker (never cached) and load the local one.
pub async fn check_freshness(
    source: &dyn TableSource,
    store: &dyn MarkerStore,
    remote_marker_url: &str,
    local_marker_path: &Utf8Path,
) -> Result<FreshnessCheck, SyncError> {
    let local = store
        .load_marker(local_marker_path)
        .map_err(SyncError::Marker)?
        .unwrap_or_else(FreshnessMarker::epoch);

    let remote = source.fetch_marker(remote_marker_url).await?;

    debug!(
        "Update timestamps: remote: '{}', local: '{}'",
        remote.timestamp, local.timestamp
    );

    Ok(FreshnessCheck { remote, local })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(day: u32) -> FreshnessMarker {
        FreshnessMarker::new(Utc.with_ymd_and_hms(2022, 1, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn proceeds_only_on_strictly_newer_remote() {
        let newer = FreshnessCheck {
            remote: at(2),
            local: at(1),
        };
        let same = FreshnessCheck {
            remote: at(1),
            local: at(1),
        };
        let older = FreshnessCheck {
            remote: at(1),
            local: at(2),
        };

        assert!(newer.should_proceed(false));
        assert!(!same.should_proceed(false));
        assert!(!older.should_proceed(false));
    }

    #[test]
    fn force_always_proceeds() {
        let same = FreshnessCheck {
            remote: at(1),
            local: at(1),
        };
        assert!(same.should_proceed(true));
    }

    #[test]
    fn first_run_proceeds_against_epoch() {
        let first = FreshnessCheck {
            remote: at(1),
            local: FreshnessMarker::epoch(),
        };
        assert!(first.should_proceed(false));
    }
}

use crate::sync::{SyncError, SyncRequest};
use camino::Utf8Path;
use chrono::{DateTime, NaiveDate, Utc};
use covid_core::plan::{expected_date_series, expected_fixed, prune};
use covid_core::{DatasetSpec, FileLayout, FreshnessMarker, SyncPlan};
use tracing::{debug, warn};

/// Plan a date-series run: enumerate `[start, end]` (end defaults to today
/// and is clamped to it) and prune files already on disk unless forced.
pub fn plan_date_series(
    spec: &DatasetSpec,
    req: &SyncRequest,
    default_start: NaiveDate,
    today: NaiveDate,
) -> Result<SyncPlan, SyncError> {
    if !matches!(spec.layout, FileLayout::DateSeries { .. }) {
        return Err(SyncError::InvalidRequest(format!(
            "{} is not a date-series dataset",
            spec.kind
        )));
    }

    let start = req.start.unwrap_or(default_start);
    let mut end = req.end.unwrap_or(today);
    if end > today {
        warn!("End date {} is in the future, clamping to {}", end, today);
        end = today;
    }

    let expected = expected_date_series(spec, &req.target_dir, start, end, today)?;
    let plan = prune(expected, req.force, |item| item.local_path.is_file());

    debug!(
        "Planned {}: {} pending, {} present (start = {}, end = {}, force = {})",
        spec.kind,
        plan.pending.len(),
        plan.present.len(),
        start,
        end,
        req.force
    );
    Ok(plan)
}

/// Plan a fixed-file run once the freshness gate has opened.
///
/// A present file is kept only if it was written after the remote marker;
/// anything older predates the publication and is re-fetched.
pub fn plan_fixed(
    spec: &DatasetSpec,
    req: &SyncRequest,
    remote: &FreshnessMarker,
) -> Result<SyncPlan, SyncError> {
    if !matches!(spec.layout, FileLayout::Fixed { .. }) {
        return Err(SyncError::InvalidRequest(format!(
            "{} is not a fixed-file dataset",
            spec.kind
        )));
    }

    let expected = expected_fixed(spec, &req.target_dir)?;
    let plan = prune(expected, req.force, |item| {
        written_after(&item.local_path, remote)
    });

    debug!(
        "Planned {}: {} pending, {} present (force = {})",
        spec.kind,
        plan.pending.len(),
        plan.present.len(),
        req.force
    );
    Ok(plan)
}

fn written_after(path: &Utf8Path, marker: &FreshnessMarker) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    match meta.modified() {
        Ok(mtime) => DateTime::<Utc>::from(mtime) > marker.timestamp,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn root(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    fn vaccinations() -> DatasetSpec {
        DatasetSpec::vaccinations(
            "https://x/dati",
            vec!["platea.csv".into(), "consegne-vaccini-latest.csv".into()],
            "last-update-dataset.json",
        )
    }

    #[test]
    fn end_defaults_to_today() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatasetSpec::contagions("https://x");
        let req = SyncRequest::new(root(&dir)).with_range(Some(d(2021, 5, 1)), None);

        let plan = plan_date_series(&spec, &req, d(2020, 2, 24), d(2021, 5, 3)).unwrap();
        assert_eq!(plan.pending.len(), 6);
        assert_eq!(plan.pending.iter().filter(|i| i.is_today).count(), 2);
    }

    #[test]
    fn future_end_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatasetSpec::contagions("https://x");
        let req =
            SyncRequest::new(root(&dir)).with_range(Some(d(2021, 5, 1)), Some(d(2021, 6, 1)));

        let plan = plan_date_series(&spec, &req, d(2020, 2, 24), d(2021, 5, 2)).unwrap();
        assert_eq!(plan.pending.len(), 4);
    }

    #[test]
    fn reversed_range_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatasetSpec::contagions("https://x");
        let req =
            SyncRequest::new(root(&dir)).with_range(Some(d(2021, 5, 3)), Some(d(2021, 5, 1)));

        assert!(matches!(
            plan_date_series(&spec, &req, d(2020, 2, 24), d(2022, 1, 1)),
            Err(SyncError::InvalidRequest(_))
        ));
    }

    #[test]
    fn present_files_are_pruned_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DatasetSpec::contagions("https://x");
        let req =
            SyncRequest::new(root(&dir)).with_range(Some(d(2021, 5, 1)), Some(d(2021, 5, 2)));

        let first = plan_date_series(&spec, &req, d(2020, 2, 24), d(2022, 1, 1)).unwrap();
        let existing = &first.pending[0].local_path;
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(existing, b"data\n").unwrap();

        let second = plan_date_series(&spec, &req, d(2020, 2, 24), d(2022, 1, 1)).unwrap();
        assert_eq!(second.pending.len(), 3);
        assert_eq!(second.present, vec![existing.clone()]);

        let forced = plan_date_series(&spec, &req.clone().with_force(true), d(2020, 2, 24), d(2022, 1, 1))
            .unwrap();
        assert_eq!(forced.pending.len(), 4);
        assert!(forced.present.is_empty());
    }

    #[test]
    fn fixed_files_older_than_marker_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let r = root(&dir);
        let old = r.join("platea.csv");
        let fresh = r.join("consegne-vaccini-latest.csv");
        std::fs::write(&old, b"a\n").unwrap();
        std::fs::write(&fresh, b"a\n").unwrap();

        let marker = FreshnessMarker::new(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());
        let before = filetime::FileTime::from_unix_time(marker.timestamp.timestamp() - 3600, 0);
        filetime::set_file_mtime(&old, before).unwrap();

        let plan = plan_fixed(&vaccinations(), &SyncRequest::new(r.clone()), &marker).unwrap();
        assert_eq!(plan.pending.len(), 1);
        assert_eq!(plan.pending[0].local_path, old);
        assert_eq!(plan.present, vec![fresh]);
    }

    #[test]
    fn layout_mismatch_is_rejected() {
        let req = SyncRequest::new("/tmp/x");
        assert!(plan_fixed(&DatasetSpec::contagions("https://x"), &req, &FreshnessMarker::epoch())
            .is_err());
        assert!(plan_date_series(&vaccinations(), &req, d(2020, 1, 1), d(2020, 1, 2)).is_err());
    }
}

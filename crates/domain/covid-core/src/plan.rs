use crate::path_utils::DatasetPath;
use crate::{CoreError, DatasetSpec, FileLayout, SyncPlan, WorkItem, WorkKey};
use camino::Utf8Path;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Every calendar day in `[start, end]`, both ends included.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, CoreError> {
    if start > end {
        return Err(CoreError::InvalidRange { start, end });
    }
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Parse a user supplied date, dropping any time-of-day component.
pub fn parse_day(input: &str) -> Result<NaiveDate, CoreError> {
    let s = input.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(CoreError::InvalidDate(input.to_string()))
}

/// Enumerate the expected files of a date-series dataset, date-major.
///
/// Items whose date equals `today` are flagged `is_today`. Fixed layouts
/// produce an empty list.
pub fn expected_date_series(
    spec: &DatasetSpec,
    root: &Utf8Path,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<WorkItem>, CoreError> {
    let FileLayout::DateSeries { scopes } = &spec.layout else {
        return Ok(Vec::new());
    };

    let days = date_range(start, end)?;
    let mut items = Vec::with_capacity(days.len() * scopes.len());
    for date in days {
        for scope in scopes {
            let name = DatasetPath::contagions_file_name(*scope, date);
            items.push(WorkItem {
                url: DatasetPath::remote_url(&spec.base_url, &[scope.subdir(), &name]),
                local_path: root.join(scope.subdir()).join(&name),
                key: WorkKey::Date {
                    scope: *scope,
                    date,
                },
                is_today: date == today,
            });
        }
    }
    Ok(items)
}

/// Enumerate the files of a fixed-file dataset. The set is all or nothing:
/// one unsafe name rejects the whole layout.
pub fn expected_fixed(spec: &DatasetSpec, root: &Utf8Path) -> Result<Vec<WorkItem>, CoreError> {
    let FileLayout::Fixed { files, .. } = &spec.layout else {
        return Ok(Vec::new());
    };

    files
        .iter()
        .map(|name| {
            if !DatasetPath::verify_safe(name) {
                return Err(CoreError::UnsafeFileName(name.clone()));
            }
            Ok(WorkItem {
                url: DatasetPath::remote_url(&spec.base_url, &[name]),
                local_path: root.join(name),
                key: WorkKey::Name(name.clone()),
                is_today: false,
            })
        })
        .collect()
}

/// Split expected items into pending work and already-present files.
///
/// With `force` nothing is pruned. Otherwise an item is dropped from the
/// work list when `is_current` reports its local file as up to date.
pub fn prune<F>(expected: Vec<WorkItem>, force: bool, is_current: F) -> SyncPlan
where
    F: Fn(&WorkItem) -> bool,
{
    if force {
        return SyncPlan {
            pending: expected,
            present: Vec::new(),
        };
    }

    let mut plan = SyncPlan::default();
    for item in expected {
        if is_current(&item) {
            plan.present.push(item.local_path);
        } else {
            plan.pending.push(item);
        }
    }
    plan
}

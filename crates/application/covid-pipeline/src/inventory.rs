//! Read side of the synchronized data directories: which files are on disk,
//! without touching the network.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use covid_core::path_utils::DatasetPath;
use covid_core::plan::date_range;
use covid_core::{FreshnessMarker, Scope};
use serde::Serialize;
use std::fs;

use crate::sync::storage::{FileMarkerStore, MarkerStore};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("read {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeInventory {
    pub scope: Scope,
    pub files: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    /// Days between `first` and `last` with no file.
    pub missing: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContagionsInventory {
    pub root: Utf8PathBuf,
    pub scopes: Vec<ScopeInventory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixedFileEntry {
    pub name: String,
    pub present: bool,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaccinationsInventory {
    pub root: Utf8PathBuf,
    pub files: Vec<FixedFileEntry>,
    pub marker: Option<FreshnessMarker>,
}

impl VaccinationsInventory {
    pub fn is_complete(&self) -> bool {
        self.marker.is_some() && self.files.iter().all(|f| f.present)
    }
}

/// Contagion files of one scope, sorted by date. A missing directory is an
/// empty listing; names that do not follow the naming scheme are ignored.
pub fn contagion_files(
    root: &Utf8Path,
    scope: Scope,
) -> Result<Vec<(NaiveDate, Utf8PathBuf)>, InventoryError> {
    let dir = root.join(scope.subdir());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = dir.read_dir_utf8().map_err(|source| InventoryError::Io {
        path: dir.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| InventoryError::Io {
            path: dir.clone(),
            source,
        })?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(date) = DatasetPath::parse_contagions_file_name(scope, entry.file_name()) {
            files.push((date, entry.path().to_owned()));
        }
    }
    files.sort_by_key(|(date, _)| *date);
    Ok(files)
}

pub fn scan_contagions(root: &Utf8Path) -> Result<ContagionsInventory, InventoryError> {
    let mut scopes = Vec::with_capacity(Scope::ALL.len());
    for scope in Scope::ALL {
        let files = contagion_files(root, scope)?;
        let first = files.first().map(|(d, _)| *d);
        let last = files.last().map(|(d, _)| *d);

        let missing = match (first, last) {
            (Some(first), Some(last)) => {
                let have: std::collections::HashSet<NaiveDate> =
                    files.iter().map(|(d, _)| *d).collect();
                date_range(first, last)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|d| !have.contains(d))
                    .collect()
            }
            _ => Vec::new(),
        };

        scopes.push(ScopeInventory {
            scope,
            files: files.len(),
            first,
            last,
            missing,
        });
    }

    Ok(ContagionsInventory {
        root: root.to_owned(),
        scopes,
    })
}

pub fn scan_vaccinations(root: &Utf8Path) -> Result<VaccinationsInventory, InventoryError> {
    let files = covid_config::VACCINATION_FILES
        .iter()
        .map(|name| {
            let meta = fs::metadata(root.join(name)).ok().filter(|m| m.is_file());
            FixedFileEntry {
                name: name.to_string(),
                present: meta.is_some(),
                size: meta.map(|m| m.len()),
            }
        })
        .collect();

    let marker = FileMarkerStore::new()
        .load_marker(&root.join(covid_config::VACCINATIONS_MARKER_FILE))
        .map_err(InventoryError::Marker)?;

    Ok(VaccinationsInventory {
        root: root.to_owned(),
        files,
        marker,
    })
}

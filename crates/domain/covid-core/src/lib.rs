use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod marker;
pub mod path_utils;
pub mod plan;
pub mod table;

pub use marker::FreshnessMarker;
pub use table::Table;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid table: {0}")]
    InvalidTable(String),
    #[error("invalid freshness marker: {0}")]
    InvalidMarker(String),
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid date '{0}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("unsafe file name '{0}'")]
    UnsafeFileName(String),
}

/// Dataset families known to the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Contagions,
    Vaccinations,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Contagions => "contagions",
            DatasetKind::Vaccinations => "vaccinations",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic scope of a date-series file. Each scope maps to its own
/// subdirectory both remotely and locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    National,
    Regional,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::National, Scope::Regional];

    /// Directory name, identical on the remote and on disk.
    pub fn subdir(&self) -> &'static str {
        match self {
            Scope::National => "dati-andamento-nazionale",
            Scope::Regional => "dati-regioni",
        }
    }

    /// Tag embedded in file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Scope::National => "andamento-nazionale",
            Scope::Regional => "regioni",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::National => f.write_str("national"),
            Scope::Regional => f.write_str("regional"),
        }
    }
}

/// Shape of the files a dataset produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLayout {
    /// One file per calendar day per scope.
    DateSeries { scopes: Vec<Scope> },
    /// A static list of file names, gated by a freshness marker.
    Fixed { files: Vec<String>, marker: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    pub kind: DatasetKind,
    pub base_url: String,
    pub layout: FileLayout,
}

impl DatasetSpec {
    pub fn contagions(base_url: impl Into<String>) -> Self {
        Self {
            kind: DatasetKind::Contagions,
            base_url: base_url.into(),
            layout: FileLayout::DateSeries {
                scopes: Scope::ALL.to_vec(),
            },
        }
    }

    pub fn vaccinations(
        base_url: impl Into<String>,
        files: Vec<String>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            kind: DatasetKind::Vaccinations,
            base_url: base_url.into(),
            layout: FileLayout::Fixed {
                files,
                marker: marker.into(),
            },
        }
    }

    /// Remote URL of the freshness marker, if the layout has one.
    pub fn marker_url(&self) -> Option<String> {
        match &self.layout {
            FileLayout::Fixed { marker, .. } => {
                Some(path_utils::DatasetPath::remote_url(&self.base_url, &[marker]))
            }
            FileLayout::DateSeries { .. } => None,
        }
    }
}

/// Logical identity of a work item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkKey {
    Date { scope: Scope, date: NaiveDate },
    Name(String),
}

impl fmt::Display for WorkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkKey::Date { scope, date } => write!(f, "{scope} {date}"),
            WorkKey::Name(name) => f.write_str(name),
        }
    }
}

/// One planned fetch-and-persist unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: String,
    pub local_path: Utf8PathBuf,
    pub key: WorkKey,
    /// The logical date equals the current date; a fetch miss is tolerated.
    pub is_today: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub pending: Vec<WorkItem>,
    /// Expected files already on disk and left out of `pending`.
    pub present: Vec<Utf8PathBuf>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

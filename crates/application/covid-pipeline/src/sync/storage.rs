use camino::Utf8Path;
use covid_core::FreshnessMarker;
use tracing::warn;

/// Durable record of the last successfully synced freshness marker.
pub trait MarkerStore: Send + Sync {
    fn load_marker(&self, path: &Utf8Path) -> Result<Option<FreshnessMarker>, String>;
    fn save_marker(&self, path: &Utf8Path, marker: &FreshnessMarker) -> Result<(), String>;
}

/// Stores the marker as JSON next to the dataset it describes.
pub struct FileMarkerStore;

impl FileMarkerStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileMarkerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerStore for FileMarkerStore {
    fn load_marker(&self, path: &Utf8Path) -> Result<Option<FreshnessMarker>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(path).map_err(|e| format!("read marker {path}: {e}"))?;
        match FreshnessMarker::from_json(&data) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                // Treated as never synced; the next successful pass overwrites it.
                warn!("Ignoring unreadable marker '{}': {}", path, e);
                Ok(None)
            }
        }
    }

    fn save_marker(&self, path: &Utf8Path, marker: &FreshnessMarker) -> Result<(), String> {
        let data =
            serde_json::to_vec_pretty(marker).map_err(|e| format!("serialize marker: {e}"))?;
        covid_infra::fs::write_atomic_sync(path, &data)
            .map_err(|e| format!("persist marker: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use chrono::{TimeZone, Utc};

    fn marker_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join("last-update-dataset.json")).unwrap()
    }

    #[test]
    fn missing_marker_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileMarkerStore::new().load_marker(&marker_path(&dir)).unwrap(), None);
    }

    #[test]
    fn saved_marker_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = marker_path(&dir);
        let store = FileMarkerStore::new();
        let marker = FreshnessMarker::new(Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap());

        store.save_marker(&path, &marker).unwrap();
        assert_eq!(store.load_marker(&path).unwrap(), Some(marker));
    }

    #[test]
    fn corrupt_marker_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = marker_path(&dir);
        std::fs::write(&path, b"{ truncated").unwrap();

        assert_eq!(FileMarkerStore::new().load_marker(&path).unwrap(), None);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nope").join("m.json")).unwrap();
        let marker = FreshnessMarker::epoch();

        assert!(FileMarkerStore::new().save_marker(&path, &marker).is_err());
        assert!(!path.exists());
    }
}

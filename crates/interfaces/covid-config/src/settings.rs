use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

const QUALIFIER: &str = "org";
const ORG: &str = "covid";
const APP: &str = "dashboard";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot determine config directory")]
    NoConfigDir,
    #[error("config path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
    #[error("read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// User overridable settings. Every field is optional in the file; missing
/// ones take the built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub data_dir: Utf8PathBuf,
    pub contagions_base_url: String,
    pub vaccinations_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: Utf8PathBuf::from(crate::DEFAULT_DATA_DIR),
            contagions_base_url: crate::CONTAGIONS_BASE_URL.to_string(),
            vaccinations_base_url: crate::VACCINATIONS_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    /// `<platform config dir>/settings.json`.
    pub fn default_path() -> Result<Utf8PathBuf, SettingsError> {
        let proj_dirs =
            ProjectDirs::from(QUALIFIER, ORG, APP).ok_or(SettingsError::NoConfigDir)?;
        let path = proj_dirs.config_dir().join(SETTINGS_FILE);
        Utf8PathBuf::from_path_buf(path)
            .map_err(|p| SettingsError::NonUtf8Path(p.display().to_string()))
    }

    /// Load settings from `path`; an absent file yields the defaults.
    pub fn load_from(path: &Utf8Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("No settings at '{}', using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Load from an explicit path, or from the platform location.
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self, SettingsError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Ok(path) => Self::load_from(&path),
                Err(SettingsError::NoConfigDir) => Ok(Self::default()),
                Err(e) => Err(e),
            },
        }
    }

    pub fn contagions_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(crate::CONTAGIONS_DIR)
    }

    pub fn vaccinations_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(crate::VACCINATIONS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn absent_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&tmp_path(&dir, "none.json")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.contagions_dir(), Utf8PathBuf::from("share/contagions"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "settings.json");
        std::fs::write(&path, r#"{ "dataDir": "/srv/covid" }"#).unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.data_dir, Utf8PathBuf::from("/srv/covid"));
        assert_eq!(s.vaccinations_dir(), Utf8PathBuf::from("/srv/covid/vaccinations"));
        assert_eq!(s.contagions_base_url, crate::CONTAGIONS_BASE_URL);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp_path(&dir, "settings.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}

pub mod commands;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use covid_config::Settings;
use covid_pipeline::SyncOptions;

/// Everything a command needs, resolved from the settings file and the
/// command line. Flags win over settings.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub data_dir: Utf8PathBuf,
    pub contagions_base_url: String,
    pub vaccinations_base_url: String,
    pub options: SyncOptions,
}

impl RunContext {
    pub fn new(settings: Settings, data_dir: Option<Utf8PathBuf>, options: SyncOptions) -> Self {
        Self {
            data_dir: data_dir.unwrap_or(settings.data_dir),
            contagions_base_url: settings.contagions_base_url,
            vaccinations_base_url: settings.vaccinations_base_url,
            options,
        }
    }

    pub fn contagions_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(covid_config::CONTAGIONS_DIR)
    }

    pub fn vaccinations_dir(&self) -> Utf8PathBuf {
        self.data_dir.join(covid_config::VACCINATIONS_DIR)
    }
}

/// `--start` / `--end` value parser.
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    covid_core::plan::parse_day(s).map_err(|e| e.to_string())
}

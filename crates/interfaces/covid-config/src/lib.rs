//! Central configuration constants for remote sources, runtime limits and
//! defaults, plus the optional on-disk settings file.

pub mod settings;

pub use settings::{Settings, SettingsError};

/// Base URL of the Civil Protection contagions repository.
pub const CONTAGIONS_BASE_URL: &str = "https://raw.githubusercontent.com/pcm-dpc/COVID-19/master";

/// Base URL of the vaccinations open-data repository.
pub const VACCINATIONS_BASE_URL: &str =
    "https://raw.githubusercontent.com/italia/covid19-opendata-vaccini/master/dati";

/// First day published by the contagions repository (`YYYY-MM-DD`).
pub const CONTAGIONS_START_DATE: &str = "2020-02-24";

/// Fixed files of the vaccinations dataset.
pub const VACCINATION_FILES: [&str; 4] = [
    "consegne-vaccini-latest.csv",
    "somministrazioni-vaccini-latest.csv",
    "platea.csv",
    "platea-dose-addizionale-booster.csv",
];

/// Freshness marker of the vaccinations dataset, same name remotely and locally.
pub const VACCINATIONS_MARKER_FILE: &str = "last-update-dataset.json";

/// Subdirectories of the data directory, one per dataset family.
pub const CONTAGIONS_DIR: &str = "contagions";
pub const VACCINATIONS_DIR: &str = "vaccinations";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "share";

/// Minimum allowed concurrent fetches.
pub const MIN_PARALLELISM: usize = 1;

/// Maximum allowed concurrent fetches.
pub const MAX_PARALLELISM: usize = 32;

/// Used when the machine's parallelism cannot be queried.
pub const FALLBACK_PARALLELISM: usize = 4;

/// Convenience function to clamp a parallelism value into allowed range.
pub fn clamp_parallelism(v: usize) -> usize {
    v.clamp(MIN_PARALLELISM, MAX_PARALLELISM)
}

/// One worker per available CPU, clamped.
pub fn default_parallelism() -> usize {
    let n = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_PARALLELISM);
    clamp_parallelism(n)
}

pub fn vaccination_files() -> Vec<String> {
    VACCINATION_FILES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_parallelism(0), MIN_PARALLELISM);
        assert_eq!(clamp_parallelism(1000), MAX_PARALLELISM);
        assert_eq!(clamp_parallelism(6), 6);
    }

    #[test]
    fn default_parallelism_is_in_range() {
        let n = default_parallelism();
        assert!((MIN_PARALLELISM..=MAX_PARALLELISM).contains(&n));
    }
}

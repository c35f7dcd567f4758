use crate::CoreError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication timestamp of a fixed-file dataset.
///
/// Serialized as `{"ultimo_aggiornamento": "<RFC 3339>"}`, the shape of the
/// remote `last-update-dataset.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FreshnessMarker {
    #[serde(rename = "ultimo_aggiornamento", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl FreshnessMarker {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    /// Sentinel used when no marker was ever persisted. Older than any real
    /// publication, so the first sync always proceeds.
    pub fn epoch() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_epoch(&self) -> bool {
        self.timestamp == DateTime::<Utc>::UNIX_EPOCH
    }

    pub fn is_newer_than(&self, other: &FreshnessMarker) -> bool {
        self.timestamp > other.timestamp
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidMarker(e.to_string()))
    }
}

/// Accepts RFC 3339 timestamps and offset-less ones, which are read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CoreError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = day.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(CoreError::InvalidMarker(format!("unparsable timestamp '{s}'")))
}

mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of checking one edition.
///
/// Serialized as one element of the `--output` JSON array, with both times as
/// Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub edition_id: String,
    /// Local MD5 before the run (`ZERO_MD5` if there was no file).
    pub old_hash: String,
    /// Local MD5 after the run. Equal to `old_hash` when nothing changed.
    pub new_hash: String,
    /// `Last-Modified` of the download, or the release day when nothing was
    /// downloaded.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub modified_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub checked_at: DateTime<Utc>,
}

impl Outcome {
    pub fn updated(&self) -> bool {
        !self.old_hash.eq_ignore_ascii_case(&self.new_hash)
    }
}

/// Outcomes of a successful run, in configured edition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UpdateReport {
    pub outcomes: Vec<Outcome>,
}

impl UpdateReport {
    /// Number of editions whose file was replaced.
    pub fn updated(&self) -> usize {
        self.outcomes.iter().filter(|o| o.updated()).count()
    }

    /// The report as the single-line JSON array printed by `--output`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.outcomes)
    }
}

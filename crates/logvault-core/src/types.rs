//! Read-model types returned by the query surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::storage::ObjectSummary;

/// One stored log file, as reported by a catalog listing.
///
/// Rebuilt on every query; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileEntry {
    /// Full storage key.
    pub key: String,
    /// Last segment of the key.
    pub file_name: String,
    /// Modification time reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Object size in bytes.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// Sort key taken from the file name's numeric suffix.
    pub sequence: u64,
}

impl LogFileEntry {
    /// Builds an entry from a listing summary.
    #[must_use]
    pub fn from_summary(summary: &ObjectSummary) -> Self {
        let file_name = codec::file_name_of(&summary.key).to_string();
        let sequence = codec::extract_sequence(&file_name);
        Self {
            key: summary.key.clone(),
            file_name,
            last_modified: summary.last_modified,
            size_bytes: summary.size,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> ObjectSummary {
        ObjectSummary {
            key: "prod/payments/10.0.0.5/2024-03-05/payments-05-03-2024-7.log".to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).single().expect("valid"),
            size: 2048,
        }
    }

    #[test]
    fn from_summary_derives_name_and_sequence() {
        let entry = LogFileEntry::from_summary(&summary());
        assert_eq!(entry.file_name, "payments-05-03-2024-7.log");
        assert_eq!(entry.sequence, 7);
        assert_eq!(entry.size_bytes, 2048);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let json = serde_json::to_value(LogFileEntry::from_summary(&summary())).expect("serialize");
        assert_eq!(json["fileName"], "payments-05-03-2024-7.log");
        assert_eq!(json["size"], 2048);
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["lastModified"], "2024-03-05T12:00:00Z");
        assert!(json.get("sizeBytes").is_none());
    }
}

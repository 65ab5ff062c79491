//! Change log entries.

use serde::{Deserialize, Serialize};
use telemetry_types::{ArchivedRecord, Digest};

/// Kind of mutation a change record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Modify => "MODIFY",
            ChangeKind::Remove => "REMOVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "MODIFY" => Some(ChangeKind::Modify),
            "REMOVE" => Some(ChangeKind::Remove),
            _ => None,
        }
    }
}

/// The attributes of a record image the loop cares about.
///
/// Any attribute may be absent; consumers only take what is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

impl From<&ArchivedRecord> for RecordImage {
    fn from(record: &ArchivedRecord) -> Self {
        Self {
            device: Some(record.device.clone()),
            temperature: Some(record.temperature),
            humidity: Some(record.humidity),
        }
    }
}

/// One mutation with its before/after images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub event_id: String,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<RecordImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<RecordImage>,
}

/// Change records delivered together, in log order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn event_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.event_id.as_str()).collect()
    }
}

/// Acknowledgement returned by a successful upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertAck {
    pub digest: Digest,
    pub kind: ChangeKind,
    /// Id of the change record appended for this write.
    pub change_id: String,
}

//! Typed records for the user-data, equipment and sequence partitions.
//!
//! Field names serialize in camelCase so they line up with the partition
//! indexes (`userId`, `type`, `status`, `targetId`).

use astro_common::now_millis;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-user preferences and app state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    pub updated_at: i64,
}

impl UserDataRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: kind.into(),
            data,
            updated_at: now_millis(),
        }
    }
}

/// A piece of imaging equipment (camera, mount, filter wheel, focuser...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub name: String,
    #[serde(default)]
    pub settings: Value,
    pub updated_at: i64,
}

impl EquipmentRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: kind.into(),
            status: "disconnected".to_string(),
            name: name.into(),
            settings: Value::Null,
            updated_at: now_millis(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// An imaging sequence planned against a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRecord {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub target_id: String,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Value>,
    pub updated_at: i64,
}

impl SequenceRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        target_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            status: "draft".to_string(),
            target_id: target_id.into(),
            name: name.into(),
            steps: Vec::new(),
            updated_at: now_millis(),
        }
    }
}

//! Persisted sync metadata

use serde::{Deserialize, Serialize};

/// Whether the store is bound to an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    Cloud,
}

/// Small metadata record kept next to the entity namespaces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Account the local store was last synced for
    #[serde(default)]
    pub user_id: Option<String>,
    /// Unix ms of the last run that changed at least one item
    #[serde(default)]
    pub last_sync_at: Option<i64>,
    #[serde(default)]
    pub mode: StorageMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let state = SyncState {
            user_id: Some("u1".to_string()),
            last_sync_at: Some(42),
            mode: StorageMode::Cloud,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"userId":"u1","lastSyncAt":42,"mode":"cloud"}"#);
    }

    #[test]
    fn missing_fields_default_to_local() {
        let state: SyncState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, SyncState::default());
    }
}

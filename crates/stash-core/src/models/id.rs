//! Entity identifiers

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

const LOCAL_PREFIX: &str = "local_";

/// Identifier of a folder or snippet.
///
/// Until a record is created remotely this is a client-generated `local_<uuid v7>`
/// token; afterwards it equals the server-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a fresh locally-unique id (time-sortable)
    #[must_use]
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap an id received from elsewhere (server payloads, user input, links)
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Whether this is a client-generated token that the server has never seen
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_unique_and_marked_local() {
        let first = EntityId::new_local();
        let second = EntityId::new_local();
        assert_ne!(first, second);
        assert!(first.is_local());
        assert!(first.as_str().starts_with("local_"));
    }

    #[test]
    fn server_ids_are_not_local() {
        assert!(!EntityId::from("srv-42").is_local());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::from("srv-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"srv-1\"");
    }
}

//! Account session persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

pub use stash_core::auth::{AuthSession, AuthUser};

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "stash-cli";

/// One stored session per remote endpoint
#[derive(Clone)]
pub struct SessionStore {
    username: String,
}

impl SessionStore {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            username: format!("session:{api_base_url}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> Result<Entry, CliError> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username).map_err(secure_storage)
    }

    #[cfg(not(test))]
    pub fn load(&self) -> Result<Option<AuthSession>, CliError> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(secure_storage(error)),
        }
    }

    #[cfg(test)]
    pub fn load(&self) -> Result<Option<AuthSession>, CliError> {
        let guard = Self::test_store().lock().map_err(secure_storage)?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(CliError::from)
    }

    #[cfg(not(test))]
    pub fn save(&self, session: &AuthSession) -> Result<(), CliError> {
        let raw = serde_json::to_string(session)?;
        self.entry()?.set_password(&raw).map_err(secure_storage)
    }

    #[cfg(test)]
    pub fn save(&self, session: &AuthSession) -> Result<(), CliError> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store().lock().map_err(secure_storage)?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    pub fn clear(&self) -> Result<(), CliError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(secure_storage(error)),
        }
    }

    #[cfg(test)]
    pub fn clear(&self) -> Result<(), CliError> {
        let mut guard = Self::test_store().lock().map_err(secure_storage)?;
        guard.remove(&self.username);
        Ok(())
    }
}

fn secure_storage(error: impl std::fmt::Display) -> CliError {
    CliError::Auth(format!("secure storage: {error}"))
}

//! Referral code capture for clients that land on a `?ref=` link.
//!
//! The code is staged in a small key-value store until sign-up completes,
//! then turned into a referral row and cleared.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use url::Url;
use uuid::Uuid;

use super::manager::AffiliateManager;
use super::types::{AffiliateError, Referral};

/// Key under which the staged code is kept.
pub const REFERRAL_KEY: &str = "fitcoach.referral_code";

/// Query parameter carrying the code.
pub const REFERRAL_PARAM: &str = "ref";

/// Minimal persistent string store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AffiliateError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AffiliateError>;
    fn remove(&self, key: &str) -> Result<(), AffiliateError>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AffiliateError> {
        self.values
            .lock()
            .map_err(|_| AffiliateError::StoreError("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AffiliateError> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AffiliateError> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AffiliateError> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// JSON-file-backed store.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, AffiliateError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(store_error)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content).map_err(store_error)
    }

    fn write_all(&self, values: &HashMap<String, String>) -> Result<(), AffiliateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(store_error)?;
        }
        let content = serde_json::to_string_pretty(values).map_err(store_error)?;
        fs::write(&self.path, content).map_err(store_error)
    }
}

fn store_error(e: impl std::fmt::Display) -> AffiliateError {
    AffiliateError::StoreError(e.to_string())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, AffiliateError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AffiliateError> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)
    }

    fn remove(&self, key: &str) -> Result<(), AffiliateError> {
        let mut values = self.read_all()?;
        if values.remove(key).is_some() {
            self.write_all(&values)?;
        }
        Ok(())
    }
}

/// Extract a normalized referral code from a landing URL.
pub fn referral_code_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == REFERRAL_PARAM)
        .map(|(_, value)| value.trim().to_uppercase())
        .filter(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Stages a referral code between landing and sign-up.
pub struct ReferralTracker<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ReferralTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stage the `ref` code found in `url`, if any. Later captures win.
    pub fn capture_from_url(&self, url: &str) -> Result<Option<String>, AffiliateError> {
        let Some(code) = referral_code_from_url(url) else {
            return Ok(None);
        };
        self.store.set(REFERRAL_KEY, &code)?;
        tracing::debug!(code = %code, "Staged referral code");
        Ok(Some(code))
    }

    /// The staged code, if any.
    pub fn staged(&self) -> Result<Option<String>, AffiliateError> {
        self.store.get(REFERRAL_KEY)
    }

    /// Turn the staged code into a referral for a newly signed-up user.
    ///
    /// The stash is cleared once the code has been resolved, whether or not
    /// it produced a referral. A database error leaves it in place.
    pub fn complete_signup(
        &self,
        affiliates: &AffiliateManager<'_>,
        user_id: Uuid,
    ) -> Result<Option<Referral>, AffiliateError> {
        let Some(code) = self.staged()? else {
            return Ok(None);
        };

        let referral = affiliates.register_referral(&code, user_id)?;
        self.store.remove(REFERRAL_KEY)?;
        Ok(referral)
    }
}

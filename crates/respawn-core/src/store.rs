//! Persistent tenant credential store.
//!
//! A JSON file keyed by tenant id. Every write goes through
//! `io::atomic_write` (temp-file-then-rename) so a crash mid-`put` can
//! never corrupt previously stored tenants.
//!
//! Early deployments stored a bare credential string per tenant id; those
//! entries are upgraded transparently at load time (the notification target
//! is derived from the tenant id) and the upgraded shape is re-persisted.

use crate::error::{CoreError, Result};
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A registered tenant: who to notify and which credential to act with.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenant {
    pub tenant_id: String,
    /// Notification target the front end delivers to.
    pub chat_id: i64,
    /// Remote-access credential. Must be non-empty for the tenant to be
    /// considered active.
    pub token: String,
    pub registered_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Credential shortened for display: last four characters only.
    pub fn redacted_token(&self) -> String {
        let tail: String = self
            .token
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("\u{2026}{tail}")
    }
}

/// The canonical on-disk record (the map key carries the tenant id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TenantRecord {
    chat_id: i64,
    token: String,
    #[serde(default = "Utc::now")]
    registered_at: DateTime<Utc>,
}

/// One stored entry, old or new shape. Decoded as a sum type so the legacy
/// upgrade lives in exactly one place instead of type checks at call sites.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Record(TenantRecord),
    Legacy(String),
}

// ---------------------------------------------------------------------------
// TenantStore
// ---------------------------------------------------------------------------

pub struct TenantStore {
    path: PathBuf,
}

impl TenantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TenantStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let map = self.load()?;
        Ok(map
            .get(tenant_id)
            .map(|record| tenant_from(tenant_id, record)))
    }

    /// Create or overwrite the record for `tenant_id`. Atomic with respect
    /// to the whole store file.
    pub fn put(&self, tenant_id: &str, chat_id: i64, token: &str) -> Result<Tenant> {
        let mut map = self.load()?;
        let record = TenantRecord {
            chat_id,
            token: token.to_string(),
            registered_at: Utc::now(),
        };
        map.insert(tenant_id.to_string(), record.clone());
        self.persist(&map)?;
        Ok(tenant_from(tenant_id, &record))
    }

    /// All stored tenants. Order is stable (sorted by tenant id) so
    /// reconciliation passes visit tenants deterministically.
    pub fn list(&self) -> Result<Vec<Tenant>> {
        let map = self.load()?;
        Ok(map
            .iter()
            .map(|(id, record)| tenant_from(id, record))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn load(&self) -> Result<BTreeMap<String, TenantRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let raw: BTreeMap<String, StoredEntry> = serde_json::from_str(&data)?;

        let mut upgraded = false;
        let mut map = BTreeMap::new();
        for (tenant_id, entry) in raw {
            let record = match entry {
                StoredEntry::Record(record) => record,
                StoredEntry::Legacy(token) => {
                    // Legacy shape: derive the notification target from the
                    // tenant id itself.
                    let chat_id = tenant_id
                        .parse()
                        .map_err(|_| CoreError::InvalidNotificationTarget(tenant_id.clone()))?;
                    upgraded = true;
                    TenantRecord {
                        chat_id,
                        token,
                        registered_at: Utc::now(),
                    }
                }
            };
            map.insert(tenant_id, record);
        }
        if upgraded {
            self.persist(&map)?;
        }
        Ok(map)
    }

    fn persist(&self, map: &BTreeMap<String, TenantRecord>) -> Result<()> {
        let data = serde_json::to_string_pretty(map)?;
        io::atomic_write(&self.path, data.as_bytes())
    }
}

fn tenant_from(tenant_id: &str, record: &TenantRecord) -> Tenant {
    Tenant {
        tenant_id: tenant_id.to_string(),
        chat_id: record.chat_id,
        token: record.token.clone(),
        registered_at: record.registered_at,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

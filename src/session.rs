//! Session storage for the signed-in account.
//!
//! The core only ever needs three strings: the auth token, the user role and
//! the selected store id. They are read at session start, written at login
//! and cleared at logout. The store itself is injected so views and tests
//! stay independent of the platform keychain.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;
use tracing::warn;

const SERVICE_NAME: &str = "eatorder-kds";

// Session keys
pub const KEY_USER_TOKEN: &str = "userToken";
pub const KEY_USER_ROLE: &str = "userRole";
pub const KEY_SELECTED_STORE_ID: &str = "selectedStoreId";

/// All session keys managed by this module.
const ALL_KEYS: &[&str] = &[KEY_USER_TOKEN, KEY_USER_ROLE, KEY_SELECTED_STORE_ID];

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Key-value session provider. Implementations must be safe to share across
/// the async event loop.
pub trait SessionStore: Send + Sync {
    /// Read a session value. Returns `None` when the key has never been set.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), String>;

    /// Silently succeeds when the key does not exist.
    fn delete(&self, key: &str) -> Result<(), String>;

    fn token(&self) -> Option<String> {
        self.get(KEY_USER_TOKEN)
    }

    fn role(&self) -> Option<String> {
        self.get(KEY_USER_ROLE)
    }

    fn store_id(&self) -> Option<String> {
        self.get(KEY_SELECTED_STORE_ID)
    }

    /// Persist the full session after a successful login.
    fn store_session(&self, token: &str, role: &str, store_id: &str) -> Result<(), String> {
        self.set(KEY_USER_TOKEN, token)?;
        self.set(KEY_USER_ROLE, role)?;
        self.set(KEY_SELECTED_STORE_ID, store_id)?;
        Ok(())
    }

    /// Remove every session key (logout).
    fn clear_session(&self) {
        for key in ALL_KEYS {
            if let Err(e) = self.delete(key) {
                warn!(key, error = %e, "failed to clear session key");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory provider
// ---------------------------------------------------------------------------

/// Plain in-memory session, used by tests and by callers that manage
/// persistence elsewhere.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let mut map = self.values.lock().map_err(|e| e.to_string())?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        let mut map = self.values.lock().map_err(|e| e.to_string())?;
        map.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OS keyring provider
// ---------------------------------------------------------------------------

/// Session backed by the OS credential store: DPAPI on Windows, Keychain on
/// macOS, the Secret Service API on Linux.
pub struct KeyringSession;

impl KeyringSession {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeyringSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringSession {
    fn get(&self, key: &str) -> Option<String> {
        let entry = match Entry::new(SERVICE_NAME, key) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to create entry");
                return None;
            }
        };
        match entry.get_password() {
            Ok(pw) => Some(pw),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "keyring: failed to read session value");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
        entry.set_password(value).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), String> {
        let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }
}

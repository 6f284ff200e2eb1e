//! Purpose: Process-wide holder of the authenticated identity, mirrored to durable storage.
//! Exports: `SessionStore`, `SessionIdentity`, `AUTH_KEY`, `Area`, `Gate`, `gate`.
//! Role: Single owner of session state; pipelines and views only read snapshots.
//! Invariants: Storage is written before the in-memory cell on set (write-through).
//! Invariants: After `clear_identity` returns, the in-memory identity is absent.
//! Invariants: Writers are serialized; readers never block on storage after first load.
//! Invariants: Clearing an already-empty store does not notify observers.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::storage::KeyValueStorage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub const AUTH_KEY: &str = "auth_token";
const RECORD_VERSION: u32 = 1;

/// The authenticated principal as returned by sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: String,
    pub username: String,
    pub location: String,
    pub age: i32,
    pub gender: String,
    pub created_at: String,
    pub updated_at: String,
    pub tkn: String,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("location", &self.location)
            .field("age", &self.age)
            .field("gender", &self.gender)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("tkn", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    version: u32,
    saved_at: String,
    identity: SessionIdentity,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredForm {
    Record(StoredSession),
    Bare(SessionIdentity),
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    storage: Arc<dyn KeyValueStorage>,
    cell: watch::Sender<Option<SessionIdentity>>,
    loaded: AtomicBool,
    writer: Mutex<()>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let (cell, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                storage,
                cell,
                loaded: AtomicBool::new(false),
                writer: Mutex::new(()),
            }),
        }
    }

    pub fn set_identity(&self, identity: SessionIdentity) -> Result<(), Error> {
        let _guard = self.lock_writer();
        let record = StoredSession {
            version: RECORD_VERSION,
            saved_at: now_rfc3339(),
            identity,
        };
        let json = serde_json::to_string(&record).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode session identity")
                .with_source(err)
        })?;
        self.inner.storage.store(AUTH_KEY, &json)?;
        tracing::info!(user = %record.identity.username, "session identity set");
        self.inner.loaded.store(true, Ordering::Release);
        self.inner.cell.send_replace(Some(record.identity));
        Ok(())
    }

    pub fn clear_identity(&self) -> Result<(), Error> {
        let _guard = self.lock_writer();
        let removed = self.inner.storage.remove(AUTH_KEY);
        self.inner.loaded.store(true, Ordering::Release);
        let cleared = self.inner.cell.send_if_modified(|current| {
            if current.is_some() {
                *current = None;
                true
            } else {
                false
            }
        });
        if cleared {
            tracing::info!("session identity cleared");
        }
        removed
    }

    /// Clears the identity after the server rejected its credential.
    pub fn evict(&self) {
        tracing::warn!("credential rejected by server; evicting session");
        if let Err(err) = self.clear_identity() {
            tracing::error!(error = %err, "failed to remove stored session during eviction");
        }
    }

    pub fn current_identity(&self) -> Option<SessionIdentity> {
        self.ensure_loaded();
        self.inner.cell.borrow().clone()
    }

    /// Bearer token of the current identity, if present and non-empty.
    pub fn token(&self) -> Option<String> {
        self.ensure_loaded();
        self.inner
            .cell
            .borrow()
            .as_ref()
            .map(|identity| identity.tkn.clone())
            .filter(|token| !token.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.ensure_loaded();
        self.inner.cell.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SessionIdentity>> {
        self.ensure_loaded();
        self.inner.cell.subscribe()
    }

    /// Stream of identity snapshots, starting with the current one.
    pub fn changes(&self) -> WatchStream<Option<SessionIdentity>> {
        WatchStream::new(self.subscribe())
    }

    /// Hook for out-of-process writes to the same storage key: reloads only
    /// when the in-memory cell is still empty.
    pub fn on_storage_changed(&self, key: &str) {
        if key != AUTH_KEY {
            return;
        }
        let _guard = self.lock_writer();
        if self.inner.cell.borrow().is_some() {
            return;
        }
        let stored = self.read_stored();
        self.inner.loaded.store(true, Ordering::Release);
        if stored.is_some() {
            tracing::debug!("session identity reloaded after storage change");
            self.inner.cell.send_replace(stored);
        }
    }

    fn ensure_loaded(&self) {
        if self.inner.loaded.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.lock_writer();
        if self.inner.loaded.load(Ordering::Acquire) {
            return;
        }
        let stored = self.read_stored();
        self.inner.cell.send_if_modified(|current| {
            if current.is_none() && stored.is_some() {
                *current = stored;
                true
            } else {
                false
            }
        });
        self.inner.loaded.store(true, Ordering::Release);
    }

    fn read_stored(&self) -> Option<SessionIdentity> {
        let raw = match self.inner.storage.load(AUTH_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "stored session unreadable; treating as signed out");
                return None;
            }
        };
        match serde_json::from_str::<StoredForm>(&raw) {
            Ok(StoredForm::Record(record)) => Some(record.identity),
            Ok(StoredForm::Bare(identity)) => Some(identity),
            Err(err) => {
                tracing::warn!(error = %err, "stored session has unknown shape; treating as signed out");
                None
            }
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.inner
            .writer
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.inner.cell.borrow().is_some())
            .finish_non_exhaustive()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Area {
    /// Requires a signed-in identity (cart, orders, checkout).
    Protected,
    /// Only for signed-out users (login, signup, code reset).
    GuestOnly,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Gate {
    Show,
    RedirectToLogin,
    RedirectToHome,
}

pub fn gate(identity: Option<&SessionIdentity>, area: Area) -> Gate {
    match (area, identity.is_some()) {
        (Area::Protected, true) | (Area::GuestOnly, false) => Gate::Show,
        (Area::Protected, false) => Gate::RedirectToLogin,
        (Area::GuestOnly, true) => Gate::RedirectToHome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{EncryptedFileStorage, MemoryStorage};

    fn identity(username: &str, token: &str) -> SessionIdentity {
        SessionIdentity {
            id: "66f1c0a2".to_string(),
            username: username.to_string(),
            location: "Lagos".to_string(),
            age: 27,
            gender: "female".to_string(),
            created_at: "2024-09-01T10:00:00".to_string(),
            updated_at: "2024-09-02T10:00:00".to_string(),
            tkn: token.to_string(),
        }
    }

    fn memory_store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        (storage, store)
    }

    #[test]
    fn set_then_read_reflects_identity() {
        let (storage, store) = memory_store();
        store.set_identity(identity("kejiah", "tok-1")).expect("set");
        assert_eq!(store.current_identity(), Some(identity("kejiah", "tok-1")));
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        assert!(storage.load(AUTH_KEY).expect("load").is_some());
    }

    #[test]
    fn identity_survives_restart_with_encrypted_storage() {
        let temp = tempfile::tempdir().expect("tempdir");
        {
            let storage = Arc::new(EncryptedFileStorage::open(temp.path()).expect("open"));
            let store = SessionStore::new(storage);
            store.set_identity(identity("kejiah", "tok-1")).expect("set");
        }
        let storage = Arc::new(EncryptedFileStorage::open(temp.path()).expect("reopen"));
        let store = SessionStore::new(storage);
        assert_eq!(store.current_identity(), Some(identity("kejiah", "tok-1")));
    }

    #[test]
    fn clear_is_idempotent() {
        let (storage, store) = memory_store();
        store.set_identity(identity("kejiah", "tok-1")).expect("set");
        store.clear_identity().expect("clear");
        assert_eq!(store.current_identity(), None);
        store.clear_identity().expect("clear again");
        assert_eq!(store.current_identity(), None);
        assert_eq!(storage.load(AUTH_KEY).expect("load"), None);
    }

    #[test]
    fn clearing_empty_store_does_not_notify() {
        let (_storage, store) = memory_store();
        let mut rx = store.subscribe();
        rx.mark_unchanged();
        store.clear_identity().expect("clear");
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[test]
    fn observers_see_set_and_clear() {
        let (_storage, store) = memory_store();
        let mut rx = store.subscribe();
        store.set_identity(identity("kejiah", "tok-1")).expect("set");
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|id| id.username.clone()),
            Some("kejiah".to_string())
        );
        store.clear_identity().expect("clear");
        assert!(rx.has_changed().expect("sender alive"));
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn lazy_load_reads_storage_once() {
        let storage = Arc::new(MemoryStorage::new());
        let seeded = SessionStore::new(storage.clone());
        seeded.set_identity(identity("kejiah", "tok-1")).expect("set");

        let store = SessionStore::new(storage.clone());
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        // Later external writes are not picked up without the change hook.
        SessionStore::new(storage.clone())
            .set_identity(identity("other", "tok-2"))
            .expect("set");
        assert_eq!(store.token().as_deref(), Some("tok-1"));
    }

    #[test]
    fn storage_change_hook_reloads_only_when_empty() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage.clone());
        assert!(!store.is_authenticated());

        SessionStore::new(storage.clone())
            .set_identity(identity("kejiah", "tok-1"))
            .expect("set");
        store.on_storage_changed("recent_view");
        assert!(!store.is_authenticated());
        store.on_storage_changed(AUTH_KEY);
        assert_eq!(store.token().as_deref(), Some("tok-1"));

        SessionStore::new(storage)
            .set_identity(identity("other", "tok-2"))
            .expect("set");
        store.on_storage_changed(AUTH_KEY);
        assert_eq!(store.token().as_deref(), Some("tok-1"));
    }

    #[test]
    fn bare_legacy_identity_is_accepted() {
        let storage = Arc::new(MemoryStorage::new());
        let bare = serde_json::to_string(&identity("kejiah", "tok-1")).expect("json");
        storage.store(AUTH_KEY, &bare).expect("store");
        let store = SessionStore::new(storage);
        assert_eq!(store.current_identity(), Some(identity("kejiah", "tok-1")));
    }

    #[test]
    fn garbage_entry_reads_as_signed_out() {
        let storage = Arc::new(MemoryStorage::new());
        storage.store(AUTH_KEY, "not json").expect("store");
        let store = SessionStore::new(storage);
        assert_eq!(store.current_identity(), None);
    }

    #[test]
    fn sentinel_age_from_server_decodes() {
        let body = r#"{"id":"u1","username":"kejiah","location":"","age":-1,"gender":"",
            "created_at":"x","updated_at":"y","tkn":"tok-1"}"#;
        let identity: SessionIdentity = serde_json::from_str(body).expect("decode");
        assert_eq!(identity.age, -1);
    }

    #[test]
    fn empty_token_is_not_a_credential() {
        let (_storage, store) = memory_store();
        store.set_identity(identity("kejiah", "")).expect("set");
        assert!(store.is_authenticated());
        assert_eq!(store.token(), None);
    }

    #[test]
    fn debug_output_redacts_token() {
        let text = format!("{:?}", identity("kejiah", "tok-secret"));
        assert!(!text.contains("tok-secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn gate_routes_by_area() {
        let user = identity("kejiah", "tok-1");
        assert_eq!(gate(Some(&user), Area::Protected), Gate::Show);
        assert_eq!(gate(None, Area::Protected), Gate::RedirectToLogin);
        assert_eq!(gate(Some(&user), Area::GuestOnly), Gate::RedirectToHome);
        assert_eq!(gate(None, Area::GuestOnly), Gate::Show);
    }
}

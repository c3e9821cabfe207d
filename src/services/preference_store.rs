//! Observable key-value preference storage.
//!
//! A [`PreferenceStore`] holds small string preferences (the remembered view
//! mode, the cookie-consent record) and tells subscribers about every change.
//! [`FilePreferenceStore::refresh`] picks up writes made by another process
//! and reports them the same way, which is how cached snapshots built on top
//! of a store stay current.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::Result;

/// A change to one key. `value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// Key that changed.
    pub key: String,
    /// New value.
    pub value: Option<String>,
}

/// Callback invoked after a change.
pub type ChangeCallback = Arc<dyn Fn(&StoreChange) + Send + Sync>;

/// Handle returned by [`PreferenceStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// String key-value store with change notification.
pub trait PreferenceStore: Send + Sync {
    /// Reads the current value of a key.
    fn read(&self, key: &str) -> Option<String>;

    /// Stores a value and notifies subscribers.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key and notifies subscribers if it existed.
    fn remove(&self, key: &str) -> Result<()>;

    /// Registers a change callback.
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId;

    /// Removes a change callback. Returns whether it was registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Subscriber registry shared by the store implementations.
#[derive(Default)]
struct Subscribers {
    callbacks: Mutex<Vec<(SubscriptionId, ChangeCallback)>>,
}

impl Subscribers {
    fn add(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.lock().push((id, callback));
        id
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.lock();
        let before = callbacks.len();
        callbacks.retain(|(sid, _)| *sid != id);
        callbacks.len() != before
    }

    fn notify(&self, change: &StoreChange) {
        // snapshot first: callbacks may subscribe or read the store
        let callbacks: Vec<ChangeCallback> = self.lock().iter().map(|(_, cb)| cb.clone()).collect();
        tracing::debug!(key = %change.key, subscribers = callbacks.len(), "preference changed");
        for callback in callbacks {
            callback(change);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, ChangeCallback)>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-local preference store.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
    subscribers: Subscribers,
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn read(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        self.subscribers.notify(&StoreChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let existed = self.values().remove(key).is_some();
        if existed {
            self.subscribers.notify(&StoreChange {
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

/// Preference store persisted as a JSON object on disk.
///
/// Reads are served from a cached snapshot. Every write rewrites the file.
pub struct FilePreferenceStore {
    path: PathBuf,
    snapshot: Mutex<BTreeMap<String, String>>,
    subscribers: Subscribers,
}

impl FilePreferenceStore {
    /// Opens the store at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = read_document(&path)?;
        tracing::debug!(path = %path.display(), keys = snapshot.len(), "opened preference store");
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
            subscribers: Subscribers::default(),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file after an external change and notifies subscribers
    /// of every key whose value differs from the cached snapshot.
    /// Returns the changed keys.
    pub fn refresh(&self) -> Result<Vec<String>> {
        let fresh = read_document(&self.path)?;
        let changes: Vec<StoreChange> = {
            let mut snapshot = self.snapshot();
            let mut changes = Vec::new();
            for (key, value) in &fresh {
                if snapshot.get(key) != Some(value) {
                    changes.push(StoreChange {
                        key: key.clone(),
                        value: Some(value.clone()),
                    });
                }
            }
            for key in snapshot.keys() {
                if !fresh.contains_key(key) {
                    changes.push(StoreChange {
                        key: key.clone(),
                        value: None,
                    });
                }
            }
            *snapshot = fresh;
            changes
        };

        for change in &changes {
            self.subscribers.notify(change);
        }
        Ok(changes.into_iter().map(|c| c.key).collect())
    }

    fn snapshot(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn read(&self, key: &str) -> Option<String> {
        self.snapshot().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut snapshot = self.snapshot();
            let mut next = snapshot.clone();
            next.insert(key.to_string(), value.to_string());
            self.persist(&next)?;
            *snapshot = next;
        }
        self.subscribers.notify(&StoreChange {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let existed = {
            let mut snapshot = self.snapshot();
            let existed = snapshot.contains_key(key);
            if existed {
                let mut next = snapshot.clone();
                next.remove(key);
                self.persist(&next)?;
                *snapshot = next;
            }
            existed
        };
        if existed {
            self.subscribers.notify(&StoreChange {
                key: key.to_string(),
                value: None,
            });
        }
        Ok(())
    }

    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

fn read_document(path: &Path) -> Result<BTreeMap<String, String>> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(values) => Ok(values),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed preference file");
                Ok(BTreeMap::new())
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

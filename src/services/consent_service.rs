//! Cookie-consent state kept in a preference store.
//!
//! The decision is stored as one JSON value. [`ConsentService`] keeps a
//! parsed snapshot and drops it whenever the store reports a change to the
//! consent key, so a decision made elsewhere (another window, another
//! process refreshing the same file) is picked up on the next read.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::{PreferenceStore, StoreChange, SubscriptionId};
use crate::Result;

/// Storage key of the consent record.
pub const DEFAULT_CONSENT_KEY: &str = "volvox-cookie-consent";

/// Cookie categories a visitor can allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentCategory {
    /// Required for the site to work; always allowed.
    Necessary,
    /// Usage analytics.
    Analytics,
    /// Advertising and campaign tracking.
    Marketing,
}

/// Optional categories chosen by the visitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentChoices {
    /// Allow analytics cookies.
    pub analytics: bool,
    /// Allow marketing cookies.
    pub marketing: bool,
}

impl ConsentChoices {
    /// Every optional category allowed.
    pub fn all() -> Self {
        Self {
            analytics: true,
            marketing: true,
        }
    }
}

/// A recorded consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentState {
    /// Identifier of this decision.
    pub id: Uuid,
    /// Always true.
    pub necessary: bool,
    /// Analytics allowed.
    pub analytics: bool,
    /// Marketing allowed.
    pub marketing: bool,
    /// When the visitor decided.
    pub decided_at: DateTime<Utc>,
    /// Policy version the decision was made under.
    pub version: u32,
}

impl ConsentState {
    fn new(choices: ConsentChoices, version: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            necessary: true,
            analytics: choices.analytics,
            marketing: choices.marketing,
            decided_at: Utc::now(),
            version,
        }
    }

    /// Returns whether the category is allowed by this decision.
    pub fn allows(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => true,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
        }
    }
}

/// `None` means stale; `Some(None)` means no decision on record.
type Snapshot = Arc<Mutex<Option<Option<ConsentState>>>>;

/// Reads and records cookie-consent decisions.
pub struct ConsentService {
    store: Arc<dyn PreferenceStore>,
    key: String,
    version: u32,
    snapshot: Snapshot,
    subscription: SubscriptionId,
}

impl ConsentService {
    /// Creates a service for the given policy version under the default key.
    pub fn new(store: Arc<dyn PreferenceStore>, version: u32) -> Self {
        Self::with_key(store, DEFAULT_CONSENT_KEY, version)
    }

    /// Creates a service storing its record under `key`.
    pub fn with_key(store: Arc<dyn PreferenceStore>, key: impl Into<String>, version: u32) -> Self {
        let key = key.into();
        let snapshot: Snapshot = Arc::new(Mutex::new(None));

        let watched = key.clone();
        let cache = Arc::clone(&snapshot);
        let subscription = store.subscribe(Arc::new(move |change: &StoreChange| {
            if change.key == watched {
                *cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
            }
        }));

        Self {
            store,
            key,
            version,
            snapshot,
            subscription,
        }
    }

    /// Current decision, if any. Malformed records read as no decision.
    pub fn snapshot(&self) -> Option<ConsentState> {
        let mut cached = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = cached.as_ref() {
            return state.clone();
        }

        let state = self.store.read(&self.key).and_then(|raw| {
            serde_json::from_str::<ConsentState>(&raw)
                .map_err(|e| tracing::warn!(error = %e, "ignoring malformed consent record"))
                .ok()
        });
        *cached = Some(state.clone());
        state
    }

    /// Returns whether the visitor should be asked: no decision, or one made
    /// under an older policy version.
    pub fn needs_prompt(&self) -> bool {
        self.snapshot().map_or(true, |s| s.version < self.version)
    }

    /// Returns whether a category may be used right now.
    pub fn allows(&self, category: ConsentCategory) -> bool {
        match self.snapshot() {
            Some(state) => state.allows(category),
            None => category == ConsentCategory::Necessary,
        }
    }

    /// Records acceptance of every category.
    pub fn accept_all(&self) -> Result<ConsentState> {
        self.save(ConsentChoices::all())
    }

    /// Records rejection of every optional category.
    pub fn reject_optional(&self) -> Result<ConsentState> {
        self.save(ConsentChoices::default())
    }

    /// Records a decision.
    pub fn save(&self, choices: ConsentChoices) -> Result<ConsentState> {
        let state = ConsentState::new(choices, self.version);
        self.store.write(&self.key, &serde_json::to_string(&state)?)?;
        tracing::info!(
            analytics = state.analytics,
            marketing = state.marketing,
            version = state.version,
            "cookie consent recorded"
        );
        Ok(state)
    }

    /// Forgets the decision so the visitor is asked again.
    pub fn reset(&self) -> Result<()> {
        self.store.remove(&self.key)
    }
}

impl Drop for ConsentService {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}

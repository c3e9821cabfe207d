//! Business logic services.
//!
//! Services sit between the listing controller and its collaborators:
//! - `filter_service`: filter and sort derivation
//! - `url_sync`: filter state <-> URL query parameters
//! - `debounce`: cancelable timers and input debouncing
//! - `preference_store`: observable key-value preferences
//! - `content_service`: cached loading of listing content
//! - `consent_service`: cookie-consent decisions

pub mod consent_service;
pub mod content_service;
pub mod debounce;
pub mod filter_service;
pub mod preference_store;
pub mod url_sync;

pub use consent_service::{
    ConsentCategory, ConsentChoices, ConsentService, ConsentState, DEFAULT_CONSENT_KEY,
};
pub use content_service::{
    ContentCacheSettings, ContentService, ContentSource, HttpContentSource, JsonFileSource,
};
pub use debounce::{
    Debouncer, ManualScheduler, Scheduler, Task, TimerId, TokioScheduler, DEFAULT_SEARCH_DEBOUNCE,
};
pub use filter_service::{
    apply_filters, collect_tags, filtered_indices, normalize_tag, FilterState, SortOption, ViewMode,
};
pub use preference_store::{
    ChangeCallback, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, StoreChange,
    SubscriptionId,
};
pub use url_sync::{HistoryRouter, MemoryRouter};

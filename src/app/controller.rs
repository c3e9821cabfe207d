//! The list filter/sort controller.
//!
//! One [`ListController`] drives one listing for the lifetime of a page
//! view. It owns the [`FilterState`], re-derives the visible items whenever
//! that state changes, and mirrors the state into the page URL through the
//! host's [`HistoryRouter`]. Typed search text is debounced; every other
//! change applies immediately.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::app::events::{EventBus, ListEvent};
use crate::config::{ListingConfig, DEFAULT_VIEW_MODE_KEY};
use crate::domain::{ListDomain, ListItem};
use crate::services::url_sync::{apply_to_url, clear_managed, parse_filter_state};
use crate::services::{
    collect_tags, filtered_indices, normalize_tag, Debouncer, FilterState, HistoryRouter,
    PreferenceStore, Scheduler, SortOption, ViewMode, DEFAULT_SEARCH_DEBOUNCE,
};

/// What the rendering layer should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingView {
    /// The collection has not arrived yet.
    Loading,
    /// Nothing matches the current filters.
    Empty {
        /// Whether search text or tags are narrowing the listing.
        filters_active: bool,
    },
    /// Matching items in display order.
    Items(Vec<ListItem>),
}

impl ListingView {
    /// Returns whether this is the explicit "no results" state.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ListingView::Empty { .. })
    }
}

struct Inner {
    items: Option<Arc<[ListItem]>>,
    filter: FilterState,
    search_input: String,
    visible: Vec<usize>,
    revision: u64,
    mounted: bool,
    session: u64,
}

struct Shared {
    domain: ListDomain,
    router: Arc<dyn HistoryRouter>,
    store: Arc<dyn PreferenceStore>,
    view_mode_key: String,
    events: EventBus,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn recompute(&self, inner: &mut Inner) {
        let Some(items) = inner.items.as_ref() else {
            return;
        };
        inner.visible = filtered_indices(items, &inner.filter);
        inner.revision += 1;
        tracing::debug!(
            domain = %self.domain,
            revision = inner.revision,
            visible = inner.visible.len(),
            total = items.len(),
            "listing recomputed"
        );
        self.events.publish(ListEvent::ResultsChanged {
            revision: inner.revision,
            count: inner.visible.len(),
        });
    }

    fn sync_url(&self, inner: &Inner) {
        let current = self.router.current_url();
        let next = apply_to_url(&current, &inner.filter, self.domain);
        if next != current {
            self.replace_url(next);
        }
    }

    fn replace_url(&self, url: url::Url) {
        tracing::debug!(domain = %self.domain, url = %url, "replacing history entry");
        let rendered = url.to_string();
        self.router.replace(url);
        self.events.publish(ListEvent::UrlReplaced { url: rendered });
    }

    fn commit_search(&self, session: u64) {
        let mut inner = self.lock();
        if !inner.mounted || inner.session != session {
            tracing::debug!(domain = %self.domain, "dropping search commit for stale view");
            return;
        }
        let committed = inner.search_input.trim().to_string();
        if inner.filter.search_query == committed {
            return;
        }
        inner.filter.search_query = committed;
        self.recompute(&mut inner);
        self.sync_url(&inner);
    }

    fn remember_view_mode(&self, mode: ViewMode) {
        if let Err(e) = self.store.write(&self.view_mode_key, mode.as_str()) {
            tracing::warn!(error = %e, "failed to remember view mode");
        }
    }
}

/// Filter, sort and URL-state controller for one listing.
pub struct ListController {
    shared: Arc<Shared>,
    scheduler: Arc<dyn Scheduler>,
    debouncer: Debouncer,
}

impl ListController {
    /// Creates an unmounted controller with default settings.
    pub fn new(
        domain: ListDomain,
        router: Arc<dyn HistoryRouter>,
        store: Arc<dyn PreferenceStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let shared = Arc::new(Shared {
            domain,
            router,
            store,
            view_mode_key: DEFAULT_VIEW_MODE_KEY.to_string(),
            events: EventBus::default(),
            inner: Mutex::new(Inner {
                items: None,
                filter: FilterState::defaults(domain),
                search_input: String::new(),
                visible: Vec::new(),
                revision: 0,
                mounted: false,
                session: 0,
            }),
        });
        let debouncer = Debouncer::new(Arc::clone(&scheduler), DEFAULT_SEARCH_DEBOUNCE);
        Self {
            shared,
            scheduler,
            debouncer,
        }
    }

    /// Applies debounce and preference-key settings. Call before mounting.
    pub fn with_config(self, config: &ListingConfig) -> Self {
        self.with_debounce(config.search_debounce())
            .with_view_mode_key(config.view_mode_key.clone())
    }

    /// Sets the search quiet period.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(Arc::clone(&self.scheduler), delay);
        self
    }

    /// Sets the preference key of the remembered view mode.
    pub fn with_view_mode_key(mut self, key: impl Into<String>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.view_mode_key = key.into(),
            None => tracing::warn!("view mode key must be set before the controller is shared"),
        }
        self
    }

    /// Listing this controller drives.
    pub fn domain(&self) -> ListDomain {
        self.shared.domain
    }

    /// Subscribes to listing events.
    pub fn events(&self) -> broadcast::Receiver<ListEvent> {
        self.shared.events.subscribe()
    }

    /// Seeds the state from the current URL and the remembered view mode,
    /// derives the first result set and rewrites the URL into its canonical
    /// form (defaults and malformed values dropped).
    pub fn mount(&self) {
        let shared = &self.shared;
        let remembered = shared
            .store
            .read(&shared.view_mode_key)
            .and_then(|v| ViewMode::parse(&v))
            .unwrap_or_default();
        let url = shared.router.current_url();
        let filter = parse_filter_state(&url, shared.domain, remembered);

        let mut inner = shared.lock();
        inner.search_input = filter.search_query.clone();
        inner.filter = filter.clone();
        inner.mounted = true;
        inner.session += 1;
        tracing::info!(domain = %shared.domain, url = %url, "listing mounted");
        shared.events.publish(ListEvent::Mounted {
            domain: shared.domain,
            state: filter,
        });
        shared.recompute(&mut inner);
        shared.sync_url(&inner);
    }

    /// Supplies the collection. Until this is called the listing is loading.
    pub fn load_items(&self, items: impl Into<Arc<[ListItem]>>) {
        let mut inner = self.shared.lock();
        inner.items = Some(items.into());
        self.shared.recompute(&mut inner);
    }

    /// Records typed search text and schedules it to apply after the quiet
    /// period. Each call restarts the period.
    pub fn set_search_input(&self, text: impl Into<String>) {
        let text = text.into();
        let session = {
            let mut inner = self.shared.lock();
            if !inner.mounted {
                return;
            }
            inner.search_input = text.clone();
            inner.session
        };
        self.shared
            .events
            .publish(ListEvent::SearchPending { input: text });

        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        self.debouncer.call(move || {
            if let Some(shared) = weak.upgrade() {
                shared.commit_search(session);
            }
        });
    }

    /// Applies pending search text immediately.
    pub fn flush_search(&self) {
        self.debouncer.cancel();
        let session = self.shared.lock().session;
        self.shared.commit_search(session);
    }

    /// Selects or deselects a tag. Returns whether it is selected afterwards.
    pub fn toggle_tag(&self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            tracing::debug!(domain = %self.shared.domain, tag, "ignoring malformed tag");
            return false;
        };
        let mut inner = self.shared.lock();
        if !inner.mounted {
            return inner.filter.selected_tags.contains(&tag);
        }
        let selected = inner.filter.toggle_tag(&tag);
        self.shared.recompute(&mut inner);
        self.shared.sync_url(&inner);
        selected
    }

    /// Changes the sort order. Options the listing does not offer are
    /// rejected and `false` is returned.
    pub fn set_sort(&self, option: SortOption) -> bool {
        if !self.shared.domain.accepts_sort(option) {
            tracing::debug!(domain = %self.shared.domain, sort = %option, "sort option not offered");
            return false;
        }
        let mut inner = self.shared.lock();
        if !inner.mounted {
            return false;
        }
        if inner.filter.sort_option != option {
            inner.filter.sort_option = option;
            self.shared.recompute(&mut inner);
            self.shared.sync_url(&inner);
        }
        true
    }

    /// Changes the layout and remembers it for future visits.
    pub fn set_view_mode(&self, mode: ViewMode) {
        let mut inner = self.shared.lock();
        if !inner.mounted {
            return;
        }
        inner.filter.view_mode = mode;
        self.shared.remember_view_mode(mode);
        self.shared.sync_url(&inner);
    }

    /// Switches between grid and list.
    pub fn toggle_view_mode(&self) -> ViewMode {
        let next = self.state().view_mode.toggled();
        self.set_view_mode(next);
        next
    }

    /// Resets every field to its default and drops the managed parameters
    /// from the URL, keeping any others.
    pub fn clear_all(&self) {
        self.debouncer.cancel();
        let shared = &self.shared;
        let mut inner = shared.lock();
        if !inner.mounted {
            return;
        }

        let defaults = FilterState::defaults(shared.domain);
        if inner.filter.view_mode != defaults.view_mode {
            shared.remember_view_mode(defaults.view_mode);
        }
        inner.filter = defaults;
        inner.search_input.clear();
        shared.recompute(&mut inner);

        let current = shared.router.current_url();
        let cleared = clear_managed(&current, shared.domain);
        if cleared != current {
            shared.replace_url(cleared);
        }
        shared.events.publish(ListEvent::Cleared);
    }

    /// Stops acting on input. A pending search is dropped.
    pub fn unmount(&self) {
        self.debouncer.cancel();
        let mut inner = self.shared.lock();
        if inner.mounted {
            inner.mounted = false;
            inner.session += 1;
            tracing::debug!(domain = %self.shared.domain, "listing unmounted");
            self.shared.events.publish(ListEvent::Unmounted);
        }
    }

    /// Whether the controller is mounted.
    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    /// Committed filter state.
    pub fn state(&self) -> FilterState {
        self.shared.lock().filter.clone()
    }

    /// Search text as typed, which may not be applied yet.
    pub fn search_input(&self) -> String {
        self.shared.lock().search_input.clone()
    }

    /// Whether typed search text is waiting for the quiet period.
    pub fn is_search_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Number of derivations so far.
    pub fn revision(&self) -> u64 {
        self.shared.lock().revision
    }

    /// Number of visible items.
    pub fn result_count(&self) -> usize {
        self.shared.lock().visible.len()
    }

    /// Every tag in the collection, for the filter controls.
    pub fn available_tags(&self) -> BTreeSet<String> {
        self.shared
            .lock()
            .items
            .as_deref()
            .map(collect_tags)
            .unwrap_or_default()
    }

    /// What to render right now.
    pub fn view(&self) -> ListingView {
        let inner = self.shared.lock();
        let Some(items) = inner.items.as_ref() else {
            return ListingView::Loading;
        };
        if inner.visible.is_empty() {
            return ListingView::Empty {
                filters_active: inner.filter.has_active_filters(),
            };
        }
        ListingView::Items(inner.visible.iter().map(|&i| items[i].clone()).collect())
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        self.unmount();
    }
}

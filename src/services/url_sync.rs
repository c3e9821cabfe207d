//! Filter state <-> URL query synchronisation.
//!
//! Managed parameters:
//! - `q`: search text
//! - `tags` (posts) / `tech` (products): comma-joined tag selection
//! - `sort`: one of the listing's sort options
//! - `view`: `grid` or `list`
//!
//! A parameter is written only when its value differs from the default, and
//! unknown or malformed values read back as absent. Parameters the listing
//! does not manage are preserved in their original order.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use url::Url;

use crate::domain::ListDomain;
use crate::services::{normalize_tag, FilterState, SortOption, ViewMode};

/// Search text parameter.
pub const PARAM_QUERY: &str = "q";
/// Sort parameter.
pub const PARAM_SORT: &str = "sort";
/// View mode parameter.
pub const PARAM_VIEW: &str = "view";

/// Read and replace primitives of the host's routing layer.
pub trait HistoryRouter: Send + Sync {
    /// Returns the URL of the current history entry.
    fn current_url(&self) -> Url;

    /// Replaces the current history entry without adding a new one.
    fn replace(&self, url: Url);
}

/// In-memory history stack.
#[derive(Debug)]
pub struct MemoryRouter {
    entries: Mutex<Vec<Url>>,
    replace_count: AtomicUsize,
}

impl MemoryRouter {
    /// Creates a router whose only entry is `url`.
    pub fn new(url: Url) -> Self {
        Self {
            entries: Mutex::new(vec![url]),
            replace_count: AtomicUsize::new(0),
        }
    }

    /// Parses `url` and creates a router on it.
    pub fn parse(url: &str) -> crate::Result<Self> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Navigates to a new entry.
    pub fn push(&self, url: Url) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url);
    }

    /// Number of entries on the history stack.
    pub fn history_len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of replace calls so far.
    pub fn replace_count(&self) -> usize {
        self.replace_count.load(Ordering::SeqCst)
    }
}

impl HistoryRouter for MemoryRouter {
    fn current_url(&self) -> Url {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // the stack is created with one entry and never popped
        entries[entries.len() - 1].clone()
    }

    fn replace(&self, url: Url) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = entries.last_mut() {
            *last = url;
        }
        self.replace_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns the names of the parameters a listing manages.
pub fn managed_param_names(domain: ListDomain) -> [&'static str; 4] {
    [PARAM_QUERY, domain.tags_param(), PARAM_SORT, PARAM_VIEW]
}

/// Seeds a filter state from a URL.
///
/// Absent or malformed parameters fall back to the listing defaults; the
/// view mode falls back to `fallback_view` (the remembered preference).
pub fn parse_filter_state(url: &Url, domain: ListDomain, fallback_view: ViewMode) -> FilterState {
    let mut state = FilterState::defaults(domain).with_view(fallback_view);

    if let Some(q) = first_param(url, PARAM_QUERY) {
        state.search_query = q.trim().to_string();
    }

    if let Some(tags) = first_param(url, domain.tags_param()) {
        state.selected_tags = split_tags(&tags);
    }

    if let Some(sort) = first_param(url, PARAM_SORT)
        .and_then(|s| SortOption::parse(&s))
        .filter(|s| domain.accepts_sort(*s))
    {
        state.sort_option = sort;
    }

    if let Some(view) = first_param(url, PARAM_VIEW).and_then(|v| ViewMode::parse(&v)) {
        state.view_mode = view;
    }

    state
}

/// Returns the managed parameters for `state`, omitting defaults.
pub fn managed_params(state: &FilterState, domain: ListDomain) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !state.search_query.is_empty() {
        params.push((PARAM_QUERY, state.search_query.clone()));
    }
    if !state.selected_tags.is_empty() {
        params.push((domain.tags_param(), join_tags(&state.selected_tags)));
    }
    if state.sort_option != domain.default_sort() {
        params.push((PARAM_SORT, state.sort_option.as_str().to_string()));
    }
    if state.view_mode != ViewMode::default() {
        params.push((PARAM_VIEW, state.view_mode.as_str().to_string()));
    }

    params
}

/// Returns `url` with its managed parameters rewritten to match `state`.
pub fn apply_to_url(url: &Url, state: &FilterState, domain: ListDomain) -> Url {
    let mut pairs = unmanaged_pairs(url, domain);
    pairs.extend(
        managed_params(state, domain)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
    );
    with_pairs(url, &pairs)
}

/// Returns `url` with every managed parameter removed.
pub fn clear_managed(url: &Url, domain: ListDomain) -> Url {
    with_pairs(url, &unmanaged_pairs(url, domain))
}

fn first_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',').filter_map(normalize_tag).collect()
}

fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn unmanaged_pairs(url: &Url, domain: ListDomain) -> Vec<(String, String)> {
    let managed = managed_param_names(domain);
    url.query_pairs()
        .filter(|(k, _)| {
            let key: &str = k;
            !managed.iter().any(|m| *m == key)
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn with_pairs(url: &Url, pairs: &[(String, String)]) -> Url {
    let mut next = url.clone();
    if pairs.is_empty() {
        next.set_query(None);
    } else {
        next.query_pairs_mut().clear().extend_pairs(pairs);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn absent_params_give_defaults() {
        let state = parse_filter_state(&url("https://volvox.dev/blog"), ListDomain::Posts, ViewMode::Grid);
        assert_eq!(state, FilterState::defaults(ListDomain::Posts));
    }

    #[test]
    fn view_falls_back_to_remembered_preference() {
        let state = parse_filter_state(&url("https://volvox.dev/blog"), ListDomain::Posts, ViewMode::List);
        assert_eq!(state.view_mode, ViewMode::List);

        let explicit = parse_filter_state(
            &url("https://volvox.dev/blog?view=grid"),
            ListDomain::Posts,
            ViewMode::List,
        );
        assert_eq!(explicit.view_mode, ViewMode::Grid);
    }

    #[test]
    fn parses_every_managed_param() {
        let state = parse_filter_state(
            &url("https://volvox.dev/blog?q=rust%20tips&tags=release,%20news,,&sort=views&view=list"),
            ListDomain::Posts,
            ViewMode::Grid,
        );
        assert_eq!(state.search_query, "rust tips");
        assert_eq!(
            state.selected_tags.iter().cloned().collect::<Vec<_>>(),
            vec!["news", "release"]
        );
        assert_eq!(state.sort_option, SortOption::Views);
        assert_eq!(state.view_mode, ViewMode::List);
    }

    #[test]
    fn malformed_values_read_as_absent() {
        let state = parse_filter_state(
            &url("https://volvox.dev/products?sort=views&view=cards&q=%20%20"),
            ListDomain::Products,
            ViewMode::Grid,
        );
        assert_eq!(state, FilterState::defaults(ListDomain::Products));
    }

    #[test]
    fn products_read_tech_not_tags() {
        let state = parse_filter_state(
            &url("https://volvox.dev/products?tags=ignored&tech=rust,typescript"),
            ListDomain::Products,
            ViewMode::Grid,
        );
        assert_eq!(
            state.selected_tags.iter().cloned().collect::<Vec<_>>(),
            vec!["rust", "typescript"]
        );
    }

    #[test]
    fn default_state_has_no_managed_params() {
        for domain in [ListDomain::Posts, ListDomain::Products] {
            assert!(managed_params(&FilterState::defaults(domain), domain).is_empty());
            let base = url("https://volvox.dev/list");
            assert_eq!(apply_to_url(&base, &FilterState::defaults(domain), domain).query(), None);
        }
    }

    #[test]
    fn non_default_state_round_trips() {
        let state = FilterState::defaults(ListDomain::Posts)
            .with_search("hello world & more")
            .with_tags(["release", "rust"])
            .with_sort(SortOption::ZA)
            .with_view(ViewMode::List);

        let written = apply_to_url(&url("https://volvox.dev/blog"), &state, ListDomain::Posts);
        let read = parse_filter_state(&written, ListDomain::Posts, ViewMode::Grid);
        assert_eq!(read, state);
    }

    #[test]
    fn padded_and_blank_queries_round_trip() {
        let base = url("https://volvox.dev/blog");
        for typed in ["  ", "  rust tips ", "rust"] {
            let state = FilterState::defaults(ListDomain::Posts).with_search(typed);
            let written = apply_to_url(&base, &state, ListDomain::Posts);
            let read = parse_filter_state(&written, ListDomain::Posts, ViewMode::Grid);
            assert_eq!(read, state, "query {:?}", typed);
        }

        let blank = FilterState::defaults(ListDomain::Posts).with_search("  ");
        assert_eq!(apply_to_url(&base, &blank, ListDomain::Posts).query(), None);

        let padded = parse_filter_state(
            &url("https://volvox.dev/blog?q=%20%20rust%20"),
            ListDomain::Posts,
            ViewMode::Grid,
        );
        assert_eq!(padded.search_query, "rust");
    }

    #[test]
    fn toggled_tags_round_trip() {
        let mut state = FilterState::defaults(ListDomain::Posts);
        state.toggle_tag(" rust");
        state.toggle_tag("a,b");
        state.toggle_tag("release ");

        let written = apply_to_url(&url("https://volvox.dev/blog"), &state, ListDomain::Posts);
        assert_eq!(written.query(), Some("tags=release%2Crust"));
        assert_eq!(parse_filter_state(&written, ListDomain::Posts, ViewMode::Grid), state);
    }

    #[test]
    fn default_valued_fields_are_omitted() {
        let state = FilterState::defaults(ListDomain::Products).with_tags(["rust"]);
        let written = apply_to_url(&url("https://volvox.dev/products"), &state, ListDomain::Products);
        assert_eq!(written.query(), Some("tech=rust"));
    }

    #[test]
    fn unrelated_params_are_preserved() {
        let base = url("https://volvox.dev/blog?utm_source=news&q=old&ref=x");
        let state = FilterState::defaults(ListDomain::Posts).with_sort(SortOption::Oldest);
        let written = apply_to_url(&base, &state, ListDomain::Posts);
        assert_eq!(written.query(), Some("utm_source=news&ref=x&sort=oldest"));

        let cleared = clear_managed(&written, ListDomain::Posts);
        assert_eq!(cleared.query(), Some("utm_source=news&ref=x"));
    }

    #[test]
    fn memory_router_replace_keeps_history_length() {
        let router = MemoryRouter::parse("https://volvox.dev/blog").unwrap();
        router.replace(url("https://volvox.dev/blog?q=a"));
        router.replace(url("https://volvox.dev/blog?q=ab"));
        assert_eq!(router.history_len(), 1);
        assert_eq!(router.replace_count(), 2);
        assert_eq!(router.current_url().query(), Some("q=ab"));

        router.push(url("https://volvox.dev/products"));
        assert_eq!(router.history_len(), 2);
        assert_eq!(router.current_url().path(), "/products");
    }
}

//! Filter and sort derivation for listings.
//!
//! [`apply_filters`] is the single derivation step shared by the blog and
//! product listings:
//! - free-text search across title, description and tags
//! - tag filtering with "any selected tag" semantics
//! - stable sorting by date, popularity or title

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ListDomain, ListItem};

/// Sort order of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOption {
    /// Most recent first.
    #[serde(rename = "newest")]
    Newest,
    /// Oldest first.
    #[serde(rename = "oldest")]
    Oldest,
    /// Most viewed first.
    #[serde(rename = "views")]
    Views,
    /// Title ascending.
    #[serde(rename = "a-z")]
    AZ,
    /// Title descending.
    #[serde(rename = "z-a")]
    ZA,
}

impl SortOption {
    /// Returns the query-string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Newest => "newest",
            SortOption::Oldest => "oldest",
            SortOption::Views => "views",
            SortOption::AZ => "a-z",
            SortOption::ZA => "z-a",
        }
    }

    /// Parses a query-string value. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(SortOption::Newest),
            "oldest" => Some(SortOption::Oldest),
            "views" => Some(SortOption::Views),
            "a-z" => Some(SortOption::AZ),
            "z-a" => Some(SortOption::ZA),
            _ => None,
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            SortOption::Newest => "Newest",
            SortOption::Oldest => "Oldest",
            SortOption::Views => "Most viewed",
            SortOption::AZ => "A to Z",
            SortOption::ZA => "Z to A",
        }
    }

    /// Compares two items under this ordering.
    pub fn compare(&self, a: &ListItem, b: &ListItem) -> Ordering {
        match self {
            SortOption::Newest => b.timestamp.cmp(&a.timestamp),
            SortOption::Oldest => a.timestamp.cmp(&b.timestamp),
            SortOption::Views => b.views.cmp(&a.views),
            SortOption::AZ => compare_titles(a, b),
            SortOption::ZA => compare_titles(b, a),
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compare_titles(a: &ListItem, b: &ListItem) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

/// How a listing lays out its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Grid of cards.
    #[default]
    Grid,
    /// Vertical list.
    List,
}

impl ViewMode {
    /// Returns the query-string and preference value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }

    /// Parses a stored or query-string value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(ViewMode::Grid),
            "list" => Some(ViewMode::List),
            _ => None,
        }
    }

    /// Returns the other mode.
    pub fn toggled(&self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Search text, tag selection, sort order and view mode of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// Committed search text, trimmed.
    pub search_query: String,
    /// Selected tags; an item matches if it has any of them.
    pub selected_tags: BTreeSet<String>,
    /// Sort order.
    pub sort_option: SortOption,
    /// Layout.
    pub view_mode: ViewMode,
}

impl FilterState {
    /// Returns the default state for a listing.
    pub fn defaults(domain: ListDomain) -> Self {
        Self {
            search_query: String::new(),
            selected_tags: BTreeSet::new(),
            sort_option: domain.default_sort(),
            view_mode: ViewMode::default(),
        }
    }

    /// Sets the search text, trimmed.
    pub fn with_search(mut self, query: &str) -> Self {
        self.search_query = query.trim().to_string();
        self
    }

    /// Adds selected tags. Tags that [`normalize_tag`] rejects are skipped.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected_tags
            .extend(tags.into_iter().filter_map(|t| normalize_tag(t.as_ref())));
        self
    }

    /// Sets the sort order.
    pub fn with_sort(mut self, sort: SortOption) -> Self {
        self.sort_option = sort;
        self
    }

    /// Sets the view mode.
    pub fn with_view(mut self, view: ViewMode) -> Self {
        self.view_mode = view;
        self
    }

    /// Selects the tag if unselected, otherwise deselects it.
    /// Returns whether the tag is selected afterwards; a tag that
    /// [`normalize_tag`] rejects is never selected.
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize_tag(tag) else {
            return false;
        };
        if self.selected_tags.remove(&tag) {
            false
        } else {
            self.selected_tags.insert(tag);
            true
        }
    }

    /// Returns whether any filter narrows the result set.
    pub fn has_active_filters(&self) -> bool {
        !self.search_query.is_empty() || !self.selected_tags.is_empty()
    }

    /// Returns whether every field equals the listing default.
    pub fn is_default(&self, domain: ListDomain) -> bool {
        *self == Self::defaults(domain)
    }
}

/// Trims a tag. Empty tags and tags containing `,` (the URL separator)
/// are rejected.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim();
    (!tag.is_empty() && !tag.contains(',')).then(|| tag.to_string())
}

/// Returns the items matching `state`, in the order `state` asks for.
///
/// Pure and deterministic; `items` is left untouched.
pub fn apply_filters<'a>(items: &'a [ListItem], state: &FilterState) -> Vec<&'a ListItem> {
    filtered_indices(items, state)
        .into_iter()
        .map(|i| &items[i])
        .collect()
}

/// Same derivation as [`apply_filters`], returning positions into `items`.
pub fn filtered_indices(items: &[ListItem], state: &FilterState) -> Vec<usize> {
    let needle = state.search_query.to_lowercase();

    let mut matched: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| needle.is_empty() || matches_search(item, &needle))
        .filter(|(_, item)| matches_tags(item, &state.selected_tags))
        .map(|(i, _)| i)
        .collect();

    // Vec::sort_by is stable
    matched.sort_by(|&a, &b| state.sort_option.compare(&items[a], &items[b]));
    matched
}

/// Returns whether the lower-cased `needle` occurs in the title,
/// description or any tag.
pub fn matches_search(item: &ListItem, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item.description.to_lowercase().contains(needle)
        || item.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Returns whether the item carries any selected tag. An empty selection
/// matches everything.
pub fn matches_tags(item: &ListItem, selected: &BTreeSet<String>) -> bool {
    selected.is_empty() || selected.iter().any(|tag| item.has_tag(tag))
}

/// Collects every tag used across the collection, sorted.
pub fn collect_tags(items: &[ListItem]) -> BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| item.tags.iter().cloned())
        .collect()
}

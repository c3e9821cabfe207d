//! Listing items and the two listing domains.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::SortOption;

/// Stable identifier of a listing item (post slug or product id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A blog post or product shown in a filterable listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Slug or product id.
    pub id: ItemId,
    /// Display title.
    pub title: String,
    /// Excerpt or product description.
    #[serde(default)]
    pub description: String,
    /// Publication date for posts, last update for products.
    pub timestamp: DateTime<Utc>,
    /// Tags for posts, tech stack for products.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Popularity metric. Products carry zero.
    #[serde(default)]
    pub views: u64,
}

impl ListItem {
    /// Creates an item with no description, tags or views.
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            timestamp,
            tags: BTreeSet::new(),
            views: 0,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the view count.
    pub fn with_views(mut self, views: u64) -> Self {
        self.views = views;
        self
    }

    /// Returns whether the item carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Which listing a controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListDomain {
    /// The blog index.
    Posts,
    /// The product catalog.
    Products,
}

impl ListDomain {
    /// Parses a domain name as used on the command line and in content paths.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "posts" | "post" | "blog" => Some(ListDomain::Posts),
            "products" | "product" => Some(ListDomain::Products),
            _ => None,
        }
    }

    /// Path segment and file stem for this domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListDomain::Posts => "posts",
            ListDomain::Products => "products",
        }
    }

    /// Sort order used when the URL names none.
    pub fn default_sort(&self) -> SortOption {
        match self {
            ListDomain::Posts => SortOption::Newest,
            ListDomain::Products => SortOption::AZ,
        }
    }

    /// Query parameter carrying the selected tags.
    pub fn tags_param(&self) -> &'static str {
        match self {
            ListDomain::Posts => "tags",
            ListDomain::Products => "tech",
        }
    }

    /// Sort options this listing offers.
    pub fn sort_options(&self) -> &'static [SortOption] {
        match self {
            ListDomain::Posts => &[
                SortOption::Newest,
                SortOption::Oldest,
                SortOption::Views,
                SortOption::AZ,
                SortOption::ZA,
            ],
            ListDomain::Products => &[
                SortOption::AZ,
                SortOption::ZA,
                SortOption::Newest,
                SortOption::Oldest,
            ],
        }
    }

    /// Returns whether the listing accepts the sort option.
    pub fn accepts_sort(&self, option: SortOption) -> bool {
        self.sort_options().contains(&option)
    }
}

impl fmt::Display for ListDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_defaults() {
        assert_eq!(ListDomain::Posts.default_sort(), SortOption::Newest);
        assert_eq!(ListDomain::Products.default_sort(), SortOption::AZ);
        assert_eq!(ListDomain::Posts.tags_param(), "tags");
        assert_eq!(ListDomain::Products.tags_param(), "tech");
    }

    #[test]
    fn products_do_not_sort_by_views() {
        assert!(ListDomain::Posts.accepts_sort(SortOption::Views));
        assert!(!ListDomain::Products.accepts_sort(SortOption::Views));
    }

    #[test]
    fn domain_parse() {
        assert_eq!(ListDomain::parse("Blog"), Some(ListDomain::Posts));
        assert_eq!(ListDomain::parse("products"), Some(ListDomain::Products));
        assert_eq!(ListDomain::parse("team"), None);
    }

    #[test]
    fn item_deserializes_with_defaults() {
        let json = r#"{"id":"hello","title":"Hello","timestamp":"2024-01-02T00:00:00Z"}"#;
        let item: ListItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, ItemId::from("hello"));
        assert!(item.tags.is_empty());
        assert_eq!(item.views, 0);
        assert_eq!(item.description, "");
    }
}

//! Content loading for listings.
//!
//! The [`ContentService`] fronts a [`ContentSource`] with a bounded LRU
//! cache. A listing always gets a collection back: when the source fails,
//! the failure is logged and the listing sees an empty collection.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use url::Url;

use crate::domain::{ListDomain, ListItem};
use crate::Result;

/// Backend that produces the full collection for a listing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches every item of the listing.
    async fn fetch(&self, domain: ListDomain) -> Result<Vec<ListItem>>;
}

/// Reads `posts.json` and `products.json` from a directory.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    /// Creates a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, domain: ListDomain) -> PathBuf {
        self.dir.join(format!("{}.json", domain.as_str()))
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    async fn fetch(&self, domain: ListDomain) -> Result<Vec<ListItem>> {
        let bytes = tokio::fs::read(self.path_for(domain)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Fetches `{base_url}/posts` and `{base_url}/products` as JSON.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpContentSource {
    /// Creates a source rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }

    /// Endpoint for a listing.
    pub fn endpoint(&self, domain: ListDomain) -> Result<Url> {
        Ok(self.base_url.join(domain.as_str())?)
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, domain: ListDomain) -> Result<Vec<ListItem>> {
        let items = self
            .client
            .get(self.endpoint(domain)?)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ListItem>>()
            .await?;
        Ok(items)
    }
}

struct CacheEntry {
    items: Arc<[ListItem]>,
    fetched_at: Instant,
}

/// Cache settings for the content service.
#[derive(Debug, Clone)]
pub struct ContentCacheSettings {
    /// Number of listings kept.
    pub capacity: usize,
    /// How long a fetched collection stays fresh.
    pub ttl: Duration,
}

impl Default for ContentCacheSettings {
    fn default() -> Self {
        Self {
            capacity: 16,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Cached access to listing content.
pub struct ContentService<S: ContentSource> {
    source: Arc<S>,
    cache: Mutex<LruCache<ListDomain, CacheEntry>>,
    ttl: Duration,
}

impl<S: ContentSource> ContentService<S> {
    /// Creates a service with default cache settings.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_settings(source, ContentCacheSettings::default())
    }

    /// Creates a service with explicit cache settings.
    pub fn with_settings(source: Arc<S>, settings: ContentCacheSettings) -> Self {
        let capacity = NonZeroUsize::new(settings.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl: settings.ttl,
        }
    }

    /// Returns the collection for a listing, from cache when fresh.
    ///
    /// Source failures are logged and yield an empty collection, which is
    /// not cached so the next call retries.
    pub async fn load(&self, domain: ListDomain) -> Arc<[ListItem]> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get(&domain) {
                if entry.fetched_at.elapsed() < self.ttl {
                    tracing::debug!(%domain, items = entry.items.len(), "content cache hit");
                    return Arc::clone(&entry.items);
                }
                cache.pop(&domain);
            }
        }

        match self.source.fetch(domain).await {
            Ok(items) => {
                tracing::info!(%domain, items = items.len(), "content loaded");
                let items: Arc<[ListItem]> = items.into();
                self.cache.lock().await.put(
                    domain,
                    CacheEntry {
                        items: Arc::clone(&items),
                        fetched_at: Instant::now(),
                    },
                );
                items
            }
            Err(e) => {
                tracing::warn!(%domain, error = %e, "content fetch failed, showing empty listing");
                Arc::from(Vec::new())
            }
        }
    }

    /// Drops the cached collection for a listing.
    pub async fn invalidate(&self, domain: ListDomain) {
        self.cache.lock().await.pop(&domain);
    }

    /// Drops every cached collection.
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}

// =============================================================================
// Ticker Directory — code → name for the selectable universe
// =============================================================================
//
// `TickerDirectory::resolve` serves from the cache when fresh, otherwise it
// pulls the constituent page from its `DirectorySource`, scrapes it and
// stores the result. The source is a trait so tests can feed static HTML.

pub mod cache;
pub mod scrape;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SpreadError};
use crate::types::Instrument;

pub use cache::DirectoryCache;
pub use scrape::CodeFormat;

// =============================================================================
// InstrumentDirectory
// =============================================================================

/// Resolved instruments in source order, unique by code.
#[derive(Debug, Clone, Default)]
pub struct InstrumentDirectory {
    instruments: Vec<Instrument>,
    index: HashMap<String, usize>,
}

impl Serialize for InstrumentDirectory {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(&self.instruments)
    }
}

impl InstrumentDirectory {
    /// Build from raw rows; the first row for a code wins.
    pub fn from_instruments(rows: Vec<Instrument>) -> Self {
        let mut instruments = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());
        for inst in rows {
            if inst.code.is_empty() || inst.name.is_empty() || index.contains_key(&inst.code) {
                continue;
            }
            index.insert(inst.code.clone(), instruments.len());
            instruments.push(inst);
        }
        Self { instruments, index }
    }

    pub fn get(&self, code: &str) -> Option<&Instrument> {
        self.index.get(code).map(|&i| &self.instruments[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.index.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Where the constituent page comes from.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn fetch_html(&self) -> Result<String>;
}

/// Plain HTTP GET of the constituent page.
pub struct HttpDirectorySource {
    url: String,
    client: reqwest::Client,
}

impl HttpDirectorySource {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for directory source")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl DirectorySource for HttpDirectorySource {
    #[instrument(skip(self), name = "directory::fetch_html")]
    async fn fetch_html(&self) -> Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SpreadError::DirectoryUnavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SpreadError::DirectoryUnavailable(format!(
                "{} returned {status}",
                self.url
            )));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| SpreadError::DirectoryUnavailable(format!("failed to read body: {e}")))?;
        debug!(url = %self.url, bytes = html.len(), "constituent page downloaded");
        Ok(html)
    }
}

// =============================================================================
// TickerDirectory
// =============================================================================

pub struct TickerDirectory {
    source: Arc<dyn DirectorySource>,
    format: CodeFormat,
    cache: DirectoryCache,
}

impl TickerDirectory {
    pub fn new(
        source: Arc<dyn DirectorySource>,
        format: CodeFormat,
        cache: DirectoryCache,
    ) -> Self {
        Self {
            source,
            format,
            cache,
        }
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Resolve the directory, scraping only on a cache miss.
    pub async fn resolve(&self) -> Result<Arc<InstrumentDirectory>> {
        if let Some(hit) = self.cache.get() {
            return Ok(hit);
        }

        let html = self.source.fetch_html().await.inspect_err(|e| {
            warn!(error = %e, "constituent page fetch failed");
        })?;
        let directory = Arc::new(scrape::parse_directory(&html, &self.format)?);
        info!(count = directory.len(), "instrument directory resolved");

        self.cache.put(directory.clone());
        Ok(directory)
    }

    /// Drop the cached entry and scrape again.
    pub async fn refresh(&self) -> Result<Arc<InstrumentDirectory>> {
        self.cache.invalidate();
        self.resolve().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory page source that counts how often it is hit.
    pub(crate) struct StaticSource {
        pub html: String,
        pub hits: AtomicUsize,
    }

    impl StaticSource {
        pub(crate) fn new(html: &str) -> Self {
            Self {
                html: html.to_string(),
                hits: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DirectorySource for StaticSource {
        async fn fetch_html(&self) -> Result<String> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(self.html.clone())
        }
    }

    struct DownSource;

    #[async_trait]
    impl DirectorySource for DownSource {
        async fn fetch_html(&self) -> Result<String> {
            Err(SpreadError::DirectoryUnavailable("connection refused".into()))
        }
    }

    pub(crate) const PAGE: &str = "<table><tr><th>コード</th><th>銘柄名</th></tr>\
        <tr><td>7203</td><td>トヨタ自動車</td></tr>\
        <tr><td>7267</td><td>ホンダ</td></tr>\
        <tr><td>6758</td><td>ソニーグループ</td></tr></table>";

    #[test]
    fn directory_dedups_and_indexes() {
        let dir = InstrumentDirectory::from_instruments(vec![
            Instrument::new("7203.T", "トヨタ自動車"),
            Instrument::new("7203.T", "duplicate"),
            Instrument::new("", "no code"),
            Instrument::new("6758.T", ""),
            Instrument::new("7267.T", "ホンダ"),
        ]);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("7203.T").unwrap().name, "トヨタ自動車");
        assert!(dir.contains("7267.T"));
        assert!(!dir.contains("6758.T"));
        assert!(!dir.contains("7267"));
    }

    #[test]
    fn directory_serialises_as_list() {
        let dir =
            InstrumentDirectory::from_instruments(vec![Instrument::new("7203.T", "トヨタ")]);
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json, serde_json::json!([{ "code": "7203.T", "name": "トヨタ" }]));
    }

    #[tokio::test]
    async fn resolve_scrapes_once_then_serves_cache() {
        let source = Arc::new(StaticSource::new(PAGE));
        let directory =
            TickerDirectory::new(source.clone(), CodeFormat::default(), DirectoryCache::new(None));

        let first = directory.resolve().await.unwrap();
        let second = directory.resolve().await.unwrap();
        assert_eq!(first.len(), 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.hits.load(Ordering::SeqCst), 1);

        directory.refresh().await.unwrap();
        assert_eq!(source.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_rescraped() {
        let source = Arc::new(StaticSource::new(PAGE));
        let directory = TickerDirectory::new(
            source.clone(),
            CodeFormat::default(),
            DirectoryCache::new(Some(Duration::ZERO)),
        );
        directory.resolve().await.unwrap();
        directory.resolve().await.unwrap();
        assert_eq!(source.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_source_is_directory_unavailable() {
        let directory = TickerDirectory::new(
            Arc::new(DownSource),
            CodeFormat::default(),
            DirectoryCache::new(None),
        );
        assert!(matches!(
            directory.resolve().await,
            Err(SpreadError::DirectoryUnavailable(_))
        ));
        assert!(directory.cache().get().is_none());
    }
}

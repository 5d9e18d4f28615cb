// =============================================================================
// Central Application State — Spread Viewer
// =============================================================================
//
// Ties the configuration, the instrument directory and the price source
// together for the HTTP handlers. Collaborators are injected as trait
// objects so tests can substitute in-memory sources.
//
// Thread safety:
//   - Atomic counters for lock-free request accounting.
//   - The directory cache manages its own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::directory::{DirectoryCache, HttpDirectorySource, TickerDirectory};
use crate::error::Result;
use crate::market_data::{PriceFetcher, YahooClient};
use crate::runtime_config::RuntimeConfig;
use crate::spread::{self, SpreadReport, SpreadRequest};

/// Counters and cache status reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub computations_ok: u64,
    pub computations_failed: u64,
    pub directory_cached: bool,
    pub directory_age_secs: Option<u64>,
    pub directory_ttl_secs: Option<u64>,
}

pub struct AppState {
    pub runtime_config: RuntimeConfig,
    pub directory: TickerDirectory,
    pub fetcher: Arc<dyn PriceFetcher>,

    computations_ok: AtomicU64,
    computations_failed: AtomicU64,

    /// Instant when the server was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: RuntimeConfig,
        directory: TickerDirectory,
        fetcher: Arc<dyn PriceFetcher>,
    ) -> Self {
        Self {
            runtime_config: config,
            directory,
            fetcher,
            computations_ok: AtomicU64::new(0),
            computations_failed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Wire the HTTP-backed collaborators described by `config`.
    pub fn from_config(config: RuntimeConfig) -> anyhow::Result<Self> {
        let timeout = config.http_timeout();

        let source = HttpDirectorySource::new(&config.directory_url, timeout, &config.user_agent)?;
        let directory = TickerDirectory::new(
            Arc::new(source),
            config.code_format(),
            DirectoryCache::from_ttl_secs(config.directory_ttl_secs),
        );

        let fetcher = YahooClient::new(&config.price_base_url, timeout, &config.user_agent)?;

        Ok(Self::new(config, directory, Arc::new(fetcher)))
    }

    /// Run one comparison and account for its outcome.
    pub async fn compare(&self, request: &SpreadRequest) -> Result<SpreadReport> {
        let result = spread::compare(&self.directory, self.fetcher.as_ref(), request).await;
        let counter = if result.is_ok() {
            &self.computations_ok
        } else {
            &self.computations_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    pub fn health(&self) -> HealthSnapshot {
        let cache = self.directory.cache();
        HealthSnapshot {
            status: "ok",
            uptime_secs: self.start_time.elapsed().as_secs(),
            computations_ok: self.computations_ok.load(Ordering::Relaxed),
            computations_failed: self.computations_failed.load(Ordering::Relaxed),
            directory_cached: cache.get().is_some(),
            directory_age_secs: cache.age_secs(),
            directory_ttl_secs: cache.ttl().map(|t| t.as_secs()),
        }
    }
}

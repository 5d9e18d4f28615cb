// =============================================================================
// Directory Cache — memoised constituent list with an optional TTL
// =============================================================================
//
// Population is idempotent: two concurrent misses both scrape and the last
// `put` wins, which is harmless because both values are equivalent.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::directory::InstrumentDirectory;

struct CachedDirectory {
    directory: Arc<InstrumentDirectory>,
    fetched_at: Instant,
}

pub struct DirectoryCache {
    /// `None` keeps the entry for the process lifetime.
    ttl: Option<Duration>,
    slot: RwLock<Option<CachedDirectory>>,
}

impl DirectoryCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// `0` seconds means no expiry.
    pub fn from_ttl_secs(secs: u64) -> Self {
        Self::new((secs > 0).then(|| Duration::from_secs(secs)))
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The cached directory, if present and not expired.
    pub fn get(&self) -> Option<Arc<InstrumentDirectory>> {
        let slot = self.slot.read();
        let entry = slot.as_ref()?;
        match self.ttl {
            Some(ttl) if entry.fetched_at.elapsed() >= ttl => None,
            _ => Some(entry.directory.clone()),
        }
    }

    pub fn put(&self, directory: Arc<InstrumentDirectory>) {
        *self.slot.write() = Some(CachedDirectory {
            directory,
            fetched_at: Instant::now(),
        });
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    /// Seconds since the current entry was stored, expired or not.
    pub fn age_secs(&self) -> Option<u64> {
        self.slot
            .read()
            .as_ref()
            .map(|e| e.fetched_at.elapsed().as_secs())
    }
}

impl std::fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("ttl", &self.ttl)
            .field("populated", &self.slot.read().is_some())
            .finish()
    }
}

//! In-memory robots prefix cache
//!
//! The seeder keeps one of these per process. Entries carry the validity
//! deadline recorded alongside the prefixes; expired entries are evicted
//! on lookup so the caller re-reads the store (and, on a store miss,
//! re-fetches the robots file).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Cached robots prefixes for one host
#[derive(Debug, Clone)]
pub struct CachedPrefixes {
    pub prefixes: Vec<String>,
    pub valid_until: DateTime<Utc>,
}

/// Per-host robots prefix cache with TTL expiry
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedPrefixes>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the cached prefixes for a host, evicting the entry when
    /// its validity deadline has passed.
    pub fn get(&mut self, host: &str, now: DateTime<Utc>) -> Option<&CachedPrefixes> {
        if let Some(entry) = self.entries.get(host) {
            if entry.valid_until <= now {
                self.entries.remove(host);
                return None;
            }
        }
        self.entries.get(host)
    }

    pub fn insert(&mut self, host: &str, prefixes: Vec<String>, valid_until: DateTime<Utc>) {
        self.entries.insert(
            host.to_string(),
            CachedPrefixes {
                prefixes,
                valid_until,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

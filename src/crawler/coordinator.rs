//! Coordinator: session deduplication and IP-based shard routing
//!
//! URLs from the seeder are deduplicated against an in-memory seen-set,
//! their hosts resolved (with failures cached), and the result routed to
//! `hash(ip) % fanout`. A full shard queue means the URL is dropped on
//! the floor; the seeder re-observes it once it becomes due again.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use url::Url;

use crate::{Engine, Result};

/// The seen-set is cleared past this size; the store stays the ground
/// truth, so the occasional duplicate visit is acceptable
pub const SEEN_SET_LIMIT: usize = 2_000_000;

/// Session state owned by the coordinator task
pub struct ShardRouter {
    fanout: usize,
    seen: HashSet<String>,
    host_ips: HashMap<String, Option<String>>,
}

impl ShardRouter {
    pub fn new(fanout: usize) -> Self {
        Self {
            fanout,
            seen: HashSet::new(),
            host_ips: HashMap::new(),
        }
    }

    /// Records a URL for the session; false when it was already seen
    pub fn mark_seen(&mut self, url: &str) -> bool {
        if self.seen.contains(url) {
            return false;
        }
        if self.seen.len() >= SEEN_SET_LIMIT {
            tracing::debug!("Seen-set reached {} entries; clearing", self.seen.len());
            self.seen.clear();
        }
        self.seen.insert(url.to_string());
        true
    }

    /// Cached resolution outcome for a host; None means not yet looked
    /// up, Some(None) a cached failure
    pub fn cached_ip(&self, host: &str) -> Option<&Option<String>> {
        self.host_ips.get(host)
    }

    pub fn cache_ip(&mut self, host: &str, ip: Option<String>) {
        self.host_ips.insert(host.to_string(), ip);
    }

    /// Deterministic shard for a resolved IP
    pub fn shard_for_ip(&self, ip: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        ip.hash(&mut hasher);
        (hasher.finish() as usize) % self.fanout.max(1)
    }
}

pub async fn coordinator(
    engine: Arc<Engine>,
    mut input: mpsc::Receiver<String>,
    shards: Vec<mpsc::Sender<String>>,
) -> Result<()> {
    let token = engine.shutdown.clone();
    let mut router = ShardRouter::new(shards.len());

    loop {
        let url_str = tokio::select! {
            _ = token.cancelled() => break,
            received = input.recv() => match received {
                Some(url) => url,
                None => break,
            },
        };

        if !router.mark_seen(&url_str) {
            continue;
        }

        // urls were parsed during link extraction, so failures are rare
        let host = match Url::parse(&url_str) {
            Ok(u) => match u.host_str() {
                Some(h) => h.to_string(),
                None => continue,
            },
            Err(_) => continue,
        };

        let ip = match router.cached_ip(&host) {
            Some(cached) => cached.clone(),
            None => {
                let resolved = resolve(&host).await;
                if resolved.is_none() {
                    tracing::debug!("[coord] Could not resolve host {}", host);
                }
                router.cache_ip(&host, resolved.clone());
                resolved
            }
        };

        let ip = match ip {
            Some(ip) => ip,
            None => continue, // resolution failed; drop the url
        };

        let shard = router.shard_for_ip(&ip);
        match shards[shard].try_send(url_str) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // queue is full: drop on the floor, the seeder will
                // re-observe the url once it is due again
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }

    tracing::info!("[coord] Exited");
    Ok(())
}

async fn resolve(host: &str) -> Option<String> {
    let addrs = tokio::net::lookup_host((host, crate::url::GEMINI_DEFAULT_PORT))
        .await
        .ok()?;
    addrs.into_iter().next().map(|a| a.ip().to_string())
}

//! Global crawl blacklist: domains and URL prefixes never visited or
//! indexed

use std::collections::HashSet;
use url::Url;

use crate::config::BlacklistConfig;

/// Compiled blacklist. Built once at startup from the configuration and
/// shared read-only by the seeder and the indexer.
#[derive(Debug, Default)]
pub struct Blacklist {
    domains: HashSet<String>,
    prefixes: Vec<String>,
}

impl Blacklist {
    pub fn from_config(config: &BlacklistConfig) -> Self {
        Self {
            domains: config.domains.iter().cloned().collect(),
            prefixes: config.prefixes.clone(),
        }
    }

    /// Returns whether the URL is blacklisted, either by its host or by
    /// a URL prefix. Both the parsed and the string form are taken so
    /// callers that already have both don't pay for reassembly.
    pub fn is_blacklisted(&self, url: &Url, url_str: &str) -> bool {
        if let Some(host) = url.host_str() {
            if self.domains.contains(host) {
                return true;
            }
        }

        self.prefixes.iter().any(|p| url_str.starts_with(p))
    }
}

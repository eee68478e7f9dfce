//! Seeder: turns the store's due URLs into coordinator input
//!
//! For each candidate the seeder rejects blacklisted URLs, obtains the
//! host's robots prefixes (memory cache, then store, then a live fetch
//! of `/robots.txt`), synthesizes banned results for disallowed paths,
//! and forwards the rest. Hosts whose robots fetch keeps failing are in
//! backoff and their URLs are deferred silently.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use url::Url;

use crate::gemini::{Client, StatusClass};
use crate::robots::{self, RobotsCache};
use crate::storage::{RobotsLookup, Store};
use crate::{Engine, Result};

use super::{VisitResult, SEEDER_IDLE_SLEEP};

/// Outcome of a robots prefix lookup for one host
enum Robots {
    Prefixes(Vec<String>),
    Backoff,
}

pub async fn seeder(
    engine: Arc<Engine>,
    mut store: Store,
    output: mpsc::Sender<String>,
    results: mpsc::Sender<VisitResult>,
) -> Result<()> {
    let client = Client::new(engine.certs.clone());
    let mut cache = RobotsCache::new();
    let token = engine.shutdown.clone();

    'outer: loop {
        let due = store.due_urls(Store::now())?;
        tracing::debug!("[seeder] {} URLs due", due.len());

        for url_str in due {
            if token.is_cancelled() {
                break 'outer;
            }

            let parsed = match Url::parse(&url_str) {
                Ok(u) => u,
                Err(_) => continue,
            };

            if engine.blacklist.is_blacklisted(&parsed, &url_str) {
                continue;
            }

            let prefixes = tokio::select! {
                r = host_prefixes(&mut store, &mut cache, &client, &parsed) => r?,
                _ = token.cancelled() => break 'outer,
            };
            let prefixes = match prefixes {
                Robots::Prefixes(p) => p,
                Robots::Backoff => continue, // deferred without log spam
            };

            if robots::is_banned(parsed.path(), &prefixes) {
                let banned = VisitResult::Banned { url: url_str };
                tokio::select! {
                    _ = results.send(banned) => {}
                    _ = token.cancelled() => break 'outer,
                }
                continue;
            }

            tokio::select! {
                _ = output.send(url_str) => {}
                _ = token.cancelled() => break 'outer,
            }
        }

        // the due set is exhausted; give the flusher a moment to produce
        // new work before polling again
        tokio::select! {
            _ = tokio::time::sleep(SEEDER_IDLE_SLEEP) => {}
            _ = token.cancelled() => break,
        }
    }

    tracing::info!("[seeder] Exited");
    Ok(())
}

/// Robots prefixes for the URL's host: memory cache first, then the
/// store, then a live fetch whose outcome is written back to the store.
async fn host_prefixes(
    store: &mut Store,
    cache: &mut RobotsCache,
    client: &Client,
    url: &Url,
) -> Result<Robots> {
    let host = match url.host_str() {
        Some(h) => h.to_string(),
        None => return Ok(Robots::Prefixes(Vec::new())),
    };
    let now = Store::now();
    let now_dt = Utc::now();

    if let Some(hit) = cache.get(&host, now_dt) {
        return Ok(Robots::Prefixes(hit.prefixes.clone()));
    }

    match store.robots_lookup(&host, now)? {
        RobotsLookup::Prefixes {
            prefixes,
            valid_until,
        } => {
            let deadline = Utc
                .timestamp_opt(valid_until, 0)
                .single()
                .unwrap_or(now_dt);
            cache.insert(&host, prefixes.clone(), deadline);
            return Ok(Robots::Prefixes(prefixes));
        }
        RobotsLookup::Backoff => return Ok(Robots::Backoff),
        RobotsLookup::Missing => {}
    }

    fetch_robots(store, cache, client, url, &host, now).await
}

async fn fetch_robots(
    store: &mut Store,
    cache: &mut RobotsCache,
    client: &Client,
    url: &Url,
    host: &str,
    now: i64,
) -> Result<Robots> {
    let mut robots_url = url.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    let fetched = client.fetch(&robots_url).await;

    let prefixes = match fetched {
        Ok((response, final_url)) => {
            if response.is_slowdown() {
                // host-level cooldown; no urls-table update
                if let Ok(seconds) = response.meta.trim().parse::<i64>() {
                    store.set_host_slowdown(host, now + seconds)?;
                }
                return Ok(Robots::Backoff);
            }

            match response.class() {
                Some(StatusClass::Success) => {
                    if final_url != robots_url {
                        tracing::info!(
                            "robots.txt redirected from {} to {}; treating as no robots",
                            robots_url,
                            final_url
                        );
                        Vec::new()
                    } else {
                        tracing::info!("Found robots.txt for {}", host);
                        robots::parse_robots(&String::from_utf8_lossy(&response.body))
                    }
                }
                Some(StatusClass::PermFailure) => {
                    // no such file
                    Vec::new()
                }
                _ => {
                    tracing::info!(
                        "Cannot read robots.txt for {}: got code {}; treating as no robots",
                        host,
                        response.code
                    );
                    Vec::new()
                }
            }
        }
        Err(e) => {
            store.save_robots_error(host, e.is_permanent(), now)?;
            return Ok(Robots::Backoff);
        }
    };

    let valid_until = store.save_robots_success(host, &prefixes, now)?;
    let deadline = Utc
        .timestamp_opt(valid_until, 0)
        .single()
        .unwrap_or_else(Utc::now);
    cache.insert(host, prefixes.clone(), deadline);

    Ok(Robots::Prefixes(prefixes))
}

//! The crawler: five cooperating workers turning due URLs into
//! persistent visit outcomes
//!
//! - the **seeder** polls the store for due URLs and enforces the
//!   blacklist and robots rules,
//! - the **coordinator** deduplicates the session and routes URLs to
//!   visitor shards by resolved IP,
//! - the **visitors** perform the Gemini transactions and parse
//!   successful payloads,
//! - the **flusher** serializes visit results into the store,
//! - the **cleaner** garbage-collects unreferenced content rows.
//!
//! Backpressure: per-shard queues are bounded and the coordinator drops
//! on the floor when one is full; the seeder re-observes the URL once it
//! is due again. The shared results queue blocks visitors when full,
//! capping the global fetch rate.

mod blacklist;
mod cleaner;
mod coordinator;
mod flusher;
mod seeder;
mod visitor;

pub use blacklist::Blacklist;
pub use cleaner::cleaner;
pub use coordinator::{coordinator, ShardRouter};
pub use flusher::{apply_result, flusher, parse_content_type};
pub use seeder::seeder;
pub use visitor::{classify_error, classify_response, visitor};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::parse::Page;
use crate::storage::Store;
use crate::{Engine, GemplexError, Result};

/// Capacity of the shared results queue
pub const RESULTS_QUEUE_SIZE: usize = 10_000;

/// Capacity of the seeder → coordinator queue
pub const URL_QUEUE_SIZE: usize = 100_000;

/// Pause between seeder passes once the due set is exhausted
pub const SEEDER_IDLE_SLEEP: Duration = Duration::from_secs(10);

/// Per-visitor pause after each URL, capping per-host pressure
pub const VISITOR_SLEEP: Duration = Duration::from_secs(1);

/// Interval between cleaner passes
pub const CLEANER_PERIOD: Duration = Duration::from_secs(15 * 60);

/// The outcome of visiting one URL. One variant per persistence class;
/// the flusher dispatches on the variant.
#[derive(Debug)]
pub enum VisitResult {
    /// 2x response with a parseable text payload
    Success {
        url: String,
        status_code: u16,
        page: Page,
        contents: Vec<u8>,
        content_type: String,
        visited_at: i64,
    },

    /// Disallowed by the host's robots prefixes (synthesized by the
    /// seeder, no fetch happens)
    Banned { url: String },

    /// Status 44: the host asked for a cooldown
    Slowdown {
        url: String,
        seconds: Option<i64>,
        error: String,
    },

    /// 5x, 1x, too many redirects, or a dead host
    Permanent {
        url: String,
        status_code: Option<u16>,
        error: String,
    },

    /// Everything else: 4x, transient network errors, parse failures
    Temporary {
        url: String,
        status_code: Option<u16>,
        error: String,
    },
}

impl VisitResult {
    pub fn url(&self) -> &str {
        match self {
            VisitResult::Success { url, .. }
            | VisitResult::Banned { url }
            | VisitResult::Slowdown { url, .. }
            | VisitResult::Permanent { url, .. }
            | VisitResult::Temporary { url, .. } => url,
        }
    }
}

/// Runs the crawler until shutdown. Spawns all five worker kinds, waits
/// for them to acknowledge, then drains the shard queues (optionally
/// dumping them to `dump_path` for debugging).
pub async fn crawl(engine: Arc<Engine>, dump_path: Option<PathBuf>) -> Result<()> {
    let db_path = Path::new(&engine.config.db.path).to_path_buf();

    let mut seeder_store = Store::open(&db_path)?;
    let flusher_store = Store::open(&db_path)?;
    let cleaner_store = Store::open(&db_path)?;

    for seed in &engine.config.crawl.seeds {
        match crate::url::normalize_url_str(seed) {
            Ok(url) => seeder_store.seed_url(&url)?,
            Err(e) => tracing::warn!("Ignoring invalid seed URL {}: {}", seed, e),
        }
    }

    let fanout = engine.config.crawl.fanout;
    let queue_size = engine.config.crawl.queue_size;

    let (url_tx, url_rx) = mpsc::channel::<String>(URL_QUEUE_SIZE);
    let (results_tx, results_rx) = mpsc::channel::<VisitResult>(RESULTS_QUEUE_SIZE);

    let mut shard_txs = Vec::with_capacity(fanout);
    let mut shard_rxs = Vec::with_capacity(fanout);
    for _ in 0..fanout {
        let (tx, rx) = mpsc::channel::<String>(queue_size);
        shard_txs.push(tx);
        shard_rxs.push(rx);
    }

    let mut visitors: JoinSet<Result<(usize, Vec<String>)>> = JoinSet::new();
    for (id, rx) in shard_rxs.into_iter().enumerate() {
        let engine = engine.clone();
        let results = results_tx.clone();
        visitors.spawn(async move {
            let leftover = visitor(id, engine, rx, results).await?;
            Ok((id, leftover))
        });
    }

    let mut workers: JoinSet<Result<()>> = JoinSet::new();
    workers.spawn(seeder(engine.clone(), seeder_store, url_tx, results_tx));
    workers.spawn(coordinator(engine.clone(), url_rx, shard_txs));
    workers.spawn(flusher(engine.clone(), flusher_store, results_rx));
    workers.spawn(cleaner(engine.clone(), cleaner_store));

    let mut failure: Option<GemplexError> = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Crawler worker failed: {}", e);
                engine.shutdown.cancel();
                if failure.is_none() {
                    failure = Some(e);
                }
            }
            Err(e) => {
                tracing::error!("Crawler worker panicked: {}", e);
                engine.shutdown.cancel();
            }
        }
    }

    tracing::info!("Draining visitor queues...");
    let mut leftovers: Vec<(usize, Vec<String>)> = Vec::new();
    while let Some(joined) = visitors.join_next().await {
        if let Ok(Ok((id, urls))) = joined {
            if !urls.is_empty() {
                leftovers.push((id, urls));
            }
        }
    }

    if let Some(path) = dump_path {
        leftovers.sort_by_key(|(id, _)| *id);
        if let Err(e) = dump_crawler_state(&path, &leftovers) {
            tracing::warn!("Could not dump crawler state: {}", e);
        }
    }

    match failure {
        Some(e) => Err(e),
        None => {
            tracing::info!("Crawler stopped");
            Ok(())
        }
    }
}

/// Writes the undispatched per-shard URLs to a human-readable file
fn dump_crawler_state(path: &Path, leftovers: &[(usize, Vec<String>)]) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(path)?;
    for (id, urls) in leftovers {
        writeln!(file, "---- channel {} ----", id)?;
        for url in urls {
            writeln!(file, "{}", url)?;
        }
    }

    tracing::info!("Dumped crawler state to {}", path.display());
    Ok(())
}

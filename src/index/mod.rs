//! Ping-pong indexer and the live index alias
//!
//! Two named slots (`ping.idx`, `pong.idx`) alternate as the live index.
//! Each cycle rebuilds the inactive slot from the store and atomically
//! swaps the alias the search daemon reads through; queries always see
//! exactly one complete index.

mod builder;
mod schema;

pub use builder::build_index;
pub use schema::{build_schema, resolve_fields, IndexFields};

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tantivy::{Index, IndexReader};

use crate::storage::Store;
use crate::{Engine, GemplexError, Result};

/// Pause between index rebuilds
pub const INDEX_PERIOD: Duration = Duration::from_secs(3600);

/// The two on-disk index slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Ping,
    Pong,
}

impl Slot {
    pub fn dir_name(self) -> &'static str {
        match self {
            Slot::Ping => "ping.idx",
            Slot::Pong => "pong.idx",
        }
    }

    pub fn other(self) -> Slot {
        match self {
            Slot::Ping => Slot::Pong,
            Slot::Pong => Slot::Ping,
        }
    }

    pub fn path(self, base: &Path) -> PathBuf {
        base.join(self.dir_name())
    }
}

/// An opened index slot ready for queries
pub struct LiveIndex {
    pub slot: Slot,
    pub index: Index,
    pub reader: IndexReader,
    pub fields: IndexFields,
}

impl LiveIndex {
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

/// The alias the search daemon reads through while the indexer swaps
/// slots underneath it
#[derive(Default)]
pub struct IndexAlias {
    inner: RwLock<Option<Arc<LiveIndex>>>,
}

impl IndexAlias {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live index, if one has been loaded yet
    pub fn current(&self) -> Option<Arc<LiveIndex>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Atomically replaces the live index, returning the previous one
    pub fn swap(&self, live: Arc<LiveIndex>) -> Option<Arc<LiveIndex>> {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.replace(live)
    }
}

/// Opens an existing slot
pub fn open_slot(base: &Path, slot: Slot) -> Result<LiveIndex> {
    let index = Index::open_in_dir(slot.path(base))?;
    let fields = resolve_fields(&index.schema())?;
    let reader = index.reader()?;
    Ok(LiveIndex {
        slot,
        index,
        reader,
        fields,
    })
}

/// Clears a slot's directory and creates a fresh empty index there
pub fn create_slot(base: &Path, slot: Slot) -> Result<Index> {
    let path = slot.path(base);
    match std::fs::remove_dir_all(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(&path)?;
    Ok(Index::create_in_dir(&path, build_schema())?)
}

/// Initial index selection at startup.
///
/// Opens whichever slots exist: with both present the one holding more
/// documents wins; with neither, a fresh ping index is built
/// synchronously so the search daemon has something to read before its
/// first cycle.
pub fn load_initial(engine: &Engine, store: &Store) -> Result<()> {
    if engine.alias.current().is_some() {
        return Ok(());
    }

    let base = Path::new(&engine.config.index.path);
    let ping = open_slot(base, Slot::Ping);
    let pong = open_slot(base, Slot::Pong);

    let live = match (ping, pong) {
        (Ok(ping), Ok(pong)) => {
            let (ping_count, pong_count) = (ping.doc_count(), pong.doc_count());
            if ping_count > pong_count {
                tracing::info!(
                    "[index] Choosing ping: more documents ({} > {})",
                    ping_count,
                    pong_count
                );
                ping
            } else {
                tracing::info!(
                    "[index] Choosing pong: more documents ({} >= {})",
                    pong_count,
                    ping_count
                );
                pong
            }
        }
        (Ok(ping), Err(e)) => {
            tracing::info!("[index] Going with ping; pong did not open: {}", e);
            ping
        }
        (Err(e), Ok(pong)) => {
            tracing::info!("[index] Going with pong; ping did not open: {}", e);
            pong
        }
        (Err(_), Err(_)) => {
            tracing::info!("[index] No index available; building ping...");
            let index = create_slot(base, Slot::Ping)?;
            let fields = resolve_fields(&index.schema())?;
            let built = build_index(
                store,
                &index,
                &fields,
                engine.config.index.batch_size,
                &engine.blacklist,
                &engine.shutdown,
            )?;
            if built.is_none() {
                // cancelled before the initial index was complete
                return Ok(());
            }
            let reader = index.reader()?;
            LiveIndex {
                slot: Slot::Ping,
                index,
                reader,
                fields,
            }
        }
    };

    engine.alias.swap(Arc::new(live));
    Ok(())
}

/// The periodic indexer daemon
pub async fn index(engine: Arc<Engine>) -> Result<()> {
    let store = Store::open(Path::new(&engine.config.db.path))?;
    let token = engine.shutdown.clone();

    load_initial(&engine, &store)?;

    loop {
        if token.is_cancelled() {
            break;
        }

        // the rebuild is blocking work; run it off the async threads
        let engine_for_build = engine.clone();
        let db_path = PathBuf::from(&engine.config.db.path);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let store = Store::open(&db_path)?;
            rebuild_inactive(&engine_for_build, &store)
        })
        .await
        .map_err(|e| GemplexError::IndexDir(format!("index build task failed: {}", e)))??;

        tokio::select! {
            _ = tokio::time::sleep(INDEX_PERIOD) => {}
            _ = token.cancelled() => break,
        }
    }

    tracing::info!("[index] Exited");
    Ok(())
}

/// Builds the inactive slot from the store and swaps it live
pub fn rebuild_inactive(engine: &Engine, store: &Store) -> Result<()> {
    let base = Path::new(&engine.config.index.path);
    let target = match engine.alias.current() {
        Some(live) => live.slot.other(),
        None => Slot::Ping,
    };

    tracing::info!("Creating new index in slot {:?}", target);
    let index = create_slot(base, target)?;
    let fields = resolve_fields(&index.schema())?;

    let built = build_index(
        store,
        &index,
        &fields,
        engine.config.index.batch_size,
        &engine.blacklist,
        &engine.shutdown,
    )?;
    if built.is_none() {
        tracing::info!("Index build cancelled; keeping the current slot live");
        return Ok(());
    }

    let reader = index.reader()?;
    engine.alias.swap(Arc::new(LiveIndex {
        slot: target,
        index,
        reader,
        fields,
    }));
    tracing::info!("Swapped in new index: {:?}", target);
    Ok(())
}

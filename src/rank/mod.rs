//! Link-graph ranker
//!
//! Periodically computes PageRank over the URL graph and over the host
//! graph (URL edges projected through the url→host mapping), then writes
//! back `urlRank × hostRank` per URL (renormalized to max 1.0) and the
//! host ranks.

mod pagerank;

pub use pagerank::{pagerank, BETA, EPSILON};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::Store;
use crate::{Engine, Result};

/// Pause between ranking passes
pub const RANK_PERIOD: Duration = Duration::from_secs(3600);

pub async fn rank(engine: Arc<Engine>) -> Result<()> {
    let mut store = Store::open(Path::new(&engine.config.db.path))?;
    let token = engine.shutdown.clone();

    loop {
        run_rank_pass(&mut store)?;

        tokio::select! {
            _ = tokio::time::sleep(RANK_PERIOD) => {}
            _ = token.cancelled() => break,
        }
    }

    tracing::info!("[rank] Exited");
    Ok(())
}

/// One full ranking pass over the store
pub fn run_rank_pass(store: &mut Store) -> Result<()> {
    let edges = store.link_edges()?;
    tracing::info!("[rank] Ranking {} edges", edges.len());

    let url_ranks = pagerank(&edges);

    let host_of: HashMap<i64, String> = store.url_hosts()?.into_iter().collect();

    // project the url graph onto hosts; intra-host edges become
    // self-loops, which pagerank ignores
    let mut host_index: HashMap<String, i64> = HashMap::new();
    let mut host_names: Vec<String> = Vec::new();
    let host_id = |index: &mut HashMap<String, i64>,
                   names: &mut Vec<String>,
                   host: &str| {
        if let Some(&id) = index.get(host) {
            return id;
        }
        let id = names.len() as i64;
        names.push(host.to_string());
        index.insert(host.to_string(), id);
        id
    };

    let mut host_edges = Vec::with_capacity(edges.len());
    for (src, dst) in &edges {
        let (Some(src_host), Some(dst_host)) = (host_of.get(src), host_of.get(dst)) else {
            continue;
        };
        let s = host_id(&mut host_index, &mut host_names, src_host);
        let d = host_id(&mut host_index, &mut host_names, dst_host);
        host_edges.push((s, d));
    }

    let host_ranks_by_id = pagerank(&host_edges);
    let host_rank_of = |host: &str| -> f64 {
        host_index
            .get(host)
            .and_then(|id| host_ranks_by_id.get(id))
            .copied()
            .unwrap_or(0.0)
    };

    // stored per-url rank is urlRank × hostRank, renormalized
    let mut combined: Vec<(i64, f64)> = url_ranks
        .iter()
        .map(|(&id, &rank)| {
            let host_rank = host_of.get(&id).map(|h| host_rank_of(h)).unwrap_or(0.0);
            (id, rank * host_rank)
        })
        .collect();

    let max = combined.iter().map(|&(_, r)| r).fold(0.0_f64, f64::max);
    if max > 0.0 {
        for entry in &mut combined {
            entry.1 /= max;
        }
    }

    let host_ranks: Vec<(String, f64)> = host_names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
            host_ranks_by_id
                .get(&(i as i64))
                .map(|&r| (name.clone(), r))
        })
        .collect();

    store.write_url_ranks(&combined)?;
    store.write_host_ranks(&host_ranks)?;

    tracing::info!(
        "[rank] Wrote {} url ranks and {} host ranks",
        combined.len(),
        host_ranks.len()
    );
    Ok(())
}

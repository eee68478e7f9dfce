//! Damped PageRank over a directed edge list
//!
//! The graph is held as parallel arrays (interned node ids, out-degrees,
//! compacted edges); no pointer structures. Cycles are fine, acyclicity
//! is not assumed.

use std::collections::HashMap;

/// Damping factor
pub const BETA: f64 = 0.85;

/// Convergence tolerance on the L1 delta between iterations
pub const EPSILON: f64 = 1e-4;

/// Computes PageRank for the given `(src, dst)` edges.
///
/// Self-loops are ignored. The returned ranks are normalized so the
/// highest-ranking node has rank 1.0; an empty edge set yields an empty
/// map.
pub fn pagerank(edges: &[(i64, i64)]) -> HashMap<i64, f64> {
    let (nodes, mut ranks) = converge(edges);

    let max = ranks.iter().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for rank in &mut ranks {
            *rank /= max;
        }
    }

    nodes.into_iter().zip(ranks).collect()
}

/// Runs the power iteration to convergence, returning the interned node
/// list and the raw (unnormalized) ranks, which sum to 1.0.
fn converge(edges: &[(i64, i64)]) -> (Vec<i64>, Vec<f64>) {
    if edges.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut nodes: Vec<i64> = Vec::new();
    let mut compact: Vec<(usize, usize)> = Vec::with_capacity(edges.len());
    for &(src, dst) in edges {
        let s = intern(&mut index, &mut nodes, src);
        let d = intern(&mut index, &mut nodes, dst);
        compact.push((s, d));
    }

    let n = nodes.len();
    let mut out_degree = vec![0.0_f64; n];
    for &(s, _) in &compact {
        out_degree[s] += 1.0;
    }

    // uniformly distribute 1.0 unit of rank over all nodes
    let mut ranks = vec![1.0 / n as f64; n];
    let mut next = vec![0.0_f64; n];

    loop {
        for &(s, d) in &compact {
            if s == d {
                continue;
            }
            next[d] += BETA * ranks[s] / out_degree[s];
        }

        // rank that did not get redistributed (dangling nodes, damping)
        // leaks; spread it uniformly so the total mass stays 1.0
        let total: f64 = next.iter().sum();
        let leak = (1.0 - total) / n as f64;

        let mut diff = 0.0;
        for i in 0..n {
            next[i] += leak;
            diff += (ranks[i] - next[i]).abs();
        }

        std::mem::swap(&mut ranks, &mut next);
        for value in next.iter_mut() {
            *value = 0.0;
        }

        if diff <= EPSILON {
            break;
        }
    }

    (nodes, ranks)
}

fn intern(index: &mut HashMap<i64, usize>, nodes: &mut Vec<i64>, id: i64) -> usize {
    if let Some(&i) = index.get(&id) {
        return i;
    }
    let i = nodes.len();
    nodes.push(id);
    index.insert(id, i);
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_edges_empty_ranks() {
        assert!(pagerank(&[]).is_empty());
    }

    #[test]
    fn test_self_edges_ignored() {
        let ranks = pagerank(&[(1, 1), (2, 2)]);
        assert_eq!(ranks.len(), 2);
        // neither node receives anything from the other; ranks are equal
        assert!((ranks[&1] - ranks[&2]).abs() < 1e-9);
    }

    #[test]
    fn test_raw_ranks_sum_to_one() {
        let (_, ranks) = converge(&[(1, 2), (2, 3), (3, 1), (1, 3)]);
        let sum: f64 = ranks.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
    }

    #[test]
    fn test_two_node_chain() {
        let ranks = pagerank(&[(1, 2)]);
        assert!(ranks[&2] > ranks[&1]);
    }

    #[test]
    fn test_normalized_max_is_one() {
        let ranks = pagerank(&[(1, 2), (3, 2), (2, 1)]);
        let max = ranks.values().cloned().fold(0.0_f64, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
        for rank in ranks.values() {
            assert!(*rank > 0.0 && *rank <= 1.0);
        }
    }

    #[test]
    fn test_hub_outranks_leaves() {
        // everything links to node 10
        let ranks = pagerank(&[(1, 10), (2, 10), (3, 10), (10, 1)]);
        assert_eq!(ranks[&10], 1.0);
        assert!(ranks[&1] > ranks[&2]); // 10 links back to 1
        assert!((ranks[&2] - ranks[&3]).abs() < 1e-9);
    }
}

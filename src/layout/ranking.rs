use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Directed edge between two node ids, as seen by the layered layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RankEdge<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

/// Longest-path ranks over a declaration-ordered topological sort.
///
/// When only cycles remain, the earliest-declared unprocessed node becomes
/// the next source and its incoming edges are treated as back-edges. Edges
/// that point backwards in the resulting order never raise a rank.
pub(super) fn compute_ranks<'a>(
    node_ids: &[&'a str],
    edges: &[RankEdge<'a>],
    node_order: &HashMap<&'a str, usize>,
) -> HashMap<&'a str, usize> {
    let set: HashSet<&str> = node_ids.iter().copied().collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        if set.contains(edge.from) && set.contains(edge.to) {
            adj.entry(edge.from).or_default().push(edge.to);
            if let Some(deg) = indeg.get_mut(edge.to) {
                *deg += 1;
            }
        }
    }

    let order_key = |id: &str| -> usize { node_order.get(id).copied().unwrap_or(usize::MAX) };

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();
    for id in node_ids {
        if indeg.get(id).copied().unwrap_or(0) == 0 {
            ready.push(Reverse((order_key(*id), *id)));
        }
    }

    let mut order: Vec<&str> = Vec::with_capacity(set.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id);
            for next in adj.get(id).into_iter().flatten() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse((order_key(*next), *next)));
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        let best = node_ids
            .iter()
            .filter(|id| !processed.contains(*id))
            .min_by_key(|id| order_key(**id));
        match best {
            Some(id) => ready.push(Reverse((order_key(*id), *id))),
            None => break,
        }
    }

    let order_index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx))
        .collect();

    let mut ranks: HashMap<&'a str, usize> = HashMap::new();
    for node in &order {
        let rank = *ranks.entry(*node).or_insert(0);
        let from_idx = order_index.get(node).copied().unwrap_or(0);
        for next in adj.get(node).into_iter().flatten() {
            let to_idx = order_index.get(next).copied().unwrap_or(from_idx);
            if to_idx <= from_idx {
                continue;
            }
            let entry = ranks.entry(*next).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }
    ranks
}

/// Reorders each rank by the median position of its neighbours in the
/// adjacent rank, sweeping down then up `passes` times. Ties keep the current
/// order, then declaration order.
pub(super) fn order_rank_nodes<'a>(
    rank_nodes: &mut [Vec<&'a str>],
    edges: &[RankEdge<'a>],
    node_order: &HashMap<&'a str, usize>,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        outgoing.entry(edge.from).or_default().push(edge.to);
        incoming.entry(edge.to).or_default().push(edge.from);
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let update_positions = |rank_nodes: &[Vec<&'a str>], positions: &mut HashMap<&'a str, usize>| {
        positions.clear();
        for bucket in rank_nodes {
            for (idx, node_id) in bucket.iter().enumerate() {
                positions.insert(*node_id, idx);
            }
        }
    };
    update_positions(&*rank_nodes, &mut positions);

    let sort_bucket = |bucket: &mut Vec<&'a str>,
                       neighbors: &HashMap<&str, Vec<&str>>,
                       positions: &HashMap<&str, usize>| {
        let current: HashMap<&str, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (*id, idx))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = median_position(a, neighbors, positions, &current);
            let b_score = median_position(b, neighbors, positions, &current);
            a_score
                .partial_cmp(&b_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| current.get(a).cmp(&current.get(b)))
                .then_with(|| {
                    let a_order = node_order.get(a).copied().unwrap_or(usize::MAX);
                    let b_order = node_order.get(b).copied().unwrap_or(usize::MAX);
                    a_order.cmp(&b_order)
                })
        });
    };

    for _ in 0..passes.max(1) {
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &incoming, &positions);
            update_positions(&*rank_nodes, &mut positions);
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            sort_bucket(&mut rank_nodes[rank], &outgoing, &positions);
            update_positions(&*rank_nodes, &mut positions);
        }
    }
}

fn median_position(
    node_id: &str,
    neighbors: &HashMap<&str, Vec<&str>>,
    positions: &HashMap<&str, usize>,
    current: &HashMap<&str, usize>,
) -> f64 {
    let fallback = current.get(node_id).copied().unwrap_or(0) as f64;
    let Some(list) = neighbors.get(node_id) else {
        return fallback;
    };
    let mut values: Vec<f64> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor).map(|pos| *pos as f64))
        .collect();
    if values.is_empty() {
        return fallback;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

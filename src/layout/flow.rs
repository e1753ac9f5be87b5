use std::collections::HashMap;

use super::LayoutPosition;
use super::ranking::{RankEdge, compute_ranks, order_rank_nodes};
use crate::config::SpacingConfig;
use crate::ir::{Direction, ParsedDiagram};

/// Layered layout. Ranks advance along the diagram direction (x for LR/RL,
/// y for TD/BT, reversed for RL/BT); nodes within a rank are spread across
/// the other axis, centred on the rank line.
pub(super) fn compute_flow_layout(
    diagram: &ParsedDiagram,
    spacing: SpacingConfig,
    order_passes: usize,
) -> Vec<LayoutPosition> {
    let node_ids: Vec<&str> = diagram.nodes.iter().map(|node| node.id.as_str()).collect();
    let node_order: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx))
        .collect();
    let edges: Vec<RankEdge> = diagram
        .connections
        .iter()
        .filter(|conn| conn.source_id != conn.target_id)
        .filter(|conn| {
            node_order.contains_key(conn.source_id.as_str())
                && node_order.contains_key(conn.target_id.as_str())
        })
        .map(|conn| RankEdge {
            from: conn.source_id.as_str(),
            to: conn.target_id.as_str(),
        })
        .collect();

    let ranks = compute_ranks(&node_ids, &edges, &node_order);
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut rank_nodes: Vec<Vec<&str>> = vec![Vec::new(); max_rank + 1];
    for id in &node_ids {
        let rank = ranks.get(id).copied().unwrap_or(0);
        rank_nodes[rank].push(*id);
    }
    order_rank_nodes(&mut rank_nodes, &edges, &node_order, order_passes);

    let direction = diagram.direction;
    let (rank_gap, node_gap) = if direction.is_horizontal() {
        (spacing.horizontal_spacing, spacing.vertical_spacing)
    } else {
        (spacing.vertical_spacing, spacing.horizontal_spacing)
    };

    let mut placed: HashMap<&str, (f64, f64)> = HashMap::with_capacity(node_ids.len());
    for (rank, bucket) in rank_nodes.iter().enumerate() {
        let rank_slot = match direction {
            Direction::RightLeft | Direction::BottomTop => max_rank - rank,
            Direction::LeftRight | Direction::TopDown => rank,
        };
        let rank_coord = rank_slot as f64 * rank_gap;
        let half_span = (bucket.len().saturating_sub(1)) as f64 / 2.0;
        for (idx, id) in bucket.iter().enumerate() {
            let cross_coord = (idx as f64 - half_span) * node_gap;
            let point = if direction.is_horizontal() {
                (rank_coord, cross_coord)
            } else {
                (cross_coord, rank_coord)
            };
            placed.insert(*id, point);
        }
    }

    // An id missing here is left out; the assembler reports it.
    node_ids
        .iter()
        .filter_map(|id| {
            let (x, y) = placed.get(id).copied()?;
            Some(LayoutPosition::new(id, x, y))
        })
        .collect()
}

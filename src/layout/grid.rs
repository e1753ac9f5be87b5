use super::LayoutPosition;
use crate::config::SpacingConfig;
use crate::ir::ParsedNode;

pub(super) fn compute_grid_layout(nodes: &[ParsedNode], spacing: SpacingConfig) -> Vec<LayoutPosition> {
    let columns = grid_columns(nodes.len());
    nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let col = idx % columns;
            let row = idx / columns;
            LayoutPosition::new(
                &node.id,
                col as f64 * spacing.horizontal_spacing,
                row as f64 * spacing.vertical_spacing,
            )
        })
        .collect()
}

fn grid_columns(count: usize) -> usize {
    ((count as f64).sqrt().ceil() as usize).max(1)
}

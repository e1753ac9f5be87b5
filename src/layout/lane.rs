use super::LayoutPosition;
use crate::config::SpacingConfig;
use crate::ir::ParsedNode;

/// Lifelines side by side; message order is carried by the connectors.
pub(super) fn compute_lane_layout(nodes: &[ParsedNode], spacing: SpacingConfig) -> Vec<LayoutPosition> {
    nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| LayoutPosition::new(&node.id, idx as f64 * spacing.horizontal_spacing, 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_mermaid;

    #[test]
    fn participants_share_one_row() {
        let parsed = parse_mermaid("sequenceDiagram\nA->>B: hi\nB->>C: hi\nC-->>A: bye").unwrap();
        let positions = compute_lane_layout(&parsed.nodes, SpacingConfig::new(150.0, 0.0));
        let coords: Vec<(&str, f64, f64)> = positions
            .iter()
            .map(|p| (p.id.as_str(), p.x, p.y))
            .collect();
        assert_eq!(coords, vec![("A", 0.0, 0.0), ("B", 150.0, 0.0), ("C", 300.0, 0.0)]);
    }
}

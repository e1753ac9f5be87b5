//! Auto-layout: assigns each parsed node a cell origin on the canvas.
//!
//! Layout never fails. Every strategy returns exactly one position per node,
//! in node declaration order, including nodes no connection touches.

mod flow;
mod grid;
mod lane;
mod ranking;
use flow::*;
use grid::*;
use lane::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LayoutConfig;
use crate::ir::{DiagramKind, ParsedDiagram};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutStrategy {
    /// `ceil(sqrt(n))` columns filled row by row.
    Grid,
    /// Layered by longest path from the sources, following the diagram direction.
    Flow,
    /// One row in declaration order.
    Lane,
}

impl LayoutStrategy {
    pub fn default_for(kind: DiagramKind) -> Self {
        match kind {
            DiagramKind::Flowchart => Self::Flow,
            DiagramKind::Class | DiagramKind::Architecture => Self::Grid,
            DiagramKind::Sequence => Self::Lane,
        }
    }
}

impl std::str::FromStr for LayoutStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(Self::Grid),
            "flow" | "layered" => Ok(Self::Flow),
            "lane" | "row" => Ok(Self::Lane),
            other => Err(format!("unknown layout strategy '{other}' (expected grid, flow or lane)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl LayoutPosition {
    fn new(id: &str, x: f64, y: f64) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
        }
    }
}

pub fn compute_layout(
    diagram: &ParsedDiagram,
    strategy: LayoutStrategy,
    config: &LayoutConfig,
) -> Vec<LayoutPosition> {
    let spacing = config.spacing(diagram.kind);
    let positions = match strategy {
        LayoutStrategy::Grid => compute_grid_layout(&diagram.nodes, spacing),
        LayoutStrategy::Lane => compute_lane_layout(&diagram.nodes, spacing),
        LayoutStrategy::Flow => compute_flow_layout(diagram, spacing, config.order_passes),
    };
    debug!(
        ?strategy,
        kind = %diagram.kind,
        nodes = positions.len(),
        "computed layout"
    );
    positions
}

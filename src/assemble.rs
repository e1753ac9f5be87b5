//! Graph assembly: parsed nodes + layout positions → canvas shapes and
//! connectors.
//!
//! Shapes and connectors are keyed by generated UUIDs. Index-based consumers
//! use [`Diagram::indexed_connectors`]; review-before-save flows wrap the
//! result in a [`PendingImport`] and re-key it on [`PendingImport::commit`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ExportError, ImportError};
use crate::ir::{
    Activation, DiagramKind, Direction, LineType, MarkerEnd, NodeDetails, ParsedConnection,
    ParsedDiagram, ParsedNode, Port, Relationship,
};
use crate::layout::LayoutPosition;
use crate::shape::{ShapeSubtype, ShapeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ShapeId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(Uuid);

impl ConnectorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Dialect-specific payload of a shape. Group references point at other
/// shapes in the same diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ShapeData {
    Class {
        stereotype: Option<String>,
        attributes: Vec<String>,
        methods: Vec<String>,
    },
    Service {
        icon: Option<String>,
        group: Option<ShapeId>,
    },
    Group {
        icon: Option<String>,
        parent: Option<ShapeId>,
    },
    Junction {
        group: Option<ShapeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    #[serde(rename = "type")]
    pub shape_type: ShapeType,
    pub subtype: Option<ShapeSubtype>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    pub z_index: i32,
    pub locked: bool,
    pub is_preview: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ShapeData>,
}

impl Shape {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorStyle {
    Orthogonal,
    Straight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    None,
    Arrow,
    OpenArrow,
    Cross,
    Triangle,
    FilledDiamond,
    HollowDiamond,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorData {
    /// Position of a message in the sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<Activation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<Port>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: ConnectorId,
    pub source_shape_id: ShapeId,
    pub target_shape_id: ShapeId,
    pub relationship: Relationship,
    pub style: ConnectorStyle,
    pub marker_start: Marker,
    pub marker_end: Marker,
    pub line_type: LineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub z_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ConnectorData>,
}

/// Connector endpoints expressed as positions in [`Diagram::shapes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedConnector {
    pub from_shape_index: usize,
    pub to_shape_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    pub kind: DiagramKind,
    pub direction: Direction,
    pub shapes: Vec<Shape>,
    pub connectors: Vec<Connector>,
}

impl Diagram {
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|shape| shape.id == id)
    }

    /// Index pairs for each connector, in connector order.
    pub fn indexed_connectors(&self) -> Result<Vec<IndexedConnector>, ExportError> {
        let index: HashMap<ShapeId, usize> = self
            .shapes
            .iter()
            .enumerate()
            .map(|(idx, shape)| (shape.id, idx))
            .collect();
        self.connectors
            .iter()
            .map(|connector| -> Result<IndexedConnector, ExportError> {
                let lookup = |id: ShapeId| {
                    index.get(&id).copied().ok_or_else(|| ExportError::MissingShape {
                        connector: connector.id.to_string(),
                        shape: id.to_string(),
                    })
                };
                Ok(IndexedConnector {
                    from_shape_index: lookup(connector.source_shape_id)?,
                    to_shape_index: lookup(connector.target_shape_id)?,
                })
            })
            .collect()
    }

    /// Arithmetic mean of the shape centres, `None` when there are no shapes.
    pub fn mean_center(&self) -> Option<Point> {
        if self.shapes.is_empty() {
            return None;
        }
        let count = self.shapes.len() as f64;
        let (sum_x, sum_y) = self.shapes.iter().fold((0.0, 0.0), |(sx, sy), shape| {
            let c = shape.center();
            (sx + c.x, sy + c.y)
        });
        Some(Point::new(sum_x / count, sum_y / count))
    }

    /// Moves every shape so the mean of the shape centres lands on `target`.
    pub fn center_on(&mut self, target: Point) {
        let Some(current) = self.mean_center() else {
            return;
        };
        let (dx, dy) = (target.x - current.x, target.y - current.y);
        for shape in &mut self.shapes {
            shape.x += dx;
            shape.y += dy;
        }
    }
}

/// Temporary id → committed id for everything in a [`PendingImport`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdTranslation {
    pub shapes: HashMap<ShapeId, ShapeId>,
    pub connectors: HashMap<ConnectorId, ConnectorId>,
}

impl IdTranslation {
    pub fn shape(&self, temporary: ShapeId) -> Option<ShapeId> {
        self.shapes.get(&temporary).copied()
    }

    pub fn connector(&self, temporary: ConnectorId) -> Option<ConnectorId> {
        self.connectors.get(&temporary).copied()
    }
}

/// An assembled diagram held for review. Its ids are temporary until
/// [`commit`](Self::commit) re-keys every shape and connector.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImport {
    diagram: Diagram,
}

impl PendingImport {
    pub fn new(diagram: Diagram) -> Self {
        Self { diagram }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Assigns final ids from `mint` and rewrites every internal reference.
    pub fn commit(self, mut mint: impl FnMut() -> Uuid) -> (Diagram, IdTranslation) {
        let mut diagram = self.diagram;
        let mut translation = IdTranslation::default();

        for shape in &mut diagram.shapes {
            let committed = ShapeId::from(mint());
            translation.shapes.insert(shape.id, committed);
            shape.id = committed;
        }
        let remap = |id: ShapeId| translation.shapes.get(&id).copied().unwrap_or(id);
        for shape in &mut diagram.shapes {
            match &mut shape.data {
                Some(ShapeData::Service { group, .. }) | Some(ShapeData::Junction { group }) => {
                    *group = group.map(remap);
                }
                Some(ShapeData::Group { parent, .. }) => *parent = parent.map(remap),
                Some(ShapeData::Class { .. }) | None => {}
            }
        }

        let mut connector_ids = HashMap::with_capacity(diagram.connectors.len());
        for connector in &mut diagram.connectors {
            connector.source_shape_id = remap(connector.source_shape_id);
            connector.target_shape_id = remap(connector.target_shape_id);
            let committed = ConnectorId::from(mint());
            connector_ids.insert(connector.id, committed);
            connector.id = committed;
        }
        translation.connectors = connector_ids;

        (diagram, translation)
    }
}

/// Builds the canvas graph for `parsed`, then centres it on `center`.
pub fn assemble(
    parsed: &ParsedDiagram,
    positions: &[LayoutPosition],
    config: &Config,
    center: Point,
) -> Result<Diagram, ImportError> {
    let position_by_id: HashMap<&str, &LayoutPosition> =
        positions.iter().map(|pos| (pos.id.as_str(), pos)).collect();

    let ids: HashMap<&str, ShapeId> = parsed
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), ShapeId::new()))
        .collect();

    let mut shapes = Vec::with_capacity(parsed.nodes.len());
    for node in &parsed.nodes {
        let position = position_by_id
            .get(node.id.as_str())
            .ok_or_else(|| ImportError::MissingPosition {
                id: node.id.clone(),
            })?;
        let size = config.dimensions.size_for(node.shape_type);
        shapes.push(Shape {
            id: ids[node.id.as_str()],
            shape_type: node.shape_type,
            subtype: node.subtype,
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
            label: node.label.clone(),
            z_index: 0,
            locked: false,
            is_preview: false,
            data: shape_data(node, &ids)?,
        });
    }

    let mut connectors = Vec::with_capacity(parsed.connections.len());
    for (order, connection) in parsed.connections.iter().enumerate() {
        let resolve = |id: &str| {
            ids.get(id).copied().ok_or_else(|| ImportError::UnresolvedNode {
                id: id.to_string(),
            })
        };
        let source_shape_id = resolve(&connection.source_id)?;
        let target_shape_id = resolve(&connection.target_id)?;
        let (marker_start, marker_end) = markers(connection);
        connectors.push(Connector {
            id: ConnectorId::new(),
            source_shape_id,
            target_shape_id,
            relationship: connection.relationship,
            style: match parsed.kind {
                DiagramKind::Sequence => ConnectorStyle::Straight,
                _ => ConnectorStyle::Orthogonal,
            },
            marker_start,
            marker_end,
            line_type: connection.line_type,
            label: connection.label.clone(),
            z_index: 0,
            data: connector_data(parsed.kind, order, connection),
        });
    }

    let mut diagram = Diagram {
        kind: parsed.kind,
        direction: parsed.direction,
        shapes,
        connectors,
    };
    diagram.center_on(center);
    debug!(
        kind = %diagram.kind,
        shapes = diagram.shapes.len(),
        connectors = diagram.connectors.len(),
        "assembled diagram"
    );
    Ok(diagram)
}

fn shape_data(
    node: &ParsedNode,
    ids: &HashMap<&str, ShapeId>,
) -> Result<Option<ShapeData>, ImportError> {
    let group_ref = |group: &Option<String>| -> Result<Option<ShapeId>, ImportError> {
        match group {
            None => Ok(None),
            Some(group) => ids.get(group.as_str()).copied().map(Some).ok_or_else(|| {
                ImportError::UnresolvedGroup {
                    node: node.id.clone(),
                    group: group.clone(),
                }
            }),
        }
    };
    let data = match &node.details {
        NodeDetails::None => None,
        NodeDetails::Class {
            stereotype,
            attributes,
            methods,
        } => Some(ShapeData::Class {
            stereotype: stereotype.clone(),
            attributes: attributes.clone(),
            methods: methods.clone(),
        }),
        NodeDetails::Service { icon, group } => Some(ShapeData::Service {
            icon: icon.clone(),
            group: group_ref(group)?,
        }),
        NodeDetails::Group { icon, parent } => Some(ShapeData::Group {
            icon: icon.clone(),
            parent: group_ref(parent)?,
        }),
        NodeDetails::Junction { group } => Some(ShapeData::Junction {
            group: group_ref(group)?,
        }),
    };
    Ok(data)
}

/// Start and end markers. Class relationships decorate the source end.
fn markers(connection: &ParsedConnection) -> (Marker, Marker) {
    let plain_end = match connection.marker_end {
        MarkerEnd::Arrow => Marker::Arrow,
        MarkerEnd::None => Marker::None,
    };
    match connection.relationship {
        Relationship::Inheritance | Relationship::Realization => (Marker::Triangle, Marker::None),
        Relationship::Composition => (Marker::FilledDiamond, Marker::None),
        Relationship::Aggregation => (Marker::HollowDiamond, Marker::None),
        Relationship::Dependency => (Marker::None, Marker::OpenArrow),
        Relationship::LostMessage | Relationship::DashedLostMessage => (Marker::None, Marker::Cross),
        Relationship::AsyncMessage | Relationship::DashedAsyncMessage => {
            (Marker::None, Marker::OpenArrow)
        }
        _ if connection.bidirectional => (plain_end, plain_end),
        _ => (Marker::None, plain_end),
    }
}

fn connector_data(
    kind: DiagramKind,
    order: usize,
    connection: &ParsedConnection,
) -> Option<ConnectorData> {
    match kind {
        DiagramKind::Sequence => Some(ConnectorData {
            order: Some(order),
            activation: connection.activation,
            ..ConnectorData::default()
        }),
        DiagramKind::Architecture
            if connection.source_port.is_some() || connection.target_port.is_some() =>
        {
            Some(ConnectorData {
                source_port: connection.source_port,
                target_port: connection.target_port,
                ..ConnectorData::default()
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimensionConfig;
    use crate::layout::{LayoutStrategy, compute_layout};
    use crate::parser::parse_mermaid;

    const EPS: f64 = 1e-9;

    fn build(input: &str, center: Point) -> Diagram {
        let parsed = parse_mermaid(input).unwrap();
        let config = Config::default();
        let positions = compute_layout(
            &parsed,
            LayoutStrategy::default_for(parsed.kind),
            &config.layout,
        );
        assemble(&parsed, &positions, &config, center).unwrap()
    }

    #[test]
    fn example_flowchart_assembles() {
        let diagram = build(
            "flowchart LR\nA((Start)) --> B[Process Order]\nB[Process Order] --> C{Payment Valid?}",
            Point::new(500.0, 300.0),
        );
        assert_eq!(diagram.shapes.len(), 3);
        assert_eq!(diagram.connectors.len(), 2);
        let dims = DimensionConfig::default();
        assert_eq!(
            (diagram.shapes[0].width, diagram.shapes[0].height),
            (dims.event.width, dims.event.height)
        );
        assert_eq!(diagram.shapes[1].width, dims.task.width);
        assert_eq!(diagram.shapes[2].width, dims.gateway.width);
        for shape in &diagram.shapes {
            assert_eq!((shape.z_index, shape.locked, shape.is_preview), (0, false, false));
        }
        let indexed = diagram.indexed_connectors().unwrap();
        assert_eq!(
            indexed,
            vec![
                IndexedConnector {
                    from_shape_index: 0,
                    to_shape_index: 1
                },
                IndexedConnector {
                    from_shape_index: 1,
                    to_shape_index: 2
                },
            ]
        );
        assert!(diagram.connectors.iter().all(|c| c.marker_end == Marker::Arrow
            && c.line_type == LineType::Solid
            && c.style == ConnectorStyle::Orthogonal));
    }

    #[test]
    fn shapes_do_not_overlap() {
        let diagram = build(
            "flowchart TD\nA --> B\nA --> C\nA --> D\nB --> E\nC --> E\nD --> E",
            Point::default(),
        );
        for (i, a) in diagram.shapes.iter().enumerate() {
            for b in &diagram.shapes[i + 1..] {
                let separate = a.x + a.width <= b.x
                    || b.x + b.width <= a.x
                    || a.y + a.height <= b.y
                    || b.y + b.height <= a.y;
                assert!(separate, "{} overlaps {}", a.label, b.label);
            }
        }
    }

    #[test]
    fn centering_uses_mean_of_centres() {
        let target = Point::new(-120.5, 42.0);
        let diagram = build("classDiagram\nclass A\nclass B {\n+x\n+y\n}\nclass C", target);
        let mean = diagram.mean_center().unwrap();
        assert!((mean.x - target.x).abs() < EPS);
        assert!((mean.y - target.y).abs() < EPS);
    }

    #[test]
    fn missing_position_is_fatal() {
        let parsed = parse_mermaid("flowchart TD\nA --> B").unwrap();
        let positions = vec![LayoutPosition {
            id: "A".to_string(),
            x: 0.0,
            y: 0.0,
        }];
        let err = assemble(&parsed, &positions, &Config::default(), Point::default()).unwrap_err();
        assert_eq!(
            err,
            ImportError::MissingPosition {
                id: "B".to_string()
            }
        );
    }

    #[test]
    fn unresolved_connection_is_fatal() {
        let mut parsed = parse_mermaid("flowchart TD\nA --> B").unwrap();
        parsed.connections.push(ParsedConnection::new("A", "Ghost"));
        let positions = compute_layout(&parsed, LayoutStrategy::Grid, &Config::default().layout);
        let err = assemble(&parsed, &positions, &Config::default(), Point::default()).unwrap_err();
        assert_eq!(
            err,
            ImportError::UnresolvedNode {
                id: "Ghost".to_string()
            }
        );
    }

    #[test]
    fn class_boxes_keep_table_size() {
        let diagram = build(
            "classDiagram\nclass Small\nclass Big {\n+a\n+b\n+run()\n}\nBig <|-- Small",
            Point::default(),
        );
        let dims = DimensionConfig::default();
        let big = diagram.shapes.iter().find(|s| s.label == "Big").unwrap();
        assert_eq!((big.width, big.height), (dims.class.width, dims.class.height));
        let conn = &diagram.connectors[0];
        assert_eq!(conn.source_shape_id, big.id);
        assert_eq!((conn.marker_start, conn.marker_end), (Marker::Triangle, Marker::None));
    }

    #[test]
    fn long_class_bodies_stay_inside_their_grid_cell() {
        let members: String = (0..12).map(|i| format!("+field{i}\n")).collect();
        let input = format!("classDiagram\nclass A {{\n{members}}}\nclass B\nclass C\nclass D");
        let diagram = build(&input, Point::default());
        let a = &diagram.shapes[0];
        let c = &diagram.shapes[2];
        assert_eq!(a.height, DimensionConfig::default().class.height);
        assert!(a.y + a.height <= c.y, "A bottom {} overlaps C top {}", a.y + a.height, c.y);
    }

    #[test]
    fn sequence_connectors_carry_order() {
        let diagram = build(
            "sequenceDiagram\nA->>+B: one\nB-->>-A: two\nA-xB: three",
            Point::default(),
        );
        let orders: Vec<Option<usize>> = diagram
            .connectors
            .iter()
            .map(|c| c.data.as_ref().and_then(|d| d.order))
            .collect();
        assert_eq!(orders, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(diagram.connectors[2].marker_end, Marker::Cross);
        assert!(diagram.connectors.iter().all(|c| c.style == ConnectorStyle::Straight));
        let lifeline = &diagram.shapes[0];
        assert_eq!(lifeline.height, DimensionConfig::default().lifeline.height);
    }

    #[test]
    fn architecture_groups_resolve_to_shape_ids() {
        let diagram = build(
            "architecture-beta\ngroup api(cloud)[API]\nservice db(database)[DB] in api\ndb:R --> L:web",
            Point::default(),
        );
        let api = diagram.shapes[0].id;
        assert_eq!(
            diagram.shapes[1].data,
            Some(ShapeData::Service {
                icon: Some("database".to_string()),
                group: Some(api),
            })
        );
        let data = diagram.connectors[0].data.as_ref().unwrap();
        assert_eq!((data.source_port, data.target_port), (Some(Port::Right), Some(Port::Left)));
    }

    #[test]
    fn undeclared_group_is_fatal() {
        let parsed = parse_mermaid("architecture-beta\nservice db(database)[DB] in nowhere").unwrap();
        let config = Config::default();
        let positions = compute_layout(&parsed, LayoutStrategy::Grid, &config.layout);
        let err = assemble(&parsed, &positions, &config, Point::default()).unwrap_err();
        assert_eq!(
            err,
            ImportError::UnresolvedGroup {
                node: "db".to_string(),
                group: "nowhere".to_string()
            }
        );
    }

    #[test]
    fn commit_rekeys_every_reference() {
        let diagram = build(
            "architecture-beta\ngroup api[API]\nservice a[A] in api\nservice b[B] in api\na:R -- L:b",
            Point::default(),
        );
        let pending = PendingImport::new(diagram.clone());
        let mut counter = 0u128;
        let (committed, translation) = pending.commit(|| {
            counter += 1;
            Uuid::from_u128(counter)
        });

        assert_eq!(translation.shapes.len(), 3);
        assert_eq!(translation.connectors.len(), 1);
        for (before, after) in diagram.shapes.iter().zip(&committed.shapes) {
            assert_eq!(translation.shape(before.id), Some(after.id));
            assert_eq!(before.label, after.label);
        }
        let api = committed.shapes[0].id;
        assert_eq!(api, ShapeId::from(Uuid::from_u128(1)));
        assert!(matches!(
            committed.shapes[1].data,
            Some(ShapeData::Service { group: Some(g), .. }) if g == api
        ));
        let conn = &committed.connectors[0];
        assert_eq!(conn.source_shape_id, committed.shapes[1].id);
        assert_eq!(conn.target_shape_id, committed.shapes[2].id);
        assert_eq!(
            translation.connector(diagram.connectors[0].id),
            Some(conn.id)
        );
        assert_eq!(
            committed.indexed_connectors().unwrap(),
            diagram.indexed_connectors().unwrap()
        );
    }

    #[test]
    fn indexed_connectors_report_dangling_ids() {
        let mut diagram = build("flowchart TD\nA --> B", Point::default());
        diagram.shapes.pop();
        assert!(matches!(
            diagram.indexed_connectors(),
            Err(ExportError::MissingShape { .. })
        ));
    }

    #[test]
    fn empty_diagram_centres_trivially() {
        let diagram = build("flowchart TD", Point::new(10.0, 10.0));
        assert!(diagram.shapes.is_empty());
        assert!(diagram.mean_center().is_none());
    }
}

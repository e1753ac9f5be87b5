use serde::{Deserialize, Serialize};

use crate::shape::{ShapeSubtype, ShapeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagramKind {
    Flowchart,
    Class,
    Sequence,
    Architecture,
}

impl DiagramKind {
    pub const ALL: [DiagramKind; 4] = [
        DiagramKind::Flowchart,
        DiagramKind::Class,
        DiagramKind::Sequence,
        DiagramKind::Architecture,
    ];

    /// Canonical header keyword written by the exporters.
    pub fn header(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Class => "classDiagram",
            Self::Sequence => "sequenceDiagram",
            Self::Architecture => "architecture-beta",
        }
    }

    /// Returns true when `line` (already trimmed) opens a diagram of this kind.
    pub fn matches_header(self, line: &str) -> bool {
        let keyword = line.split_whitespace().next().unwrap_or("");
        let lower = keyword.to_ascii_lowercase();
        match self {
            Self::Flowchart => lower == "flowchart" || lower == "graph",
            Self::Class => lower == "classdiagram" || lower == "classdiagram-v2",
            Self::Sequence => lower == "sequencediagram",
            Self::Architecture => lower == "architecture-beta" || lower == "architecture",
        }
    }

    /// Detects the dialect from the first non-empty, non-comment line.
    pub fn detect(input: &str) -> Option<Self> {
        let first = input.lines().map(str::trim).find(|line| {
            !line.is_empty() && !line.starts_with("%%")
        })?;
        Self::ALL.into_iter().find(|kind| kind.matches_header(first))
    }

    pub fn default_direction(self) -> Direction {
        match self {
            Self::Flowchart | Self::Class => Direction::TopDown,
            Self::Sequence | Self::Architecture => Direction::LeftRight,
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[default]
    TopDown,
    BottomTop,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "TD" | "TB" => Some(Self::TopDown),
            "BT" => Some(Self::BottomTop),
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::TopDown => "TD",
            Self::BottomTop => "BT",
            Self::LeftRight => "LR",
            Self::RightLeft => "RL",
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight | Self::RightLeft)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineType {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerEnd {
    #[default]
    Arrow,
    None,
}

/// Semantic kind of an edge, independent of how it is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    #[default]
    Flow,
    Inheritance,
    Realization,
    Composition,
    Aggregation,
    Dependency,
    Association,
    Link,
    DottedLink,
    /// `->>`
    SyncMessage,
    /// `-->>`
    ReturnMessage,
    /// `->`
    OpenMessage,
    /// `-->`
    DashedOpenMessage,
    /// `-x`
    LostMessage,
    /// `--x`
    DashedLostMessage,
    /// `-)`
    AsyncMessage,
    /// `--)`
    DashedAsyncMessage,
    ServiceEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Activation {
    Activate,
    Deactivate,
}

/// Side of an architecture service an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    #[serde(rename = "T")]
    Top,
    #[serde(rename = "B")]
    Bottom,
}

impl Port {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "L" | "l" => Some(Self::Left),
            "R" | "r" => Some(Self::Right),
            "T" | "t" => Some(Self::Top),
            "B" | "b" => Some(Self::Bottom),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
            Self::Top => "T",
            Self::Bottom => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum NodeDetails {
    #[default]
    None,
    Class {
        stereotype: Option<String>,
        attributes: Vec<String>,
        methods: Vec<String>,
    },
    Service {
        icon: Option<String>,
        group: Option<String>,
    },
    Group {
        icon: Option<String>,
        parent: Option<String>,
    },
    Junction {
        group: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedNode {
    pub id: String,
    pub label: String,
    pub shape_type: ShapeType,
    pub subtype: Option<ShapeSubtype>,
    pub raw_syntax: String,
    #[serde(default)]
    pub details: NodeDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConnection {
    pub source_id: String,
    pub target_id: String,
    pub label: Option<String>,
    pub line_type: LineType,
    pub marker_end: MarkerEnd,
    /// Arrow heads on both ends (`<-->`).
    #[serde(default)]
    pub bidirectional: bool,
    pub relationship: Relationship,
    #[serde(default)]
    pub activation: Option<Activation>,
    #[serde(default)]
    pub source_port: Option<Port>,
    #[serde(default)]
    pub target_port: Option<Port>,
}

impl ParsedConnection {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: None,
            line_type: LineType::Solid,
            marker_end: MarkerEnd::Arrow,
            bidirectional: false,
            relationship: Relationship::Flow,
            activation: None,
            source_port: None,
            target_port: None,
        }
    }
}

/// Output of one parse pass. Nodes keep first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedDiagram {
    pub kind: DiagramKind,
    pub direction: Direction,
    pub nodes: Vec<ParsedNode>,
    pub connections: Vec<ParsedConnection>,
    /// Spacing overrides taken from a `%%{init: ...}%%` directive.
    #[serde(skip)]
    pub init_config: Option<serde_json::Value>,
}

impl ParsedDiagram {
    pub fn new(kind: DiagramKind) -> Self {
        Self {
            kind,
            direction: kind.default_direction(),
            nodes: Vec::new(),
            connections: Vec::new(),
            init_config: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ParsedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dialect_headers() {
        assert_eq!(DiagramKind::detect("graph TD\nA-->B"), Some(DiagramKind::Flowchart));
        assert_eq!(
            DiagramKind::detect("%% comment\n\nclassDiagram\n"),
            Some(DiagramKind::Class)
        );
        assert_eq!(
            DiagramKind::detect("sequenceDiagram"),
            Some(DiagramKind::Sequence)
        );
        assert_eq!(
            DiagramKind::detect("architecture-beta\n  service a[A]"),
            Some(DiagramKind::Architecture)
        );
        assert_eq!(DiagramKind::detect("pie title Pets"), None);
        assert_eq!(DiagramKind::detect("   \n"), None);
    }

    #[test]
    fn direction_tokens_are_case_insensitive() {
        assert_eq!(Direction::from_token("lr"), Some(Direction::LeftRight));
        assert_eq!(Direction::from_token("TB"), Some(Direction::TopDown));
        assert_eq!(Direction::from_token("XY"), None);
    }
}

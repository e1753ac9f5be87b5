use crate::ir::DiagramKind;
use crate::shape::ShapeType;

/// Failure of the import pipeline. The `Display` text is meant to be shown to
/// the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("diagram text is empty")]
    EmptyInput,
    #[error("unrecognized diagram type: expected one of flowchart, graph, classDiagram, sequenceDiagram or architecture-beta, found '{found}'")]
    UnknownDiagramType { found: String },
    #[error("expected '{expected}' as the first line of the diagram")]
    MissingHeader { expected: &'static str },
    #[error("connection references undeclared node '{id}'")]
    UnresolvedNode { id: String },
    #[error("node '{node}' is placed in undeclared group '{group}'")]
    UnresolvedGroup { node: String, group: String },
    #[error("layout produced no position for node '{id}'")]
    MissingPosition { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("connector {connector} references missing shape {shape}")]
    MissingShape { connector: String, shape: String },
    #[error("{kind} diagrams cannot express {shape_type:?} shapes (shape {shape})")]
    UnsupportedShape {
        kind: DiagramKind,
        shape: String,
        shape_type: ShapeType,
    },
}

//! Canvas graph → Mermaid text, one writer per dialect.
//!
//! Output re-imports to the same shape types, subtypes, labels and
//! connector relationships. Node ids are regenerated from shape positions.

mod architecture;
mod class;
mod flowchart;
mod sequence;

use std::collections::HashMap;

use tracing::debug;

use crate::assemble::{Connector, Diagram, Shape, ShapeId};
use crate::error::ExportError;
use crate::ir::DiagramKind;

const INDENT: &str = "    ";

pub fn export_mermaid(diagram: &Diagram) -> Result<String, ExportError> {
    let index = ShapeIndex::new(diagram)?;
    let text = match diagram.kind {
        DiagramKind::Flowchart => flowchart::write_flowchart(diagram, &index)?,
        DiagramKind::Class => class::write_class_diagram(diagram, &index)?,
        DiagramKind::Sequence => sequence::write_sequence_diagram(diagram, &index)?,
        DiagramKind::Architecture => architecture::write_architecture(diagram, &index)?,
    };
    debug!(
        kind = %diagram.kind,
        shapes = diagram.shapes.len(),
        connectors = diagram.connectors.len(),
        "exported mermaid diagram"
    );
    Ok(text)
}

/// Shape id → position in [`Diagram::shapes`], checked against every
/// connector up front so the writers never meet a dangling reference.
pub(crate) struct ShapeIndex {
    positions: HashMap<ShapeId, usize>,
}

impl ShapeIndex {
    fn new(diagram: &Diagram) -> Result<Self, ExportError> {
        let positions: HashMap<ShapeId, usize> = diagram
            .shapes
            .iter()
            .enumerate()
            .map(|(idx, shape)| (shape.id, idx))
            .collect();
        for connector in &diagram.connectors {
            for id in [connector.source_shape_id, connector.target_shape_id] {
                if !positions.contains_key(&id) {
                    return Err(ExportError::MissingShape {
                        connector: connector.id.to_string(),
                        shape: id.to_string(),
                    });
                }
            }
        }
        Ok(Self { positions })
    }

    pub(crate) fn position(&self, id: ShapeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Source and target positions of a connector validated in `new`.
    pub(crate) fn endpoints(&self, connector: &Connector) -> (usize, usize) {
        (
            self.position(connector.source_shape_id).unwrap_or_default(),
            self.position(connector.target_shape_id).unwrap_or_default(),
        )
    }
}

pub(crate) fn unsupported(kind: DiagramKind, shape: &Shape) -> ExportError {
    ExportError::UnsupportedShape {
        kind,
        shape: shape.label.clone(),
        shape_type: shape.shape_type,
    }
}

/// Wraps a label in quotes when it contains characters the dialect grammar
/// would read as syntax. Quotes inside a label become `#quot;`.
pub(crate) fn quote_label(label: &str, syntax_chars: &[char]) -> String {
    let needs_quotes = label.contains(syntax_chars)
        || label.starts_with(char::is_whitespace)
        || label.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", label.replace('"', "#quot;"))
    } else {
        label.to_string()
    }
}

/// Keeps a label on one line.
pub(crate) fn single_line(label: &str) -> String {
    label.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImportOptions, import_mermaid};

    #[test]
    fn quoting_only_when_needed() {
        assert_eq!(quote_label("Plain text", &['[', ']']), "Plain text");
        assert_eq!(quote_label("a[b]", &['[', ']']), "\"a[b]\"");
        assert_eq!(quote_label("say \"hi\" [x]", &['[']), "\"say #quot;hi#quot; [x]\"");
        assert_eq!(quote_label(" padded", &[]), "\" padded\"");
    }

    #[test]
    fn dangling_connector_is_reported() {
        let mut diagram = import_mermaid("flowchart TD\nA --> B", &ImportOptions::default()).unwrap();
        let ghost = ShapeId::new();
        diagram.connectors[0].target_shape_id = ghost;
        let connector = diagram.connectors[0].id;
        assert_eq!(
            export_mermaid(&diagram),
            Err(ExportError::MissingShape {
                connector: connector.to_string(),
                shape: ghost.to_string(),
            })
        );
    }

    #[test]
    fn multi_line_labels_are_joined() {
        assert_eq!(single_line("first\n  second"), "first second");
    }
}

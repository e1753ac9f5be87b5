use tracing::warn;

use super::{INDENT, ShapeIndex, quote_label, single_line, unsupported};
use crate::assemble::{Connector, Diagram, Marker};
use crate::error::ExportError;
use crate::ir::{DiagramKind, LineType};
use crate::shape::bracket_syntax;

const SYNTAX_CHARS: &[char] = &['[', ']', '(', ')', '{', '}', '|', '"', ';', '<', '>', '&', '%'];

pub(super) fn write_flowchart(diagram: &Diagram, index: &ShapeIndex) -> Result<String, ExportError> {
    let mut out = format!("flowchart {}\n", diagram.direction.token());

    for (idx, shape) in diagram.shapes.iter().enumerate() {
        let (open, close) = bracket_syntax(shape.shape_type, shape.subtype)
            .ok_or_else(|| unsupported(DiagramKind::Flowchart, shape))?;
        let label = quote_label(&single_line(&shape.label), SYNTAX_CHARS);
        out.push_str(&format!("{INDENT}n{idx}{open}{label}{close}\n"));
    }

    for connector in &diagram.connectors {
        let (from, to) = index.endpoints(connector);
        let op = link_operator(connector);
        match connector.label.as_deref().map(single_line) {
            Some(label) if !label.is_empty() => {
                let label = quote_label(&label.replace('|', "#124;"), SYNTAX_CHARS);
                out.push_str(&format!("{INDENT}n{from} {op}|{label}| n{to}\n"));
            }
            _ => out.push_str(&format!("{INDENT}n{from} {op} n{to}\n")),
        }
    }
    Ok(out)
}

/// Flowcharts have no dashed stroke; dashed connectors are written dotted.
fn link_operator(connector: &Connector) -> &'static str {
    let arrow = connector.marker_end != Marker::None;
    match (connector.line_type, arrow) {
        (LineType::Solid, true) => "-->",
        (LineType::Solid, false) => "---",
        (LineType::Dashed, _) => {
            warn!(connector = %connector.id, "flowchart has no dashed links; writing dotted");
            if arrow { "-.->" } else { "-.-" }
        }
        (LineType::Dotted, true) => "-.->",
        (LineType::Dotted, false) => "-.-",
    }
}

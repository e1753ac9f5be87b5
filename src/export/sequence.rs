use super::{INDENT, ShapeIndex, single_line, unsupported};
use crate::assemble::{Connector, Diagram, Marker};
use crate::error::ExportError;
use crate::ir::{Activation, DiagramKind, LineType, Relationship};
use crate::shape::{ShapeSubtype, ShapeType};

pub(super) fn write_sequence_diagram(
    diagram: &Diagram,
    index: &ShapeIndex,
) -> Result<String, ExportError> {
    let mut out = String::from("sequenceDiagram\n");

    for (idx, shape) in diagram.shapes.iter().enumerate() {
        if shape.shape_type != ShapeType::Lifeline {
            return Err(unsupported(DiagramKind::Sequence, shape));
        }
        let keyword = match shape.subtype {
            Some(ShapeSubtype::Actor) => "actor",
            _ => "participant",
        };
        out.push_str(&format!("{INDENT}{keyword} p{idx} as {}\n", single_line(&shape.label)));
    }

    // Messages keep their recorded order; connectors without one follow.
    let mut messages: Vec<(usize, &Connector)> = diagram.connectors.iter().enumerate().collect();
    messages.sort_by_key(|(position, connector)| {
        connector
            .data
            .as_ref()
            .and_then(|data| data.order)
            .unwrap_or(usize::MAX - diagram.connectors.len() + position)
    });

    for (_, connector) in messages {
        let (from, to) = index.endpoints(connector);
        let suffix = match connector.data.as_ref().and_then(|data| data.activation) {
            Some(Activation::Activate) => "+",
            Some(Activation::Deactivate) => "-",
            None => "",
        };
        out.push_str(&format!("{INDENT}p{from}{}{suffix}p{to}", message_operator(connector)));
        if let Some(label) = connector.label.as_deref().map(single_line)
            && !label.is_empty()
        {
            out.push_str(&format!(": {label}"));
        }
        out.push('\n');
    }
    Ok(out)
}

fn message_operator(connector: &Connector) -> &'static str {
    match connector.relationship {
        Relationship::SyncMessage => "->>",
        Relationship::ReturnMessage => "-->>",
        Relationship::OpenMessage => "->",
        Relationship::DashedOpenMessage => "-->",
        Relationship::LostMessage => "-x",
        Relationship::DashedLostMessage => "--x",
        Relationship::AsyncMessage => "-)",
        Relationship::DashedAsyncMessage => "--)",
        _ => {
            let dashed = connector.line_type != LineType::Solid;
            match (dashed, connector.marker_end != Marker::None) {
                (false, true) => "->>",
                (true, true) => "-->>",
                (false, false) => "->",
                (true, false) => "-->",
            }
        }
    }
}

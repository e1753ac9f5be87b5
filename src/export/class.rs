use std::collections::HashSet;

use tracing::warn;

use super::{INDENT, ShapeIndex, single_line, unsupported};
use crate::assemble::{Connector, Diagram, Marker, Shape, ShapeData};
use crate::error::ExportError;
use crate::ir::{DiagramKind, Direction, LineType, Relationship};
use crate::shape::{ShapeSubtype, ShapeType};

pub(super) fn write_class_diagram(
    diagram: &Diagram,
    index: &ShapeIndex,
) -> Result<String, ExportError> {
    let mut out = String::from("classDiagram\n");
    if diagram.direction != Direction::TopDown {
        out.push_str(&format!("{INDENT}direction {}\n", diagram.direction.token()));
    }

    let names = class_names(&diagram.shapes);
    for (shape, name) in diagram.shapes.iter().zip(&names) {
        if shape.shape_type != ShapeType::Class {
            return Err(unsupported(DiagramKind::Class, shape));
        }
        write_class(&mut out, shape, name);
    }

    for connector in &diagram.connectors {
        let (from, to) = index.endpoints(connector);
        let op = relation_operator(connector);
        out.push_str(&format!("{INDENT}{} {op} {}", names[from], names[to]));
        if let Some(label) = connector.label.as_deref().map(single_line)
            && !label.is_empty()
        {
            out.push_str(&format!(" : {label}"));
        }
        out.push('\n');
    }
    Ok(out)
}

fn write_class(out: &mut String, shape: &Shape, name: &str) {
    let label = single_line(&shape.label).replace('"', "#quot;");
    let mut header = format!("{INDENT}class {name}");
    if label != name {
        header.push_str(&format!("[\"{label}\"]"));
    }

    let (stereotype, attributes, methods) = match &shape.data {
        Some(ShapeData::Class {
            stereotype,
            attributes,
            methods,
        }) => (stereotype.clone(), attributes.as_slice(), methods.as_slice()),
        _ => (None, &[][..], &[][..]),
    };
    let stereotype = stereotype.or_else(|| shape.subtype.and_then(subtype_stereotype).map(str::to_string));

    if stereotype.is_none() && attributes.is_empty() && methods.is_empty() {
        out.push_str(&header);
        out.push('\n');
        return;
    }
    out.push_str(&format!("{header} {{\n"));
    if let Some(stereotype) = stereotype {
        out.push_str(&format!("{INDENT}{INDENT}<<{stereotype}>>\n"));
    }
    for member in attributes.iter().chain(methods) {
        out.push_str(&format!("{INDENT}{INDENT}{}\n", single_line(member).replace('}', ")")));
    }
    out.push_str(&format!("{INDENT}}}\n"));
}

fn subtype_stereotype(subtype: ShapeSubtype) -> Option<&'static str> {
    match subtype {
        ShapeSubtype::Interface => Some("interface"),
        ShapeSubtype::Abstract => Some("abstract"),
        ShapeSubtype::Enumeration => Some("enumeration"),
        ShapeSubtype::Service => Some("service"),
        _ => None,
    }
}

/// Class identifiers derived from labels: word characters and `~` only,
/// de-duplicated with a numeric suffix.
fn class_names(shapes: &[Shape]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    shapes
        .iter()
        .enumerate()
        .map(|(idx, shape)| {
            let mut base: String = shape
                .label
                .trim()
                .chars()
                .map(|ch| if ch.is_alphanumeric() || ch == '_' || ch == '~' { ch } else { '_' })
                .collect();
            if base.trim_matches('_').is_empty() {
                base = format!("Class{idx}");
            }
            let mut name = base.clone();
            let mut suffix = 2;
            while !used.insert(name.clone()) {
                name = format!("{base}_{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

/// Canonical operator for a relationship; the source is always written on
/// the left. Non-class relationships fall back to the stroke and marker.
fn relation_operator(connector: &Connector) -> &'static str {
    match connector.relationship {
        Relationship::Inheritance => "<|--",
        Relationship::Realization => "<|..",
        Relationship::Composition => "*--",
        Relationship::Aggregation => "o--",
        Relationship::Dependency => "..>",
        Relationship::Association => "-->",
        Relationship::Link => "--",
        Relationship::DottedLink => "..",
        other => {
            warn!(relationship = ?other, "class diagrams have no such relationship; using a plain link");
            let dashed = connector.line_type != LineType::Solid;
            match (dashed, connector.marker_end != Marker::None) {
                (false, true) => "-->",
                (false, false) => "--",
                (true, true) => "..>",
                (true, false) => "..",
            }
        }
    }
}

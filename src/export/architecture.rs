use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::{INDENT, ShapeIndex, single_line, unsupported};
use crate::assemble::{Diagram, Marker, Shape, ShapeData, ShapeId};
use crate::error::ExportError;
use crate::ir::DiagramKind;
use crate::shape::{ShapeType, subtype_icon};

pub(super) fn write_architecture(diagram: &Diagram, index: &ShapeIndex) -> Result<String, ExportError> {
    let mut names: HashMap<ShapeId, String> = HashMap::with_capacity(diagram.shapes.len());
    for (idx, shape) in diagram.shapes.iter().enumerate() {
        let prefix = match shape.shape_type {
            ShapeType::Group => "g",
            ShapeType::Service => "s",
            ShapeType::Junction => "j",
            _ => return Err(unsupported(DiagramKind::Architecture, shape)),
        };
        names.insert(shape.id, format!("{prefix}{idx}"));
    }
    // Junctions re-import with their id as label, so keep usable labels.
    let mut used: HashSet<String> = names.values().cloned().collect();
    for shape in &diagram.shapes {
        if shape.shape_type == ShapeType::Junction
            && is_identifier(&shape.label)
            && used.insert(shape.label.clone())
        {
            names.insert(shape.id, shape.label.clone());
        }
    }

    let mut out = String::from("architecture-beta\n");
    for shape in groups_parents_first(&diagram.shapes) {
        let (icon, parent) = match &shape.data {
            Some(ShapeData::Group { icon, parent }) => (icon.clone(), *parent),
            _ => (None, None),
        };
        write_declaration(&mut out, "group", shape, icon, parent, &names);
    }
    for shape in &diagram.shapes {
        match (shape.shape_type, &shape.data) {
            (ShapeType::Service, data) => {
                let (icon, group) = match data {
                    Some(ShapeData::Service { icon, group }) => (icon.clone(), *group),
                    _ => (None, None),
                };
                write_declaration(&mut out, "service", shape, icon, group, &names);
            }
            (ShapeType::Junction, data) => {
                let group = match data {
                    Some(ShapeData::Junction { group }) => *group,
                    _ => None,
                };
                out.push_str(&format!("{INDENT}junction {}", names[&shape.id]));
                push_membership(&mut out, shape, group, &names);
                out.push('\n');
            }
            _ => {}
        }
    }

    for connector in &diagram.connectors {
        let (from, to) = index.endpoints(connector);
        let (source_port, target_port) = connector
            .data
            .as_ref()
            .map(|data| (data.source_port, data.target_port))
            .unwrap_or_default();
        let start = connector.marker_start != Marker::None;
        let end = connector.marker_end != Marker::None;
        let op = match (start, end) {
            (true, true) => "<-->",
            (false, true) => "-->",
            (true, false) => {
                warn!(connector = %connector.id, "start-only arrow has no architecture syntax; writing plain edge");
                "--"
            }
            (false, false) => "--",
        };
        let source = &names[&diagram.shapes[from].id];
        let target = &names[&diagram.shapes[to].id];
        out.push_str(INDENT);
        out.push_str(source);
        if let Some(port) = source_port {
            out.push_str(&format!(":{}", port.token()));
        }
        out.push_str(&format!(" {op} "));
        if let Some(port) = target_port {
            out.push_str(&format!("{}:", port.token()));
        }
        out.push_str(target);
        out.push('\n');
    }
    Ok(out)
}

fn is_identifier(label: &str) -> bool {
    label
        .split('-')
        .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_alphanumeric() || ch == '_'))
}

fn write_declaration(
    out: &mut String,
    keyword: &str,
    shape: &Shape,
    icon: Option<String>,
    membership: Option<ShapeId>,
    names: &HashMap<ShapeId, String>,
) {
    let icon = icon.or_else(|| shape.subtype.and_then(subtype_icon).map(str::to_string));
    out.push_str(&format!("{INDENT}{keyword} {}", names[&shape.id]));
    if let Some(icon) = icon {
        out.push_str(&format!("({icon})"));
    }
    let label = single_line(&shape.label).replace('[', "(").replace(']', ")");
    out.push_str(&format!("[{label}]"));
    push_membership(out, shape, membership, names);
    out.push('\n');
}

fn push_membership(
    out: &mut String,
    shape: &Shape,
    membership: Option<ShapeId>,
    names: &HashMap<ShapeId, String>,
) {
    let Some(group) = membership else {
        return;
    };
    match names.get(&group) {
        Some(name) => out.push_str(&format!(" in {name}")),
        None => warn!(shape = %shape.id, %group, "group not in diagram; writing shape ungrouped"),
    }
}

/// Groups ordered so every parent is declared before its children.
fn groups_parents_first(shapes: &[Shape]) -> Vec<&Shape> {
    let groups: Vec<&Shape> = shapes
        .iter()
        .filter(|shape| shape.shape_type == ShapeType::Group)
        .collect();
    let group_ids: HashSet<ShapeId> = groups.iter().map(|shape| shape.id).collect();
    let parent_of = |shape: &Shape| match &shape.data {
        Some(ShapeData::Group {
            parent: Some(parent),
            ..
        }) if group_ids.contains(parent) => Some(*parent),
        _ => None,
    };

    let mut emitted: HashSet<ShapeId> = HashSet::new();
    let mut ordered = Vec::with_capacity(groups.len());
    while ordered.len() < groups.len() {
        let before = ordered.len();
        for shape in &groups {
            if emitted.contains(&shape.id) {
                continue;
            }
            if parent_of(*shape).is_none_or(|parent| emitted.contains(&parent)) {
                emitted.insert(shape.id);
                ordered.push(*shape);
            }
        }
        if ordered.len() == before {
            // Parent cycle: keep the remaining groups in shape order.
            ordered.extend(groups.iter().filter(|shape| !emitted.contains(&shape.id)));
            break;
        }
    }
    ordered
}

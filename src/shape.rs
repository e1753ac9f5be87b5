//! Shape-type inference.
//!
//! Maps raw Mermaid bracket syntax (plus, for circles, the node label) to the
//! semantic shape the canvas draws. Inference is syntax-first, label-second.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Event,
    Gateway,
    Task,
    Subprocess,
    Class,
    Lifeline,
    Service,
    Group,
    Junction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeSubtype {
    StartEvent,
    EndEvent,
    ExclusiveGateway,
    Interface,
    Abstract,
    Enumeration,
    Service,
    Participant,
    Actor,
    Database,
    Server,
    Disk,
    Cloud,
    Internet,
}

/// Infers the shape of a flowchart node from its bracket syntax.
///
/// Double circles are disambiguated by label: "start" wins over "end", and a
/// label containing neither defaults to a start event. Labels such as
/// "Restart process" therefore read as start events.
pub fn infer_flow_shape(raw_syntax: &str, label: &str) -> (ShapeType, Option<ShapeSubtype>) {
    let raw = raw_syntax.trim();
    if raw.starts_with("(((") && raw.ends_with(")))") {
        return (ShapeType::Event, Some(ShapeSubtype::EndEvent));
    }
    if raw.starts_with("((") && raw.ends_with("))") {
        let lower = label.to_lowercase();
        let subtype = if lower.contains("start") {
            ShapeSubtype::StartEvent
        } else if lower.contains("end") {
            ShapeSubtype::EndEvent
        } else {
            ShapeSubtype::StartEvent
        };
        return (ShapeType::Event, Some(subtype));
    }
    if raw.starts_with('{') && raw.ends_with('}') {
        return (ShapeType::Gateway, Some(ShapeSubtype::ExclusiveGateway));
    }
    if raw.starts_with('(') && raw.ends_with(')') {
        return (ShapeType::Subprocess, None);
    }
    (ShapeType::Task, None)
}

pub fn infer_class_shape(stereotype: Option<&str>) -> (ShapeType, Option<ShapeSubtype>) {
    let subtype = stereotype.and_then(|value| {
        match value.trim().trim_matches(['<', '>']).to_ascii_lowercase().as_str() {
            "interface" => Some(ShapeSubtype::Interface),
            "abstract" => Some(ShapeSubtype::Abstract),
            "enumeration" | "enum" => Some(ShapeSubtype::Enumeration),
            "service" => Some(ShapeSubtype::Service),
            _ => None,
        }
    });
    (ShapeType::Class, subtype)
}

pub fn infer_participant_shape(keyword: &str) -> (ShapeType, Option<ShapeSubtype>) {
    let subtype = if keyword.eq_ignore_ascii_case("actor") {
        ShapeSubtype::Actor
    } else {
        ShapeSubtype::Participant
    };
    (ShapeType::Lifeline, Some(subtype))
}

pub fn infer_service_shape(icon: Option<&str>) -> (ShapeType, Option<ShapeSubtype>) {
    (ShapeType::Service, icon.and_then(icon_subtype))
}

pub fn icon_subtype(icon: &str) -> Option<ShapeSubtype> {
    match icon.trim().to_ascii_lowercase().as_str() {
        "database" => Some(ShapeSubtype::Database),
        "server" => Some(ShapeSubtype::Server),
        "disk" => Some(ShapeSubtype::Disk),
        "cloud" => Some(ShapeSubtype::Cloud),
        "internet" => Some(ShapeSubtype::Internet),
        _ => None,
    }
}

pub fn subtype_icon(subtype: ShapeSubtype) -> Option<&'static str> {
    match subtype {
        ShapeSubtype::Database => Some("database"),
        ShapeSubtype::Server => Some("server"),
        ShapeSubtype::Disk => Some("disk"),
        ShapeSubtype::Cloud => Some("cloud"),
        ShapeSubtype::Internet => Some("internet"),
        _ => None,
    }
}

/// Inverse of [`infer_flow_shape`]: the delimiters that re-import as the
/// given shape. `None` for shapes a flowchart cannot express.
pub fn bracket_syntax(
    shape_type: ShapeType,
    subtype: Option<ShapeSubtype>,
) -> Option<(&'static str, &'static str)> {
    match (shape_type, subtype) {
        (ShapeType::Event, Some(ShapeSubtype::EndEvent)) => Some(("(((", ")))")),
        (ShapeType::Event, _) => Some(("((", "))")),
        (ShapeType::Gateway, _) => Some(("{", "}")),
        (ShapeType::Subprocess, _) => Some(("(", ")")),
        (ShapeType::Task, _) => Some(("[", "]")),
        _ => None,
    }
}

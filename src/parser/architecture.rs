use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, DiagramBuilder, Rule, label_text, starts_with_keyword};
use crate::ir::{
    DiagramKind, LineType, MarkerEnd, NodeDetails, ParsedConnection, ParsedNode, Port,
    Relationship,
};
use crate::shape::{ShapeType, icon_subtype, infer_service_shape};

static EDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<from>\w+(?:-\w+)*)(?:\{group\})?(?:\s*:\s*(?P<from_port>[LRTBlrtb]))?\s*(?P<op><-->|-->|<--|--)\s*(?:(?P<to_port>[LRTBlrtb])\s*:\s*)?(?P<to>\w+(?:-\w+)*)(?:\{group\})?$",
    )
    .unwrap()
});
static DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<keyword>group|service)\s+(?P<id>\w+(?:-\w+)*)\s*(?:\((?P<icon>[^)]*)\))?\s*(?:\[(?P<label>[^\]]*)\])?\s*(?:in\s+(?P<parent>\w+(?:-\w+)*))?$",
    )
    .unwrap()
});
static JUNCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^junction\s+(?P<id>\w+(?:-\w+)*)\s*(?:in\s+(?P<parent>\w+(?:-\w+)*))?$").unwrap()
});

pub(super) static DIALECT: Dialect = Dialect {
    kind: DiagramKind::Architecture,
    split_semicolons: false,
    header_direction: false,
    rules: &[
        Rule {
            name: "edge",
            apply: apply_edge,
        },
        Rule {
            name: "directive",
            apply: apply_directive,
        },
        Rule {
            name: "declaration",
            apply: apply_declaration,
        },
        Rule {
            name: "junction",
            apply: apply_junction,
        },
    ],
    block_rule: None,
};

fn apply_directive(line: &str, _builder: &mut DiagramBuilder) -> bool {
    ["title", "accTitle", "accDescr"]
        .iter()
        .any(|keyword| starts_with_keyword(line, keyword))
}

/// `a:R --> L:b`. `<--` is flipped so the arrow head sits on the target;
/// `<-->` keeps the written direction and marks both ends.
fn apply_edge(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = EDGE_RE.captures(line) else {
        return false;
    };
    let mut from = (&caps["from"], caps.name("from_port").and_then(|m| Port::from_token(m.as_str())));
    let mut to = (&caps["to"], caps.name("to_port").and_then(|m| Port::from_token(m.as_str())));
    let op = &caps["op"];
    if op == "<--" {
        std::mem::swap(&mut from, &mut to);
    }
    let marker_end = if op == "--" {
        MarkerEnd::None
    } else {
        MarkerEnd::Arrow
    };

    for id in [from.0, to.0] {
        if !builder.contains(id) {
            builder.declare(service(id, id, None, None, ""));
        }
    }

    builder.connect(ParsedConnection {
        line_type: LineType::Solid,
        marker_end,
        bidirectional: op == "<-->",
        relationship: Relationship::ServiceEdge,
        source_port: from.1,
        target_port: to.1,
        ..ParsedConnection::new(from.0, to.0)
    });
    true
}

fn service(
    id: &str,
    label: &str,
    icon: Option<&str>,
    group: Option<&str>,
    raw_syntax: &str,
) -> ParsedNode {
    let (shape_type, subtype) = infer_service_shape(icon);
    ParsedNode {
        id: id.to_string(),
        label: label.to_string(),
        shape_type,
        subtype,
        raw_syntax: raw_syntax.to_string(),
        details: NodeDetails::Service {
            icon: icon.map(str::to_string),
            group: group.map(str::to_string),
        },
    }
}

fn apply_declaration(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = DECLARATION_RE.captures(line) else {
        return false;
    };
    let id = &caps["id"];
    let icon = caps
        .name("icon")
        .map(|m| m.as_str().trim())
        .filter(|icon| !icon.is_empty());
    let label = caps
        .name("label")
        .map(|m| label_text(m.as_str()))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| id.to_string());
    let parent = caps.name("parent").map(|m| m.as_str());

    let node = if &caps["keyword"] == "group" {
        ParsedNode {
            id: id.to_string(),
            label,
            shape_type: ShapeType::Group,
            subtype: icon.and_then(icon_subtype),
            raw_syntax: line.to_string(),
            details: NodeDetails::Group {
                icon: icon.map(str::to_string),
                parent: parent.map(str::to_string),
            },
        }
    } else {
        service(id, &label, icon, parent, line)
    };
    builder.declare(node);
    true
}

fn apply_junction(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = JUNCTION_RE.captures(line) else {
        return false;
    };
    let id = &caps["id"];
    builder.declare(ParsedNode {
        id: id.to_string(),
        label: id.to_string(),
        shape_type: ShapeType::Junction,
        subtype: None,
        raw_syntax: line.to_string(),
        details: NodeDetails::Junction {
            group: caps.name("parent").map(|m| m.as_str().to_string()),
        },
    });
    true
}

#[cfg(test)]
mod tests {
    use crate::ir::{MarkerEnd, NodeDetails, Port, Relationship};
    use crate::parser::parse_mermaid;
    use crate::shape::{ShapeSubtype, ShapeType};

    const SAMPLE: &str = "architecture-beta
    group api(cloud)[API]

    service db(database)[Database] in api
    service disk1(disk)[Storage] in api
    service server(server)[Server] in api
    junction hub in api

    db:L -- R:server
    disk1:T -- B:server
    server:R --> L:hub
";

    #[test]
    fn declarations() {
        let parsed = parse_mermaid(SAMPLE).unwrap();
        let nodes: Vec<(&str, ShapeType, Option<ShapeSubtype>)> = parsed
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.shape_type, n.subtype))
            .collect();
        assert_eq!(
            nodes,
            vec![
                ("api", ShapeType::Group, Some(ShapeSubtype::Cloud)),
                ("db", ShapeType::Service, Some(ShapeSubtype::Database)),
                ("disk1", ShapeType::Service, Some(ShapeSubtype::Disk)),
                ("server", ShapeType::Service, Some(ShapeSubtype::Server)),
                ("hub", ShapeType::Junction, None),
            ]
        );
        assert_eq!(parsed.node("db").unwrap().label, "Database");
        assert_eq!(
            parsed.node("db").unwrap().details,
            NodeDetails::Service {
                icon: Some("database".to_string()),
                group: Some("api".to_string()),
            }
        );
    }

    #[test]
    fn edges_keep_ports() {
        let parsed = parse_mermaid(SAMPLE).unwrap();
        assert_eq!(parsed.connections.len(), 3);
        let first = &parsed.connections[0];
        assert_eq!((first.source_id.as_str(), first.target_id.as_str()), ("db", "server"));
        assert_eq!(first.source_port, Some(Port::Left));
        assert_eq!(first.target_port, Some(Port::Right));
        assert_eq!(first.marker_end, MarkerEnd::None);
        assert_eq!(first.relationship, Relationship::ServiceEdge);
        assert_eq!(parsed.connections[2].marker_end, MarkerEnd::Arrow);
    }

    #[test]
    fn reversed_arrow_and_group_modifier() {
        let input = "architecture-beta\nservice a(server)[A]\nservice b(server)[B]\na{group}:B <-- T:b{group}";
        let parsed = parse_mermaid(input).unwrap();
        let conn = &parsed.connections[0];
        assert_eq!((conn.source_id.as_str(), conn.target_id.as_str()), ("b", "a"));
        assert_eq!(conn.source_port, Some(Port::Top));
        assert_eq!(conn.target_port, Some(Port::Bottom));
        assert_eq!(conn.marker_end, MarkerEnd::Arrow);
        assert!(!conn.bidirectional);
    }

    #[test]
    fn double_headed_edges_are_bidirectional() {
        let parsed = parse_mermaid("architecture-beta\nservice a[A]\nservice b[B]\na:R <--> L:b").unwrap();
        let conn = &parsed.connections[0];
        assert_eq!((conn.source_id.as_str(), conn.target_id.as_str()), ("a", "b"));
        assert!(conn.bidirectional);
        assert_eq!(conn.marker_end, MarkerEnd::Arrow);
    }

    #[test]
    fn undeclared_endpoints_become_services() {
        let parsed = parse_mermaid("architecture-beta\ngateway -- backend\ntitle Demo").unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert!(parsed.nodes.iter().all(|n| n.shape_type == ShapeType::Service));
        assert_eq!(parsed.connections[0].source_port, None);
    }

    #[test]
    fn unknown_icons_have_no_subtype() {
        let parsed =
            parse_mermaid("architecture-beta\nservice s3(logos:aws-s3)[Bucket]\ngroup vpc[VPC]").unwrap();
        assert_eq!(parsed.node("s3").unwrap().subtype, None);
        assert_eq!(parsed.node("vpc").unwrap().label, "VPC");
        assert_eq!(parsed.node("vpc").unwrap().subtype, None);
    }
}

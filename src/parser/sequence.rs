use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, DiagramBuilder, Rule, label_text, starts_with_keyword};
use crate::ir::{
    Activation, DiagramKind, LineType, MarkerEnd, NodeDetails, ParsedConnection, ParsedNode,
    Relationship,
};
use crate::shape::infer_participant_shape;

static MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<from>[^\s<>:+\-][^<>:]*?)\s*(?P<op>-->>|->>|--x|-x|--\)|-\)|-->|->)(?P<act>[+\-])?\s*(?P<to>[^:]+?)\s*(?::\s*(?P<label>.*))?$",
    )
    .unwrap()
});
static PARTICIPANT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:create\s+)?(?P<keyword>participant|actor)\s+(?P<id>.+?)(?:\s+as\s+(?P<label>.+))?$",
    )
    .unwrap()
});

pub(super) static DIALECT: Dialect = Dialect {
    kind: DiagramKind::Sequence,
    split_semicolons: false,
    header_direction: false,
    rules: &[
        Rule {
            name: "participant",
            apply: apply_participant,
        },
        Rule {
            name: "message",
            apply: apply_message,
        },
        Rule {
            name: "block",
            apply: apply_block_keyword,
        },
    ],
    block_rule: None,
};

/// Control-flow blocks, notes and activation bars carry no participants.
const IGNORED_KEYWORDS: [&str; 21] = [
    "note",
    "loop",
    "alt",
    "else",
    "opt",
    "par",
    "par_over",
    "and",
    "end",
    "critical",
    "option",
    "break",
    "rect",
    "box",
    "autonumber",
    "activate",
    "deactivate",
    "destroy",
    "title",
    "links",
    "link",
];

fn apply_block_keyword(line: &str, _builder: &mut DiagramBuilder) -> bool {
    is_block_keyword(line)
}

/// Sequence keywords are case-insensitive (`Note`, `note`, `LOOP`).
fn is_block_keyword(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    IGNORED_KEYWORDS
        .iter()
        .any(|keyword| starts_with_keyword(&lowered, keyword))
}

fn message_kind(op: &str) -> Option<(Relationship, LineType, MarkerEnd)> {
    let kind = match op {
        "->>" => (Relationship::SyncMessage, LineType::Solid, MarkerEnd::Arrow),
        "-->>" => (Relationship::ReturnMessage, LineType::Dashed, MarkerEnd::Arrow),
        "->" => (Relationship::OpenMessage, LineType::Solid, MarkerEnd::None),
        "-->" => (Relationship::DashedOpenMessage, LineType::Dashed, MarkerEnd::None),
        "-x" => (Relationship::LostMessage, LineType::Solid, MarkerEnd::Arrow),
        "--x" => (Relationship::DashedLostMessage, LineType::Dashed, MarkerEnd::Arrow),
        "-)" => (Relationship::AsyncMessage, LineType::Solid, MarkerEnd::Arrow),
        "--)" => (Relationship::DashedAsyncMessage, LineType::Dashed, MarkerEnd::Arrow),
        _ => return None,
    };
    Some(kind)
}

fn participant(id: &str, label: &str, keyword: &str, raw_syntax: &str) -> ParsedNode {
    let (shape_type, subtype) = infer_participant_shape(keyword);
    ParsedNode {
        id: id.to_string(),
        label: label.to_string(),
        shape_type,
        subtype,
        raw_syntax: raw_syntax.to_string(),
        details: NodeDetails::None,
    }
}

fn apply_message(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = MESSAGE_RE.captures(line) else {
        return false;
    };
    let Some((relationship, line_type, marker_end)) = message_kind(&caps["op"]) else {
        return false;
    };
    let from = caps["from"].trim();
    let to = caps["to"].trim();
    if from.is_empty() || to.is_empty() {
        return false;
    }
    // `alt status -> ok` is a block label, `Box ->> Server` is a message.
    if from
        .split_once(char::is_whitespace)
        .is_some_and(|(head, _)| is_block_keyword(head))
    {
        return false;
    }

    // Participants used before (or without) a declaration.
    for id in [from, to] {
        if !builder.contains(id) {
            builder.declare(participant(id, id, "participant", ""));
        }
    }

    let activation = caps.name("act").map(|m| match m.as_str() {
        "+" => Activation::Activate,
        _ => Activation::Deactivate,
    });
    let label = caps
        .name("label")
        .map(|m| label_text(m.as_str()))
        .filter(|label| !label.is_empty());
    builder.connect(ParsedConnection {
        label,
        line_type,
        marker_end,
        relationship,
        activation,
        ..ParsedConnection::new(from, to)
    });
    true
}

fn apply_participant(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = PARTICIPANT_RE.captures(line) else {
        return false;
    };
    let id = caps["id"].trim();
    let label = caps
        .name("label")
        .map(|m| label_text(m.as_str()))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| id.to_string());
    builder.declare(participant(id, &label, &caps["keyword"], line));
    true
}

#[cfg(test)]
mod tests {
    use crate::ir::{Activation, LineType, MarkerEnd, Relationship};
    use crate::parser::parse_mermaid;
    use crate::shape::{ShapeSubtype, ShapeType};

    #[test]
    fn participants_and_aliases() {
        let input = "sequenceDiagram\nparticipant A as Alice\nactor B as \"Bob the Builder\"\nparticipant Carol";
        let parsed = parse_mermaid(input).unwrap();
        let nodes: Vec<(&str, &str, Option<ShapeSubtype>)> = parsed
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.label.as_str(), n.subtype))
            .collect();
        assert_eq!(
            nodes,
            vec![
                ("A", "Alice", Some(ShapeSubtype::Participant)),
                ("B", "Bob the Builder", Some(ShapeSubtype::Actor)),
                ("Carol", "Carol", Some(ShapeSubtype::Participant)),
            ]
        );
        assert!(parsed.nodes.iter().all(|n| n.shape_type == ShapeType::Lifeline));
    }

    #[test]
    fn message_operators() {
        let input = "sequenceDiagram\nA->>B: sync\nB-->>A: reply\nA->B\nB-->A\nA-xB: lost\nA--xB\nA-)B: fire\nA--)B";
        let parsed = parse_mermaid(input).unwrap();
        let kinds: Vec<(Relationship, LineType, MarkerEnd)> = parsed
            .connections
            .iter()
            .map(|c| (c.relationship, c.line_type, c.marker_end))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (Relationship::SyncMessage, LineType::Solid, MarkerEnd::Arrow),
                (Relationship::ReturnMessage, LineType::Dashed, MarkerEnd::Arrow),
                (Relationship::OpenMessage, LineType::Solid, MarkerEnd::None),
                (Relationship::DashedOpenMessage, LineType::Dashed, MarkerEnd::None),
                (Relationship::LostMessage, LineType::Solid, MarkerEnd::Arrow),
                (Relationship::DashedLostMessage, LineType::Dashed, MarkerEnd::Arrow),
                (Relationship::AsyncMessage, LineType::Solid, MarkerEnd::Arrow),
                (Relationship::DashedAsyncMessage, LineType::Dashed, MarkerEnd::Arrow),
            ]
        );
        assert_eq!(parsed.connections[0].label.as_deref(), Some("sync"));
        assert_eq!(parsed.connections[2].label, None);
        assert_eq!(parsed.nodes.len(), 2);
    }

    #[test]
    fn implicit_participants_in_first_use_order() {
        let input = "sequenceDiagram\nClient->>Server: GET /\nServer->>DB: query\nparticipant DB as Database";
        let parsed = parse_mermaid(input).unwrap();
        let ids: Vec<&str> = parsed.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Client", "Server", "DB"]);
        assert_eq!(parsed.node("Client").unwrap().label, "Client");
        // The implicit participant was seen first and keeps its id as label.
        assert_eq!(parsed.node("DB").unwrap().label, "DB");
    }

    #[test]
    fn activation_suffixes() {
        let input = "sequenceDiagram\nA->>+B: start\nB-->>-A: done\nA->>B";
        let parsed = parse_mermaid(input).unwrap();
        let activations: Vec<Option<Activation>> =
            parsed.connections.iter().map(|c| c.activation).collect();
        assert_eq!(
            activations,
            vec![Some(Activation::Activate), Some(Activation::Deactivate), None]
        );
        assert_eq!(parsed.connections[1].target_id, "A");
    }

    #[test]
    fn control_blocks_are_skipped() {
        let input = "sequenceDiagram\nautonumber\nloop Every minute\nA->>B: ping\nend\nalt ok\nB-->>A: pong\nelse failed\nB--xA: timeout\nend\nNote over A,B: heartbeat\nactivate A\ndeactivate A";
        let parsed = parse_mermaid(input).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.connections.len(), 3);
    }

    #[test]
    fn keyword_spelled_participants_still_send() {
        let input = "sequenceDiagram\nBox ->> Server: ship\nOption ->> Server: pick\nalt status -> ok\nNOTE over Box: x\nend";
        let parsed = parse_mermaid(input).unwrap();
        let pairs: Vec<(&str, &str)> = parsed
            .connections
            .iter()
            .map(|c| (c.source_id.as_str(), c.target_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Box", "Server"), ("Option", "Server")]);
        assert_eq!(parsed.nodes.len(), 3);
    }

    #[test]
    fn arrows_inside_aliases_are_not_messages() {
        let input = "sequenceDiagram\nparticipant A as Web->API\nA->>B: hi";
        let parsed = parse_mermaid(input).unwrap();
        let nodes: Vec<(&str, &str)> = parsed
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.label.as_str()))
            .collect();
        assert_eq!(nodes, vec![("A", "Web->API"), ("B", "B")]);
        assert_eq!(parsed.connections.len(), 1);
        assert_eq!(parsed.connections[0].source_id, "A");
    }

    #[test]
    fn hyphenated_ids_and_spacing() {
        let input = "sequenceDiagram\nweb-app ->> auth-svc : login\nauth-svc -->> web-app : token";
        let parsed = parse_mermaid(input).unwrap();
        let conn = &parsed.connections[0];
        assert_eq!(conn.source_id, "web-app");
        assert_eq!(conn.target_id, "auth-svc");
        assert_eq!(conn.label.as_deref(), Some("login"));
    }
}

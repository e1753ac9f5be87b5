use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, DiagramBuilder, Rule, label_text, starts_with_keyword};
use crate::ir::{
    DiagramKind, Direction, LineType, MarkerEnd, NodeDetails, ParsedConnection, ParsedNode,
    Relationship,
};
use crate::shape::infer_class_shape;

static RELATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?P<left>[\w~]+)\s*(?:"[^"]*"\s*)?(?P<op><\|--|<\|\.\.|--\|>|\.\.\|>|\*--|--\*|o--|--o|<\.\.|\.\.>|<--|-->|\.\.|--)\s*(?:"[^"]*"\s*)?(?P<right>[\w~]+)\s*(?::\s*(?P<label>.*))?$"#,
    )
    .unwrap()
});
static DECLARATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^class\s+(?P<id>[\w~]+)\s*(?:\[\s*(?P<label>"[^"]*"|[^\]]*)\s*\])?\s*(?::::\s*[\w-]+)?\s*(?P<body>\{.*)?$"#,
    )
    .unwrap()
});
static STEREOTYPE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<<\s*(?P<stereotype>[^>]+?)\s*>>\s*(?P<id>[\w~]+)?\s*$").unwrap());
static MEMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<id>[\w~]+)\s*:\s*(?P<member>.+)$").unwrap());

pub(super) static DIALECT: Dialect = Dialect {
    kind: DiagramKind::Class,
    split_semicolons: false,
    header_direction: false,
    rules: &[
        Rule {
            name: "relation",
            apply: apply_relation,
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
            name: "stereotype",
            apply: apply_stereotype,
        },
        Rule {
            name: "member",
            apply: apply_member,
        },
    ],
    block_rule: Some(apply_body_line),
};

const IGNORED_KEYWORDS: [&str; 9] = [
    "note",
    "classDef",
    "style",
    "cssClass",
    "click",
    "link",
    "callback",
    "namespace",
    "title",
];

fn apply_directive(line: &str, builder: &mut DiagramBuilder) -> bool {
    if starts_with_keyword(line, "direction") {
        if let Some(dir) = line.split_whitespace().nth(1).and_then(Direction::from_token) {
            builder.diagram.direction = dir;
        }
        return true;
    }
    // Closing brace of a namespace.
    if line == "}" {
        return true;
    }
    IGNORED_KEYWORDS
        .iter()
        .any(|keyword| starts_with_keyword(line, keyword))
}

/// Canonical shape of a relationship operator.
struct RelationKind {
    relationship: Relationship,
    line_type: LineType,
    marker_end: MarkerEnd,
    /// The decorated end is on the right; endpoints are swapped.
    reversed: bool,
}

fn relation_kind(op: &str) -> Option<RelationKind> {
    let (relationship, reversed) = match op {
        "<|--" => (Relationship::Inheritance, false),
        "--|>" => (Relationship::Inheritance, true),
        "<|.." => (Relationship::Realization, false),
        "..|>" => (Relationship::Realization, true),
        "*--" => (Relationship::Composition, false),
        "--*" => (Relationship::Composition, true),
        "o--" => (Relationship::Aggregation, false),
        "--o" => (Relationship::Aggregation, true),
        "..>" => (Relationship::Dependency, false),
        "<.." => (Relationship::Dependency, true),
        "-->" => (Relationship::Association, false),
        "<--" => (Relationship::Association, true),
        "--" => (Relationship::Link, false),
        ".." => (Relationship::DottedLink, false),
        _ => return None,
    };
    let line_type = if op.contains("..") {
        LineType::Dashed
    } else {
        LineType::Solid
    };
    let marker_end = match relationship {
        Relationship::Dependency | Relationship::Association => MarkerEnd::Arrow,
        _ => MarkerEnd::None,
    };
    Some(RelationKind {
        relationship,
        line_type,
        marker_end,
        reversed,
    })
}

fn placeholder(id: &str) -> ParsedNode {
    let (shape_type, subtype) = infer_class_shape(None);
    ParsedNode {
        id: id.to_string(),
        label: id.to_string(),
        shape_type,
        subtype,
        raw_syntax: String::new(),
        details: empty_class_details(),
    }
}

fn empty_class_details() -> NodeDetails {
    NodeDetails::Class {
        stereotype: None,
        attributes: Vec::new(),
        methods: Vec::new(),
    }
}

fn ensure_class(builder: &mut DiagramBuilder, id: &str) {
    if !builder.contains(id) {
        builder.declare(placeholder(id));
    }
}

fn apply_relation(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = RELATION_RE.captures(line) else {
        return false;
    };
    let Some(kind) = relation_kind(&caps["op"]) else {
        return false;
    };
    let (mut source, mut target) = (&caps["left"], &caps["right"]);
    if kind.reversed {
        std::mem::swap(&mut source, &mut target);
    }
    ensure_class(builder, &caps["left"]);
    ensure_class(builder, &caps["right"]);

    let label = caps
        .name("label")
        .map(|m| label_text(m.as_str()))
        .filter(|label| !label.is_empty());
    builder.connect(ParsedConnection {
        label,
        line_type: kind.line_type,
        marker_end: kind.marker_end,
        relationship: kind.relationship,
        ..ParsedConnection::new(source, target)
    });
    true
}

fn apply_declaration(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = DECLARATION_RE.captures(line) else {
        return false;
    };
    let id = &caps["id"];
    let label = caps
        .name("label")
        .map(|m| label_text(m.as_str()))
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| id.to_string());

    let (shape_type, subtype) = infer_class_shape(None);
    builder.declare(ParsedNode {
        id: id.to_string(),
        label,
        shape_type,
        subtype,
        raw_syntax: line.to_string(),
        details: empty_class_details(),
    });

    if let Some(body) = caps.name("body") {
        let inner = &body.as_str()[1..];
        match inner.find('}') {
            Some(close) => {
                for member in inner[..close].split(';') {
                    add_body_entry(builder, id, member);
                }
            }
            None => {
                builder.open_block = Some(id.to_string());
                add_body_entry(builder, id, inner);
            }
        }
    }
    true
}

fn apply_stereotype(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = STEREOTYPE_LINE_RE.captures(line) else {
        return false;
    };
    if let Some(id) = caps.name("id") {
        ensure_class(builder, id.as_str());
        set_stereotype(builder, id.as_str(), &caps["stereotype"]);
    }
    true
}

fn apply_member(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(caps) = MEMBER_RE.captures(line) else {
        return false;
    };
    let id = &caps["id"];
    ensure_class(builder, id);
    add_member(builder, id, &caps["member"]);
    true
}

/// Consumes one line of an open `class Name {` body.
fn apply_body_line(line: &str, builder: &mut DiagramBuilder) {
    let Some(id) = builder.open_block.clone() else {
        return;
    };
    match line.find('}') {
        Some(close) => {
            add_body_entry(builder, &id, &line[..close]);
            builder.open_block = None;
        }
        None => add_body_entry(builder, &id, line),
    }
}

fn add_body_entry(builder: &mut DiagramBuilder, id: &str, entry: &str) {
    let entry = entry.trim();
    if entry.is_empty() {
        return;
    }
    if let Some(stereotype) = entry
        .strip_prefix("<<")
        .and_then(|rest| rest.strip_suffix(">>"))
    {
        set_stereotype(builder, id, stereotype.trim());
        return;
    }
    add_member(builder, id, entry);
}

fn set_stereotype(builder: &mut DiagramBuilder, id: &str, stereotype: &str) {
    let Some(node) = builder.node_mut(id) else {
        return;
    };
    let (shape_type, subtype) = infer_class_shape(Some(stereotype));
    node.shape_type = shape_type;
    node.subtype = subtype;
    if let NodeDetails::None = node.details {
        node.details = empty_class_details();
    }
    if let NodeDetails::Class {
        stereotype: slot, ..
    } = &mut node.details
    {
        *slot = Some(stereotype.to_string());
    }
}

/// Members containing `(` are methods; everything else is an attribute.
fn add_member(builder: &mut DiagramBuilder, id: &str, member: &str) {
    let member = member.trim();
    if member.is_empty() {
        return;
    }
    let Some(node) = builder.node_mut(id) else {
        return;
    };
    if let NodeDetails::None = node.details {
        node.details = empty_class_details();
    }
    if let NodeDetails::Class {
        attributes,
        methods,
        ..
    } = &mut node.details
    {
        if member.contains('(') {
            methods.push(member.to_string());
        } else {
            attributes.push(member.to_string());
        }
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, DiagramBuilder, Rule, label_text, starts_with_keyword};
use crate::ir::{DiagramKind, Direction, LineType, MarkerEnd, ParsedConnection, ParsedNode, Relationship};
use crate::shape::infer_flow_shape;

/// Any run of link strokes with optional heads; filtered by stroke count.
static ARROW_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<?[-.=]*[-=]+[-.=]*[>ox]?").unwrap());
static NODE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][\w\-.]*$").unwrap());

pub(super) static DIALECT: Dialect = Dialect {
    kind: DiagramKind::Flowchart,
    split_semicolons: true,
    header_direction: true,
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
            name: "node",
            apply: apply_node,
        },
    ],
    block_rule: None,
};

const IGNORED_KEYWORDS: [&str; 11] = [
    "subgraph",
    "end",
    "style",
    "classDef",
    "class",
    "click",
    "linkStyle",
    "title",
    "accTitle",
    "accDescr",
    "link",
];

/// Statements that carry no nodes or edges: styling, subgraph brackets and
/// `direction` (which does update the diagram).
fn apply_directive(line: &str, builder: &mut DiagramBuilder) -> bool {
    if starts_with_keyword(line, "direction") {
        if let Some(dir) = line.split_whitespace().nth(1).and_then(Direction::from_token) {
            builder.diagram.direction = dir;
        }
        return true;
    }
    IGNORED_KEYWORDS
        .iter()
        .any(|keyword| starts_with_keyword(line, keyword))
}

fn apply_edge(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(chain) = split_edge_chain(line) else {
        return false;
    };

    // Every token must parse before anything is declared.
    let mut groups: Vec<Vec<ParsedNode>> = Vec::with_capacity(chain.groups.len());
    for group in &chain.groups {
        let nodes: Option<Vec<ParsedNode>> = group
            .split('&')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_node_token)
            .collect();
        match nodes {
            Some(nodes) if !nodes.is_empty() => groups.push(nodes),
            _ => return false,
        }
    }
    let mut ids: Vec<Vec<String>> = Vec::with_capacity(groups.len());
    for nodes in groups {
        let mut group_ids = Vec::with_capacity(nodes.len());
        for node in nodes {
            group_ids.push(node.id.clone());
            builder.declare(node);
        }
        ids.push(group_ids);
    }

    for (idx, link) in chain.links.iter().enumerate() {
        for source in &ids[idx] {
            for target in &ids[idx + 1] {
                builder.connect(ParsedConnection {
                    label: link.label.clone(),
                    line_type: link.line_type,
                    marker_end: link.marker_end,
                    relationship: Relationship::Flow,
                    ..ParsedConnection::new(source.as_str(), target.as_str())
                });
            }
        }
    }
    true
}

fn apply_node(line: &str, builder: &mut DiagramBuilder) -> bool {
    let Some(node) = parse_node_token(line) else {
        return false;
    };
    builder.declare(node);
    true
}

/// Bracket pairs, longest first, so `(((x)))` is not read as `(x)`.
const DELIMITERS: [(&str, &str); 14] = [
    ("(((", ")))"),
    ("((", "))"),
    ("([", "])"),
    ("[[", "]]"),
    ("[(", ")]"),
    ("{{", "}}"),
    ("[/", "/]"),
    ("[\\", "\\]"),
    ("[/", "\\]"),
    ("[\\", "/]"),
    ("[", "]"),
    ("(", ")"),
    ("{", "}"),
    (">", "]"),
];

fn parse_node_token(token: &str) -> Option<ParsedNode> {
    let base = token.split(":::").next().unwrap_or("").trim();
    if base.is_empty() {
        return None;
    }

    let Some(open_idx) = base.find(['[', '(', '{', '>']) else {
        if !NODE_ID_RE.is_match(base) {
            return None;
        }
        let (shape_type, subtype) = infer_flow_shape("", base);
        return Some(ParsedNode {
            id: base.to_string(),
            label: base.to_string(),
            shape_type,
            subtype,
            raw_syntax: String::new(),
            details: Default::default(),
        });
    };

    let id = base[..open_idx].trim();
    if !NODE_ID_RE.is_match(id) {
        return None;
    }
    let raw = base[open_idx..].trim();
    let (open, close) = DELIMITERS
        .iter()
        .find(|(open, close)| {
            raw.len() >= open.len() + close.len() && raw.starts_with(open) && raw.ends_with(close)
        })
        .copied()?;
    let label = label_text(&raw[open.len()..raw.len() - close.len()]);
    let (shape_type, subtype) = infer_flow_shape(raw, &label);
    Some(ParsedNode {
        id: id.to_string(),
        label,
        shape_type,
        subtype,
        raw_syntax: raw.to_string(),
        details: Default::default(),
    })
}

#[derive(Debug, Clone, PartialEq)]
struct ParsedLink {
    label: Option<String>,
    line_type: LineType,
    marker_end: MarkerEnd,
}

/// `A --> B -.->|x| C & D` as node groups `[A, B, C & D]` joined by links.
#[derive(Debug)]
struct EdgeChain {
    groups: Vec<String>,
    links: Vec<ParsedLink>,
}

fn stroke_count(op: &str) -> usize {
    op.chars().filter(|c| matches!(c, '-' | '=' | '.')).count()
}

/// Operators that open a `-- text -->` label rather than link two nodes.
fn is_label_opener(op: &str) -> bool {
    matches!(op, "--" | "-." | "==")
}

fn split_edge_chain(line: &str) -> Option<EdgeChain> {
    let masked = mask_label_content(line);
    let arrows: Vec<(usize, usize)> = ARROW_TOKEN_RE
        .find_iter(&masked)
        .filter(|m| stroke_count(m.as_str()) >= 2)
        .map(|m| (m.start(), m.end()))
        .collect();
    if arrows.is_empty() {
        return None;
    }

    let mut groups = vec![line[..arrows[0].0].trim().to_string()];
    let mut links = Vec::new();
    let mut idx = 0;
    while idx < arrows.len() {
        let (start, end) = arrows[idx];
        let mut op = line[start..end].to_string();
        let mut label = None;
        let mut tail_start = end;

        if is_label_opener(&op) && idx + 1 < arrows.len() {
            let (next_start, next_end) = arrows[idx + 1];
            let text = line[end..next_start].trim();
            if !text.is_empty() {
                label = Some(label_text(text));
            }
            op.push_str(&line[next_start..next_end]);
            tail_start = next_end;
            idx += 1;
        }
        idx += 1;

        let tail_end = arrows.get(idx).map_or(line.len(), |(s, _)| *s);
        let mut tail = line[tail_start..tail_end].trim();
        if let Some(rest) = tail.strip_prefix('|') {
            let close = find_unquoted(rest, '|')?;
            let text = rest[..close].trim();
            if !text.is_empty() {
                label = Some(label_text(text));
            }
            tail = rest[close + 1..].trim();
        }

        let (line_type, marker_end) = parse_link_operator(&op);
        links.push(ParsedLink {
            label,
            line_type,
            marker_end,
        });
        groups.push(tail.to_string());
    }

    if groups.iter().any(|g| g.is_empty()) {
        return None;
    }
    Some(EdgeChain { groups, links })
}

fn find_unquoted(text: &str, needle: char) -> Option<usize> {
    let mut in_quote = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            _ if ch == needle && !in_quote => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Maps an operator such as `-->`, `-.->`, `==>` or `---` to line type and
/// end marker. Thick links read as solid; `o`/`x` decorations are dropped.
fn parse_link_operator(op: &str) -> (LineType, MarkerEnd) {
    let trimmed = op.trim().trim_end_matches(['o', 'x']);
    let line_type = if trimmed.contains('.') {
        LineType::Dotted
    } else {
        LineType::Solid
    };
    let marker_end = if trimmed.ends_with('>') {
        MarkerEnd::Arrow
    } else {
        MarkerEnd::None
    };
    (line_type, marker_end)
}

/// Blanks out bracketed, quoted and `|piped|` label text so link strokes
/// inside labels (`A[wi-fi]`) are not mistaken for operators. Byte offsets
/// are preserved.
fn mask_label_content(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut in_pipe = false;

    for ch in line.chars() {
        let masked = depth > 0 || in_quote || in_pipe;
        match ch {
            '"' => {
                in_quote = !in_quote;
                result.push(ch);
            }
            '[' | '(' | '{' if !in_quote && !in_pipe => {
                depth += 1;
                result.push(ch);
            }
            ']' | ')' | '}' if !in_quote && !in_pipe && depth > 0 => {
                depth -= 1;
                result.push(ch);
            }
            '|' if !in_quote && depth == 0 => {
                in_pipe = !in_pipe;
                result.push(ch);
            }
            _ if masked => {
                for _ in 0..ch.len_utf8() {
                    result.push(' ');
                }
            }
            _ => result.push(ch),
        }
    }
    result
}

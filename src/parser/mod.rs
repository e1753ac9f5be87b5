//! Mermaid text → [`ParsedDiagram`].
//!
//! All four dialects share one driver: the input is normalised into
//! statements (comments stripped, blank lines dropped, header checked), then
//! each statement is offered to the dialect's rule table in order. The first
//! rule that accepts a statement wins; statements no rule accepts are
//! skipped. Connection rules run before keyword and node rules, so an id
//! that happens to spell a keyword (`Note --> User`) still connects. Sequence
//! `participant`/`actor` lines are keyword-anchored and are read first.

mod architecture;
mod class;
mod flowchart;
mod sequence;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::ImportError;
use crate::ir::{DiagramKind, Direction, ParsedConnection, ParsedDiagram, ParsedNode};

static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+);").unwrap());

/// One entry of a dialect's rule table. `apply` returns `true` when it
/// recognised the statement, including statements it deliberately ignores.
pub(crate) struct Rule {
    pub name: &'static str,
    pub apply: fn(&str, &mut DiagramBuilder) -> bool,
}

pub(crate) struct Dialect {
    pub kind: DiagramKind,
    /// Split `;`-separated statements outside brackets and quotes.
    pub split_semicolons: bool,
    /// Reads the direction token from the header line, if the dialect has one.
    pub header_direction: bool,
    pub rules: &'static [Rule],
    /// Consumes statements while a block (class body) is open.
    pub block_rule: Option<fn(&str, &mut DiagramBuilder)>,
}

fn dialect(kind: DiagramKind) -> &'static Dialect {
    match kind {
        DiagramKind::Flowchart => &flowchart::DIALECT,
        DiagramKind::Class => &class::DIALECT,
        DiagramKind::Sequence => &sequence::DIALECT,
        DiagramKind::Architecture => &architecture::DIALECT,
    }
}

/// Parses Mermaid text, detecting the dialect from its header line.
pub fn parse_mermaid(input: &str) -> Result<ParsedDiagram, ImportError> {
    let (statements, _) = preprocess_input(input, false);
    let Some((_, header)) = statements.first() else {
        return Err(ImportError::EmptyInput);
    };
    let kind = DiagramKind::ALL
        .into_iter()
        .find(|kind| kind.matches_header(header))
        .ok_or_else(|| ImportError::UnknownDiagramType {
            found: header.split_whitespace().next().unwrap_or("").to_string(),
        })?;
    parse_diagram(kind, input)
}

/// Parses Mermaid text that must start with the header of `kind`.
pub fn parse_diagram(kind: DiagramKind, input: &str) -> Result<ParsedDiagram, ImportError> {
    let dialect = dialect(kind);
    let (statements, init_config) = preprocess_input(input, dialect.split_semicolons);
    let Some((_, header)) = statements.first() else {
        return Err(ImportError::EmptyInput);
    };
    if !dialect.kind.matches_header(header) {
        return Err(ImportError::MissingHeader {
            expected: kind.header(),
        });
    }

    let mut builder = DiagramBuilder::new(dialect.kind);
    builder.diagram.init_config = init_config;
    if dialect.header_direction
        && let Some(dir) = header.split_whitespace().nth(1).and_then(Direction::from_token)
    {
        builder.diagram.direction = dir;
    }

    let mut skipped = 0usize;
    for (line_no, statement) in statements.iter().skip(1) {
        if builder.open_block.is_some()
            && let Some(block_rule) = dialect.block_rule
        {
            block_rule(statement, &mut builder);
            continue;
        }
        let matched = dialect
            .rules
            .iter()
            .find(|rule| (rule.apply)(statement, &mut builder));
        match matched {
            Some(rule) => trace!(line_no, rule = rule.name, "matched statement"),
            None => {
                skipped += 1;
                trace!(line_no, statement = %statement, "skipping unrecognized statement");
            }
        }
    }

    let diagram = builder.finish();
    debug!(
        kind = %diagram.kind,
        nodes = diagram.nodes.len(),
        connections = diagram.connections.len(),
        skipped,
        "parsed mermaid diagram"
    );
    Ok(diagram)
}

/// Accumulates nodes and connections for one parse pass.
pub(crate) struct DiagramBuilder {
    pub diagram: ParsedDiagram,
    index: HashMap<String, usize>,
    /// Id of the class whose `{ ... }` body is being read.
    pub open_block: Option<String>,
}

impl DiagramBuilder {
    fn new(kind: DiagramKind) -> Self {
        Self {
            diagram: ParsedDiagram::new(kind),
            index: HashMap::new(),
            open_block: None,
        }
    }

    /// Records a node the first time its id is seen. Later declarations of
    /// the same id are ignored; class bodies and member lines are merged
    /// through [`DiagramBuilder::node_mut`] instead.
    pub fn declare(&mut self, node: ParsedNode) {
        if self.index.contains_key(&node.id) {
            return;
        }
        self.index.insert(node.id.clone(), self.diagram.nodes.len());
        self.diagram.nodes.push(node);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ParsedNode> {
        let idx = *self.index.get(id)?;
        self.diagram.nodes.get_mut(idx)
    }

    pub fn connect(&mut self, connection: ParsedConnection) {
        self.diagram.connections.push(connection);
    }

    fn finish(self) -> ParsedDiagram {
        self.diagram
    }
}

type Statements = Vec<(usize, String)>;

/// Splits the input into trimmed statements tagged with their 1-based line
/// number, dropping blank lines and `%%` comments. A `%%{init: ...}%%`
/// directive is returned separately.
fn preprocess_input(input: &str, split_semicolons: bool) -> (Statements, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut statements = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        let without_comment = strip_trailing_comment(trimmed_line);
        if without_comment.is_empty() {
            continue;
        }
        if split_semicolons {
            for statement in split_statements(&without_comment) {
                statements.push((idx + 1, statement));
            }
        } else {
            statements.push((idx + 1, without_comment));
        }
    }

    (statements, init_config)
}

fn split_statements(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }

        match ch {
            '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' | '}' => {
                if depth > 0 {
                    depth -= 1;
                }
                current.push(ch);
            }
            ';' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}

fn strip_trailing_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '%'
            && let Some('%') = chars.peek().copied()
        {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

/// Label text as written: surrounding quotes removed, entity codes decoded.
pub(crate) fn label_text(input: &str) -> String {
    let trimmed = input.trim();
    let unquoted = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    decode_entities(unquoted)
}

/// `#quot;`, `#amp;`, `#lt;`, `#gt;` and numeric codes such as `#124;`.
/// Unknown names are left as written.
fn decode_entities(text: &str) -> String {
    if !text.contains('#') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "quot" => Some('"'),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name.parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// True when `line` starts with `keyword` as a whole word. Matching is
/// case-sensitive, as in the flowchart and class grammars.
pub(crate) fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| rest.chars().next().is_none_or(|ch| ch.is_whitespace() || ch == ':'))
}

//! Textual configuration form (pmcfg).
//!
//! Blocks are `name { ... }` with tab indentation, items are
//! `name "value"` with values aligned per block. Line comments start
//! with `//`; the first line of a persisted revision is the special
//! `// @desc "<description>"` comment.

use thiserror::Error;

use crate::tree::{ConfigTree, NodeId, NodeKind, NodeState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected token {0:?} at line {1}")]
    UnexpectedToken(String, usize),
    #[error("unterminated string at line {0}")]
    UnterminatedString(usize),
}

/// Parsed configuration contents, detached from any definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentNode {
    pub name: String,
    pub value: String,
    pub kind: NodeKind,
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    fn block(name: &str) -> Self {
        ContentNode {
            name: name.to_owned(),
            value: String::new(),
            kind: NodeKind::Block,
            children: Vec::new(),
        }
    }

    fn item(name: &str, value: &str) -> Self {
        ContentNode {
            name: name.to_owned(),
            value: value.to_owned(),
            kind: NodeKind::Item,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// How node values and states appear in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderView {
    /// Pending view: `new_value`, `+`/`-` state markers, used for the
    /// `show configuration` command output.
    Interactive,
    /// Persisted view: committed `value` only, nodes not yet committed
    /// (`is_new`) excluded. Used for rollback snapshots and the running
    /// configuration file.
    Committed,
}

/// Render a subtree; `desc` becomes the `// @desc` first line.
pub fn render(tree: &ConfigTree, from: NodeId, view: RenderView, desc: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(d) = desc {
        out.push_str(&format!("// @desc \"{}\"\n", d));
    }
    render_children(tree, from, view, 0, &mut out);
    out
}

fn renders_anything(tree: &ConfigTree, id: NodeId, view: RenderView) -> bool {
    let n = tree.node(id);
    if n.is_template {
        return false;
    }
    match n.kind {
        NodeKind::Item => match view {
            RenderView::Interactive => !n.new_value.is_empty() || n.state == NodeState::Deleted,
            RenderView::Committed => !n.value.is_empty() && !n.is_new,
        },
        NodeKind::Block => {
            if view == RenderView::Committed && n.is_new {
                return false;
            }
            n.children.iter().any(|&c| renders_anything(tree, c, view))
        }
        _ => false,
    }
}

fn render_children(tree: &ConfigTree, id: NodeId, view: RenderView, depth: usize, out: &mut String) {
    // item name column width per block
    let mut max_name = 0usize;
    for &c in &tree.node(id).children {
        let n = tree.node(c);
        if !n.is_template && n.kind == NodeKind::Item {
            let extra = usize::from(view == RenderView::Interactive && n.state != NodeState::Ready);
            max_name = max_name.max(n.name.len() + extra);
        }
    }

    for &c in &tree.node(id).children {
        let n = tree.node(c);
        if n.is_template || !renders_anything(tree, c, view) {
            continue;
        }
        let marker = if view == RenderView::Interactive {
            match n.state {
                NodeState::Deleted => "-",
                NodeState::Modified => "+",
                _ => "",
            }
        } else {
            ""
        };
        match n.kind {
            NodeKind::Block => {
                out.push_str(&"\t".repeat(depth));
                out.push_str(&format!("{}{} {{\n", marker, n.name));
                render_children(tree, c, view, depth + 1, out);
                out.push_str(&"\t".repeat(depth));
                out.push_str("}\n");
            }
            NodeKind::Item => {
                let value = match view {
                    RenderView::Interactive => &n.new_value,
                    RenderView::Committed => &n.value,
                };
                let shown = format!("{}{}", marker, n.name);
                let pad = max_name.saturating_sub(shown.len()) + 1;
                out.push_str(&"\t".repeat(depth));
                out.push_str(&format!("{}{}\"{}\"\n", shown, " ".repeat(pad), value));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1usize;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                // line comment
                chars.next();
                if chars.peek() == Some(&'/') {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            line += 1;
                            break;
                        }
                    }
                } else {
                    return Err(ParseError::UnexpectedToken("/".to_owned(), line));
                }
            }
            '{' => {
                chars.next();
                tokens.push((Token::Open, line));
            }
            '}' => {
                chars.next();
                tokens.push((Token::Close, line));
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    if c == '\n' {
                        line += 1;
                    }
                    s.push(c);
                }
                if !closed {
                    return Err(ParseError::UnterminatedString(line));
                }
                tokens.push((Token::Str(s), line));
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                        break;
                    }
                    s.push(c);
                    chars.next();
                }
                tokens.push((Token::Ident(s), line));
            }
        }
    }
    Ok(tokens)
}

/// Parse configuration contents into a detached tree rooted at an
/// anonymous block.
pub fn parse(input: &str) -> Result<ContentNode, ParseError> {
    let tokens = tokenize(input)?;
    let mut pos = 0usize;
    let mut root = ContentNode::block("");
    parse_nodes(&tokens, &mut pos, &mut root, true)?;
    Ok(root)
}

fn parse_nodes(
    tokens: &[(Token, usize)],
    pos: &mut usize,
    parent: &mut ContentNode,
    top: bool,
) -> Result<(), ParseError> {
    loop {
        match tokens.get(*pos) {
            None => {
                if top {
                    return Ok(());
                }
                return Err(ParseError::UnexpectedEof);
            }
            Some((Token::Close, _)) => {
                if top {
                    let (t, l) = &tokens[*pos];
                    return Err(ParseError::UnexpectedToken(format!("{t:?}"), *l));
                }
                *pos += 1;
                return Ok(());
            }
            Some((Token::Ident(name), line)) => {
                let name = name.clone();
                let line = *line;
                *pos += 1;
                match tokens.get(*pos) {
                    Some((Token::Str(value), _)) => {
                        parent.children.push(ContentNode::item(&name, value));
                        *pos += 1;
                    }
                    Some((Token::Open, _)) => {
                        *pos += 1;
                        let mut block = ContentNode::block(&name);
                        parse_nodes(tokens, pos, &mut block, false)?;
                        parent.children.push(block);
                    }
                    _ => return Err(ParseError::UnexpectedToken(name, line)),
                }
            }
            Some((t, l)) => return Err(ParseError::UnexpectedToken(format!("{t:?}"), *l)),
        }
    }
}

/// Split a CLI line into tokens, keeping quoted segments (quotes
/// included) as single tokens.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                cur.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !cur.is_empty() {
                    out.push(std::mem::take(&mut cur));
                }
            }
            _ => cur.push(c),
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

/// Description from a revision's `// @desc "<text>"` first line.
pub fn revision_desc(input: &str) -> Option<String> {
    let first = input.lines().next()?;
    let rest = first.trim().strip_prefix("//")?.trim().strip_prefix("@desc")?.trim();
    let rest = rest.strip_prefix('"')?.strip_suffix('"')?;
    Some(rest.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConfigTree;

    #[test]
    fn parse_nested_blocks_and_items() {
        let input = r#"
// a comment
system {
	hostname "node-1"
	ntp {
		server "10.0.0.1"
	}
}
"#;
        let root = parse(input).unwrap();
        assert_eq!(root.children.len(), 1);
        let system = &root.children[0];
        assert_eq!(system.name, "system");
        assert_eq!(system.children[0], ContentNode::item("hostname", "node-1"));
        assert_eq!(system.children[1].name, "ntp");
    }

    #[test]
    fn parse_rejects_unbalanced_braces() {
        assert_eq!(parse("a {"), Err(ParseError::UnexpectedEof));
        assert!(matches!(parse("}"), Err(ParseError::UnexpectedToken(_, _))));
    }

    #[test]
    fn render_then_parse_round_trips_committed_values() {
        let mut t = ConfigTree::new();
        let root = t.root();
        let system = t.build_block(root, "system", "");
        let hostname = t.build_item(system, "hostname", "", "STRING");
        t.node_mut(hostname).value = "node-1".to_owned();
        t.node_mut(hostname).new_value = "node-1".to_owned();

        let text = render(&t, root, RenderView::Committed, Some("initial"));
        assert!(text.starts_with("// @desc \"initial\"\n"));
        assert_eq!(revision_desc(&text).as_deref(), Some("initial"));

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.children[0].name, "system");
        assert_eq!(parsed.children[0].children[0], ContentNode::item("hostname", "node-1"));
    }

    #[test]
    fn interactive_view_marks_pending_changes() {
        let mut t = ConfigTree::new();
        let root = t.root();
        let system = t.build_block(root, "system", "");
        let hostname = t.build_item(system, "hostname", "", "STRING");
        t.node_mut(hostname).new_value = "new-name".to_owned();
        t.node_mut(hostname).state = NodeState::Modified;
        t.node_mut(system).state = NodeState::Modified;

        let text = render(&t, root, RenderView::Interactive, None);
        assert!(text.contains("+system {"));
        assert!(text.contains("+hostname \"new-name\""));
    }

    #[test]
    fn tokenize_line_keeps_quoted_segments_together() {
        assert_eq!(
            tokenize_line("set system hostname \"node one\""),
            vec!["set", "system", "hostname", "\"node one\""]
        );
        assert_eq!(tokenize_line("  a   b "), vec!["a", "b"]);
    }

    #[test]
    fn committed_view_excludes_uncommitted_nodes() {
        let mut t = ConfigTree::new();
        let root = t.root();
        let system = t.build_block(root, "system", "");
        let hostname = t.build_item(system, "hostname", "", "STRING");
        t.node_mut(hostname).value = "old".to_owned();
        t.node_mut(hostname).new_value = "new".to_owned();
        t.node_mut(hostname).state = NodeState::Modified;
        let fresh = t.build_item(system, "fresh", "", "STRING");
        t.node_mut(fresh).is_new = true;
        t.node_mut(fresh).new_value = "x".to_owned();

        let text = render(&t, root, RenderView::Committed, None);
        assert!(text.contains("hostname \"old\""));
        assert!(!text.contains("fresh"));
    }
}

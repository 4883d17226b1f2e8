//! Item value patterns.
//!
//! A pattern is either a regular expression or a path reference of the
//! form `:pmcfg:[<path>]` that enumerates valid values from the
//! children of another configuration node. Absolute paths start at the
//! tree root; relative paths resolve from the validated node's parent.

use regex::Regex;

use crate::tree::{ConfigTree, NodeId};

#[derive(Debug, Clone)]
pub struct CfgPattern {
    pub name: String,
    pub pattern: String,
    pub desc: String,
}

impl CfgPattern {
    pub fn new(name: &str, pattern: &str, desc: &str) -> Self {
        CfgPattern { name: name.to_owned(), pattern: pattern.to_owned(), desc: desc.to_owned() }
    }
}

const PMCFG_PREFIX: &str = ":pmcfg:";

/// Path referenced by a `:pmcfg:[...]` pattern, if this is one.
pub(crate) fn pmcfg_path(pattern: &str) -> Option<&str> {
    let rest = pattern.strip_prefix(PMCFG_PREFIX)?;
    rest.strip_prefix('[')?.strip_suffix(']')
}

/// Node the reference pattern enumerates, resolved absolute from the
/// tree root or relative from the validated node's parent.
pub(crate) fn resolve_reference(
    tree: &ConfigTree,
    pattern_path: &str,
    node: Option<NodeId>,
) -> Option<NodeId> {
    if let Some(abs) = pattern_path.strip_prefix('/') {
        tree.lookup(tree.root(), abs)
    } else {
        let parent = tree.node(node?).parent?;
        tree.lookup(parent, pattern_path)
    }
}

/// Validate `value` against the pattern registered for `type_tag`.
///
/// Enclosing double quotes are stripped from the value in place before
/// regex matching, mirroring how the CLI quotes free-form values.
pub fn pattern_valid(
    tree: &ConfigTree,
    patterns: &[CfgPattern],
    value: &mut String,
    type_tag: &str,
    node: Option<NodeId>,
) -> bool {
    let Some(ptrn) = patterns.iter().find(|p| p.name == type_tag) else {
        return false;
    };

    if let Some(path) = pmcfg_path(&ptrn.pattern) {
        let Some(reference) = resolve_reference(tree, path, node) else {
            return false;
        };
        return tree
            .node(reference)
            .children
            .iter()
            .any(|&c| !tree.node(c).is_template && tree.node(c).name == *value);
    }

    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value.remove(0);
        value.pop();
    }
    // whole-value match
    match Regex::new(&format!("^(?:{})$", ptrn.pattern)) {
        Ok(re) => re.is_match(value),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConfigTree;

    #[test]
    fn regex_pattern_matches_whole_value() {
        let tree = ConfigTree::new();
        let patterns = vec![CfgPattern::new("NUM", r"\d+", "number")];
        let mut ok = "123".to_owned();
        let mut partial = "12a".to_owned();
        assert!(pattern_valid(&tree, &patterns, &mut ok, "NUM", None));
        assert!(!pattern_valid(&tree, &patterns, &mut partial, "NUM", None));
    }

    #[test]
    fn quotes_are_stripped_before_matching() {
        let tree = ConfigTree::new();
        let patterns = vec![CfgPattern::new("WORD", r"[a-z]+", "word")];
        let mut v = "\"abc\"".to_owned();
        assert!(pattern_valid(&tree, &patterns, &mut v, "WORD", None));
        assert_eq!(v, "abc");
    }

    #[test]
    fn reference_pattern_enumerates_node_children() {
        let mut tree = ConfigTree::new();
        let root = tree.root();
        let zones = tree.build_block(root, "zones", "");
        tree.build_block(zones, "red", "");
        tree.build_block(zones, "blue", "");
        let patterns = vec![CfgPattern::new("ZONE", ":pmcfg:[/zones]", "zone name")];

        let mut ok = "red".to_owned();
        let mut bad = "green".to_owned();
        assert!(pattern_valid(&tree, &patterns, &mut ok, "ZONE", None));
        assert!(!pattern_valid(&tree, &patterns, &mut bad, "ZONE", None));
    }

    #[test]
    fn unknown_type_is_invalid() {
        let tree = ConfigTree::new();
        let mut v = "x".to_owned();
        assert!(!pattern_valid(&tree, &[], &mut v, "NOPE", None));
    }
}

//! Configuration engine: auto-complete, edit, validate, merge, commit,
//! rollback support, discard and sort over the arena tree.
//!
//! One engine instance serves every user of a daemon. Per-user state is
//! a working node; at most one user holds the write transaction, other
//! users operate in pretend mode until it ends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use tracing::debug;

use crate::pattern::{pattern_valid, pmcfg_path, resolve_reference, CfgPattern};
use crate::rollback;
use crate::text::ContentNode;
use crate::tree::{ConfigTree, HandlerId, Node, NodeId, NodeKind, NodeState, SpecialAc};

/// Declared identity of a configuration user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub wnode: NodeId,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Unknown,
    Set,
    Show,
    Del,
    Edit,
    Cmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcMode {
    Tab,
    Enter,
}

/// Handler invoked when committed changes touch its nodes.
pub trait ChangeHandler: Send + Sync {
    fn run(&self, tree: &mut ConfigTree, changed: &[NodeId]);
}

/// One flattened change, the unit of notification and replication apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatChange {
    pub path: String,
    pub value: String,
    pub kind: NodeKind,
    pub state: NodeState,
}

/// Remote user subscribed to a notification path.
#[derive(Clone)]
pub struct NtfUser {
    pub user_type: String,
    pub user_id: String,
    pub client: Weak<gdt_runtime::Client>,
}

/// Path subscription with its pending per-commit change batch.
pub struct Notification {
    pub path: String,
    pub users: Vec<NtfUser>,
    pub pending: Vec<FlatChange>,
    pub ready: bool,
}

/// Auto-complete outcome.
#[derive(Debug, Default)]
pub struct AcResult {
    pub mode: ConfigMode,
    pub result: Vec<NodeId>,
    pub result_size: i32,
    pub last_found: Option<NodeId>,
    pub errors: Vec<String>,
    /// Transient nodes (TAB template instances, help entries) the caller
    /// purges with [`Config::purge_tmp_nodes`] once the response is out.
    pub tmp_nodes: Vec<NodeId>,
}

impl Default for ConfigMode {
    fn default() -> Self {
        ConfigMode::Unknown
    }
}

pub struct Config {
    pub tree: ConfigTree,
    cmd_root: NodeId,
    patterns: Vec<CfgPattern>,
    handlers: Vec<Arc<dyn ChangeHandler>>,
    users: HashMap<UserId, UserInfo>,
    transaction: Option<UserId>,
    pub notifications: Vec<Notification>,
    commit_log_dir: PathBuf,
}

impl Config {
    pub fn new(commit_log_dir: &Path) -> Self {
        let mut tree = ConfigTree::new();
        let cmd_root = build_cmd_tree(&mut tree);
        Config {
            tree,
            cmd_root,
            patterns: Vec::new(),
            handlers: Vec::new(),
            users: HashMap::new(),
            transaction: None,
            notifications: Vec::new(),
            commit_log_dir: commit_log_dir.to_owned(),
        }
    }

    pub fn commit_log_dir(&self) -> &Path {
        &self.commit_log_dir
    }

    pub fn cmd_root(&self) -> NodeId {
        self.cmd_root
    }

    // -- patterns -----------------------------------------------------------

    pub fn add_pattern(&mut self, pattern: CfgPattern) {
        self.patterns.push(pattern);
    }

    pub fn get_pattern(&self, type_tag: &str) -> Option<&CfgPattern> {
        self.patterns.iter().find(|p| p.name == type_tag)
    }

    // -- on-change handlers -------------------------------------------------

    pub fn register_handler(&mut self, handler: Arc<dyn ChangeHandler>) -> HandlerId {
        self.handlers.push(handler);
        self.handlers.len() - 1
    }

    pub fn set_on_change(&mut self, node: NodeId, handler: HandlerId, recursive: bool) {
        self.tree.node_mut(node).on_change = Some(handler);
        if recursive {
            let children = self.tree.node(node).children.clone();
            for c in children {
                self.set_on_change(c, handler, true);
            }
        }
    }

    // -- per-user working nodes ---------------------------------------------

    /// Touch a user entry, creating it at the tree root if unknown.
    pub fn update_user(&mut self, user: &UserId) {
        let root = self.tree.root();
        self.users
            .entry(user.clone())
            .and_modify(|u| u.timestamp = SystemTime::now())
            .or_insert(UserInfo { wnode: root, timestamp: SystemTime::now() });
    }

    pub fn set_user_wnode(&mut self, user: &UserId, wnode: NodeId) {
        self.users.insert(user.clone(), UserInfo { wnode, timestamp: SystemTime::now() });
    }

    pub fn user_wnode(&self, user: &UserId) -> Option<NodeId> {
        self.users.get(user).map(|u| u.wnode)
    }

    pub fn remove_user(&mut self, user: &UserId) {
        self.users.remove(user);
    }

    pub fn reset_all_wnodes(&mut self) {
        let root = self.tree.root();
        for u in self.users.values_mut() {
            u.wnode = root;
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // -- transaction --------------------------------------------------------

    pub fn start_transaction(&mut self, owner: &UserId) {
        self.transaction = Some(owner.clone());
    }

    pub fn end_transaction(&mut self) {
        self.transaction = None;
    }

    pub fn transaction_started(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn transaction_owner(&self) -> Option<&UserId> {
        self.transaction.as_ref()
    }

    /// True when `user` must see the tree through the operation-
    /// restricted pretend view.
    pub fn pretend_for(&self, user: &UserId) -> bool {
        self.transaction_started() && self.transaction.as_ref() != Some(user)
    }

    // -- notifications ------------------------------------------------------

    pub fn subscribe(&mut self, path: &str, user: NtfUser) {
        match self.notifications.iter_mut().find(|n| n.path == path) {
            Some(n) => n.users.push(user),
            None => self.notifications.push(Notification {
                path: path.to_owned(),
                users: vec![user],
                pending: Vec::new(),
                ready: false,
            }),
        }
    }

    /// Flatten the pending change set and assign each changed node to
    /// every subscription watching one of its ancestors. Returns the
    /// indices of subscriptions that became ready.
    pub fn prepare_notifications(&mut self) -> Vec<usize> {
        let root = self.tree.root();
        let changed: Vec<NodeId> = self
            .tree
            .flatten(root)
            .into_iter()
            .filter(|&id| self.tree.node(id).state != NodeState::Ready)
            .collect();

        let mut touched = Vec::new();
        for id in changed {
            let full_path = self.tree.full_path(id);
            let flat = FlatChange {
                path: full_path,
                value: self.tree.node(id).new_value.clone(),
                kind: self.tree.node(id).kind,
                state: self.tree.node(id).state,
            };
            // walk upward collecting watching subscriptions
            let mut cursor = Some(id);
            while let Some(cur) = cursor {
                let cur_path = self.tree.full_path(cur);
                if let Some(idx) = self.notifications.iter().position(|n| n.path == cur_path) {
                    self.notifications[idx].pending.push(flat.clone());
                    self.notifications[idx].ready = true;
                    if !touched.contains(&idx) {
                        touched.push(idx);
                    }
                }
                cursor = self.tree.node(cur).parent;
            }
        }
        touched
    }

    // -- tree state machine: commit / discard / sort / merge ----------------

    /// Apply (or with `pretend` just count) MODIFIED/DELETED markings.
    pub fn commit_tree(&mut self, from: NodeId, pretend: bool) -> usize {
        let mut res = 0usize;
        let children = self.tree.node(from).children.clone();
        for c in children {
            if !self.tree.exists(c) || self.tree.node(c).is_template {
                continue;
            }
            if !pretend {
                self.tree.node_mut(c).is_new = false;
            }
            match self.tree.node(c).state {
                NodeState::Ready => {
                    res += self.commit_tree(c, pretend);
                }
                NodeState::Modified => {
                    res += 1;
                    if !pretend {
                        let n = self.tree.node_mut(c);
                        n.state = NodeState::Ready;
                        if n.kind == NodeKind::Item {
                            n.value = n.new_value.clone();
                        }
                    }
                    res += self.commit_tree(c, pretend);
                }
                NodeState::Deleted => {
                    res += 1;
                    if !pretend {
                        match self.tree.node(c).kind {
                            NodeKind::Block => {
                                self.tree.remove_subtree(c);
                            }
                            NodeKind::Item => {
                                let n = self.tree.node_mut(c);
                                n.state = NodeState::Ready;
                                n.value.clear();
                                n.new_value.clear();
                            }
                            _ => {}
                        }
                    }
                }
                NodeState::Unknown => {}
            }
        }
        res
    }

    /// Revert pending changes: drop new blocks, restore MODIFIED/DELETED
    /// to READY with `new_value` reset from `value`.
    pub fn discard(&mut self, from: NodeId) {
        let children = self.tree.node(from).children.clone();
        for c in children {
            if !self.tree.exists(c) || self.tree.node(c).is_template {
                continue;
            }
            if self.tree.node(c).is_new {
                if self.tree.node(c).kind == NodeKind::Block {
                    self.tree.remove_subtree(c);
                }
                continue;
            }
            match self.tree.node(c).state {
                NodeState::Modified | NodeState::Deleted => {
                    let n = self.tree.node_mut(c);
                    n.state = NodeState::Ready;
                    if n.kind == NodeKind::Item {
                        n.new_value = n.value.clone();
                    }
                    self.discard(c);
                }
                NodeState::Ready => self.discard(c),
                NodeState::Unknown => {}
            }
        }
    }

    /// Order template-based siblings by their sort-node integer value;
    /// ties and missing sort nodes fall back to name order. Blocks with
    /// the empty flag are never reordered.
    pub fn sort_tree(&mut self, from: NodeId) {
        let children = self.tree.node(from).children.clone();
        for c in children {
            if !self.tree.exists(c) {
                continue;
            }
            let n = self.tree.node(c);
            if n.kind != NodeKind::Block || n.is_template {
                continue;
            }
            if n.sort_node.is_some() && !n.is_empty {
                self.sort_template_siblings(from);
            }
            self.sort_tree(c);
        }
    }

    fn sort_template_siblings(&mut self, parent: NodeId) {
        let mut siblings = self.tree.node(parent).children.clone();
        if siblings.len() <= 2 {
            return;
        }
        // index 0 is the template
        let tail = siblings.split_off(1);
        let mut keyed: Vec<(NodeId, i64, String)> = tail
            .into_iter()
            .map(|id| {
                let n = self.tree.node(id);
                let key = n
                    .sort_node
                    .as_ref()
                    .and_then(|sn| self.tree.lookup(id, sn))
                    .map(|s| self.tree.int_value(s, None, i64::MAX))
                    .unwrap_or(i64::MAX);
                (id, key, n.name.clone())
            })
            .collect();
        keyed.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)));
        siblings.extend(keyed.into_iter().map(|(id, _, _)| id));
        self.tree.node_mut(parent).children = siblings;
    }

    /// Mark everything in scope DELETED ahead of a full replacement
    /// merge; surviving paths are revived as MODIFIED by the merge.
    pub fn replace_prepare(&mut self, from: NodeId) {
        let children = self.tree.node(from).children.clone();
        for c in children {
            if !self.tree.exists(c) {
                continue;
            }
            if self.tree.node(c).is_template {
                // template siblings are the instances
                let siblings = self.tree.node(from).children.clone();
                for s in siblings.into_iter().skip(1) {
                    self.tree.node_mut(s).state = NodeState::Deleted;
                    self.replace_prepare(s);
                }
                continue;
            }
            match self.tree.node(c).kind {
                NodeKind::Item => self.tree.node_mut(c).state = NodeState::Deleted,
                NodeKind::Block => self.replace_prepare(c),
                _ => {}
            }
        }
    }

    /// Clear values and template instances, returning the definition to
    /// its empty shape.
    pub fn reset_tree(&mut self, from: NodeId) {
        let children = self.tree.node(from).children.clone();
        for c in children {
            if !self.tree.exists(c) {
                continue;
            }
            if self.tree.node(c).is_template {
                let siblings = self.tree.node(from).children.clone();
                for s in siblings.into_iter().skip(1) {
                    self.tree.remove_subtree(s);
                }
                continue;
            }
            {
                let n = self.tree.node_mut(c);
                n.value.clear();
                n.new_value.clear();
                n.state = NodeState::Ready;
            }
            self.reset_tree(c);
        }
    }

    /// Check parsed contents against the definition without mutating it.
    pub fn validate_contents(&self, def: NodeId, contents: &ContentNode) -> bool {
        for content in &contents.children {
            let mut found = false;
            let def_children = &self.tree.node(def).children;
            for &dc in def_children {
                let dn = self.tree.node(dc);
                if !dn.is_template {
                    if dn.name != content.name {
                        continue;
                    }
                    if content.kind == NodeKind::Item && !dn.type_tag.is_empty() {
                        let mut v = content.value.clone();
                        let tag = dn.type_tag.clone();
                        if self.get_pattern(&tag).is_some()
                            && !pattern_valid(&self.tree, &self.patterns, &mut v, &tag, Some(dc))
                        {
                            return false;
                        }
                    }
                    if !self.validate_contents(dc, content) {
                        return false;
                    }
                    found = true;
                    break;
                }
                // template: any block may instantiate it
                if content.kind != NodeKind::Block {
                    return false;
                }
                if !self.validate_contents(dc, content) {
                    return false;
                }
                found = true;
                break;
            }
            if !found {
                return false;
            }
        }
        true
    }

    /// Merge parsed contents into the definition.
    ///
    /// Matched items take the content value as `new_value` (and with
    /// `set_node_state` become MODIFIED); template instances are created
    /// as needed; new template siblings are sorted in unless flagged
    /// empty.
    pub fn merge(
        &mut self,
        def: NodeId,
        contents: &ContentNode,
        set_node_state: bool,
    ) -> Result<(), String> {
        for content in &contents.children {
            let mut found = false;
            let def_children = self.tree.node(def).children.clone();
            for dc in def_children {
                if !self.tree.node(dc).is_template {
                    if self.tree.node(dc).name != content.name {
                        continue;
                    }
                    if content.kind == NodeKind::Item {
                        let tag = self.tree.node(dc).type_tag.clone();
                        if self.get_pattern(&tag).is_some() {
                            let mut v = content.value.clone();
                            if !pattern_valid(&self.tree, &self.patterns, &mut v, &tag, Some(dc)) {
                                return Err(format!(
                                    "invalid \"{}\" value \"{}\" for item \"{}\"",
                                    tag, content.value, content.name
                                ));
                            }
                        }
                        let n = self.tree.node_mut(dc);
                        if !set_node_state {
                            n.value = content.value.clone();
                        }
                        n.new_value = content.value.clone();
                        if set_node_state {
                            n.state = NodeState::Modified;
                        }
                    }
                    self.merge(dc, content, set_node_state)?;
                    found = true;
                    break;
                }

                // template definition
                if content.kind != NodeKind::Block {
                    return Err(format!("\"{}\" must be a block node", content.name));
                }
                let tag = self.tree.node(dc).type_tag.clone();
                if self.get_pattern(&tag).is_some() {
                    let mut v = content.name.clone();
                    if !pattern_valid(&self.tree, &self.patterns, &mut v, &tag, Some(dc)) {
                        return Err(format!(
                            "invalid \"{}\" name \"{}\"",
                            tag, content.name
                        ));
                    }
                }

                // revive an existing instance when replacing
                let mut instance = None;
                if set_node_state {
                    if let Some(existing) = self.tree.child_by_name(def, &content.name) {
                        let n = self.tree.node_mut(existing);
                        n.state = NodeState::Modified;
                        n.is_new = false;
                        instance = Some(existing);
                    }
                }
                let created = instance.is_none();
                let inst = match instance {
                    Some(i) => i,
                    None => {
                        let mut node = Node::new(&content.name, NodeKind::Block);
                        node.sort_node = self.tree.node(dc).sort_node.clone();
                        node.is_empty = self.tree.node(dc).is_empty;
                        node.on_change = self.tree.node(dc).on_change;
                        if set_node_state {
                            node.state = NodeState::Modified;
                            node.is_new = true;
                        }
                        let id = self.tree.add_child(def, node);
                        self.tree.copy_nodes(dc, id, None);
                        id
                    }
                };
                self.merge(inst, content, set_node_state)?;
                if created && !self.tree.node(inst).is_empty {
                    self.sort_template_siblings(def);
                }
                found = true;
                break;
            }
            if !found {
                return Err(format!("unknown item \"{}\"", content.name));
            }
        }
        Ok(())
    }

    // -- change snapshots and handler dispatch ------------------------------

    /// Flattened pending changes of the whole tree.
    pub fn flat_changes(&self) -> Vec<FlatChange> {
        let root = self.tree.root();
        self.tree
            .flatten(root)
            .into_iter()
            .filter(|&id| self.tree.node(id).state != NodeState::Ready)
            .map(|id| FlatChange {
                path: self.tree.full_path(id),
                value: self.tree.node(id).new_value.clone(),
                kind: self.tree.node(id).kind,
                state: self.tree.node(id).state,
            })
            .collect()
    }

    /// Run on-change handlers for the given nodes, grouped by handler
    /// identity; each node runs in at most one pass.
    fn dispatch_handlers(&mut self, ids: &[NodeId]) {
        let mut groups: HashMap<HandlerId, Vec<NodeId>> = HashMap::new();
        for &id in ids {
            if !self.tree.exists(id) || self.tree.node(id).handler_executed {
                continue;
            }
            if let Some(h) = self.tree.node(id).on_change {
                groups.entry(h).or_default().push(id);
            }
        }
        for (hid, nodes) in groups {
            if nodes.is_empty() {
                continue;
            }
            let handler = self.handlers[hid].clone();
            handler.run(&mut self.tree, &nodes);
            for id in nodes {
                if self.tree.exists(id) {
                    self.tree.node_mut(id).handler_executed = true;
                }
            }
        }
    }

    /// Commit with two-pass on-change dispatch: existing MODIFIED and
    /// DELETED nodes first, freshly added nodes after the tree settles.
    pub fn commit_with_handlers(&mut self) -> usize {
        let root = self.tree.root();
        let flat: Vec<NodeId> = self
            .tree
            .flatten(root)
            .into_iter()
            .filter(|&id| self.tree.node(id).state != NodeState::Ready)
            .collect();
        let (added, changed): (Vec<NodeId>, Vec<NodeId>) =
            flat.iter().partition(|&&id| self.tree.node(id).is_new);

        self.dispatch_handlers(&changed);
        let res = self.commit_tree(root, false);
        self.dispatch_handlers(&added);

        for id in flat {
            if self.tree.exists(id) {
                let n = self.tree.node_mut(id);
                n.handler_executed = false;
                n.is_new = false;
            }
        }
        res
    }

    /// Apply a flattened change batch received from a peer (the
    /// receiving end of a configuration update notification).
    pub fn apply_changes(&mut self, changes: &[FlatChange]) {
        let root = self.tree.root();

        // first pass: handlers for nodes that already exist (MOD/DEL)
        let mut existing = Vec::new();
        for ch in changes {
            if let Some(id) = self.tree.lookup(root, &ch.path) {
                let n = self.tree.node_mut(id);
                n.new_value = ch.value.clone();
                n.state = ch.state;
                if ch.state == NodeState::Deleted && n.kind == NodeKind::Item {
                    n.value.clear();
                } else if n.kind == NodeKind::Item {
                    n.value = ch.value.clone();
                }
                existing.push(id);
            }
        }
        self.dispatch_handlers(&existing);

        // apply: create, delete, update
        let mut created = Vec::new();
        for ch in changes {
            let Some(id) = self.tree.lookup_create(root, &ch.path, ch.kind, true) else {
                continue;
            };
            match self.tree.node(id).kind {
                NodeKind::Block => {
                    if ch.state == NodeState::Deleted {
                        self.tree.remove_subtree(id);
                        continue;
                    }
                }
                NodeKind::Item => {
                    let n = self.tree.node_mut(id);
                    if ch.state == NodeState::Deleted {
                        n.value.clear();
                        n.new_value.clear();
                    } else {
                        n.value = ch.value.clone();
                        n.new_value = ch.value.clone();
                    }
                }
                _ => {}
            }
            if self.tree.node(id).is_new {
                created.push(id);
            }
        }

        // second pass: handlers for additions
        self.dispatch_handlers(&created);

        for ch in changes {
            if let Some(id) = self.tree.lookup(root, &ch.path) {
                let n = self.tree.node_mut(id);
                n.handler_executed = false;
                n.is_new = false;
                n.state = NodeState::Ready;
            }
        }
    }

    // -- display helpers ----------------------------------------------------

    /// Definition listing for the `commands` command.
    pub fn command_lines(&self, from: NodeId) -> Vec<String> {
        let mut out = Vec::new();
        self.command_lines_into(from, 0, &mut out);
        out
    }

    fn command_lines_into(&self, id: NodeId, depth: usize, out: &mut Vec<String>) {
        for &c in &self.tree.node(id).children {
            let n = self.tree.node(c);
            if n.is_template {
                continue;
            }
            let label = match n.kind {
                NodeKind::Item => format!("{} <{}>", n.name, n.type_tag),
                _ => n.name.clone(),
            };
            if n.desc.is_empty() {
                out.push(format!("{}{}", "  ".repeat(depth), label));
            } else {
                out.push(format!("{}{} - {}", "  ".repeat(depth), label, n.desc));
            }
            self.command_lines_into(c, depth + 1, out);
        }
    }

    // -- auto-complete ------------------------------------------------------

    /// Remove transient auto-complete nodes after the response is sent.
    pub fn purge_tmp_nodes(&mut self, tmp: &[NodeId]) {
        for &id in tmp {
            if self.tree.exists(id) {
                self.tree.remove_subtree(id);
            }
        }
    }

    fn search_definition(&self, def: NodeId, token: &str, result: &mut Vec<NodeId>) {
        for &c in &self.tree.node(def).children {
            let n = self.tree.node(c);
            if n.is_template {
                continue;
            }
            if n.name.starts_with(token) {
                result.push(c);
            }
        }
    }

    /// Context-help entries (`?`) for an item value.
    fn special_ac(&mut self, node: NodeId, result: &mut Vec<NodeId>, tmp: &mut Vec<NodeId>) {
        if self.tree.node(node).special_ac == SpecialAc::RollbackRevision {
            for entry in rollback::revision_listing(&self.commit_log_dir) {
                let mut n = Node::new(&entry.label, NodeKind::Param);
                n.desc = entry.desc;
                let id = self.tree.add_detached(None, n);
                result.push(id);
                tmp.push(id);
            }
            return;
        }

        let tag = self.tree.node(node).type_tag.clone();
        let ptrn = self.get_pattern(&tag).cloned();
        if let Some(ref_path) = ptrn.as_ref().and_then(|p| pmcfg_path(&p.pattern)) {
            if let Some(reference) = resolve_reference(&self.tree, ref_path, Some(node)) {
                let children = self.tree.node(reference).children.clone();
                for c in children {
                    if self.tree.node(c).is_template {
                        continue;
                    }
                    let name = format!("<{}>", self.tree.node(c).name);
                    let id = self.tree.add_detached(None, Node::new(&name, NodeKind::Param));
                    result.push(id);
                    tmp.push(id);
                }
                return;
            }
        }

        let mut label = format!("<Please enter \"{}\" value", tag);
        if let Some(p) = &ptrn {
            if !p.desc.is_empty() {
                label.push_str(&format!(" identified by \"{}\"", p.desc));
            }
        }
        label.push('>');
        let id = self.tree.add_detached(None, Node::new(&label, NodeKind::Param));
        result.push(id);
        tmp.push(id);
    }

    /// Filesystem completion for absolute path values (TAB only).
    fn search_fsys(&mut self, token: &mut String, result: &mut Vec<NodeId>, tmp: &mut Vec<NodeId>) {
        let (dir, prefix) = match token.rfind('/') {
            Some(idx) => (token[..=idx].to_owned(), token[idx + 1..].to_owned()),
            None => return,
        };
        let entries: Vec<String> = match std::fs::read_dir(&dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter(|n| n.starts_with(&prefix))
                .collect(),
            Err(_) => return,
        };
        if entries.len() == 1 {
            let full = format!("{}{}", dir, entries[0]);
            let is_dir = std::fs::metadata(&full).map(|m| m.is_dir()).unwrap_or(false);
            *token = if is_dir { format!("{}/", full) } else { full };
            let id = self.tree.add_detached(None, Node::new(token, NodeKind::Param));
            result.push(id);
            tmp.push(id);
            return;
        }
        for name in &entries {
            let id = self.tree.add_detached(None, Node::new(name, NodeKind::Param));
            result.push(id);
            tmp.push(id);
        }
        if !entries.is_empty() {
            let lcp = longest_common_prefix(&entries);
            *token = format!("{}{}", dir, lcp);
        }
    }

    /// Walk the command and definition trees matching `line` tokens.
    ///
    /// TAB suggests (transient results only); ENTER applies: values are
    /// validated and staged, template instances are attached, DELETED
    /// nodes touched by a SET are revived. Tokens are rewritten in place
    /// with completions.
    pub fn auto_complete(
        &mut self,
        ac_mode: AcMode,
        wnode: NodeId,
        line: &mut Vec<String>,
        pretend: bool,
    ) -> AcResult {
        let mut ac = AcResult::default();
        let mut def = self.cmd_root;
        let mut param_found = false;
        let mut special = false;

        if line.is_empty() {
            self.search_definition(def, "", &mut ac.result);
            return ac;
        }

        let line_size = line.len();
        for i in 0..line_size {
            let mut tok = line[i].clone();

            if let Some(lf) = ac.last_found {
                if (ac.mode == ConfigMode::Set || ac.mode == ConfigMode::Cmd)
                    && matches!(self.tree.node(lf).kind, NodeKind::Item | NodeKind::Param)
                {
                    // item value token
                    special = false;
                    ac.result.clear();

                    if tok.starts_with('/') && ac_mode == AcMode::Tab {
                        special = true;
                        self.search_fsys(&mut tok, &mut ac.result, &mut ac.tmp_nodes);
                        ac.result_size -= 1;
                        line[i] = tok.clone();
                        if ac.result.len() == 1 {
                            special = false;
                            ac.result_size += 1;
                        }
                    } else if tok.starts_with('?') && ac_mode == AcMode::Tab {
                        special = true;
                        ac.result_size -= 1;
                        line[i] = String::new();
                        self.special_ac(lf, &mut ac.result, &mut ac.tmp_nodes);
                    }

                    ac.result_size += 1;
                    param_found = true;

                    let tag = self.tree.node(lf).type_tag.clone();
                    if self.get_pattern(&tag).is_some() {
                        let mut v = tok.clone();
                        if pattern_valid(&self.tree, &self.patterns, &mut v, &tag, Some(lf)) {
                            if ac_mode == AcMode::Enter && !pretend {
                                let n = self.tree.node_mut(lf);
                                n.new_value = v;
                                if ac.mode != ConfigMode::Cmd {
                                    n.state = NodeState::Modified;
                                }
                            }
                        } else if !special {
                            ac.errors.push(format!(
                                "Item \"{}\" contains invalid \"{}\" value \"{}\"!",
                                self.tree.node(lf).name,
                                tag,
                                tok
                            ));
                        }
                    } else if ac_mode == AcMode::Enter {
                        let mut v = tok.clone();
                        if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
                            v.remove(0);
                            v.pop();
                        }
                        if !pretend {
                            let n = self.tree.node_mut(lf);
                            n.new_value = v;
                            if ac.mode != ConfigMode::Cmd {
                                n.state = NodeState::Modified;
                            }
                        }
                    }
                } else if self.tree.node(lf).kind == NodeKind::Item {
                    ac.result.clear();
                    ac.errors.push("Cannot SET value in SHOW mode!".to_owned());
                    return ac;
                }
            }

            if !param_found {
                ac.result.clear();
                if !self.tree.node(def).children.is_empty() {
                    if let Some(tmpl) = self.tree.template_child(def) {
                        self.search_definition(def, &tok, &mut ac.result);
                        if (tok.starts_with('!') || ac.result.is_empty())
                            && ac.mode == ConfigMode::Set
                        {
                            if tok.starts_with('!') {
                                // name conflict check with auto-complete off
                                let plain = tok.trim_start_matches('!');
                                if self.tree.child_by_name(def, plain).is_some() {
                                    ac.result.clear();
                                    ac.errors
                                        .push(format!("Item \"{}\" already exists!", plain));
                                    return ac;
                                }
                            }
                            if tok.starts_with('?') && ac_mode == AcMode::Tab {
                                ac.result_size -= 1;
                                line[i] = String::new();
                                self.special_ac(tmpl, &mut ac.result, &mut ac.tmp_nodes);
                                ac.result_size += 1;
                                return ac;
                            }

                            let tag = self.tree.node(tmpl).type_tag.clone();
                            let disable_ac = tok.starts_with('!');
                            let mut name = if disable_ac { tok[1..].to_owned() } else { tok.clone() };
                            let has_pattern = self.get_pattern(&tag).is_some();
                            let valid = !has_pattern
                                || pattern_valid(&self.tree, &self.patterns, &mut name, &tag, Some(tmpl));
                            if valid {
                                let mut node = Node::new(&name, NodeKind::Block);
                                node.state = NodeState::Modified;
                                node.is_new = true;
                                node.is_empty = self.tree.node(tmpl).is_empty;
                                node.sort_node = self.tree.node(tmpl).sort_node.clone();
                                node.on_change = self.tree.node(tmpl).on_change;
                                let id = if ac_mode == AcMode::Enter && !pretend {
                                    self.tree.add_child(def, node)
                                } else {
                                    let id = self.tree.add_detached(Some(def), node);
                                    ac.tmp_nodes.push(id);
                                    id
                                };
                                self.tree.copy_nodes(tmpl, id, Some(NodeState::Modified));
                                if disable_ac {
                                    ac.result.clear();
                                }
                                ac.result.push(id);
                            } else {
                                ac.errors.push(format!(
                                    "Template \"{}\" contains invalid \"{}\" name \"{}\"!",
                                    self.tree.node(tmpl).name,
                                    tag,
                                    tok
                                ));
                                return ac;
                            }
                        }
                    } else {
                        self.search_definition(def, &tok, &mut ac.result);
                    }
                }
            }

            if ac.result.len() == 1 && !param_found {
                ac.result_size += 1;
                let hit = ac.result[0];
                ac.last_found = Some(hit);
                line[i] = self.tree.node(hit).name.clone();

                // mode detection, once
                if ac.mode == ConfigMode::Unknown {
                    let kind = self.tree.node(hit).kind;
                    if kind == NodeKind::Cmd || kind == NodeKind::Block {
                        match self.tree.node(hit).name.as_str() {
                            "set" => {
                                ac.mode = ConfigMode::Set;
                                def = wnode;
                                ac.result = vec![def];
                            }
                            "show" => {
                                ac.mode = ConfigMode::Show;
                                def = wnode;
                                ac.result = vec![def];
                            }
                            "delete" => {
                                ac.mode = ConfigMode::Del;
                                def = wnode;
                                ac.result = vec![def];
                            }
                            "edit" => {
                                ac.mode = ConfigMode::Edit;
                                def = wnode;
                                ac.result = vec![def];
                            }
                            _ => {
                                if kind == NodeKind::Cmd {
                                    ac.mode = ConfigMode::Cmd;
                                }
                            }
                        }
                    }
                    if ac.mode == ConfigMode::Cmd && self.tree.node(hit).children.is_empty() {
                        return ac;
                    }
                }

                // descend into blocks and commands
                let cur = ac.result[0];
                let kind = self.tree.node(cur).kind;
                if kind == NodeKind::Block || kind == NodeKind::Cmd {
                    def = cur;
                    ac.last_found = Some(def);
                    ac.result.clear();
                    if ac_mode == AcMode::Enter
                        && ac.mode == ConfigMode::Set
                        && i == line_size - 1
                        && self.tree.node(def).state == NodeState::Deleted
                        && !pretend
                    {
                        self.tree.node_mut(def).state = NodeState::Modified;
                    }
                    self.search_definition(def, "", &mut ac.result);
                    if kind == NodeKind::Cmd && !pretend {
                        let children = self.tree.node(def).children.clone();
                        for c in children {
                            if self.tree.node(c).kind == NodeKind::Param {
                                self.tree.node_mut(c).new_value.clear();
                            }
                        }
                    }
                }
            } else {
                ac.last_found = None;
                if param_found {
                    param_found = false;
                    if !special {
                        ac.result.clear();
                        self.search_definition(def, "", &mut ac.result);
                    }
                } else {
                    if !ac.result.is_empty() {
                        let names: Vec<String> = ac
                            .result
                            .iter()
                            .map(|&r| self.tree.node(r).name.clone())
                            .collect();
                        let max_match = longest_common_prefix(&names).len();

                        ac.last_found = ac
                            .result
                            .iter()
                            .copied()
                            .find(|&r| self.tree.node(r).name.len() == max_match);

                        if line[i].len() == max_match && ac.last_found.is_some() {
                            ac.result_size += 1;
                            let lf = ac.last_found.unwrap();
                            ac.result.clear();
                            match self.tree.node(lf).kind {
                                NodeKind::Item => ac.result.push(lf),
                                NodeKind::Block => {
                                    if ac_mode == AcMode::Enter
                                        && ac.mode == ConfigMode::Set
                                        && i == line_size - 1
                                        && self.tree.node(lf).state == NodeState::Deleted
                                        && !pretend
                                    {
                                        self.tree.node_mut(lf).state = NodeState::Modified;
                                    }
                                    def = lf;
                                    self.search_definition(def, "", &mut ac.result);
                                }
                                _ => {}
                            }
                            line[i] = self.tree.node(lf).name.clone();
                        } else {
                            line[i] = names[0][..max_match].to_owned();
                        }
                    } else {
                        ac.errors
                            .push(format!("Unknown item or command \"{}\"!", line[i]));
                    }
                    if i != line_size - 1 && ac.last_found.is_none() {
                        return ac;
                    }
                }
            }
        }

        debug!(mode = ?ac.mode, matches = ac.result.len(), errors = ac.errors.len(), "auto-complete");
        ac
    }
}

fn longest_common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let mut len = first.len();
    for n in &names[1..] {
        len = len.min(n.len());
        let common = first
            .bytes()
            .take(len)
            .zip(n.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        len = len.min(common);
    }
    first[..len].to_owned()
}

fn build_cmd_tree(tree: &mut ConfigTree) -> NodeId {
    let cmd_root = tree.add_root("ROOT_CMD");

    let cmd = |tree: &mut ConfigTree, name: &str, desc: &str| -> NodeId {
        let mut n = Node::new(name, NodeKind::Cmd);
        n.desc = desc.to_owned();
        tree.add_child(cmd_root, n)
    };

    cmd(tree, "set", "Creates a new node or modifies a value in an existing node");
    cmd(tree, "show", "Displays configuration node");
    cmd(tree, "edit", "Navigates to a subnode in the configuration tree for editing");
    cmd(tree, "delete", "Deletes a configuration node");
    cmd(tree, "top", "Exits to the top level of configuration mode");
    cmd(tree, "up", "Navigates up one level in the configuration tree");
    cmd(tree, "configuration", "Displays configuration file contents");
    cmd(tree, "commands", "Displays configuration file commands");

    let commit = cmd(tree, "commit", "Applies any uncommitted configuration changes");
    let mut desc_param = Node::new("description", NodeKind::Param);
    desc_param.desc = "Meaningful comment describing current commit".to_owned();
    tree.add_child(commit, desc_param);

    cmd(tree, "discard", "Discard all configuration changes");

    let rb = cmd(tree, "rollback", "Load previous configuration revision");
    let mut rev = Node::new("revision", NodeKind::Param);
    rev.desc = "Revision number for rollback operation".to_owned();
    rev.special_ac = SpecialAc::RollbackRevision;
    tree.add_child(rb, rev);

    let load = cmd(tree, "load", "Loads a saved configuration");
    let mut fname = Node::new("file-name", NodeKind::Param);
    fname.desc = "The name of the configuration file".to_owned();
    tree.add_child(load, fname);

    let save = cmd(tree, "save", "Saves the running configuration to a file");
    let mut fname = Node::new("file-name", NodeKind::Param);
    fname.desc = "The name of the file where the information is to be saved".to_owned();
    tree.add_child(save, fname);

    cmd_root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text;

    fn engine() -> Config {
        let mut cfg = Config::new(Path::new("./commit-log"));
        let root = cfg.tree.root();
        let system = cfg.tree.build_block(root, "system", "System settings");
        cfg.tree.build_item(system, "hostname", "Host name", "STRING");
        cfg.tree.build_item(system, "location", "Location", "STRING");
        let ifaces = cfg.tree.build_block(root, "interfaces", "Network interfaces");
        let tmpl = cfg.tree.build_template(ifaces, "IFACE", "STRING");
        cfg.tree.build_item(tmpl, "address", "Address", "STRING");
        cfg.add_pattern(CfgPattern::new("STRING", r#"[^\s]+"#, "free-form value"));
        cfg
    }

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn enter_set_marks_item_modified() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system hostname node-1");
        let ac = cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        assert_eq!(ac.mode, ConfigMode::Set);
        assert!(ac.errors.is_empty());

        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).new_value, "node-1");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Modified);
    }

    #[test]
    fn pretend_mode_stages_nothing() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system hostname node-1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, true);
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Ready);
        assert!(cfg.tree.node(hostname).new_value.is_empty());
    }

    #[test]
    fn tab_completes_unambiguous_prefix() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system host");
        let ac = cfg.auto_complete(AcMode::Tab, root, &mut line, false);
        assert_eq!(line[2], "hostname");
        assert!(ac.errors.is_empty());
    }

    #[test]
    fn ambiguous_token_reduces_to_common_prefix() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        // "system" and "interfaces" under ROOT share no prefix; make an
        // ambiguous pair deeper down
        let system = cfg.tree.lookup(root, "system").unwrap();
        cfg.tree.build_item(system, "locale", "Locale", "STRING");
        let mut line = tokens("set system loc");
        let ac = cfg.auto_complete(AcMode::Tab, root, &mut line, false);
        // "location" and "locale" share "loca"
        assert_eq!(line[2], "loca");
        assert!(ac.last_found.is_none());
        assert!(ac.errors.is_empty());
    }

    #[test]
    fn unknown_token_yields_error() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system nosuch x");
        let ac = cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        assert!(ac.errors.iter().any(|e| e.contains("Unknown item or command")));
    }

    #[test]
    fn enter_attaches_template_instance() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set interfaces eth0 address 10.0.0.1");
        let ac = cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        assert!(ac.errors.is_empty(), "{:?}", ac.errors);

        let eth0 = cfg.tree.lookup(root, "interfaces eth0").unwrap();
        assert!(cfg.tree.node(eth0).is_new);
        let addr = cfg.tree.lookup(root, "interfaces eth0 address").unwrap();
        assert_eq!(cfg.tree.node(addr).new_value, "10.0.0.1");
    }

    #[test]
    fn tab_template_instance_is_transient() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set interfaces eth0");
        let ac = cfg.auto_complete(AcMode::Tab, root, &mut line, false);
        assert!(!ac.tmp_nodes.is_empty());
        assert!(cfg.tree.lookup(root, "interfaces eth0").is_none());
        cfg.purge_tmp_nodes(&ac.tmp_nodes);
    }

    #[test]
    fn disabled_ac_rejects_duplicate_name() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set interfaces eth0 address 10.0.0.1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);

        let mut line = tokens("set interfaces !eth0");
        let ac = cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        assert!(ac.errors.iter().any(|e| e.contains("already exists")));
    }

    #[test]
    fn commit_applies_and_is_idempotent() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system hostname node-1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);

        assert!(cfg.commit_tree(root, true) > 0);
        cfg.commit_tree(root, false);
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "node-1");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Ready);

        // a second commit finds nothing to do
        assert_eq!(cfg.commit_tree(root, true), 0);
    }

    #[test]
    fn commit_removes_deleted_blocks_and_blanks_deleted_items() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set interfaces eth0 address 10.0.0.1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        cfg.commit_tree(root, false);

        let eth0 = cfg.tree.lookup(root, "interfaces eth0").unwrap();
        cfg.tree.node_mut(eth0).state = NodeState::Deleted;
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        cfg.tree.node_mut(hostname).value = "x".to_owned();
        cfg.tree.node_mut(hostname).state = NodeState::Deleted;

        cfg.commit_tree(root, false);
        assert!(cfg.tree.lookup(root, "interfaces eth0").is_none());
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Ready);
    }

    #[test]
    fn discard_reverts_pending_changes() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        cfg.tree.node_mut(hostname).value = "old".to_owned();
        cfg.tree.node_mut(hostname).new_value = "new".to_owned();
        cfg.tree.node_mut(hostname).state = NodeState::Modified;

        let mut line = tokens("set interfaces eth9 address 1.2.3.4");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);

        cfg.discard(root);
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).new_value, "old");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Ready);
        assert!(cfg.tree.lookup(root, "interfaces eth9").is_none());
    }

    #[test]
    fn merge_revives_matches_and_instantiates_templates() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let contents = text::parse(
            "system {\n\thostname \"node-9\"\n}\ninterfaces {\n\teth1 {\n\t\taddress \"10.9.9.9\"\n\t}\n}\n",
        )
        .unwrap();
        assert!(cfg.validate_contents(root, &contents));
        cfg.merge(root, &contents, true).unwrap();

        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).new_value, "node-9");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Modified);
        let addr = cfg.tree.lookup(root, "interfaces eth1 address").unwrap();
        assert_eq!(cfg.tree.node(addr).new_value, "10.9.9.9");
    }

    #[test]
    fn merge_rejects_undefined_items() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let contents = text::parse("bogus {\n\tx \"1\"\n}\n").unwrap();
        assert!(!cfg.validate_contents(root, &contents));
        assert!(cfg.merge(root, &contents, true).is_err());
    }

    #[test]
    fn replace_prepare_then_merge_replaces_scope() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let mut line = tokens("set system hostname node-1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        let mut line = tokens("set system location lab");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);
        cfg.commit_tree(root, false);

        cfg.replace_prepare(root);
        let contents = text::parse("system {\n\thostname \"node-2\"\n}\n").unwrap();
        cfg.merge(root, &contents, true).unwrap();
        cfg.commit_tree(root, false);

        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "node-2");
        // location was not in the new contents: deleted by the replace
        let location = cfg.tree.lookup(root, "system location").unwrap();
        assert_eq!(cfg.tree.node(location).value, "");
    }

    #[test]
    fn transaction_gates_other_users() {
        let mut cfg = engine();
        let u1 = UserId("u1".to_owned());
        let u2 = UserId("u2".to_owned());
        cfg.update_user(&u1);
        cfg.update_user(&u2);

        cfg.start_transaction(&u1);
        assert!(!cfg.pretend_for(&u1));
        assert!(cfg.pretend_for(&u2));
        cfg.end_transaction();
        assert!(!cfg.pretend_for(&u2));
    }

    #[test]
    fn notifications_collect_changes_under_watched_path() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        cfg.subscribe(
            "system",
            NtfUser {
                user_type: "cli".to_owned(),
                user_id: "u1".to_owned(),
                client: Weak::new(),
            },
        );
        let mut line = tokens("set system hostname node-1");
        cfg.auto_complete(AcMode::Enter, root, &mut line, false);

        let touched = cfg.prepare_notifications();
        assert_eq!(touched.len(), 1);
        let n = &cfg.notifications[touched[0]];
        assert!(n.ready);
        assert!(n.pending.iter().any(|c| c.path == "system hostname" && c.value == "node-1"));
    }

    #[test]
    fn apply_changes_runs_two_pass_handlers() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize);
        impl ChangeHandler for Counter {
            fn run(&self, _tree: &mut ConfigTree, changed: &[NodeId]) {
                self.0.fetch_add(changed.len(), Ordering::Relaxed);
            }
        }

        let mut cfg = engine();
        let root = cfg.tree.root();
        let handler = Arc::new(Counter(AtomicUsize::new(0)));
        let hid = cfg.register_handler(handler.clone());
        cfg.set_on_change(root, hid, true);

        let changes = vec![FlatChange {
            path: "system hostname".to_owned(),
            value: "node-7".to_owned(),
            kind: NodeKind::Item,
            state: NodeState::Modified,
        }];
        cfg.apply_changes(&changes);

        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "node-7");
        assert_eq!(cfg.tree.node(hostname).state, NodeState::Ready);
        assert_eq!(handler.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sort_orders_template_siblings_by_sort_node() {
        let mut cfg = engine();
        let root = cfg.tree.root();
        let ifaces = cfg.tree.lookup(root, "interfaces").unwrap();
        let tmpl = cfg.tree.template_child(ifaces).unwrap();
        cfg.tree.node_mut(tmpl).sort_node = Some("prio".to_owned());
        cfg.tree.build_item(tmpl, "prio", "Priority", "STRING");

        for (name, prio) in [("ethB", "2"), ("ethA", "3"), ("ethC", "1")] {
            let mut line = tokens(&format!("set interfaces {} prio {}", name, prio));
            let ac = cfg.auto_complete(AcMode::Enter, root, &mut line, false);
            assert!(ac.errors.is_empty(), "{:?}", ac.errors);
        }
        cfg.commit_tree(root, false);
        cfg.sort_tree(root);

        let ifaces = cfg.tree.lookup(root, "interfaces").unwrap();
        let order: Vec<String> = cfg.tree.node(ifaces).children[1..]
            .iter()
            .map(|&c| cfg.tree.node(c).name.clone())
            .collect();
        assert_eq!(order, ["ethC", "ethB", "ethA"]);
    }
}

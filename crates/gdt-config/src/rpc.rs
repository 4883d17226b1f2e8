//! GDT glue: maps config streams to engine operations and pushes
//! notifications and replication to peers.
//!
//! Inbound streams carry a config action (LOGIN, LOGOUT, AC, SET, GET,
//! REPLICATE) plus the caller's auth id. Responses stream back over
//! CONTINUE fragments: the first fragment carries the completed line,
//! CLI path and counts; follow-up fragments carry one item, output line
//! or error line each. The config mutex is held for the duration of the
//! engine operation; the response fragments stream from a snapshot.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use gdt_protocol::{params, Body, ConfigAction, ConfigMessage, GdtMessage};
use gdt_runtime::{Client, EventArgs, EventHandler, EventType, Session};

use crate::engine::{AcMode, Config, ConfigMode, FlatChange, NtfUser, UserId};
use crate::rollback;
use crate::text::{self, RenderView};
use crate::tree::{NodeKind, NodeState};

/// Shared glue state for one daemon.
pub struct ConfigRpc {
    config: Mutex<Config>,
    /// Running configuration file rewritten after each commit.
    running_cfg_path: Mutex<Option<PathBuf>>,
    /// Daemon ids receiving replication streams.
    cfg_daemons: Mutex<Vec<String>>,
    /// Peer daemon type carrying replication traffic.
    router_daemon_type: Mutex<String>,
}

impl ConfigRpc {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(ConfigRpc {
            config: Mutex::new(config),
            running_cfg_path: Mutex::new(None),
            cfg_daemons: Mutex::new(Vec::new()),
            router_daemon_type: Mutex::new("routingd".to_owned()),
        })
    }

    /// Engine access for definition building and assertions.
    pub fn config(&self) -> std::sync::MutexGuard<'_, Config> {
        self.config.lock().unwrap()
    }

    pub fn set_running_cfg_path(&self, path: PathBuf) {
        *self.running_cfg_path.lock().unwrap() = Some(path);
    }

    pub fn set_cfg_daemons(&self, daemons: Vec<String>) {
        *self.cfg_daemons.lock().unwrap() = daemons;
    }

    pub fn set_router_daemon_type(&self, ty: &str) {
        *self.router_daemon_type.lock().unwrap() = ty.to_owned();
    }

    /// Install the stream handler on a session (server side).
    pub fn attach(self: &Arc<Self>, session: &Arc<Session>) {
        session.set_callback(
            EventType::StreamNew,
            Arc::new(CfgStreamNew { rpc: Arc::clone(self) }),
        );
    }
}

// ---------------------------------------------------------------------------
// Response streaming
// ---------------------------------------------------------------------------

/// Streams queued fragments on successive CONTINUE acknowledgements.
struct StreamResponder {
    fragments: Mutex<VecDeque<ConfigMessage>>,
}

impl StreamResponder {
    fn new(fragments: VecDeque<ConfigMessage>) -> Arc<Self> {
        Arc::new(StreamResponder { fragments: Mutex::new(fragments) })
    }
}

impl EventHandler for StreamResponder {
    fn run(&self, args: &mut EventArgs<'_>) {
        let next = self.fragments.lock().unwrap().pop_front();
        let Some(stream) = &mut args.stream else { return };
        match next {
            Some(frag) => {
                stream.out_body = Some(Body::Config(frag));
                stream.continue_sequence();
                if let Some(ib) = &mut args.include_body {
                    **ib = true;
                }
            }
            None => stream.end_sequence(),
        }
    }
}

/// Outcome of an ENTER/AC/GET operation, flattened to wire fragments.
struct OpResponse {
    first: ConfigMessage,
    rest: VecDeque<ConfigMessage>,
}

fn result_message() -> ConfigMessage {
    ConfigMessage::new(ConfigAction::CfgResult)
}

// ---------------------------------------------------------------------------
// Inbound stream dispatch
// ---------------------------------------------------------------------------

struct CfgStreamNew {
    rpc: Arc<ConfigRpc>,
}

impl EventHandler for CfgStreamNew {
    fn run(&self, args: &mut EventArgs<'_>) {
        let Some(msg) = args.in_msg else { return };
        let Some(cfg_msg) = msg.config() else { return };
        let Some(client) = args.client.clone() else { return };

        let Some(auth_id) = cfg_msg.params.str_value(params::AUTH_ID).map(str::to_owned) else {
            if let Some(stream) = &mut args.stream {
                stream.end_sequence();
            }
            return;
        };
        let user = UserId(auth_id);
        let action = cfg_msg.action;
        debug!(action = ?action, user = %user.0, "config stream");

        match action {
            ConfigAction::UserLogin => {
                let mut cfg = self.rpc.config();
                let root = cfg.tree.root();
                cfg.set_user_wnode(&user, root);
                if let Some(stream) = &mut args.stream {
                    stream.end_sequence();
                }
            }
            ConfigAction::UserLogout => {
                let mut cfg = self.rpc.config();
                if !cfg.pretend_for(&user) && cfg.transaction_started() {
                    let root = cfg.tree.root();
                    cfg.discard(root);
                    cfg.end_transaction();
                }
                cfg.remove_user(&user);
                if let Some(stream) = &mut args.stream {
                    stream.end_sequence();
                }
            }
            ConfigAction::CfgAc => {
                let line = cfg_msg.params.str_value(params::CONFIG_AC_LINE).unwrap_or("");
                let resp = self.rpc.run_tab(&user, line);
                respond(args, resp);
            }
            ConfigAction::CfgSet => {
                let line = cfg_msg.params.str_value(params::CONFIG_AC_LINE).unwrap_or("");
                let resp = self.rpc.run_enter(&client, &user, line, true);
                respond(args, resp);
            }
            ConfigAction::CfgGet => {
                let path = cfg_msg.params.str_value(params::CONFIG_CFG_ITEM_PATH).unwrap_or("");
                let notify = cfg_msg.params.u8_value(params::CONFIG_CFG_ITEM_NOTIFY).unwrap_or(0);
                let resp = self.rpc.run_get(&client, msg, &user, path, notify != 0);
                respond(args, resp);
            }
            ConfigAction::CfgReplicate => {
                let line = cfg_msg
                    .params
                    .str_value(params::CONFIG_REPLICATION_LINE)
                    .unwrap_or("")
                    .to_owned();
                info!(user = %user.0, line = %line, "applying replicated line");
                // applied silently; no further forwarding from here
                let _ = self.rpc.run_enter(&client, &user, &line, false);
                if let Some(stream) = &mut args.stream {
                    stream.end_sequence();
                }
            }
            ConfigAction::CfgResult => {
                if let Some(stream) = &mut args.stream {
                    stream.end_sequence();
                }
            }
        }
    }
}

fn respond(args: &mut EventArgs<'_>, resp: OpResponse) {
    let responder = StreamResponder::new(resp.rest);
    if let Some(stream) = &mut args.stream {
        stream.out_body = Some(Body::Config(resp.first));
        stream.set_callback(EventType::StreamNext, responder);
        stream.continue_sequence();
    }
    if let Some(ib) = &mut args.include_body {
        **ib = true;
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl ConfigRpc {
    /// TAB: suggest completions, mutate nothing.
    fn run_tab(&self, user: &UserId, line: &str) -> OpResponse {
        let mut cfg = self.config();
        cfg.update_user(user);
        let pretend = cfg.pretend_for(user);
        let root = cfg.tree.root();
        let wnode = cfg.user_wnode(user).unwrap_or(root);

        let mut tokens = text::tokenize_line(line);
        let ac = cfg.auto_complete(AcMode::Tab, wnode, &mut tokens, pretend);

        let completed = tokens.join(" ");
        let cli_path = cfg.tree.cli_path(wnode);

        let mut first = result_message();
        first.params.push_str(params::CONFIG_AC_LINE, &completed);
        first.params.push_str(params::CONFIG_CLI_PATH, &cli_path);
        first.params.push_u32(params::CONFIG_AC_ERR_COUNT, ac.errors.len() as u32);
        first.params.push_u32(params::CONFIG_CFG_LINE_COUNT, 0);
        first.params.push_u8(params::CONFIG_CFG_CM_MODE, mode_code(ac.mode));

        let mut rest = VecDeque::new();
        for err in &ac.errors {
            let mut m = result_message();
            m.params.push_str(params::CONFIG_CFG_AC_ERR, err);
            rest.push_back(m);
        }
        for &id in &ac.result {
            if !cfg.tree.exists(id) {
                continue;
            }
            let n = cfg.tree.node(id);
            let mut m = result_message();
            m.params.push_str(params::CONFIG_CFG_ITEM_NAME, &n.name);
            m.params.push_str(params::CONFIG_CFG_ITEM_DESC, &n.desc);
            m.params.push_u8(params::CONFIG_CFG_ITEM_NS, n.state.to_u8());
            m.params.push_str(params::CONFIG_CFG_ITEM_VALUE, &n.value);
            m.params.push_str(params::CONFIG_CFG_ITEM_NVALUE, &n.new_value);
            m.params.push_u8(params::CONFIG_CFG_ITEM_NT, n.kind.to_u8());
            rest.push_back(m);
        }
        cfg.purge_tmp_nodes(&ac.tmp_nodes);

        OpResponse { first, rest }
    }

    /// ENTER: apply the line; `forward` enables replication of
    /// destructive effects to the configured peers.
    fn run_enter(&self, client: &Arc<Client>, user: &UserId, line: &str, forward: bool) -> OpResponse {
        let mut cfg = self.config();
        cfg.update_user(user);
        let pretend = cfg.pretend_for(user);
        let root = cfg.tree.root();
        let wnode = cfg.user_wnode(user).unwrap_or(root);

        let mut tokens = text::tokenize_line(line);
        let ac = cfg.auto_complete(AcMode::Enter, wnode, &mut tokens, pretend);
        let mut errors = ac.errors.clone();
        let mut lines: Vec<String> = Vec::new();

        if pretend && matches!(ac.mode, ConfigMode::Set | ConfigMode::Edit | ConfigMode::Del) {
            errors.push(
                "Transaction started by other user, cannot execute intrusive operation!"
                    .to_owned(),
            );
        }
        let completed = tokens.join(" ");

        match ac.mode {
            ConfigMode::Set => {
                if !pretend && cfg.tree.is_modified(root) {
                    cfg.start_transaction(user);
                    if forward {
                        self.replicate_line(client, &completed, user);
                    }
                }
            }
            ConfigMode::Edit => {
                if !pretend {
                    if let Some(lf) = ac.last_found {
                        if cfg.tree.exists(lf) && cfg.tree.node(lf).kind == NodeKind::Block {
                            cfg.set_user_wnode(user, lf);
                        }
                    }
                }
            }
            ConfigMode::Del => {
                self.run_delete(&mut cfg, client, user, &tokens, &ac.result, pretend, forward, &completed, &mut errors);
            }
            ConfigMode::Cmd => {
                self.run_command(&mut cfg, client, user, &ac.result, pretend, forward, &completed, &mut lines, &mut errors);
            }
            _ => {}
        }

        let cli_path = cfg
            .user_wnode(user)
            .map(|w| cfg.tree.cli_path(w))
            .unwrap_or_default();

        let mut first = result_message();
        first.params.push_str(params::CONFIG_AC_LINE, &completed);
        first.params.push_str(params::CONFIG_CLI_PATH, &cli_path);
        first.params.push_u32(params::CONFIG_AC_ERR_COUNT, errors.len() as u32);
        first.params.push_u32(params::CONFIG_CFG_LINE_COUNT, lines.len() as u32);
        first.params.push_u8(params::CONFIG_CFG_CM_MODE, mode_code(ac.mode));

        let mut rest = VecDeque::new();
        for err in &errors {
            let mut m = result_message();
            m.params.push_str(params::CONFIG_CFG_AC_ERR, err);
            rest.push_back(m);
        }
        for l in &lines {
            let mut m = result_message();
            m.params.push_str(params::CONFIG_CFG_LINE, l);
            rest.push_back(m);
        }
        // SHOW answers with the matched items themselves
        if ac.mode == ConfigMode::Show {
            for &id in &ac.result {
                if !cfg.tree.exists(id) {
                    continue;
                }
                let n = cfg.tree.node(id);
                let mut m = result_message();
                m.params.push_str(params::CONFIG_CFG_ITEM_NAME, &n.name);
                m.params.push_str(params::CONFIG_CFG_ITEM_DESC, &n.desc);
                m.params.push_u8(params::CONFIG_CFG_ITEM_NS, n.state.to_u8());
                m.params.push_str(params::CONFIG_CFG_ITEM_VALUE, &n.value);
                m.params.push_str(params::CONFIG_CFG_ITEM_NVALUE, &n.new_value);
                m.params.push_u8(params::CONFIG_CFG_ITEM_NT, n.kind.to_u8());
                rest.push_back(m);
            }
        }
        cfg.purge_tmp_nodes(&ac.tmp_nodes);

        OpResponse { first, rest }
    }

    /// DELETE: only item values and template-based block instances.
    #[allow(clippy::too_many_arguments)]
    fn run_delete(
        &self,
        cfg: &mut Config,
        client: &Arc<Client>,
        user: &UserId,
        tokens: &[String],
        result: &[crate::tree::NodeId],
        pretend: bool,
        forward: bool,
        line: &str,
        errors: &mut Vec<String>,
    ) {
        let cannot = |cfg: &Config, id: crate::tree::NodeId| {
            let parent_name = cfg
                .tree
                .node(id)
                .parent
                .map(|p| cfg.tree.node(p).name.clone())
                .unwrap_or_default();
            format!("Cannot delete non template block node \"{}\"!", parent_name)
        };

        let mark_deleted = |cfg: &mut Config, id: crate::tree::NodeId| {
            cfg.tree.node_mut(id).state = NodeState::Deleted;
        };

        // single exact match: the named node itself
        if result.len() == 1 {
            let only = result[0];
            if !cfg.tree.exists(only) {
                return;
            }
            if tokens.last().map(String::as_str) == Some(cfg.tree.node(only).name.as_str()) {
                match cfg.tree.node(only).kind {
                    NodeKind::Item => {
                        if !pretend {
                            cfg.start_transaction(user);
                            mark_deleted(cfg, only);
                            if forward {
                                self.replicate_line(client, line, user);
                            }
                        }
                    }
                    NodeKind::Block => errors.push(cannot(cfg, only)),
                    _ => {}
                }
                return;
            }
        }

        // otherwise the target is the block the matches belong to
        let Some(&head) = result.first() else { return };
        if !cfg.tree.exists(head) {
            return;
        }
        let Some(target) = cfg.tree.node(head).parent else { return };
        if cfg.tree.node(target).kind != NodeKind::Block {
            return;
        }
        let template_based = cfg
            .tree
            .node(target)
            .parent
            .and_then(|gp| cfg.tree.template_child(gp))
            .is_some();
        if !template_based {
            errors.push(cannot(cfg, head));
            return;
        }
        if !pretend {
            cfg.start_transaction(user);
            mark_deleted(cfg, target);
            if forward {
                self.replicate_line(client, line, user);
            }
        }
    }

    /// Special commands reached through the command tree.
    #[allow(clippy::too_many_arguments)]
    fn run_command(
        &self,
        cfg: &mut Config,
        client: &Arc<Client>,
        user: &UserId,
        result: &[crate::tree::NodeId],
        pretend: bool,
        forward: bool,
        line: &str,
        lines: &mut Vec<String>,
        errors: &mut Vec<String>,
    ) {
        let transaction_err =
            "Transaction started by other user, cannot execute intrusive operation!";
        let Some(&head) = result.first() else { return };
        if !cfg.tree.exists(head) {
            return;
        }
        let root = cfg.tree.root();
        let wnode = cfg.user_wnode(user).unwrap_or(root);

        if cfg.tree.node(head).kind == NodeKind::Cmd {
            match cfg.tree.node(head).name.as_str() {
                "configuration" => {
                    let text = text::render(&cfg.tree, wnode, RenderView::Interactive, None);
                    lines.extend(text.lines().map(str::to_owned));
                }
                "commands" => lines.extend(cfg.command_lines(wnode)),
                "top" => {
                    if pretend {
                        errors.push(transaction_err.to_owned());
                    } else {
                        cfg.set_user_wnode(user, root);
                    }
                }
                "up" => {
                    if pretend {
                        errors.push(transaction_err.to_owned());
                    } else if let Some(parent) = cfg.tree.node(wnode).parent {
                        cfg.set_user_wnode(user, parent);
                    }
                }
                "discard" => {
                    if pretend {
                        errors.push(transaction_err.to_owned());
                    } else {
                        cfg.reset_all_wnodes();
                        cfg.discard(root);
                        cfg.end_transaction();
                        if forward {
                            self.replicate_line(client, line, user);
                        }
                    }
                }
                _ => {}
            }
            return;
        }

        // commands with a parameter: the result node is the param
        if cfg.tree.node(head).kind != NodeKind::Param {
            return;
        }
        let Some(cmd) = cfg.tree.node(head).parent else { return };
        let cmd_name = cfg.tree.node(cmd).name.clone();
        let param_value = cfg.tree.node(head).new_value.clone();

        match cmd_name.as_str() {
            "commit" => {
                if pretend {
                    errors.push(transaction_err.to_owned());
                } else if cfg.commit_tree(root, true) > 0 {
                    cfg.reset_all_wnodes();
                    let snapshot =
                        text::render(&cfg.tree, root, RenderView::Committed, Some(&param_value));
                    match rollback::save_revision(cfg.commit_log_dir(), &snapshot) {
                        Ok(path) => {
                            debug!(path = %path.display(), "rollback revision saved");
                            self.finish_commit(cfg, client, user, line, forward);
                        }
                        Err(e) => {
                            warn!(error = %e, "cannot save rollback revision");
                            errors.push("Cannot create rollback configuration!".to_owned());
                        }
                    }
                }
                if cfg.tree.exists(head) {
                    cfg.tree.node_mut(head).new_value.clear();
                }
            }
            "rollback" => {
                if pretend {
                    errors.push(transaction_err.to_owned());
                    return;
                }
                if param_value.is_empty() {
                    errors.push("Rollback revision not defined!".to_owned());
                    return;
                }
                let Ok(rev) = param_value.trim().parse::<usize>() else {
                    errors.push(format!("Cannot find rollback revision '{}'!", param_value));
                    return;
                };
                match rollback::load_revision(cfg.commit_log_dir(), rev) {
                    Err(_) => {
                        errors.push(format!("Cannot find rollback revision '{}'!", param_value))
                    }
                    Ok(contents) => {
                        lines.push("Loading rollback configuration...".to_owned());
                        match text::parse(&contents) {
                            Err(_) => errors
                                .push("Invalid rollback configuration file syntax!".to_owned()),
                            Ok(parsed) => {
                                lines.push("Done".to_owned());
                                cfg.reset_all_wnodes();
                                if !cfg.validate_contents(root, &parsed) {
                                    errors.push(
                                        "Invalid/undefined rollback configuration file contents!"
                                            .to_owned(),
                                    );
                                    return;
                                }
                                cfg.replace_prepare(root);
                                lines.push("Merging rollback configuration file...".to_owned());
                                if let Err(e) = cfg.merge(root, &parsed, true) {
                                    warn!(error = %e, "rollback merge failed");
                                    errors.push(
                                        "Cannot merge configuration file contents!".to_owned(),
                                    );
                                    return;
                                }
                                lines.push("Done".to_owned());
                                lines.push("Committing rollback configuration...".to_owned());
                                self.finish_commit(cfg, client, user, line, forward);
                                lines.push("Done".to_owned());
                            }
                        }
                    }
                }
                if cfg.tree.exists(head) {
                    cfg.tree.node_mut(head).new_value.clear();
                }
            }
            "save" => {
                if param_value.is_empty() {
                    errors.push("Filename not defined!".to_owned());
                    return;
                }
                let text_out = text::render(&cfg.tree, wnode, RenderView::Committed, None);
                match std::fs::write(&param_value, text_out) {
                    Ok(()) => {
                        lines.push(format!("Saving configuration to \"{}\"...", param_value));
                        lines.push("Done".to_owned());
                    }
                    Err(_) => errors.push(format!("Cannot create file \"{}\"", param_value)),
                }
                if cfg.tree.exists(head) {
                    cfg.tree.node_mut(head).new_value.clear();
                }
            }
            "load" => {
                if pretend {
                    errors.push(transaction_err.to_owned());
                    return;
                }
                if param_value.is_empty() {
                    errors.push("Filename not defined!".to_owned());
                    return;
                }
                match std::fs::read_to_string(&param_value) {
                    Err(_) => errors.push(format!("Cannot find file \"{}\"", param_value)),
                    Ok(contents) => {
                        lines.push(format!("Loading new configuration file \"{}\"...", param_value));
                        match text::parse(&contents) {
                            Err(_) => {
                                errors.push("Invalid configuration file syntax!".to_owned())
                            }
                            Ok(parsed) => {
                                if !cfg.validate_contents(root, &parsed) {
                                    errors.push(
                                        "Invalid/undefined configuration file contents!".to_owned(),
                                    );
                                    return;
                                }
                                cfg.replace_prepare(root);
                                if let Err(e) = cfg.merge(root, &parsed, true) {
                                    warn!(error = %e, "load merge failed");
                                    errors.push(
                                        "Cannot merge configuration file contents!".to_owned(),
                                    );
                                    return;
                                }
                                // changes stay pending for an explicit commit
                                cfg.start_transaction(user);
                                lines.push("Done".to_owned());
                            }
                        }
                    }
                }
                if cfg.tree.exists(head) {
                    cfg.tree.node_mut(head).new_value.clear();
                }
            }
            _ => {}
        }
    }

    /// Shared commit tail: notifications, apply, sort, persist,
    /// transaction end, replication.
    fn finish_commit(
        &self,
        cfg: &mut Config,
        client: &Arc<Client>,
        user: &UserId,
        line: &str,
        forward: bool,
    ) {
        let root = cfg.tree.root();
        let touched = cfg.prepare_notifications();
        cfg.commit_with_handlers();
        cfg.sort_tree(root);

        if let Some(path) = self.running_cfg_path.lock().unwrap().as_ref() {
            let current = text::render(&cfg.tree, root, RenderView::Committed, None);
            if let Err(e) = std::fs::write(path, current) {
                warn!(path = %path.display(), error = %e, "cannot rewrite running configuration");
            }
        }
        cfg.end_transaction();

        self.dispatch_notifications(cfg, touched);

        if forward {
            self.replicate_line(client, line, user);
        }
    }

    /// Fire each ready subscription once per subscribed user.
    fn dispatch_notifications(&self, cfg: &mut Config, touched: Vec<usize>) {
        for idx in touched {
            let Some(ntf) = cfg.notifications.get_mut(idx) else { continue };
            if !ntf.ready {
                continue;
            }
            let changes = std::mem::take(&mut ntf.pending);
            ntf.ready = false;
            // prune terminated clients while dispatching
            ntf.users.retain(|u| u.client.strong_count() > 0);
            for user in ntf.users.clone() {
                if let Some(client) = user.client.upgrade() {
                    if let Err(e) = send_update_stream(&client, &user, &changes) {
                        warn!(user = %user.user_id, error = %e, "notification stream failed");
                    }
                }
            }
        }
    }

    /// GET: optional subscription, then the flattened subtree.
    fn run_get(
        &self,
        client: &Arc<Client>,
        msg: &GdtMessage,
        user: &UserId,
        path: &str,
        notify: bool,
    ) -> OpResponse {
        let mut cfg = self.config();
        cfg.update_user(user);
        let root = cfg.tree.root();
        let wnode = cfg.user_wnode(user).unwrap_or(root);

        let target = if path.trim().is_empty() {
            Some(wnode)
        } else {
            cfg.tree.lookup(root, path)
        };

        let mut first = result_message();
        let mut rest = VecDeque::new();

        let Some(target) = target else {
            first.params.push_u32(params::CONFIG_CFG_ITEM_COUNT, 0);
            first.params.push_u32(params::CONFIG_AC_ERR_COUNT, 1);
            let mut m = result_message();
            m.params
                .push_str(params::CONFIG_CFG_AC_ERR, &format!("Unknown item \"{}\"!", path));
            rest.push_back(m);
            return OpResponse { first, rest };
        };

        if notify {
            let watch_path = cfg.tree.full_path(target);
            cfg.subscribe(
                &watch_path,
                NtfUser {
                    user_type: msg.header.source.ty.clone(),
                    user_id: msg.header.source.id.clone().unwrap_or_default(),
                    client: Arc::downgrade(client),
                },
            );
            info!(path = %watch_path, user = %user.0, "notification subscription added");
        }

        let flat = cfg.tree.flatten(target);
        first.params.push_u32(params::CONFIG_CFG_ITEM_COUNT, flat.len() as u32);
        first.params.push_u32(params::CONFIG_AC_ERR_COUNT, 0);
        for id in flat {
            let n = cfg.tree.node(id);
            let mut m = result_message();
            m.params.push_str(params::CONFIG_CFG_ITEM_PATH, &cfg.tree.full_path(id));
            m.params.push_str(params::CONFIG_CFG_ITEM_VALUE, &n.value);
            m.params.push_u8(params::CONFIG_CFG_ITEM_NT, n.kind.to_u8());
            rest.push_back(m);
        }

        OpResponse { first, rest }
    }

    /// Open replication streams toward every configured peer daemon.
    fn replicate_line(&self, client: &Arc<Client>, line: &str, user: &UserId) {
        let daemons = self.cfg_daemons.lock().unwrap().clone();
        if daemons.is_empty() {
            return;
        }
        let Some(session) = client.session() else { return };
        let carrier_type = self.router_daemon_type.lock().unwrap().clone();
        let Some(carrier) = session.get_registered_client(&carrier_type) else {
            warn!(carrier = %carrier_type, "no registered carrier for replication");
            return;
        };
        for daemon_id in daemons {
            let mut body = ConfigMessage::new(ConfigAction::CfgReplicate);
            body.params.push_str(params::CONFIG_REPLICATION_LINE, line);
            body.params.push_str(params::AUTH_ID, &user.0);

            let uuid = match carrier.new_stream(session.daemon_type(), Some(&daemon_id)) {
                Ok(u) => u,
                Err(e) => {
                    warn!(daemon = %daemon_id, error = %e, "replication stream alloc failed");
                    continue;
                }
            };
            carrier.with_stream(&uuid, |stream| {
                stream.out_body = Some(Body::Config(body));
                stream.set_callback(
                    EventType::StreamNext,
                    Arc::new(|args: &mut EventArgs<'_>| {
                        if let Some(s) = &mut args.stream {
                            s.end_sequence();
                        }
                    }),
                );
            });
            if let Err(e) = carrier.send_stream(&uuid, true) {
                warn!(daemon = %daemon_id, error = %e, "replication send failed");
            } else {
                debug!(daemon = %daemon_id, line = %line, "replication scheduled");
            }
        }
    }
}

fn mode_code(mode: ConfigMode) -> u8 {
    match mode {
        ConfigMode::Unknown => 0,
        ConfigMode::Set => 1,
        ConfigMode::Show => 2,
        ConfigMode::Del => 3,
        ConfigMode::Edit => 4,
        ConfigMode::Cmd => 5,
    }
}

// ---------------------------------------------------------------------------
// Update push (notification sender) and receive (subscriber side)
// ---------------------------------------------------------------------------

/// Push a flattened change batch to one subscribed user.
fn send_update_stream(
    client: &Arc<Client>,
    user: &NtfUser,
    changes: &[FlatChange],
) -> Result<(), gdt_runtime::GdtError> {
    let uuid = client.new_stream(&user.user_type, Some(&user.user_id))?;

    let mut first = ConfigMessage::new(ConfigAction::CfgSet);
    first.params.push_u32(params::CONFIG_CFG_ITEM_COUNT, changes.len() as u32);

    let mut rest = VecDeque::new();
    for ch in changes {
        let mut m = ConfigMessage::new(ConfigAction::CfgSet);
        m.params.push_str(params::CONFIG_CFG_ITEM_PATH, &ch.path);
        m.params.push_str(params::CONFIG_CFG_ITEM_VALUE, &ch.value);
        m.params.push_u8(params::CONFIG_CFG_ITEM_NT, ch.kind.to_u8());
        m.params.push_u8(params::CONFIG_CFG_ITEM_NS, ch.state.to_u8());
        rest.push_back(m);
    }

    client.with_stream(&uuid, |stream| {
        stream.out_body = Some(Body::Config(first));
        stream.set_callback(EventType::StreamNext, StreamResponder::new(rest));
    });
    client.send_stream(&uuid, true)
}

/// Collected state of one inbound update stream.
#[derive(Default)]
struct UpdateCollector {
    changes: Mutex<Vec<FlatChange>>,
}

struct CfgUpdateNext {
    collector: Arc<UpdateCollector>,
}

impl EventHandler for CfgUpdateNext {
    fn run(&self, args: &mut EventArgs<'_>) {
        if let Some(cfg_msg) = args.in_msg.and_then(|m| m.config()) {
            let mut changes = self.collector.changes.lock().unwrap();
            let mut current: Option<FlatChange> = None;
            for p in cfg_msg.params.iter() {
                match p.id {
                    params::CONFIG_CFG_ITEM_PATH => {
                        if let Some(c) = current.take() {
                            changes.push(c);
                        }
                        current = Some(FlatChange {
                            path: String::from_utf8_lossy(p.first().unwrap_or_default())
                                .into_owned(),
                            value: String::new(),
                            kind: NodeKind::Unknown,
                            state: NodeState::Unknown,
                        });
                    }
                    params::CONFIG_CFG_ITEM_VALUE => {
                        if let Some(c) = &mut current {
                            c.value =
                                String::from_utf8_lossy(p.first().unwrap_or_default()).into_owned();
                        }
                    }
                    params::CONFIG_CFG_ITEM_NT => {
                        if let Some(c) = &mut current {
                            c.kind = NodeKind::from_u8(
                                p.first().and_then(|v| v.first().copied()).unwrap_or(255),
                            );
                        }
                    }
                    params::CONFIG_CFG_ITEM_NS => {
                        if let Some(c) = &mut current {
                            c.state = NodeState::from_u8(
                                p.first().and_then(|v| v.first().copied()).unwrap_or(255),
                            );
                        }
                    }
                    _ => {}
                }
            }
            if let Some(c) = current {
                changes.push(c);
            }
        }
        if let Some(stream) = &mut args.stream {
            stream.continue_sequence();
        }
    }
}

struct CfgUpdateDone {
    collector: Arc<UpdateCollector>,
    rpc: Arc<ConfigRpc>,
    update_done: Option<Arc<dyn Fn(&[FlatChange]) + Send + Sync>>,
}

impl EventHandler for CfgUpdateDone {
    fn run(&self, _args: &mut EventArgs<'_>) {
        let changes = std::mem::take(&mut *self.collector.changes.lock().unwrap());
        if changes.is_empty() {
            return;
        }
        debug!(count = changes.len(), "applying configuration update batch");
        self.rpc.config().apply_changes(&changes);
        if let Some(done) = &self.update_done {
            done(&changes);
        }
    }
}

/// Inbound handler for configuration update streams pushed by the
/// config daemon to a subscribed client.
pub struct CfgUpdateListener {
    rpc: Arc<ConfigRpc>,
    update_done: Option<Arc<dyn Fn(&[FlatChange]) + Send + Sync>>,
}

impl CfgUpdateListener {
    /// Arm update handling on a client connected to the config daemon.
    pub fn attach(
        client: &Arc<Client>,
        rpc: &Arc<ConfigRpc>,
        update_done: Option<Arc<dyn Fn(&[FlatChange]) + Send + Sync>>,
    ) {
        client.set_callback(
            EventType::StreamNew,
            Arc::new(CfgUpdateListener { rpc: Arc::clone(rpc), update_done }),
        );
    }
}

impl EventHandler for CfgUpdateListener {
    fn run(&self, args: &mut EventArgs<'_>) {
        let Some(cfg_msg) = args.in_msg.and_then(|m| m.config()) else { return };
        if cfg_msg.action != ConfigAction::CfgSet {
            return;
        }
        let collector = Arc::new(UpdateCollector::default());
        if let Some(stream) = &mut args.stream {
            stream.set_callback(
                EventType::StreamNext,
                Arc::new(CfgUpdateNext { collector: Arc::clone(&collector) }),
            );
            stream.set_callback(
                EventType::StreamEnd,
                Arc::new(CfgUpdateDone {
                    collector,
                    rpc: Arc::clone(&self.rpc),
                    update_done: self.update_done.clone(),
                }),
            );
            stream.continue_sequence();
        }
    }
}

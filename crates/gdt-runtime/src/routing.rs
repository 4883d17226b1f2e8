//! Route computation and routing policies.
//!
//! A route is any client whose registered peer endpoint matches the
//! destination descriptor. Policy only applies when several candidates
//! match: the default takes the first; the weighted-round-robin handler
//! spreads load by per-node weight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use gdt_protocol::Endpoint;

use crate::client::Client;
use crate::session::Session;

/// Routes for an inbound destination, computed on the arrival client.
///
/// The arrival client itself appearing in the result marks a route to
/// this daemon. Non-self candidates are returned with their reference
/// counter already incremented.
pub(crate) fn compute_routes(
    client: &Arc<Client>,
    session: &Arc<Session>,
    dest: &Endpoint,
) -> Vec<Arc<Client>> {
    match &dest.id {
        Some(id) => {
            if *id == session.daemon_id() && dest.ty == session.daemon_type() {
                vec![Arc::clone(client)]
            } else if session.is_router() {
                session.find_route(client, &dest.ty, Some(id))
            } else {
                Vec::new()
            }
        }
        None => {
            if dest.ty == "." {
                vec![Arc::clone(client)]
            } else if session.is_router() {
                session.find_route(client, &dest.ty, None)
            } else {
                Vec::new()
            }
        }
    }
}

/// Pluggable choice among matching candidates.
pub trait RouteHandler: Send + Sync {
    fn run(&self, candidates: &[Arc<Client>]) -> Option<Arc<Client>>;

    fn add_node(&self, _client: Option<&Arc<Client>>, _node_type: &str, _node_id: &str, _weight: u32) {}

    fn remove_type(&self, _node_type: &str) {}

    fn remove_node(&self, _node_type: &str, _node_id: &str) {}

    fn update_client(&self, _client: Option<&Arc<Client>>, _node_type: &str, _node_id: &str) {}

    fn clear(&self) {}
}

/// Default policy: first registered match wins.
pub struct FirstMatchRouting;

impl RouteHandler for FirstMatchRouting {
    fn run(&self, candidates: &[Arc<Client>]) -> Option<Arc<Client>> {
        candidates.first().cloned()
    }
}

struct WrrItem {
    id: String,
    client: Option<Weak<Client>>,
    weight: u32,
    current: i64,
    enabled: bool,
}

#[derive(Default)]
struct WrrGroup {
    items: Vec<WrrItem>,
}

impl WrrGroup {
    /// Smooth weighted round-robin over enabled items.
    fn next(&mut self) -> Option<&mut WrrItem> {
        let total: i64 = self.items.iter().filter(|i| i.enabled).map(|i| i.weight as i64).sum();
        if total == 0 {
            return None;
        }
        let mut best: Option<usize> = None;
        let mut best_current: i64 = 0;
        for (idx, item) in self.items.iter_mut().enumerate() {
            if !item.enabled {
                continue;
            }
            item.current += item.weight as i64;
            match best {
                Some(_) if best_current >= item.current => {}
                _ => {
                    best = Some(idx);
                    best_current = item.current;
                }
            }
        }
        let b = best?;
        self.items[b].current -= total;
        Some(&mut self.items[b])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut WrrItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }
}

/// Weighted-round-robin policy keyed by destination daemon type.
///
/// Falls back to the first candidate for destination types without
/// configured weights.
#[derive(Default)]
pub struct WrrRouting {
    groups: Mutex<HashMap<String, WrrGroup>>,
}

impl WrrRouting {
    pub fn new() -> Self {
        WrrRouting::default()
    }
}

impl RouteHandler for WrrRouting {
    fn run(&self, candidates: &[Arc<Client>]) -> Option<Arc<Client>> {
        let first = candidates.first()?;
        let dest_type = first.peer().ty;
        let mut groups = self.groups.lock().unwrap();
        let group = match groups.get_mut(&dest_type) {
            Some(g) => g,
            // no weights configured for this type: automatic routing
            None => return Some(Arc::clone(first)),
        };
        let item = group.next()?;
        item.client.as_ref().and_then(Weak::upgrade)
    }

    fn add_node(&self, client: Option<&Arc<Client>>, node_type: &str, node_id: &str, weight: u32) {
        let mut groups = self.groups.lock().unwrap();
        let group = groups.entry(node_type.to_owned()).or_default();
        let enabled = client.is_some();
        match group.get_mut(node_id) {
            Some(item) => {
                item.client = client.map(Arc::downgrade);
                item.weight = weight;
                item.enabled = enabled;
            }
            None => group.items.push(WrrItem {
                id: node_id.to_owned(),
                client: client.map(Arc::downgrade),
                weight,
                current: 0,
                enabled,
            }),
        }
    }

    fn remove_type(&self, node_type: &str) {
        self.groups.lock().unwrap().remove(node_type);
    }

    fn remove_node(&self, node_type: &str, node_id: &str) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(group) = groups.get_mut(node_type) {
            group.items.retain(|i| i.id != node_id);
        }
    }

    fn update_client(&self, client: Option<&Arc<Client>>, node_type: &str, node_id: &str) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(item) = groups.get_mut(node_type).and_then(|g| g.get_mut(node_id)) {
            item.client = client.map(Arc::downgrade);
            item.enabled = client.is_some();
        }
    }

    fn clear(&self) {
        self.groups.lock().unwrap().clear();
    }
}

//! Daemon-wide session: identity, the client set, the inbound listener
//! and the routing policy.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::client::{Client, ClientConfig, Direction, GdtError};
use crate::events::{CallbackSet, EventArgs, EventHandler, EventType};
use crate::registration;
use crate::routing::RouteHandler;
use crate::transport::{self, Listener};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub daemon_type: String,
    pub daemon_id: String,
    /// Routers forward between clients; leaves only accept traffic for
    /// themselves.
    pub router: bool,
    pub client: ClientConfig,
}

impl SessionConfig {
    pub fn new(daemon_type: &str, daemon_id: &str) -> Self {
        SessionConfig {
            daemon_type: daemon_type.to_owned(),
            daemon_id: daemon_id.to_owned(),
            router: false,
            client: ClientConfig::default(),
        }
    }

    pub fn router(mut self) -> Self {
        self.router = true;
        self
    }

    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.client.stream_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.client.poll_interval = interval;
        self
    }

    pub fn max_concurrent_streams(mut self, max: usize) -> Self {
        self.client.max_concurrent_streams = max;
        self
    }
}

pub struct Session {
    cfg: SessionConfig,
    clients: Mutex<Vec<Arc<Client>>>,
    callbacks: Mutex<CallbackSet>,
    route_handler: Mutex<Option<Arc<dyn RouteHandler>>>,
    server_active: AtomicBool,
    next_client_id: AtomicU32,
}

impl Session {
    pub fn new(cfg: SessionConfig) -> Arc<Self> {
        Arc::new(Session {
            cfg,
            clients: Mutex::new(Vec::new()),
            callbacks: Mutex::new(CallbackSet::new()),
            route_handler: Mutex::new(None),
            server_active: AtomicBool::new(false),
            next_client_id: AtomicU32::new(1),
        })
    }

    pub fn daemon_type(&self) -> &str {
        &self.cfg.daemon_type
    }

    pub fn daemon_id(&self) -> &str {
        &self.cfg.daemon_id
    }

    pub fn is_router(&self) -> bool {
        self.cfg.router
    }

    pub fn set_callback(&self, event: EventType, handler: Arc<dyn EventHandler>) {
        self.callbacks.lock().unwrap().set(event, handler);
    }

    pub fn remove_callback(&self, event: EventType) {
        self.callbacks.lock().unwrap().remove(event);
    }

    pub(crate) fn process_callback(&self, event: EventType, args: &mut EventArgs<'_>) -> bool {
        let cbs = self.callbacks.lock().unwrap().clone();
        cbs.process(event, args)
    }

    pub fn set_routing_handler(&self, handler: Arc<dyn RouteHandler>) {
        *self.route_handler.lock().unwrap() = Some(handler);
    }

    pub fn routing_handler(&self) -> Option<Arc<dyn RouteHandler>> {
        self.route_handler.lock().unwrap().clone()
    }

    pub fn add_client(&self, client: &Arc<Client>) {
        self.clients.lock().unwrap().push(Arc::clone(client));
    }

    pub fn remove_client(&self, client: &Arc<Client>) {
        self.clients.lock().unwrap().retain(|c| !Arc::ptr_eq(c, client));
    }

    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    /// First registered, active client whose peer daemon type matches.
    pub fn get_registered_client(&self, daemon_type: &str) -> Option<Arc<Client>> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.is_registered() && c.is_active() && c.peer().ty == daemon_type)
            .cloned()
    }

    /// Registered, active client with an exact peer (type, id) match.
    pub fn get_registered_client_by_id(
        &self,
        daemon_type: &str,
        daemon_id: &str,
    ) -> Option<Arc<Client>> {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| {
                c.is_registered()
                    && c.is_active()
                    && c.peer().ty == daemon_type
                    && c.peer().id.as_deref() == Some(daemon_id)
            })
            .cloned()
    }

    /// Resolve a destination descriptor to forwarding candidates.
    ///
    /// Non-self results come back with their reference counter
    /// incremented; the forwarder decrements after transmission.
    pub(crate) fn find_route(
        &self,
        from: &Arc<Client>,
        daemon_type: &str,
        daemon_id: Option<&str>,
    ) -> Vec<Arc<Client>> {
        match daemon_id {
            None => {
                // type-only: this daemon is an acceptable target
                if self.daemon_type() == daemon_type {
                    return vec![Arc::clone(from)];
                }
                let candidates: Vec<Arc<Client>> = self
                    .clients
                    .lock()
                    .unwrap()
                    .iter()
                    .filter(|c| c.is_registered() && c.is_active() && c.peer().ty == daemon_type)
                    .cloned()
                    .collect();
                for c in &candidates {
                    c.inc_refc();
                }
                let chosen = match self.routing_handler() {
                    Some(h) => h.run(&candidates),
                    None => candidates.first().cloned(),
                };
                let mut out = Vec::new();
                if let Some(c) = chosen {
                    c.inc_refc();
                    out.push(c);
                }
                for c in &candidates {
                    c.dec_refc();
                }
                out
            }
            // fan-out; only meaningful without reply streams
            Some("*") => self
                .clients
                .lock()
                .unwrap()
                .iter()
                .filter(|c| {
                    c.is_registered()
                        && c.is_active()
                        && c.peer().ty == daemon_type
                        && !Arc::ptr_eq(c, from)
                })
                .map(|c| {
                    c.inc_refc();
                    Arc::clone(c)
                })
                .collect(),
            Some(id) => {
                if self.daemon_type() == daemon_type && self.daemon_id() == id {
                    return vec![Arc::clone(from)];
                }
                let clients = self.clients.lock().unwrap();
                for c in clients.iter() {
                    if c.is_registered()
                        && c.is_active()
                        && c.peer().ty == daemon_type
                        && c.peer().id.as_deref() == Some(id)
                    {
                        c.inc_refc();
                        return vec![Arc::clone(c)];
                    }
                }
                Vec::new()
            }
        }
    }

    /// Dial a peer and, unless asked otherwise, run GDT registration.
    pub async fn connect(
        self: &Arc<Self>,
        addr: SocketAddr,
        skip_registration: bool,
    ) -> Result<Arc<Client>, GdtError> {
        let conn = transport::connect(addr).await?;
        let (reader, writer) = conn.split();
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let client = Client::spawn(
            id,
            reader,
            writer,
            addr,
            Direction::Outbound,
            self,
            self.cfg.client.clone(),
        );

        if skip_registration {
            self.add_client(&client);
            return Ok(client);
        }

        match registration::register_client(&client, ".").await {
            Ok(()) => {
                let mut args = EventArgs::with_client(Arc::clone(&client));
                self.process_callback(EventType::ClientCreated, &mut args);
                self.add_client(&client);
                info!(
                    client = client.id(),
                    peer_type = %client.peer().ty,
                    peer_id = ?client.peer().id,
                    "client connected and registered"
                );
                Ok(client)
            }
            Err(e) => {
                warn!(client = client.id(), error = %e, "registration failed");
                client.disconnect();
                Err(e)
            }
        }
    }

    /// Start the inbound listener; returns the bound address.
    pub async fn start_server(self: &Arc<Self>, bind: SocketAddr) -> Result<SocketAddr, GdtError> {
        let listener = Listener::bind(bind).await?;
        let addr = listener.local_addr()?;
        self.server_active.store(true, Ordering::Release);

        let session = Arc::clone(self);
        tokio::spawn(async move {
            let poll = session.cfg.client.poll_interval;
            while session.server_active.load(Ordering::Acquire) {
                match tokio::time::timeout(poll, listener.accept()).await {
                    Err(_elapsed) => continue,
                    Ok(Ok(conn)) => {
                        let peer = conn.peer_addr();
                        let (reader, writer) = conn.split();
                        let id = session.next_client_id.fetch_add(1, Ordering::Relaxed);
                        let client = Client::spawn(
                            id,
                            reader,
                            writer,
                            peer,
                            Direction::Inbound,
                            &session,
                            session.cfg.client.clone(),
                        );
                        registration::arm_inbound(&client);
                        session.add_client(&client);
                        let mut args = EventArgs::with_client(Arc::clone(&client));
                        session.process_callback(EventType::ClientNew, &mut args);
                        info!(client = client.id(), peer = %peer, "inbound client accepted");
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "listener accept failed");
                        break;
                    }
                }
            }
        });
        Ok(addr)
    }

    pub fn stop_server(&self) {
        self.server_active.store(false, Ordering::Release);
    }

    /// Stop everything and wait for forwarding references to drain.
    pub async fn shutdown(&self) {
        self.stop_server();
        let clients = self.clients();
        for c in &clients {
            c.disconnect();
        }
        for c in clients {
            while c.refc() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("daemon_type", &self.cfg.daemon_type)
            .field("daemon_id", &self.cfg.daemon_id)
            .field("router", &self.cfg.router)
            .field("clients", &self.client_count())
            .finish()
    }
}

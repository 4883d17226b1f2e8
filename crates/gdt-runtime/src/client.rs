//! One transport association: stream table, pooled buffers, egress
//! queues and the three cooperating workers (ingress, egress, timeout).
//!
//! # Workers
//! - ingress: receives datagrams with a poll timeout, runs the state
//!   machine, processes armed stream expiry and queued reconnects;
//! - egress: drains the internal (protocol-generated) queue before the
//!   external (user) queue on every pass;
//! - timeout: 1 s tick that arms the expiry check once per
//!   stream-timeout period.
//!
//! The stream table lock is never held across an event-handler call:
//! the state machine takes an entry out of the table, works on it, and
//! puts it back unless the protocol removed the stream.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gdt_protocol::{encode, Body, CodecError, Endpoint, GdtMessage, Header, SequenceFlag};

use crate::events::{CallbackSet, EventArgs, EventHandler, EventType};
use crate::pool::{BufferPool, PoolExhausted, PooledBuf, SlotPool};
use crate::session::Session;
use crate::state;
use crate::stats::{self, DirectionStats};
use crate::stream::{Initiator, Stream, StreamEntry};
use crate::transport::{ConnReader, ConnWriter, TransportError, TransportEvent};

#[derive(Debug, Error)]
pub enum GdtError {
    #[error(transparent)]
    Pool(#[from] PoolExhausted),
    #[error("unknown stream")]
    UnknownStream,
    #[error("egress queue full")]
    QueueFull,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("client inactive")]
    Inactive,
    #[error("registration failed")]
    RegistrationFailed,
    #[error("registration timed out")]
    RegistrationTimeout,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub max_concurrent_streams: usize,
    pub stream_timeout: Duration,
    pub poll_interval: Duration,
    /// Raw buffer size B; the codec fails when a message exceeds it.
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_concurrent_streams: 100,
            stream_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            buffer_size: 8192,
        }
    }
}

/// An encoded message queued for transmission.
///
/// Dropping the payload after transmission returns the buffer to its
/// pool; payloads belonging to live streams also carry the stream's
/// out flag, cleared once the fragment leaves the queue.
pub(crate) struct Payload {
    pub buf: PooledBuf,
    pub len: usize,
    pub sub_stream: u16,
    pub out_flag: Option<Arc<AtomicBool>>,
    pub callbacks: CallbackSet,
}

pub struct Client {
    id: u32,
    pub direction: Direction,
    session: Weak<Session>,
    peer_addr: SocketAddr,
    active: AtomicBool,
    registered: AtomicBool,
    reconnect_queued: AtomicBool,
    router: AtomicBool,
    refc: AtomicU32,
    /// Peer daemon identity, learned during registration.
    peer: Mutex<Endpoint>,
    pub in_stats: DirectionStats,
    pub out_stats: DirectionStats,
    last_rx: Mutex<Instant>,
    pub(crate) streams: Mutex<HashMap<[u8; 16], StreamEntry>>,
    streams_active: AtomicBool,
    callbacks: Mutex<CallbackSet>,
    expire_check: AtomicBool,
    pub(crate) buf_pool: Arc<BufferPool>,
    pub(crate) slot_pool: Arc<SlotPool>,
    internal_tx: mpsc::Sender<Payload>,
    external_tx: mpsc::Sender<Payload>,
    writer: tokio::sync::Mutex<ConnWriter>,
    pub(crate) cfg: ClientConfig,
}

impl Client {
    /// Create the client object and start its workers.
    pub(crate) fn spawn(
        id: u32,
        reader: ConnReader,
        writer: ConnWriter,
        peer_addr: SocketAddr,
        direction: Direction,
        session: &Arc<Session>,
        cfg: ClientConfig,
    ) -> Arc<Client> {
        let cap = cfg.max_concurrent_streams.max(1);
        let (internal_tx, internal_rx) = mpsc::channel(cap);
        let (external_tx, external_rx) = mpsc::channel(cap);
        let client = Arc::new(Client {
            id,
            direction,
            session: Arc::downgrade(session),
            peer_addr,
            active: AtomicBool::new(true),
            registered: AtomicBool::new(false),
            reconnect_queued: AtomicBool::new(false),
            router: AtomicBool::new(false),
            refc: AtomicU32::new(0),
            peer: Mutex::new(Endpoint::new("")),
            in_stats: DirectionStats::default(),
            out_stats: DirectionStats::default(),
            last_rx: Mutex::new(Instant::now()),
            streams: Mutex::new(HashMap::new()),
            streams_active: AtomicBool::new(false),
            callbacks: Mutex::new(CallbackSet::new()),
            expire_check: AtomicBool::new(false),
            buf_pool: BufferPool::new(cap, cfg.buffer_size),
            slot_pool: SlotPool::new(cap),
            internal_tx,
            external_tx,
            writer: tokio::sync::Mutex::new(writer),
            cfg,
        });

        tokio::spawn(ingress_loop(Arc::clone(&client), reader));
        tokio::spawn(egress_loop(Arc::clone(&client), internal_rx, external_rx));
        tokio::spawn(timeout_loop(Arc::clone(&client)));
        client
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_activity(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    pub fn is_router(&self) -> bool {
        self.router.load(Ordering::Acquire)
    }

    pub fn set_router(&self, router: bool) {
        self.router.store(router, Ordering::Release);
    }

    pub fn peer(&self) -> Endpoint {
        self.peer.lock().unwrap().clone()
    }

    pub fn set_peer(&self, peer: Endpoint) {
        *self.peer.lock().unwrap() = peer;
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    pub fn inc_refc(&self) -> u32 {
        self.refc.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn dec_refc(&self) -> u32 {
        let mut cur = self.refc.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return 0;
            }
            match self.refc.compare_exchange(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return cur - 1,
                Err(now) => cur = now,
            }
        }
    }

    pub fn refc(&self) -> u32 {
        self.refc.load(Ordering::Acquire)
    }

    pub(crate) fn touch_rx(&self) {
        *self.last_rx.lock().unwrap() = Instant::now();
    }

    fn rx_recent(&self) -> bool {
        self.last_rx.lock().unwrap().elapsed() < Duration::from_secs(1)
    }

    pub fn set_callback(&self, event: EventType, handler: Arc<dyn EventHandler>) {
        self.callbacks.lock().unwrap().set(event, handler);
    }

    pub fn remove_callback(&self, event: EventType) {
        self.callbacks.lock().unwrap().remove(event);
    }

    pub fn get_callback(&self, event: EventType) -> Option<Arc<dyn EventHandler>> {
        self.callbacks.lock().unwrap().get(event)
    }

    /// Run a client-level handler; the callback table lock is not held
    /// across the call.
    pub(crate) fn process_callback(&self, event: EventType, args: &mut EventArgs<'_>) -> bool {
        let cbs = self.callbacks.lock().unwrap().clone();
        cbs.process(event, args)
    }

    pub(crate) fn fire_event(self: &Arc<Self>, event: EventType) {
        let mut args = EventArgs::with_client(Arc::clone(self));
        self.process_callback(event, &mut args);
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    pub fn stream_exists(&self, uuid: &[u8; 16]) -> bool {
        self.streams.lock().unwrap().contains_key(uuid)
    }

    // -- stream table plumbing used by the state machine --

    pub(crate) fn take_stream(&self, uuid: &[u8; 16]) -> Option<StreamEntry> {
        self.streams.lock().unwrap().remove(uuid)
    }

    pub(crate) fn put_stream(&self, entry: StreamEntry) {
        let uuid = *entry.primary.uuid();
        let mut tbl = self.streams.lock().unwrap();
        tbl.insert(uuid, entry);
        self.streams_active.store(true, Ordering::Release);
    }

    pub(crate) fn remove_stream(&self, uuid: &[u8; 16]) -> Option<StreamEntry> {
        let mut tbl = self.streams.lock().unwrap();
        let entry = tbl.remove(uuid);
        if tbl.is_empty() {
            self.streams_active.store(false, Ordering::Release);
        }
        entry
    }

    /// Open a locally initiated stream: fresh uuid, sequence 1, START.
    pub fn new_stream(&self, dest_type: &str, dest_id: Option<&str>) -> Result<[u8; 16], GdtError> {
        let slot = match self.slot_pool.try_acquire() {
            Ok(s) => s,
            Err(e) => {
                stats::inc(&self.out_stats.strm_alloc_errors);
                return Err(e.into());
            }
        };
        let uuid = *uuid::Uuid::new_v4().as_bytes();
        let dest = Endpoint { ty: dest_type.to_owned(), id: dest_id.map(str::to_owned) };
        let stream = Stream::new(uuid, dest, Initiator::Local, slot);
        self.put_stream(StreamEntry::new(stream));
        Ok(uuid)
    }

    /// Drop a locally opened stream, returning its slot to the pool.
    pub fn close_stream(&self, uuid: &[u8; 16]) -> bool {
        self.remove_stream(uuid).is_some()
    }

    /// Mutate a tabled stream (set callbacks, stage a body).
    pub fn with_stream<R>(&self, uuid: &[u8; 16], f: impl FnOnce(&mut Stream) -> R) -> Option<R> {
        let mut tbl = self.streams.lock().unwrap();
        tbl.get_mut(uuid).map(|e| f(&mut e.primary))
    }

    /// Encode the stream's next fragment and queue it on the external
    /// egress queue.
    pub fn send_stream(&self, uuid: &[u8; 16], include_body: bool) -> Result<(), GdtError> {
        let session = self.session.upgrade().ok_or(GdtError::Inactive)?;
        let mut tbl = self.streams.lock().unwrap();
        let entry = tbl.get_mut(uuid).ok_or(GdtError::UnknownStream)?;
        let stream = &mut entry.primary;

        let mut header = Header::new(
            Endpoint {
                ty: session.daemon_type().to_owned(),
                id: Some(session.daemon_id().to_owned()),
            },
            stream.dest.clone(),
            *stream.uuid(),
            stream.sequence_flag().unwrap_or(SequenceFlag::Start),
        );
        header.sequence_num = stream.sequence_num();
        let msg = GdtMessage {
            header,
            body: if include_body { stream.out_body.clone() } else { None },
        };

        let mut buf = self.buf_pool.try_get().map_err(|e| {
            stats::inc(&self.out_stats.strm_alloc_errors);
            GdtError::from(e)
        })?;
        let len = encode(&msg, &mut buf[..])?;
        stream.out.store(true, Ordering::Release);
        stream.touch();
        let payload = Payload {
            buf,
            len,
            sub_stream: 0,
            out_flag: Some(Arc::clone(&stream.out)),
            callbacks: stream.callbacks(),
        };
        drop(tbl);
        self.queue_external(payload)
    }

    /// One-fragment datagram. With `on_reply` the stream is registered
    /// so the reply can be matched (STATELESS); without it the message
    /// is fire-and-forget (STATELESS_NO_REPLY) and freed on send.
    pub fn send_datagram(
        &self,
        body: Body,
        on_sent: Option<Arc<dyn EventHandler>>,
        on_reply: Option<Arc<dyn EventHandler>>,
        dest_type: &str,
        dest_id: Option<&str>,
    ) -> Result<(), GdtError> {
        let session = self.session.upgrade().ok_or(GdtError::Inactive)?;
        let slot = match self.slot_pool.try_acquire() {
            Ok(s) => s,
            Err(e) => {
                stats::inc(&self.out_stats.strm_alloc_errors);
                return Err(e.into());
            }
        };
        let uuid = *uuid::Uuid::new_v4().as_bytes();
        let dest = Endpoint { ty: dest_type.to_owned(), id: dest_id.map(str::to_owned) };
        let mut stream = Stream::new(uuid, dest.clone(), Initiator::Local, slot);

        let flag = if on_reply.is_some() {
            SequenceFlag::Stateless
        } else {
            SequenceFlag::StatelessNoReply
        };
        stream.set_sequence_flag(Some(flag));

        let mut header = Header::new(
            Endpoint {
                ty: session.daemon_type().to_owned(),
                id: Some(session.daemon_id().to_owned()),
            },
            dest,
            uuid,
            flag,
        );
        header.sequence_num = 1;
        let msg = GdtMessage { header, body: Some(body) };

        let mut buf = self.buf_pool.try_get().map_err(|e| {
            stats::inc(&self.out_stats.strm_alloc_errors);
            GdtError::from(e)
        })?;
        let len = encode(&msg, &mut buf[..])?;

        let mut sent_cbs = CallbackSet::new();
        if let Some(h) = on_sent {
            sent_cbs.set(EventType::PayloadSent, h);
        }

        let payload = Payload {
            buf,
            len,
            sub_stream: 0,
            out_flag: None,
            callbacks: sent_cbs,
        };

        if let Some(h) = on_reply {
            stream.set_callback(EventType::StreamEnd, h);
            self.put_stream(StreamEntry::new(stream));
        }
        self.queue_external(payload)
    }

    pub(crate) fn queue_internal(&self, payload: Payload) -> Result<(), GdtError> {
        self.internal_tx.try_send(payload).map_err(|e| {
            clear_out_flag(e.into_inner());
            GdtError::QueueFull
        })
    }

    pub(crate) fn queue_external(&self, payload: Payload) -> Result<(), GdtError> {
        self.external_tx.try_send(payload).map_err(|e| {
            clear_out_flag(e.into_inner());
            GdtError::QueueFull
        })
    }

    /// Queue a reconnect; picked up by the ingress worker.
    pub(crate) fn queue_reconnect(&self) {
        self.reconnect_queued.store(true, Ordering::Release);
    }

    pub(crate) fn arm_expiry(&self) {
        self.expire_check.store(true, Ordering::Release);
    }

    /// Expire overdue streams. With `force` every stream is expired
    /// regardless of age (`time_now = +inf` semantics).
    pub(crate) fn process_timeout(self: &Arc<Self>, force: bool) {
        if !(self.expire_check.swap(false, Ordering::AcqRel) || force) {
            return;
        }
        let ttl = self.cfg.stream_timeout;
        let now = Instant::now();
        let mut expired: Vec<StreamEntry> = Vec::new();
        {
            let mut tbl = self.streams.lock().unwrap();
            let keys: Vec<[u8; 16]> = tbl
                .iter()
                .filter(|(_, e)| {
                    if e.primary.out.load(Ordering::Acquire) && !force {
                        return false;
                    }
                    force || now.duration_since(e.primary.timestamp()) >= ttl
                })
                .map(|(k, _)| *k)
                .collect();
            for k in keys {
                if let Some(e) = tbl.remove(&k) {
                    expired.push(e);
                }
            }
            if tbl.is_empty() {
                self.streams_active.store(false, Ordering::Release);
            }
        }

        for mut entry in expired {
            entry.primary.set_timed_out();
            match entry.primary.initiator {
                Initiator::Local => stats::inc(&self.out_stats.strm_timeout),
                Initiator::Remote => stats::inc(&self.in_stats.strm_timeout),
            }
            let mut args = EventArgs::with_client(Arc::clone(self));
            entry.primary.process_callback(EventType::StreamTimeout, &mut args);
            if let Some(partner) = entry.partner.as_mut() {
                partner.set_timed_out();
                let mut args = EventArgs::with_client(Arc::clone(self));
                partner.process_callback(EventType::StreamTimeout, &mut args);
            }
            // dropping the entry returns the stream slots
        }
    }

    /// Stop the workers at their next loop iteration.
    pub fn disconnect(&self) {
        self.set_activity(false);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("peer", &self.peer())
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// A payload rejected by a full queue must not pin its stream in the
/// out state, or the stream would never expire.
fn clear_out_flag(payload: Payload) {
    if let Some(f) = &payload.out_flag {
        f.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

async fn ingress_loop(client: Arc<Client>, mut reader: ConnReader) {
    while client.is_active() {
        client.process_timeout(false);

        // a reconnect may have been queued by the egress worker
        if client.reconnect_queued.swap(false, Ordering::AcqRel) {
            client.process_timeout(true);
            if !init_reconnect(&client, &mut reader).await {
                break;
            }
        }

        match tokio::time::timeout(client.cfg.poll_interval, reader.recv()).await {
            Err(_elapsed) => {
                client.fire_event(EventType::ClientIdle);
            }
            Ok(Ok(TransportEvent::Data { tag, sub_stream, bytes })) => {
                if tag != gdt_protocol::PROTOCOL_TAG {
                    stats::inc(&client.in_stats.discarded);
                    continue;
                }
                stats::add(&client.in_stats.bytes, bytes.len() as u64);
                stats::inc(&client.in_stats.packets);
                client.touch_rx();
                state::process_frame(&client, sub_stream, &bytes);
            }
            Ok(Ok(TransportEvent::Shutdown)) | Ok(Ok(TransportEvent::AssocLost)) => {
                stats::inc(&client.in_stats.socket_errors);
                client.process_timeout(true);
                if !init_reconnect(&client, &mut reader).await {
                    break;
                }
            }
            Ok(Err(e)) => {
                warn!(client = client.id(), error = %e, "transport receive error");
                stats::inc(&client.in_stats.socket_errors);
                client.process_timeout(true);
                if !init_reconnect(&client, &mut reader).await {
                    break;
                }
            }
        }
    }

    client.fire_event(EventType::ClientTerminating);
    client.process_timeout(true);
    client.set_activity(false);

    // exit cleanup: wait for forwarding references to drain, then leave
    // the session
    while client.refc() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.process_timeout(true);
    }
    if let Some(session) = client.session() {
        let mut args = EventArgs::with_client(Arc::clone(&client));
        session.process_callback(EventType::ClientTerminated, &mut args);
        session.remove_client(&client);
    }
    client.fire_event(EventType::ClientTerminated);
    debug!(client = client.id(), "client terminated");
}

/// Outbound reconnect: tear down, redial every poll interval until the
/// client goes inactive, then re-register. Inbound clients just become
/// inactive and are reaped by the session.
async fn init_reconnect(client: &Arc<Client>, reader: &mut ConnReader) -> bool {
    client.set_registered(false);
    if client.direction == Direction::Inbound {
        client.set_activity(false);
        return false;
    }

    client.fire_event(EventType::ClientReconnecting);
    info!(client = client.id(), peer = %client.peer_addr(), "reconnecting");

    loop {
        if !client.is_active() {
            return false;
        }
        match crate::transport::connect(client.peer_addr()).await {
            Ok(conn) => {
                let (r, w) = conn.split();
                *reader = r;
                *client.writer.lock().await = w;
                client.fire_event(EventType::ClientReconnected);
                info!(client = client.id(), "reconnected");
                // registration blocks on the peer, run it apart from the
                // ingress worker
                let c = Arc::clone(client);
                tokio::spawn(async move {
                    if let Err(e) = crate::registration::register_client(&c, ".").await {
                        warn!(client = c.id(), error = %e, "re-registration failed");
                    }
                });
                return true;
            }
            Err(_) => tokio::time::sleep(client.cfg.poll_interval).await,
        }
    }
}

async fn egress_loop(
    client: Arc<Client>,
    mut internal_rx: mpsc::Receiver<Payload>,
    mut external_rx: mpsc::Receiver<Payload>,
) {
    while client.is_active() {
        let mut moved = false;

        // internal (protocol-generated) payloads drain first
        while let Ok(p) = internal_rx.try_recv() {
            moved = true;
            out_process(&client, p).await;
        }
        if let Ok(p) = external_rx.try_recv() {
            moved = true;
            out_process(&client, p).await;
        }

        if !moved {
            // busy streams get a yield, idle clients a real sleep
            if client.streams_active.load(Ordering::Acquire) && client.rx_recent() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }
    }
}

async fn out_process(client: &Arc<Client>, payload: Payload) {
    let res = {
        let mut writer = client.writer.lock().await;
        writer.send(payload.sub_stream, &payload.buf[..payload.len]).await
    };

    match res {
        Ok(()) => {
            stats::inc(&client.out_stats.packets);
            stats::add(&client.out_stats.bytes, payload.len as u64);
            let mut args = EventArgs::with_client(Arc::clone(client));
            payload.callbacks.process(EventType::PayloadSent, &mut args);
        }
        Err(e) => {
            debug!(client = client.id(), error = %e, "send failed, queueing reconnect");
            stats::inc(&client.out_stats.socket_errors);
            client.queue_reconnect();
        }
    }

    if let Some(out) = &payload.out_flag {
        out.store(false, Ordering::Release);
    }
    // payload drop returns the buffer to its pool
}

async fn timeout_loop(client: Arc<Client>) {
    let mut ticks = 0u64;
    let period = client.cfg.stream_timeout.as_secs().max(1);
    while client.is_active() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        ticks += 1;
        if ticks >= period {
            client.arm_expiry();
            ticks = 0;
        }
    }
}

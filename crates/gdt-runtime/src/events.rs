//! Event kinds and handler tables.
//!
//! Handlers are installed per client, per session or per stream and are
//! invoked synchronously from the worker that produced the event. A
//! stream handler may mutate the stream it is handed (set the next
//! sequence flag, stage a reply body) and may open streams on *other*
//! clients; the stream table lock is never held across a handler call.

use std::collections::HashMap;
use std::sync::Arc;

use gdt_protocol::GdtMessage;

use crate::client::Client;
use crate::stream::Stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ClientCreated,
    ClientNew,
    ClientIdle,
    ClientReconnecting,
    ClientReconnected,
    ClientTerminating,
    ClientTerminated,
    StreamNew,
    StreamNext,
    StreamEnd,
    StreamTimeout,
    PayloadSent,
    Datagram,
    HeartbeatReceived,
    HeartbeatMissed,
}

/// Arguments handed to a handler; population depends on the event.
#[derive(Default)]
pub struct EventArgs<'a> {
    pub client: Option<Arc<Client>>,
    pub stream: Option<&'a mut Stream>,
    pub in_msg: Option<&'a GdtMessage>,
    /// Reply-body switch for stream events; the ACK carries the stream's
    /// staged body only when a handler sets this.
    pub include_body: Option<&'a mut bool>,
}

impl<'a> EventArgs<'a> {
    pub fn new() -> Self {
        EventArgs::default()
    }

    pub fn with_client(client: Arc<Client>) -> Self {
        EventArgs { client: Some(client), ..EventArgs::default() }
    }
}

pub trait EventHandler: Send + Sync {
    fn run(&self, args: &mut EventArgs<'_>);
}

impl<F> EventHandler for F
where
    F: Fn(&mut EventArgs<'_>) + Send + Sync,
{
    fn run(&self, args: &mut EventArgs<'_>) {
        self(args)
    }
}

/// Map of event kind to handler.
#[derive(Default, Clone)]
pub struct CallbackSet {
    map: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl CallbackSet {
    pub fn new() -> Self {
        CallbackSet::default()
    }

    pub fn set(&mut self, event: EventType, handler: Arc<dyn EventHandler>) {
        self.map.insert(event, handler);
    }

    pub fn remove(&mut self, event: EventType) {
        self.map.remove(&event);
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn get(&self, event: EventType) -> Option<Arc<dyn EventHandler>> {
        self.map.get(&event).cloned()
    }

    /// Run the handler for `event`; true when one was installed.
    pub fn process(&self, event: EventType, args: &mut EventArgs<'_>) -> bool {
        match self.map.get(&event) {
            Some(h) => {
                h.run(args);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CallbackSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSet").field("events", &self.map.keys().collect::<Vec<_>>()).finish()
    }
}

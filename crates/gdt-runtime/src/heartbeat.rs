//! Liveness probing over stateless heartbeat streams.
//!
//! A heartbeat task sends one probe per interval to a (type, id) target
//! and keeps at most one probe outstanding: the next slot opens only
//! when the previous probe was answered, missed or timed out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gdt_protocol::{Endpoint, SequenceFlag};

use crate::client::Client;
use crate::events::{EventArgs, EventHandler, EventType};

struct HeartbeatShared {
    client: Arc<Client>,
    target: Endpoint,
    interval_secs: u64,
    active: AtomicBool,
    next: AtomicBool,
    total_sent: AtomicU64,
    total_received: AtomicU64,
    received: AtomicU64,
    missed: AtomicU64,
    on_received: Option<Arc<dyn EventHandler>>,
    on_missed: Option<Arc<dyn EventHandler>>,
    on_cleanup: Option<Arc<dyn EventHandler>>,
}

/// Handle to a running heartbeat task.
pub struct Heartbeat {
    shared: Arc<HeartbeatShared>,
}

impl Heartbeat {
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::Release);
    }

    pub fn total_sent(&self) -> u64 {
        self.shared.total_sent.load(Ordering::Relaxed)
    }

    pub fn total_received(&self) -> u64 {
        self.shared.total_received.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.shared.received.load(Ordering::Relaxed)
    }

    pub fn missed(&self) -> u64 {
        self.shared.missed.load(Ordering::Relaxed)
    }
}

struct HbReceived {
    hi: Arc<HeartbeatShared>,
}

impl EventHandler for HbReceived {
    fn run(&self, args: &mut EventArgs<'_>) {
        self.hi.received.fetch_add(1, Ordering::Relaxed);
        self.hi.missed.store(0, Ordering::Relaxed);
        if let Some(h) = &self.hi.on_received {
            h.run(args);
        }
        self.hi.total_received.fetch_add(1, Ordering::Relaxed);
        self.hi.next.store(true, Ordering::Release);
    }
}

struct HbMissed {
    hi: Arc<HeartbeatShared>,
}

impl EventHandler for HbMissed {
    fn run(&self, args: &mut EventArgs<'_>) {
        self.hi.missed.fetch_add(1, Ordering::Relaxed);
        if let Some(h) = &self.hi.on_missed {
            h.run(args);
        }
        self.hi.total_received.fetch_add(1, Ordering::Relaxed);
        self.hi.next.store(true, Ordering::Release);
    }
}

struct HbSent {
    hi: Arc<HeartbeatShared>,
}

impl EventHandler for HbSent {
    fn run(&self, _args: &mut EventArgs<'_>) {
        self.hi.total_sent.fetch_add(1, Ordering::Relaxed);
    }
}

/// Start probing `(target_type, target_id)` every `interval` (minimum
/// one second) on the given client.
pub fn init_heartbeat(
    client: &Arc<Client>,
    target_type: &str,
    target_id: &str,
    interval: Duration,
    on_received: Option<Arc<dyn EventHandler>>,
    on_missed: Option<Arc<dyn EventHandler>>,
    on_cleanup: Option<Arc<dyn EventHandler>>,
) -> Heartbeat {
    let shared = Arc::new(HeartbeatShared {
        client: Arc::clone(client),
        target: Endpoint::with_id(target_type, target_id),
        interval_secs: interval.as_secs().max(1),
        active: AtomicBool::new(true),
        next: AtomicBool::new(true),
        total_sent: AtomicU64::new(0),
        total_received: AtomicU64::new(0),
        received: AtomicU64::new(0),
        missed: AtomicU64::new(0),
        on_received,
        on_missed,
        on_cleanup,
    });
    tokio::spawn(heartbeat_loop(Arc::clone(&shared)));
    Heartbeat { shared }
}

async fn heartbeat_loop(hi: Arc<HeartbeatShared>) {
    let received = Arc::new(HbReceived { hi: Arc::clone(&hi) });
    let missed = Arc::new(HbMissed { hi: Arc::clone(&hi) });
    let sent = Arc::new(HbSent { hi: Arc::clone(&hi) });

    let mut slept = 0u64;
    while hi.client.is_active() && hi.active.load(Ordering::Acquire) {
        tokio::time::sleep(Duration::from_secs(1)).await;
        slept += 1;
        if slept < hi.interval_secs {
            continue;
        }
        slept = 0;
        if !(hi.next.load(Ordering::Acquire) && hi.active.load(Ordering::Acquire)) {
            continue;
        }
        let uuid = match hi.client.new_stream(&hi.target.ty, hi.target.id.as_deref()) {
            Ok(u) => u,
            Err(_) => continue,
        };
        hi.next.store(false, Ordering::Release);
        hi.client.with_stream(&uuid, |stream| {
            stream.set_callback(EventType::HeartbeatMissed, Arc::clone(&missed) as _);
            stream.set_callback(EventType::HeartbeatReceived, Arc::clone(&received) as _);
            stream.set_callback(EventType::StreamTimeout, Arc::clone(&missed) as _);
            stream.set_callback(EventType::PayloadSent, Arc::clone(&sent) as _);
            stream.set_sequence_flag(Some(SequenceFlag::Heartbeat));
        });
        let _ = hi.client.send_stream(&uuid, false);
    }

    // drain the last outstanding probe before cleanup
    while !hi.next.load(Ordering::Acquire) {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    if let Some(h) = &hi.on_cleanup {
        let mut args = EventArgs::new();
        h.run(&mut args);
    }
}

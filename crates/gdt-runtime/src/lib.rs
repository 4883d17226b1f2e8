// gdt-runtime: session-oriented, multi-stream GDT runtime.
//
// A Session owns one daemon identity and a set of Clients, each of
// which wraps one transport association with three cooperating workers
// (ingress, egress, timeout), pooled buffers, a uuid-keyed stream table
// and per-direction statistics. The inbound state machine drives the
// per-stream sequence protocol and the routing layer forwards between
// clients on router daemons.

pub mod client;
pub mod events;
pub mod heartbeat;
pub mod pool;
pub mod registration;
pub mod routing;
pub mod session;
pub mod stats;
pub mod stream;
pub mod transport;

mod state;

pub use client::{Client, ClientConfig, Direction, GdtError};
pub use events::{CallbackSet, EventArgs, EventHandler, EventType};
pub use heartbeat::{init_heartbeat, Heartbeat};
pub use pool::{BufferPool, PoolExhausted, SlotPool};
pub use registration::register_client;
pub use routing::{FirstMatchRouting, RouteHandler, WrrRouting};
pub use session::{Session, SessionConfig};
pub use stats::{DirectionStats, StatsSnapshot};
pub use stream::{Initiator, Stream};
pub use transport::{TransportError, TransportEvent, MAX_SUB_STREAMS};

//! Per-exchange stream state.
//!
//! A stream is one logical exchange addressed by a 16-byte uuid: a
//! strictly ordered run of fragments where data and acknowledgement
//! alternate. Both sides advance their sequence number in lock-step,
//! tracked by the `reply_received` toggle.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use gdt_protocol::{Body, Endpoint, SequenceFlag};

use crate::events::{CallbackSet, EventArgs, EventHandler, EventType};
use crate::pool::SlotPermit;

/// Which side opened the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Local,
    Remote,
}

pub struct Stream {
    uuid: [u8; 16],
    pub dest: Endpoint,
    pub initiator: Initiator,
    sequence_num: u32,
    reply_received: bool,
    /// Outgoing flag for the next fragment; `None` until a handler (or
    /// the state machine) decides.
    flag: Option<SequenceFlag>,
    timestamp: Instant,
    timed_out: bool,
    /// Set while a payload belonging to this stream sits in an egress
    /// queue; such streams are not expired.
    pub(crate) out: Arc<AtomicBool>,
    params: HashMap<u32, Vec<u8>>,
    pub(crate) callbacks: CallbackSet,
    /// Body staged for the next outgoing fragment.
    pub out_body: Option<Body>,
    /// Bound stream-slot; returned to the pool when the stream goes.
    pub(crate) _slot: SlotPermit,
}

impl Stream {
    pub(crate) fn new(uuid: [u8; 16], dest: Endpoint, initiator: Initiator, slot: SlotPermit) -> Self {
        Stream {
            uuid,
            dest,
            initiator,
            sequence_num: 1,
            reply_received: false,
            flag: match initiator {
                Initiator::Local => Some(SequenceFlag::Start),
                Initiator::Remote => None,
            },
            timestamp: Instant::now(),
            timed_out: false,
            out: Arc::new(AtomicBool::new(false)),
            params: HashMap::new(),
            callbacks: CallbackSet::new(),
            out_body: None,
            _slot: slot,
        }
    }

    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    pub fn sequence_num(&self) -> u32 {
        self.sequence_num
    }

    pub(crate) fn inc_sequence_num(&mut self) {
        self.sequence_num = self.sequence_num.wrapping_add(1);
    }

    pub(crate) fn reply_received(&self) -> bool {
        self.reply_received
    }

    pub(crate) fn toggle_reply_received(&mut self) {
        self.reply_received = !self.reply_received;
    }

    pub fn sequence_flag(&self) -> Option<SequenceFlag> {
        self.flag
    }

    pub(crate) fn set_sequence_flag(&mut self, flag: Option<SequenceFlag>) {
        self.flag = flag;
    }

    /// Request another data fragment from this side.
    pub fn continue_sequence(&mut self) {
        self.flag = Some(SequenceFlag::Continue);
    }

    /// Yield the next fragment to the peer.
    pub fn wait_sequence(&mut self) {
        self.flag = Some(SequenceFlag::ContinueWait);
    }

    /// Close the stream after the current fragment.
    pub fn end_sequence(&mut self) {
        self.flag = Some(SequenceFlag::End);
    }

    pub fn touch(&mut self) {
        self.timestamp = Instant::now();
        self.timed_out = false;
    }

    pub(crate) fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub(crate) fn set_timed_out(&mut self) {
        self.timed_out = true;
    }

    /// True once the expiry scan marked this stream.
    pub fn is_expired(&self) -> bool {
        self.timed_out
    }

    pub fn set_param(&mut self, id: u32, value: Vec<u8>) {
        self.params.insert(id, value);
    }

    pub fn param(&self, id: u32) -> Option<&[u8]> {
        self.params.get(&id).map(|v| v.as_slice())
    }

    pub fn remove_param(&mut self, id: u32) -> Option<Vec<u8>> {
        self.params.remove(&id)
    }

    pub fn clear_params(&mut self) {
        self.params.clear();
    }

    pub fn set_callback(&mut self, event: EventType, handler: Arc<dyn EventHandler>) {
        self.callbacks.set(event, handler);
    }

    pub fn remove_callback(&mut self, event: EventType) {
        self.callbacks.remove(event);
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    pub fn callback(&self, event: EventType) -> Option<Arc<dyn EventHandler>> {
        self.callbacks.get(event)
    }

    pub(crate) fn callbacks(&self) -> CallbackSet {
        self.callbacks.clone()
    }

    /// Run the stream-level handler for `event`.
    ///
    /// The handler set is cloned out first so a handler may re-arm or
    /// clear the stream's callbacks from inside its own invocation.
    pub(crate) fn process_callback<'a>(
        &'a mut self,
        event: EventType,
        args: &mut EventArgs<'a>,
    ) -> bool {
        let cbs = self.callbacks.clone();
        args.stream = Some(self);
        let hit = cbs.process(event, args);
        args.stream = None;
        hit
    }

}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("uuid", &uuid::Uuid::from_bytes(self.uuid))
            .field("dest", &self.dest)
            .field("initiator", &self.initiator)
            .field("sequence_num", &self.sequence_num)
            .field("flag", &self.flag)
            .finish()
    }
}

/// Which side of a loopback pair acted last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkedSide {
    Primary,
    Partner,
}

/// Stream-table entry: the primary stream plus, during loopback, the
/// linked partner created when a locally initiated stream's uuid came
/// back on the same client.
pub(crate) struct StreamEntry {
    pub primary: Stream,
    pub partner: Option<Stream>,
    pub last_side: LinkedSide,
}

impl StreamEntry {
    pub fn new(primary: Stream) -> Self {
        StreamEntry { primary, partner: None, last_side: LinkedSide::Primary }
    }

    pub fn is_linked(&self) -> bool {
        self.partner.is_some()
    }

    /// Side that must process the next linked fragment: the opposite of
    /// the one that acted last. Updates the marker.
    pub fn alternate(&mut self) -> &mut Stream {
        match self.last_side {
            LinkedSide::Primary => {
                self.last_side = LinkedSide::Partner;
                self.partner.as_mut().unwrap_or(&mut self.primary)
            }
            LinkedSide::Partner => {
                self.last_side = LinkedSide::Primary;
                &mut self.primary
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotPool;

    fn stream() -> Stream {
        let pool = SlotPool::new(4);
        Stream::new(
            *uuid::Uuid::new_v4().as_bytes(),
            Endpoint::new("routingd"),
            Initiator::Local,
            pool.try_acquire().unwrap(),
        )
    }

    #[test]
    fn local_stream_starts_at_one_with_start_flag() {
        let s = stream();
        assert_eq!(s.sequence_num(), 1);
        assert_eq!(s.sequence_flag(), Some(SequenceFlag::Start));
    }

    #[test]
    fn sequence_ops_set_flags() {
        let mut s = stream();
        s.continue_sequence();
        assert_eq!(s.sequence_flag(), Some(SequenceFlag::Continue));
        s.wait_sequence();
        assert_eq!(s.sequence_flag(), Some(SequenceFlag::ContinueWait));
        s.end_sequence();
        assert_eq!(s.sequence_flag(), Some(SequenceFlag::End));
    }

    #[test]
    fn linked_sides_alternate_starting_with_partner_marker() {
        let pool = SlotPool::new(4);
        let mut entry = StreamEntry::new(stream());
        let mut partner = Stream::new(
            *entry.primary.uuid(),
            Endpoint::new("routingd"),
            Initiator::Remote,
            pool.try_acquire().unwrap(),
        );
        partner.inc_sequence_num();
        entry.partner = Some(partner);
        entry.last_side = LinkedSide::Partner;

        // first linked fragment goes to the primary side
        assert_eq!(entry.alternate().sequence_num(), 1);
        // then back to the partner
        assert_eq!(entry.alternate().sequence_num(), 2);
        assert_eq!(entry.alternate().sequence_num(), 1);
    }
}

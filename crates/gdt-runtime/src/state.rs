//! Inbound state machine.
//!
//! For every decoded datagram: version check, route computation, then
//! per-flag dispatch on the per-stream sequence protocol. Replies are
//! queued on the internal egress queue so they precede user payloads.
//!
//! Sequence lock-step: both sides advance their counter through the
//! `reply_received` toggle. A data fragment toggles it once before the
//! handler runs and once after the ACK is staged; the counter advances
//! only on a toggle that lands in the received state, which makes data
//! and acknowledgement alternate on each side.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use gdt_protocol::{
    decode, ErrorCode, GdtMessage, Header, HopInfo, SequenceFlag, Endpoint, MAX_HOPS,
};

use crate::client::{Client, Payload};
use crate::events::{CallbackSet, EventArgs, EventType};
use crate::session::Session;
use crate::stats;
use crate::stream::{Initiator, Stream, StreamEntry};

fn validate_seq(in_seq: u32, expected: u32) -> bool {
    in_seq == expected
}

/// Stage an internally generated message on the internal egress queue.
fn queue_internal_msg(
    client: &Arc<Client>,
    msg: &GdtMessage,
    sub_stream: u16,
    out_flag: Option<Arc<std::sync::atomic::AtomicBool>>,
    callbacks: CallbackSet,
) {
    let mut buf = match client.buf_pool.try_get() {
        Ok(b) => b,
        Err(_) => {
            stats::inc(&client.in_stats.strm_alloc_errors);
            return;
        }
    };
    let len = match gdt_protocol::encode(msg, &mut buf[..]) {
        Ok(n) => n,
        Err(e) => {
            debug!(client = client.id(), error = %e, "reply encode failed");
            stats::inc(&client.out_stats.socket_errors);
            return;
        }
    };
    if let Some(f) = &out_flag {
        f.store(true, Ordering::Release);
    }
    let payload = Payload { buf, len, sub_stream, out_flag, callbacks };
    if client.queue_internal(payload).is_err() {
        stats::inc(&client.out_stats.socket_errors);
    }
}

/// Error reply: echoes uuid and sequence number back toward the sender,
/// flag STREAM_COMPLETE unless a custom flag (heartbeat) applies.
fn generate_err(
    session: &Arc<Session>,
    in_msg: &GdtMessage,
    status: ErrorCode,
    custom_flag: Option<SequenceFlag>,
    custom_src: bool,
) -> GdtMessage {
    let ih = &in_msg.header;
    let source = if custom_src {
        Endpoint {
            ty: session.daemon_type().to_owned(),
            id: Some(session.daemon_id().to_owned()),
        }
    } else {
        Endpoint { ty: ih.destination.ty.clone(), id: Some(session.daemon_id().to_owned()) }
    };
    let mut h = Header::new(
        source,
        Endpoint { ty: ih.source.ty.clone(), id: ih.source.id.clone() },
        ih.uuid,
        custom_flag.unwrap_or(SequenceFlag::StreamComplete),
    );
    h.sequence_num = ih.sequence_num;
    h.status = Some(status);
    GdtMessage::new(h)
}

/// Acknowledgement / next-fragment message derived from stream state.
///
/// The outgoing flag comes from what the handler chose: START/CONTINUE
/// become CONTINUE, a wait becomes CONTINUE_WAIT, a heartbeat echoes
/// HEARTBEAT and everything else (including an explicit end) closes with
/// END. An `err_ok` status rides along only on the acknowledging side of
/// the toggle.
fn generate_ack(
    session: &Arc<Session>,
    in_msg: &GdtMessage,
    stream: &mut Stream,
    include_body: bool,
) -> GdtMessage {
    let ih = &in_msg.header;
    let source_ty = if ih.destination.ty == "." {
        session.daemon_type().to_owned()
    } else {
        ih.destination.ty.clone()
    };
    let mut h = Header::new(
        Endpoint { ty: source_ty, id: Some(session.daemon_id().to_owned()) },
        Endpoint { ty: ih.source.ty.clone(), id: ih.source.id.clone() },
        ih.uuid,
        match stream.sequence_flag() {
            Some(SequenceFlag::Start) | Some(SequenceFlag::Continue) => SequenceFlag::Continue,
            Some(SequenceFlag::ContinueWait) => SequenceFlag::ContinueWait,
            Some(SequenceFlag::Stateless) => SequenceFlag::End,
            Some(SequenceFlag::Heartbeat) => SequenceFlag::Heartbeat,
            _ => SequenceFlag::End,
        },
    );
    h.sequence_num = stream.sequence_num();
    if !stream.reply_received() {
        h.status = Some(ErrorCode::Ok);
    }
    let body = if include_body { stream.out_body.clone() } else { None };
    let msg = GdtMessage { header: h, body };
    if stream.sequence_flag() == Some(SequenceFlag::ContinueWait) {
        stream.inc_sequence_num();
    }
    msg
}

/// Final reply closing a stream from the receiving side; carries the
/// stream's current sequence number so a linked peer validates cleanly.
fn generate_stream_complete(in_msg: &GdtMessage, sequence_num: u32) -> GdtMessage {
    let ih = &in_msg.header;
    let mut h = Header::new(
        Endpoint { ty: ih.destination.ty.clone(), id: ih.destination.id.clone() },
        Endpoint { ty: ih.source.ty.clone(), id: ih.source.id.clone() },
        ih.uuid,
        SequenceFlag::StreamComplete,
    );
    h.sequence_num = sequence_num;
    h.status = Some(ErrorCode::Ok);
    GdtMessage::new(h)
}

/// Entry point for one inbound datagram.
pub(crate) fn process_frame(client: &Arc<Client>, sub_stream: u16, bytes: &[u8]) {
    let session = match client.session() {
        Some(s) => s,
        None => return,
    };

    let msg = match decode(bytes) {
        Ok(m) => m,
        Err(e) => {
            debug!(client = client.id(), error = %e, "malformed datagram");
            stats::inc(&client.in_stats.malformed);
            return;
        }
    };

    // custom error flag so a failed heartbeat still reaches the
    // requester's heartbeat slot
    let err_flag = if msg.header.sequence_flag == SequenceFlag::Heartbeat {
        Some(SequenceFlag::Heartbeat)
    } else {
        None
    };

    if msg.header.version != gdt_protocol::GDT_VERSION {
        let err = generate_err(&session, &msg, ErrorCode::UnsupportedVersion, None, false);
        queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        return;
    }

    // routing
    let routes = crate::routing::compute_routes(client, &session, &msg.header.destination);
    if routes.is_empty() {
        let err = generate_err(&session, &msg, ErrorCode::UnknownRoute, err_flag, true);
        queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        return;
    }

    let mut route_this = false;
    for route in routes {
        // forward when the route leads to another client, or back out of
        // this association when the sender addressed its own peer type
        if !Arc::ptr_eq(&route, client) || route.peer().ty == msg.header.destination.ty {
            forward(client, &session, &route, &msg, sub_stream, err_flag);
            route.dec_refc();
        } else {
            route_this = true;
        }
    }
    if !route_this {
        return;
    }

    let len = bytes.len() as u64;
    client.touch_rx();

    match msg.header.sequence_flag {
        SequenceFlag::Heartbeat => process_heartbeat(client, &session, &msg, sub_stream, len),
        SequenceFlag::Stateless => process_stateless(client, &session, &msg, sub_stream, len),
        SequenceFlag::StatelessNoReply => process_stateless_no_reply(client, &msg, len),
        SequenceFlag::Start => process_start(client, &session, &msg, sub_stream, len),
        SequenceFlag::Continue => process_continue_arrival(client, &session, &msg, sub_stream, len),
        SequenceFlag::ContinueWait => process_continue_wait(client, &session, &msg, sub_stream, len),
        SequenceFlag::End => process_end_arrival(client, &session, &msg, sub_stream, len),
        SequenceFlag::StreamComplete => process_stream_complete_arrival(client, &msg, len),
    }
}

fn forward(
    client: &Arc<Client>,
    session: &Arc<Session>,
    route: &Arc<Client>,
    msg: &GdtMessage,
    sub_stream: u16,
    err_flag: Option<SequenceFlag>,
) {
    let mut fwd = msg.clone();

    if route.is_router() {
        let hop = fwd.header.hop_info.get_or_insert(HopInfo { current: 0, max: MAX_HOPS });
        hop.current += 1;
        if hop.current > hop.max {
            let err = generate_err(session, msg, ErrorCode::MaxHopsExceeded, err_flag, true);
            queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
            return;
        }
    } else {
        // final destination: pin the concrete daemon id
        fwd.header.destination.id = route.peer().id;
    }

    let mut buf = match route.buf_pool.try_get() {
        Ok(b) => b,
        Err(_) => {
            stats::inc(&route.out_stats.strm_alloc_errors);
            return;
        }
    };
    let len = match gdt_protocol::encode(&fwd, &mut buf[..]) {
        Ok(n) => n,
        Err(_) => {
            stats::inc(&route.out_stats.socket_errors);
            return;
        }
    };
    let payload = Payload {
        buf,
        len,
        sub_stream,
        out_flag: None,
        callbacks: CallbackSet::new(),
    };
    if route.queue_external(payload).is_err() {
        stats::inc(&route.out_stats.socket_errors);
    }
}

fn process_heartbeat(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    let uuid = msg.header.uuid;
    if let Some(mut entry) = client.take_stream(&uuid) {
        // reply to an outstanding heartbeat probe
        let stream = &mut entry.primary;
        if validate_seq(msg.header.sequence_num, stream.sequence_num()) {
            stats::inc(&client.in_stats.streams);
            stats::add(&client.in_stats.stream_bytes, len);
            match msg.header.status {
                Some(ErrorCode::Ok) => {
                    client.fire_event(EventType::HeartbeatReceived);
                    let mut args = EventArgs::with_client(Arc::clone(client));
                    stream.process_callback(EventType::HeartbeatReceived, &mut args);
                }
                Some(_) => {
                    client.fire_event(EventType::HeartbeatMissed);
                    let mut args = EventArgs::with_client(Arc::clone(client));
                    stream.process_callback(EventType::HeartbeatMissed, &mut args);
                }
                None => {}
            }
        } else {
            stats::inc(&client.in_stats.stream_errors);
            client.fire_event(EventType::HeartbeatMissed);
            let mut args = EventArgs::with_client(Arc::clone(client));
            stream.process_callback(EventType::HeartbeatMissed, &mut args);
        }
        // entry drops here, releasing the slot
    } else if msg.header.status.is_none() {
        // heartbeat request from the peer: acknowledge
        let slot = match client.slot_pool.try_acquire() {
            Ok(s) => s,
            Err(_) => {
                stats::inc(&client.in_stats.strm_alloc_errors);
                return;
            }
        };
        let mut tmp = Stream::new(
            uuid,
            Endpoint { ty: msg.header.source.ty.clone(), id: msg.header.source.id.clone() },
            Initiator::Remote,
            slot,
        );
        tmp.set_sequence_flag(Some(SequenceFlag::Heartbeat));
        let ack = generate_ack(session, msg, &mut tmp, false);
        queue_internal_msg(client, &ack, sub_stream, None, CallbackSet::new());
    }
}

fn process_stateless(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    stats::inc(&client.in_stats.datagrams);
    stats::add(&client.in_stats.datagram_bytes, len);

    let status = if validate_seq(msg.header.sequence_num, 1) {
        ErrorCode::Ok
    } else {
        stats::inc(&client.in_stats.datagram_errors);
        ErrorCode::OutOfSequence
    };

    let err = generate_err(session, msg, status, None, false);

    let mut args = EventArgs::with_client(Arc::clone(client));
    args.in_msg = Some(msg);
    client.process_callback(EventType::Datagram, &mut args);

    queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
}

fn process_stateless_no_reply(client: &Arc<Client>, msg: &GdtMessage, len: u64) {
    stats::inc(&client.in_stats.datagrams);
    stats::add(&client.in_stats.datagram_bytes, len);

    let mut args = EventArgs::with_client(Arc::clone(client));
    args.in_msg = Some(msg);
    client.process_callback(EventType::Datagram, &mut args);
}

fn process_start(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    let uuid = msg.header.uuid;

    if !validate_seq(msg.header.sequence_num, 1) {
        stats::inc(&client.in_stats.stream_errors);
        let err = generate_err(session, msg, ErrorCode::OutOfSequence, None, false);
        queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        return;
    }

    let reply_dest = Endpoint { ty: msg.header.source.ty.clone(), id: msg.header.source.id.clone() };
    let mut loopback = false;

    let mut entry = match client.take_stream(&uuid) {
        Some(mut existing) => {
            // uuid collision: a locally initiated, unlinked stream whose
            // start came back on the same client is a loopback exchange
            if existing.partner.is_none() && existing.primary.initiator == Initiator::Local {
                let slot = match client.slot_pool.try_acquire() {
                    Ok(s) => s,
                    Err(_) => {
                        stats::inc(&client.in_stats.strm_alloc_errors);
                        client.put_stream(existing);
                        return;
                    }
                };
                let partner = Stream::new(uuid, reply_dest, Initiator::Remote, slot);
                existing.partner = Some(partner);
                existing.last_side = crate::stream::LinkedSide::Partner;
                loopback = true;
                stats::inc(&client.in_stats.strm_loopback);
                existing
            } else {
                // duplicate start from the remote end
                client.put_stream(existing);
                return;
            }
        }
        None => {
            let slot = match client.slot_pool.try_acquire() {
                Ok(s) => s,
                Err(_) => {
                    stats::inc(&client.in_stats.strm_alloc_errors);
                    return;
                }
            };
            StreamEntry::new(Stream::new(uuid, reply_dest, Initiator::Remote, slot))
        }
    };

    stats::inc(&client.in_stats.streams);
    stats::add(&client.in_stats.stream_bytes, len);

    {
        let stream =
            if loopback { entry.partner.as_mut().unwrap() } else { &mut entry.primary };
        stream.touch();
        stream.set_sequence_flag(None);

        let mut include_body = false;
        {
            // client-level handlers (registration responder) first, then
            // session-level ones (application glue); each selects on the
            // message body it understands
            let mut args = EventArgs::with_client(Arc::clone(client));
            args.in_msg = Some(msg);
            args.include_body = Some(&mut include_body);
            args.stream = Some(&mut *stream);
            client.process_callback(EventType::StreamNew, &mut args);
            session.process_callback(EventType::StreamNew, &mut args);
        }

        let ack = generate_ack(session, msg, stream, include_body);
        queue_internal_msg(
            client,
            &ack,
            sub_stream,
            Some(Arc::clone(&stream.out)),
            stream.callbacks(),
        );
        stream.toggle_reply_received();
        stream.inc_sequence_num();
    }

    client.put_stream(entry);
}

/// Shared CONTINUE processing for a chosen side of the exchange.
/// Returns true when the stream was removed (sequence error on an
/// unlinked stream).
fn process_sf_continue(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
    stream: &mut Stream,
    remove_on_error: bool,
) -> bool {
    if validate_seq(msg.header.sequence_num, stream.sequence_num()) {
        stats::add(&client.in_stats.stream_bytes, len);
        stream.touch();
        stream.toggle_reply_received();
        stream.set_sequence_flag(None);

        let mut include_body = false;
        {
            let mut args = EventArgs::with_client(Arc::clone(client));
            args.in_msg = Some(msg);
            args.include_body = Some(&mut include_body);
            stream.process_callback(EventType::StreamNext, &mut args);
        }

        if stream.reply_received() {
            stream.inc_sequence_num();
        }
        let ack = generate_ack(session, msg, stream, include_body);
        queue_internal_msg(
            client,
            &ack,
            sub_stream,
            Some(Arc::clone(&stream.out)),
            stream.callbacks(),
        );
        stream.toggle_reply_received();
        if stream.reply_received() {
            stream.inc_sequence_num();
        }
        false
    } else {
        stats::inc(&client.in_stats.stream_errors);
        let err = generate_err(session, msg, ErrorCode::OutOfSequence, None, false);
        queue_internal_msg(
            client,
            &err,
            sub_stream,
            if remove_on_error { None } else { Some(Arc::clone(&stream.out)) },
            CallbackSet::new(),
        );
        remove_on_error
    }
}

fn process_continue_arrival(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    match client.take_stream(&msg.header.uuid) {
        Some(mut entry) => {
            if entry.is_linked() {
                let side = entry.alternate();
                process_sf_continue(client, session, msg, sub_stream, len, side, false);
                client.put_stream(entry);
            } else {
                let removed =
                    process_sf_continue(client, session, msg, sub_stream, len, &mut entry.primary, true);
                if !removed {
                    client.put_stream(entry);
                }
            }
        }
        None => {
            stats::inc(&client.in_stats.stream_errors);
            let err = generate_err(session, msg, ErrorCode::UnknownSequence, None, false);
            queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        }
    }
}

fn process_continue_wait(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    match client.take_stream(&msg.header.uuid) {
        Some(mut entry) => {
            let stream = &mut entry.primary;
            if validate_seq(msg.header.sequence_num, stream.sequence_num()) {
                stats::add(&client.in_stats.stream_bytes, len);
                stream.touch();
                stream.set_sequence_flag(Some(SequenceFlag::ContinueWait));
                // the peer owes the next CONTINUE
                client.put_stream(entry);
            } else {
                stats::inc(&client.in_stats.stream_errors);
                let err = generate_err(session, msg, ErrorCode::OutOfSequence, None, false);
                queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
                // entry drops: stream removed
            }
        }
        None => {
            stats::inc(&client.in_stats.stream_errors);
            let err = generate_err(session, msg, ErrorCode::UnknownSequence, None, false);
            queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        }
    }
}

/// Shared END processing for a chosen side of the exchange.
fn process_sf_end(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
    stream: &mut Stream,
    remove_stream: bool,
) {
    if validate_seq(msg.header.sequence_num, stream.sequence_num()) {
        stats::add(&client.in_stats.stream_bytes, len);
        stream.touch();
        stream.set_sequence_flag(Some(SequenceFlag::End));
        stream.toggle_reply_received();

        {
            let mut args = EventArgs::with_client(Arc::clone(client));
            args.in_msg = Some(msg);
            stream.process_callback(EventType::StreamEnd, &mut args);
        }
        if stream.reply_received() {
            stream.inc_sequence_num();
        }

        let reply = generate_stream_complete(msg, stream.sequence_num());
        queue_internal_msg(
            client,
            &reply,
            sub_stream,
            if remove_stream { None } else { Some(Arc::clone(&stream.out)) },
            stream.callbacks(),
        );
    } else {
        stats::inc(&client.in_stats.stream_errors);
        let err = generate_err(session, msg, ErrorCode::OutOfSequence, None, false);
        queue_internal_msg(
            client,
            &err,
            sub_stream,
            if remove_stream { None } else { Some(Arc::clone(&stream.out)) },
            CallbackSet::new(),
        );
    }
}

fn process_end_arrival(
    client: &Arc<Client>,
    session: &Arc<Session>,
    msg: &GdtMessage,
    sub_stream: u16,
    len: u64,
) {
    match client.take_stream(&msg.header.uuid) {
        Some(mut entry) => {
            if entry.is_linked() {
                let side = entry.alternate();
                process_sf_end(client, session, msg, sub_stream, len, side, false);
                client.put_stream(entry);
            } else {
                process_sf_end(client, session, msg, sub_stream, len, &mut entry.primary, true);
                // entry drops: stream removed
            }
        }
        None => {
            stats::inc(&client.in_stats.stream_errors);
            let err = generate_err(session, msg, ErrorCode::UnknownSequence, None, false);
            queue_internal_msg(client, &err, sub_stream, None, CallbackSet::new());
        }
    }
}

fn process_stream_complete_arrival(client: &Arc<Client>, msg: &GdtMessage, len: u64) {
    if let Some(mut entry) = client.take_stream(&msg.header.uuid) {
        let process = |client: &Arc<Client>, stream: &mut Stream| {
            stream.touch();
            if validate_seq(msg.header.sequence_num, stream.sequence_num()) {
                stats::add(&client.in_stats.stream_bytes, len);
            } else {
                stats::inc(&client.in_stats.stream_errors);
            }
            let mut args = EventArgs::with_client(Arc::clone(client));
            args.in_msg = Some(msg);
            stream.process_callback(EventType::StreamEnd, &mut args);
        };
        if entry.is_linked() {
            let side = entry.alternate();
            process(client, side);
        } else {
            process(client, &mut entry.primary);
        }
        // both sides end together; entry drop releases the slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotPool;
    use crate::session::SessionConfig;

    fn session() -> Arc<Session> {
        Session::new(SessionConfig::new("configd", "cfg1"))
    }

    fn inbound(flag: SequenceFlag) -> GdtMessage {
        let mut h = Header::new(
            Endpoint::with_id("cli", "u1"),
            Endpoint::with_id("configd", "cfg1"),
            [7u8; 16],
            flag,
        );
        h.sequence_num = 4;
        GdtMessage::new(h)
    }

    fn stream(flag: Option<SequenceFlag>) -> Stream {
        let pool = SlotPool::new(2);
        let mut s = Stream::new(
            [7u8; 16],
            Endpoint::with_id("cli", "u1"),
            Initiator::Remote,
            pool.try_acquire().unwrap(),
        );
        s.set_sequence_flag(flag);
        s
    }

    #[test]
    fn ack_flag_follows_handler_choice() {
        let session = session();
        let msg = inbound(SequenceFlag::Continue);
        for (set, expect) in [
            (Some(SequenceFlag::Start), SequenceFlag::Continue),
            (Some(SequenceFlag::Continue), SequenceFlag::Continue),
            (Some(SequenceFlag::ContinueWait), SequenceFlag::ContinueWait),
            (Some(SequenceFlag::Stateless), SequenceFlag::End),
            (Some(SequenceFlag::Heartbeat), SequenceFlag::Heartbeat),
            (Some(SequenceFlag::End), SequenceFlag::End),
            (None, SequenceFlag::End),
        ] {
            let mut s = stream(set);
            let ack = generate_ack(&session, &msg, &mut s, false);
            assert_eq!(ack.header.sequence_flag, expect, "for {set:?}");
        }
    }

    #[test]
    fn ack_reverses_endpoints_and_carries_ok_before_toggle() {
        let session = session();
        let msg = inbound(SequenceFlag::Start);
        let mut s = stream(Some(SequenceFlag::Start));
        let ack = generate_ack(&session, &msg, &mut s, false);
        assert_eq!(ack.header.destination.ty, "cli");
        assert_eq!(ack.header.destination.id.as_deref(), Some("u1"));
        assert_eq!(ack.header.source.ty, "configd");
        assert_eq!(ack.header.status, Some(ErrorCode::Ok));
        assert_eq!(ack.header.uuid, [7u8; 16]);

        s.toggle_reply_received();
        let ack = generate_ack(&session, &msg, &mut s, false);
        assert_eq!(ack.header.status, None);
    }

    #[test]
    fn continue_wait_ack_advances_the_counter() {
        let session = session();
        let msg = inbound(SequenceFlag::Continue);
        let mut s = stream(Some(SequenceFlag::ContinueWait));
        assert_eq!(s.sequence_num(), 1);
        let _ack = generate_ack(&session, &msg, &mut s, false);
        assert_eq!(s.sequence_num(), 2);
    }

    #[test]
    fn err_echoes_sequence_and_maps_heartbeat_flag() {
        let session = session();
        let msg = inbound(SequenceFlag::Heartbeat);
        let err = generate_err(
            &session,
            &msg,
            ErrorCode::UnknownRoute,
            Some(SequenceFlag::Heartbeat),
            true,
        );
        assert_eq!(err.header.sequence_num, 4);
        assert_eq!(err.header.sequence_flag, SequenceFlag::Heartbeat);
        assert_eq!(err.header.status, Some(ErrorCode::UnknownRoute));
        assert_eq!(err.header.source.ty, "configd");

        let err = generate_err(&session, &msg, ErrorCode::OutOfSequence, None, false);
        assert_eq!(err.header.sequence_flag, SequenceFlag::StreamComplete);
    }
}

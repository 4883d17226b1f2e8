// Per-stream sequence protocol, driven fragment by fragment by a raw
// peer: the happy START → CONTINUE → END → STREAM_COMPLETE run and the
// out-of-sequence and unknown-sequence error paths.

use std::sync::Arc;
use std::time::Duration;

use gdt_protocol::{Endpoint, ErrorCode, SequenceFlag};
use gdt_runtime::{EventArgs, EventHandler, EventType, Session};
use gdt_test_utils::{init_tracing, raw::RawPeer, test_session, wait_for};

/// Server-side handler keeping inbound streams open until the peer
/// ends them.
struct KeepOpen;

impl EventHandler for KeepOpen {
    fn run(&self, args: &mut EventArgs<'_>) {
        if let Some(stream) = &mut args.stream {
            stream.set_callback(
                EventType::StreamNext,
                Arc::new(|a: &mut EventArgs<'_>| {
                    if let Some(s) = &mut a.stream {
                        s.continue_sequence();
                    }
                }),
            );
            stream.continue_sequence();
        }
    }
}

async fn start_peer(daemon_id: &str) -> (std::sync::Arc<Session>, std::net::SocketAddr) {
    let session = Session::new(test_session("B", daemon_id));
    session.set_callback(EventType::StreamNew, Arc::new(KeepOpen));
    let addr = session.start_server("127.0.0.1:0".parse().unwrap()).await.unwrap();
    (session, addr)
}

#[tokio::test]
async fn ordered_fragments_run_to_stream_complete() {
    init_tracing();
    let (session, addr) = start_peer("b1").await;
    let mut peer = RawPeer::connect(addr, "X", "x1").await;
    let dest = Endpoint::with_id("B", "b1");
    let uuid = *uuid::Uuid::new_v4().as_bytes();

    // START seq=1 -> CONTINUE ack seq=1, err_ok
    peer.send(&peer.message(dest.clone(), uuid, 1, SequenceFlag::Start, None)).await;
    let ack = peer.recv().await;
    assert_eq!(ack.header.sequence_flag, SequenceFlag::Continue);
    assert_eq!(ack.header.sequence_num, 1);
    assert_eq!(ack.header.status, Some(ErrorCode::Ok));

    // CONTINUE seq=2 -> CONTINUE ack seq=2
    peer.send(&peer.message(dest.clone(), uuid, 2, SequenceFlag::Continue, None)).await;
    let ack = peer.recv().await;
    assert_eq!(ack.header.sequence_flag, SequenceFlag::Continue);
    assert_eq!(ack.header.sequence_num, 2);

    // END seq=3 -> STREAM_COMPLETE seq=3
    peer.send(&peer.message(dest.clone(), uuid, 3, SequenceFlag::End, None)).await;
    let fin = peer.recv().await;
    assert_eq!(fin.header.sequence_flag, SequenceFlag::StreamComplete);
    assert_eq!(fin.header.sequence_num, 3);

    // server side forgot the stream
    let clients = session.clients();
    assert!(
        wait_for(|| clients.iter().all(|c| c.stream_count() == 0), Duration::from_secs(2)).await
    );
}

#[tokio::test]
async fn reordered_fragment_is_rejected_and_stream_removed() {
    init_tracing();
    let (session, addr) = start_peer("b2").await;
    let mut peer = RawPeer::connect(addr, "X", "x2").await;
    let dest = Endpoint::with_id("B", "b2");
    let uuid = *uuid::Uuid::new_v4().as_bytes();

    peer.send(&peer.message(dest.clone(), uuid, 1, SequenceFlag::Start, None)).await;
    let _ack = peer.recv().await;

    // expected seq is 2; send 5
    peer.send(&peer.message(dest.clone(), uuid, 5, SequenceFlag::Continue, None)).await;
    let err = peer.recv().await;
    assert_eq!(err.header.status, Some(ErrorCode::OutOfSequence));

    // the stream is gone: the correct fragment now reports unknown
    peer.send(&peer.message(dest.clone(), uuid, 2, SequenceFlag::Continue, None)).await;
    let err = peer.recv().await;
    assert_eq!(err.header.status, Some(ErrorCode::UnknownSequence));

    let clients = session.clients();
    assert!(clients.iter().any(|c| c.in_stats.snapshot().stream_errors >= 2));
}

#[tokio::test]
async fn start_must_begin_at_sequence_one() {
    init_tracing();
    let (_session, addr) = start_peer("b3").await;
    let mut peer = RawPeer::connect(addr, "X", "x3").await;
    let dest = Endpoint::with_id("B", "b3");
    let uuid = *uuid::Uuid::new_v4().as_bytes();

    peer.send(&peer.message(dest, uuid, 7, SequenceFlag::Start, None)).await;
    let err = peer.recv().await;
    assert_eq!(err.header.status, Some(ErrorCode::OutOfSequence));
    assert_eq!(err.header.sequence_flag, SequenceFlag::StreamComplete);
}

// Leaf-to-leaf stateless datagrams through a router: one forward per
// datagram, an err-ok acknowledgement back to the sender, and an empty
// stream table once the reply lands.

use std::time::Duration;

use gdt_protocol::{payload_type, Body, DataMessage, ErrorCode};
use gdt_runtime::EventType;
use gdt_test_utils::{connect_leaf, init_tracing, start_router, wait_for, Recorder};

#[tokio::test]
async fn stateless_datagram_routes_once_and_acks() {
    init_tracing();
    let (_router, addr) = start_router("r1").await;
    let (_a_session, a) = connect_leaf("A", "a1", addr).await;
    let (_b_session, b) = connect_leaf("B", "b1", addr).await;

    let (dgram_rec, dgram_hits) = Recorder::new();
    b.set_callback(EventType::Datagram, dgram_rec);

    let (reply_rec, reply_hits) = Recorder::new();
    a.send_datagram(
        Body::Data(DataMessage::new(payload_type::GDT, b"ping")),
        None,
        Some(reply_rec),
        "B",
        Some("b1"),
    )
    .unwrap();

    assert!(
        wait_for(|| dgram_hits.lock().unwrap().len() == 1, Duration::from_secs(5)).await,
        "datagram did not reach B"
    );
    assert!(
        wait_for(|| reply_hits.lock().unwrap().len() == 1, Duration::from_secs(5)).await,
        "reply did not reach A"
    );

    let reply = reply_hits.lock().unwrap()[0].clone().expect("reply message");
    assert_eq!(reply.header.status, Some(ErrorCode::Ok));

    assert!(wait_for(|| a.stream_count() == 0, Duration::from_secs(2)).await);

    // exactly one forward: no duplicate deliveries show up later
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dgram_hits.lock().unwrap().len(), 1);
    assert_eq!(b.in_stats.snapshot().datagrams, 1);
}

#[tokio::test]
async fn unknown_destination_returns_unknown_route() {
    init_tracing();
    let (_router, addr) = start_router("r2").await;
    let (_a_session, a) = connect_leaf("A", "a2", addr).await;

    let (reply_rec, reply_hits) = Recorder::new();
    a.send_datagram(
        Body::Data(DataMessage::new(payload_type::GDT, b"anyone there")),
        None,
        Some(reply_rec),
        "nosuchd",
        Some("x1"),
    )
    .unwrap();

    assert!(wait_for(|| reply_hits.lock().unwrap().len() == 1, Duration::from_secs(5)).await);
    let reply = reply_hits.lock().unwrap()[0].clone().expect("reply message");
    assert_eq!(reply.header.status, Some(ErrorCode::UnknownRoute));
}

#[tokio::test]
async fn wildcard_destination_fans_out_no_reply_datagrams() {
    init_tracing();
    let (_router, addr) = start_router("r3").await;
    let (_a_session, a) = connect_leaf("A", "a3", addr).await;
    let (_b1_session, b1) = connect_leaf("B", "b1", addr).await;
    let (_b2_session, b2) = connect_leaf("B", "b2", addr).await;

    let (rec1, hits1) = Recorder::new();
    b1.set_callback(EventType::Datagram, rec1);
    let (rec2, hits2) = Recorder::new();
    b2.set_callback(EventType::Datagram, rec2);

    a.send_datagram(
        Body::Data(DataMessage::new(payload_type::GDT, b"to-all")),
        None,
        None,
        "B",
        Some("*"),
    )
    .unwrap();

    assert!(wait_for(|| hits1.lock().unwrap().len() == 1, Duration::from_secs(5)).await);
    assert!(wait_for(|| hits2.lock().unwrap().len() == 1, Duration::from_secs(5)).await);
}

// Pool behavior under pressure: transmitted buffers recycle to their pool,
// stream slots bound concurrency, and exhaustion surfaces as an error
// instead of blocking.

use std::time::Duration;

use gdt_protocol::{payload_type, Body, DataMessage};
use gdt_runtime::{GdtError, Session};
use gdt_test_utils::{init_tracing, start_router, test_session, wait_for};

#[tokio::test]
async fn buffers_recycle_across_many_datagrams() {
    init_tracing();
    let (_router, addr) = start_router("r1").await;

    let session = Session::new(test_session("A", "a1").max_concurrent_streams(4));
    let a = session.connect(addr, false).await.unwrap();

    // far more sends than pool capacity: the egress worker returns each
    // buffer after transmission, so the burst eventually goes through
    let mut sent = 0u32;
    while sent < 50 {
        let body = Body::Data(DataMessage::new(payload_type::GDT, &sent.to_be_bytes()));
        match a.send_datagram(body, None, None, "routingd", Some("r1")) {
            Ok(()) => sent += 1,
            // pool momentarily dry: the egress worker has not returned
            // the in-flight buffers yet
            Err(GdtError::Pool(_)) | Err(GdtError::QueueFull) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(e) => panic!("unexpected send error: {e}"),
        }
    }
    assert!(wait_for(|| a.out_stats.snapshot().packets >= 50, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn stream_slots_are_bounded_and_recovered() {
    init_tracing();
    let (_router, addr) = start_router("r2").await;

    let session = Session::new(test_session("A", "a2").max_concurrent_streams(4));
    let a = session.connect(addr, false).await.unwrap();

    let mut uuids = Vec::new();
    for _ in 0..4 {
        uuids.push(a.new_stream("B", None).unwrap());
    }
    assert!(matches!(a.new_stream("B", None), Err(GdtError::Pool(_))));
    assert_eq!(a.out_stats.snapshot().strm_alloc_errors, 1);

    // releasing one slot makes allocation work again
    let first = uuids.remove(0);
    assert!(a.close_stream(&first));
    assert!(a.new_stream("B", None).is_ok());
}

#[tokio::test]
async fn oversized_message_fails_encode_without_blocking() {
    init_tracing();
    let (_router, addr) = start_router("r3").await;
    let (_a_session, a) = gdt_test_utils::connect_leaf("A", "a3", addr).await;

    // default buffer B is 8 KiB; a larger payload must be rejected
    let big = vec![0u8; 16 * 1024];
    let res = a.send_datagram(
        Body::Data(DataMessage::new(payload_type::GDT, &big)),
        None,
        None,
        "routingd",
        Some("r3"),
    );
    assert!(matches!(res, Err(GdtError::Codec(_))));
}

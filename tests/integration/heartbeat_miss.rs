// Heartbeat liveness probes: answered probes count received, an
// unroutable target counts missed, and a registered-but-silent peer is
// missed through the stream timeout.

use std::time::Duration;

use gdt_runtime::init_heartbeat;
use gdt_test_utils::{connect_leaf, init_tracing, raw::RawPeer, start_router, wait_for};

#[tokio::test]
async fn answered_heartbeat_counts_received() {
    init_tracing();
    let (_router, addr) = start_router("r1").await;
    let (_a_session, a) = connect_leaf("A", "a1", addr).await;

    let hb = init_heartbeat(&a, "routingd", "r1", Duration::from_secs(1), None, None, None);

    assert!(wait_for(|| hb.received() >= 1, Duration::from_secs(6)).await, "no heartbeat reply");
    assert_eq!(hb.missed(), 0);
    assert!(hb.total_sent() >= 1);
    hb.stop();
}

#[tokio::test]
async fn unroutable_target_counts_missed() {
    init_tracing();
    let (_router, addr) = start_router("r2").await;
    let (_a_session, a) = connect_leaf("A", "a2", addr).await;

    let hb = init_heartbeat(&a, "ghostd", "g1", Duration::from_secs(1), None, None, None);

    assert!(wait_for(|| hb.missed() >= 1, Duration::from_secs(6)).await, "missed never fired");
    assert_eq!(hb.received(), 0);
    hb.stop();
}

#[tokio::test]
async fn silent_peer_is_missed_after_stream_timeout() {
    init_tracing();
    let (_router, addr) = start_router("r3").await;
    let (_a_session, a) = connect_leaf("A", "a3", addr).await;

    // a peer that registers as (B, b1) and then never answers anything
    let mut silent = RawPeer::connect(addr, "B", "b1").await;
    silent.register(".").await;

    let hb = init_heartbeat(&a, "B", "b1", Duration::from_secs(1), None, None, None);

    // stream timeout is 2 s in the test harness
    assert!(
        wait_for(|| hb.missed() >= 1, Duration::from_secs(10)).await,
        "timeout never surfaced as a miss"
    );
    assert_eq!(hb.received(), 0);
    assert!(a.out_stats.snapshot().strm_timeout >= 1);
    hb.stop();
}

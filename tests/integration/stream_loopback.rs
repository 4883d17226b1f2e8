// A client addressing its own daemon type through a router gets its
// START back on the same association; the ingress side links a REMOTE
// partner under the same uuid and both sides end together.

use std::sync::Arc;
use std::time::Duration;

use gdt_runtime::{EventArgs, EventHandler, EventType};
use gdt_test_utils::{connect_leaf, init_tracing, start_router, wait_for, Recorder};

/// Answer the looped-back START by ending the exchange immediately.
struct EndIncoming;

impl EventHandler for EndIncoming {
    fn run(&self, args: &mut EventArgs<'_>) {
        if let Some(stream) = &mut args.stream {
            stream.end_sequence();
        }
    }
}

#[tokio::test]
async fn loopback_links_partner_and_ends_both_sides() {
    init_tracing();
    let (_router, addr) = start_router("r1").await;
    let (c_session, c) = connect_leaf("C", "c1", addr).await;

    c_session.set_callback(EventType::StreamNew, Arc::new(EndIncoming));

    let (end_rec, end_hits) = Recorder::new();
    let uuid = c.new_stream("C", None).unwrap();
    c.with_stream(&uuid, |stream| {
        stream.set_callback(EventType::StreamEnd, end_rec);
    });
    c.send_stream(&uuid, false).unwrap();

    // the initiator side observes its own exchange ending
    assert!(
        wait_for(|| !end_hits.lock().unwrap().is_empty(), Duration::from_secs(5)).await,
        "initiator stream never ended"
    );
    assert!(wait_for(|| c.stream_count() == 0, Duration::from_secs(5)).await);
    assert_eq!(c.in_stats.snapshot().strm_loopback, 1);
}

#[tokio::test]
async fn consecutive_loopback_exchanges_each_link_once() {
    init_tracing();
    let (_router, addr) = start_router("r2").await;
    let (c_session, c) = connect_leaf("C", "c2", addr).await;

    c_session.set_callback(EventType::StreamNew, Arc::new(EndIncoming));

    for round in 1..=2u64 {
        let uuid = c.new_stream("C", None).unwrap();
        c.send_stream(&uuid, false).unwrap();
        assert!(wait_for(|| c.stream_count() == 0, Duration::from_secs(5)).await);
        assert_eq!(c.in_stats.snapshot().strm_loopback, round);
    }
}

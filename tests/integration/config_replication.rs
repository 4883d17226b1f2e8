// Replication fan-out between config daemons: destructive lines and
// commits reach every peer in the cfg_daemons list as CFG_REPLICATE
// streams and are applied there silently — an inbound replicate is
// never forwarded again, so full-mesh peer lists cannot loop.

use std::time::Duration;

use gdt_config::{ConfigRpc, NodeState};
use gdt_protocol::{params, ConfigAction, GdtMessage};
use gdt_runtime::{EventType, Session};
use gdt_test_utils::{
    cfg_set_line, connect_leaf, init_tracing, sample_config, start_config_daemon, start_router,
    test_session, wait_for, Hits, Recorder,
};

fn replicate_lines(hits: &Hits) -> Vec<String> {
    hits.lock()
        .unwrap()
        .iter()
        .filter_map(|m| m.as_ref())
        .filter_map(GdtMessage::config)
        .filter(|c| c.action == ConfigAction::CfgReplicate)
        .filter_map(|c| c.params.str_value(params::CONFIG_REPLICATION_LINE))
        .map(str::to_owned)
        .collect()
}

#[tokio::test]
async fn destructive_line_replicates_and_applies_on_peer() {
    init_tracing();
    let (_router, router_addr) = start_router("r1").await;

    // daemon A serves the CLI and replicates toward cfgb
    let log_a = tempfile::tempdir().unwrap();
    let (session_a, rpc_a, addr_a) = start_config_daemon("cfga", log_a.path()).await;
    let uplink_a = session_a.connect(router_addr, false).await.unwrap();
    rpc_a.set_cfg_daemons(vec!["cfgb".to_owned()]);

    // daemon B mirrors the definition; its own peer list points back at
    // cfga, which would loop if inbound replicates were re-forwarded
    let log_b = tempfile::tempdir().unwrap();
    let session_b = Session::new(test_session("configd", "cfgb"));
    let rpc_b = ConfigRpc::new(sample_config(log_b.path()));
    rpc_b.attach(&session_b);
    let uplink_b = session_b.connect(router_addr, false).await.unwrap();
    rpc_b.set_cfg_daemons(vec!["cfga".to_owned()]);

    // watch inbound streams on both uplinks
    let (rec_b, hits_b) = Recorder::new();
    uplink_b.set_callback(EventType::StreamNew, rec_b);
    let (rec_a, hits_a) = Recorder::new();
    uplink_a.set_callback(EventType::StreamNew, rec_a);

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr_a).await;

    // the destructive SET replicates its completed line to cfgb
    let resp = cfg_set_line(&u1, "u1", "set system hostname repl-name").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    assert!(
        wait_for(
            || replicate_lines(&hits_b)
                .iter()
                .any(|l| l == "set system hostname repl-name"),
            Duration::from_secs(5)
        )
        .await,
        "replicate stream never reached cfgb: {:?}",
        replicate_lines(&hits_b)
    );
    assert!(
        wait_for(
            || {
                let cfg = rpc_b.config();
                let root = cfg.tree.root();
                cfg.tree
                    .lookup(root, "system hostname")
                    .map(|h| cfg.tree.node(h).new_value == "repl-name")
                    .unwrap_or(false)
            },
            Duration::from_secs(5)
        )
        .await,
        "replicated line was not applied on cfgb"
    );

    // committing on A replicates the commit line; B commits as well
    let resp = cfg_set_line(&u1, "u1", "commit description sync").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    assert!(
        wait_for(
            || {
                let cfg = rpc_b.config();
                let root = cfg.tree.root();
                cfg.tree
                    .lookup(root, "system hostname")
                    .map(|h| cfg.tree.node(h).value == "repl-name")
                    .unwrap_or(false)
            },
            Duration::from_secs(5)
        )
        .await,
        "commit did not propagate to cfgb"
    );
    assert!(!rpc_b.config().transaction_started());

    // cfgb applied everything silently: nothing came back toward cfga
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(
        replicate_lines(&hits_a).is_empty(),
        "inbound replicate was re-forwarded: {:?}",
        replicate_lines(&hits_a)
    );
}

#[tokio::test]
async fn delete_line_replicates_to_peer() {
    init_tracing();
    let (_router, router_addr) = start_router("r2").await;

    let log_a = tempfile::tempdir().unwrap();
    let (session_a, rpc_a, addr_a) = start_config_daemon("cfga", log_a.path()).await;
    let _uplink_a = session_a.connect(router_addr, false).await.unwrap();
    rpc_a.set_cfg_daemons(vec!["cfgb".to_owned()]);

    let log_b = tempfile::tempdir().unwrap();
    let session_b = Session::new(test_session("configd", "cfgb"));
    let rpc_b = ConfigRpc::new(sample_config(log_b.path()));
    rpc_b.attach(&session_b);
    let _uplink_b = session_b.connect(router_addr, false).await.unwrap();

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr_a).await;

    // establish a committed value on both daemons
    cfg_set_line(&u1, "u1", "set system hostname doomed").await.unwrap();
    cfg_set_line(&u1, "u1", "commit").await.unwrap();
    assert!(
        wait_for(
            || {
                let cfg = rpc_b.config();
                let root = cfg.tree.root();
                cfg.tree
                    .lookup(root, "system hostname")
                    .map(|h| cfg.tree.node(h).value == "doomed")
                    .unwrap_or(false)
            },
            Duration::from_secs(5)
        )
        .await
    );

    // the delete reaches cfgb and stages there
    let resp = cfg_set_line(&u1, "u1", "delete system hostname").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    assert!(
        wait_for(
            || {
                let cfg = rpc_b.config();
                let root = cfg.tree.root();
                cfg.tree
                    .lookup(root, "system hostname")
                    .map(|h| cfg.tree.node(h).state == NodeState::Deleted)
                    .unwrap_or(false)
            },
            Duration::from_secs(5)
        )
        .await,
        "delete was not staged on cfgb"
    );
}

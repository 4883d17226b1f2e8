// Transaction ownership: the first destructive SET takes the
// transaction; other users are restricted to pretend mode until the
// owner commits, discards or logs out.

use std::time::Duration;

use gdt_config::UserId;
use gdt_protocol::{params, ConfigAction};
use gdt_test_utils::{
    cfg_request, cfg_set_line, connect_leaf, init_tracing, start_config_daemon, wait_for,
};

#[tokio::test]
async fn transaction_blocks_second_user_until_commit() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, rpc, addr) = start_config_daemon("cfg1", log_dir.path()).await;

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;
    let (_u2_session, u2) = connect_leaf("cli", "u2", addr).await;

    // u1 stages a change and takes the transaction
    let resp = cfg_set_line(&u1, "u1", "set system hostname node-a").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());
    {
        let cfg = rpc.config();
        assert!(cfg.transaction_started());
        assert_eq!(cfg.transaction_owner(), Some(&UserId("u1".to_owned())));
    }

    // u2 is shut out with the transaction error and stages nothing
    let resp = cfg_set_line(&u2, "u2", "set system hostname node-b").await.unwrap();
    assert!(
        resp.error_lines().iter().any(|e| e.contains("Transaction started by other user")),
        "{:?}",
        resp.error_lines()
    );
    {
        let cfg = rpc.config();
        let root = cfg.tree.root();
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).new_value, "node-a");
    }

    // the owner commits; the transaction clears
    let resp = cfg_set_line(&u1, "u1", "commit description baseline").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());
    {
        let cfg = rpc.config();
        let root = cfg.tree.root();
        assert!(!cfg.transaction_started());
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "node-a");
    }

    // u2's next attempt goes through
    let resp = cfg_set_line(&u2, "u2", "set system hostname node-b").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());
    {
        let cfg = rpc.config();
        let root = cfg.tree.root();
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).new_value, "node-b");
        assert_eq!(cfg.transaction_owner(), Some(&UserId("u2".to_owned())));
    }
}

#[tokio::test]
async fn logout_of_owner_discards_and_frees_transaction() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, rpc, addr) = start_config_daemon("cfg2", log_dir.path()).await;

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    cfg_request(&u1, "u1", ConfigAction::UserLogin, &[]).await.unwrap();
    cfg_set_line(&u1, "u1", "set system hostname throwaway").await.unwrap();
    assert!(rpc.config().transaction_started());

    cfg_request(&u1, "u1", ConfigAction::UserLogout, &[]).await.unwrap();

    assert!(
        wait_for(
            || {
                let cfg = rpc.config();
                !cfg.transaction_started() && cfg.user_count() == 0
            },
            Duration::from_secs(3)
        )
        .await
    );
    let cfg = rpc.config();
    let root = cfg.tree.root();
    let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
    assert_eq!(cfg.tree.node(hostname).new_value, "");
    assert_eq!(cfg.tree.node(hostname).state, gdt_config::NodeState::Ready);
}

#[tokio::test]
async fn discard_command_reverts_and_ends_transaction() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, rpc, addr) = start_config_daemon("cfg3", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    cfg_set_line(&u1, "u1", "set system hostname ephemeral").await.unwrap();
    assert!(rpc.config().transaction_started());

    let resp = cfg_set_line(&u1, "u1", "discard").await.unwrap();
    assert!(resp.error_lines().is_empty());

    let cfg = rpc.config();
    let root = cfg.tree.root();
    assert!(!cfg.transaction_started());
    let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
    assert_eq!(cfg.tree.node(hostname).new_value, "");

    // a GET-style check that nothing is pending
    assert!(!cfg.tree.is_modified(root));
}

#[tokio::test]
async fn unused_param_catalog_entries_are_ignored() {
    // unknown parameters in a request must not derail dispatch
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg4", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    let resp = cfg_request(
        &u1,
        "u1",
        ConfigAction::CfgSet,
        &[
            (params::CONFIG_AC_LINE, b"set system hostname ok"),
            (params::STATS_ID, b"unrelated"),
        ],
    )
    .await
    .unwrap();
    assert!(resp.error_lines().is_empty());
}

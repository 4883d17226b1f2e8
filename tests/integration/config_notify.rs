// Auto-complete responses, GET streaming and commit notifications
// pushed to subscribed peers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gdt_config::{CfgUpdateListener, ConfigRpc, FlatChange};
use gdt_protocol::{params, ConfigAction};
use gdt_test_utils::{
    cfg_request, cfg_set_line, connect_leaf, init_tracing, sample_config, start_config_daemon,
    wait_for,
};

#[tokio::test]
async fn tab_response_carries_completed_line_and_items() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg1", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    let resp = cfg_request(
        &u1,
        "u1",
        ConfigAction::CfgAc,
        &[(params::CONFIG_AC_LINE, b"set sys")],
    )
    .await
    .unwrap();

    assert_eq!(resp.param_str(params::CONFIG_AC_LINE), Some("set system"));
    let names = resp.all_param_strs(params::CONFIG_CFG_ITEM_NAME);
    assert!(names.contains(&"hostname".to_owned()), "{names:?}");
    assert!(names.contains(&"location".to_owned()), "{names:?}");
}

#[tokio::test]
async fn invalid_line_streams_error_fragments() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg2", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    let resp = cfg_set_line(&u1, "u1", "set bogus x").await.unwrap();
    assert!(
        resp.error_lines().iter().any(|e| e.contains("Unknown item or command")),
        "{:?}",
        resp.error_lines()
    );
}

#[tokio::test]
async fn get_streams_flattened_subtree() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg3", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    cfg_set_line(&u1, "u1", "set system hostname node-1").await.unwrap();
    cfg_set_line(&u1, "u1", "commit").await.unwrap();

    let resp = cfg_request(
        &u1,
        "u1",
        ConfigAction::CfgGet,
        &[(params::CONFIG_CFG_ITEM_PATH, b"system")],
    )
    .await
    .unwrap();

    let count = resp
        .fragments
        .iter()
        .find_map(|f| f.params.u32_value(params::CONFIG_CFG_ITEM_COUNT))
        .expect("item count");
    assert!(count >= 3, "system block plus its items, got {count}");

    let paths = resp.all_param_strs(params::CONFIG_CFG_ITEM_PATH);
    assert!(paths.iter().any(|p| p == "system hostname"), "{paths:?}");
    let values = resp.all_param_strs(params::CONFIG_CFG_ITEM_VALUE);
    assert!(values.iter().any(|v| v == "node-1"), "{values:?}");
}

#[tokio::test]
async fn committed_changes_notify_subscriber_and_apply_remotely() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg4", log_dir.path()).await;

    // subscriber daemon keeps a local mirror of the definition
    let mirror_dir = tempfile::tempdir().unwrap();
    let mirror = ConfigRpc::new(sample_config(mirror_dir.path()));
    let applied: Arc<Mutex<Vec<FlatChange>>> = Arc::default();

    let (_sub_session, sub_client) = connect_leaf("sysagentd", "sa1", addr).await;
    {
        let applied = Arc::clone(&applied);
        CfgUpdateListener::attach(
            &sub_client,
            &mirror,
            Some(Arc::new(move |changes: &[FlatChange]| {
                applied.lock().unwrap().extend_from_slice(changes);
            })),
        );
    }

    // subscribe to the system subtree
    let resp = cfg_request(
        &sub_client,
        "sa1",
        ConfigAction::CfgGet,
        &[
            (params::CONFIG_CFG_ITEM_PATH, b"system"),
            (params::CONFIG_CFG_ITEM_NOTIFY, &[1]),
        ],
    )
    .await
    .unwrap();
    assert!(resp.error_lines().is_empty());

    // another user commits a change under the watched path
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;
    cfg_set_line(&u1, "u1", "set system hostname pushed-name").await.unwrap();
    cfg_set_line(&u1, "u1", "commit description push").await.unwrap();

    assert!(
        wait_for(|| !applied.lock().unwrap().is_empty(), Duration::from_secs(5)).await,
        "no notification batch arrived"
    );
    let batch = applied.lock().unwrap().clone();
    assert!(
        batch.iter().any(|c| c.path == "system hostname" && c.value == "pushed-name"),
        "{batch:?}"
    );

    // the mirror tree absorbed the update
    let cfg = mirror.config();
    let root = cfg.tree.root();
    let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
    assert_eq!(cfg.tree.node(hostname).value, "pushed-name");
}

#[tokio::test]
async fn commit_touching_sibling_path_does_not_notify() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg5", log_dir.path()).await;

    let mirror_dir = tempfile::tempdir().unwrap();
    let mirror = ConfigRpc::new(sample_config(mirror_dir.path()));
    let applied: Arc<Mutex<Vec<FlatChange>>> = Arc::default();

    let (_sub_session, sub_client) = connect_leaf("sysagentd", "sa2", addr).await;
    {
        let applied = Arc::clone(&applied);
        CfgUpdateListener::attach(
            &sub_client,
            &mirror,
            Some(Arc::new(move |changes: &[FlatChange]| {
                applied.lock().unwrap().extend_from_slice(changes);
            })),
        );
    }

    // watch the interfaces subtree, then change system
    cfg_request(
        &sub_client,
        "sa2",
        ConfigAction::CfgGet,
        &[
            (params::CONFIG_CFG_ITEM_PATH, b"interfaces"),
            (params::CONFIG_CFG_ITEM_NOTIFY, &[1]),
        ],
    )
    .await
    .unwrap();

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;
    cfg_set_line(&u1, "u1", "set system hostname quiet-change").await.unwrap();
    cfg_set_line(&u1, "u1", "commit").await.unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(applied.lock().unwrap().is_empty());
}

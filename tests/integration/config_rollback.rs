// Commit-log revisions: every commit snapshots the pre-change
// configuration, revision indices count from the newest file, and a
// rollback reinstates the addressed snapshot exactly.

use gdt_config::{rollback, RenderView};
use gdt_test_utils::{cfg_set_line, connect_leaf, init_tracing, start_config_daemon};

#[tokio::test]
async fn rollback_revision_zero_reinstates_previous_commit() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let run_cfg = log_dir.path().join("running.pmcfg");
    let (_cfg_session, rpc, addr) = start_config_daemon("cfg1", log_dir.path()).await;
    rpc.set_running_cfg_path(run_cfg.clone());

    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    // first commit: hostname node-1
    cfg_set_line(&u1, "u1", "set system hostname node-1").await.unwrap();
    let resp = cfg_set_line(&u1, "u1", "commit description first").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    // second commit: hostname node-2
    cfg_set_line(&u1, "u1", "set system hostname node-2").await.unwrap();
    let resp = cfg_set_line(&u1, "u1", "commit description second").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    // two revisions; newest (index 0) is the pre-second-commit state
    let revisions = rollback::list_revisions(log_dir.path());
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].desc, "second");
    let newest = rollback::load_revision(log_dir.path(), 0).unwrap();
    assert!(newest.contains("node-1"));

    {
        let cfg = rpc.config();
        let root = cfg.tree.root();
        let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
        assert_eq!(cfg.tree.node(hostname).value, "node-2");
    }

    // rollback to revision 0 reinstates node-1
    let resp = cfg_set_line(&u1, "u1", "rollback revision 0").await.unwrap();
    assert!(resp.error_lines().is_empty(), "{:?}", resp.error_lines());

    let cfg = rpc.config();
    let root = cfg.tree.root();
    let hostname = cfg.tree.lookup(root, "system hostname").unwrap();
    assert_eq!(cfg.tree.node(hostname).value, "node-1");

    // running configuration file matches the reinstated tree
    let running = std::fs::read_to_string(&run_cfg).unwrap();
    let rendered = RenderView::Committed;
    assert_eq!(running, gdt_config::render(&cfg.tree, root, rendered, None));
    assert!(running.contains("node-1"));
}

#[tokio::test]
async fn rollback_with_unknown_revision_reports_error() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg2", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    let resp = cfg_set_line(&u1, "u1", "rollback revision 7").await.unwrap();
    assert!(
        resp.error_lines().iter().any(|e| e.contains("Cannot find rollback revision")),
        "{:?}",
        resp.error_lines()
    );
}

#[tokio::test]
async fn commit_without_changes_writes_no_revision() {
    init_tracing();
    let log_dir = tempfile::tempdir().unwrap();
    let (_cfg_session, _rpc, addr) = start_config_daemon("cfg3", log_dir.path()).await;
    let (_u1_session, u1) = connect_leaf("cli", "u1", addr).await;

    let resp = cfg_set_line(&u1, "u1", "commit description noop").await.unwrap();
    assert!(resp.error_lines().is_empty());
    assert!(rollback::list_revisions(log_dir.path()).is_empty());
}

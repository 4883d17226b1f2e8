// gdt-test-utils: in-process daemons and capture helpers for the
// integration suites.
//
// Every helper binds to 127.0.0.1:0 so each test gets an isolated
// daemon pair; timeouts are shortened to keep the suites fast.

pub mod raw;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use gdt_config::{CfgPattern, Config, ConfigRpc};
use gdt_protocol::{params, Body, ConfigAction, ConfigMessage, GdtMessage};
use gdt_runtime::{Client, EventArgs, EventHandler, EventType, GdtError, Session, SessionConfig};

/// Initialize test logging once; respects `RUST_LOG`.
pub fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Session config with test-friendly timeouts.
pub fn test_session(daemon_type: &str, daemon_id: &str) -> SessionConfig {
    SessionConfig::new(daemon_type, daemon_id)
        .stream_timeout(Duration::from_secs(2))
        .poll_interval(Duration::from_millis(250))
}

/// Router daemon with its listener started.
pub async fn start_router(daemon_id: &str) -> (Arc<Session>, SocketAddr) {
    let session = Session::new(test_session("routingd", daemon_id).router());
    let addr = session.start_server("127.0.0.1:0".parse().unwrap()).await.unwrap();
    (session, addr)
}

/// Leaf daemon connected and registered to a router.
pub async fn connect_leaf(
    daemon_type: &str,
    daemon_id: &str,
    router: SocketAddr,
) -> (Arc<Session>, Arc<Client>) {
    let session = Session::new(test_session(daemon_type, daemon_id));
    let client = session.connect(router, false).await.unwrap();
    (session, client)
}

/// Poll until `cond` holds or the timeout elapses.
pub async fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Event handler that records each hit (with the inbound message, when
/// one was present).
pub struct Recorder {
    hits: Arc<Mutex<Vec<Option<GdtMessage>>>>,
}

pub type Hits = Arc<Mutex<Vec<Option<GdtMessage>>>>;

impl Recorder {
    pub fn new() -> (Arc<Self>, Hits) {
        let hits: Hits = Arc::default();
        (Arc::new(Recorder { hits: Arc::clone(&hits) }), hits)
    }
}

impl EventHandler for Recorder {
    fn run(&self, args: &mut EventArgs<'_>) {
        self.hits.lock().unwrap().push(args.in_msg.cloned());
    }
}

// ---------------------------------------------------------------------------
// Config daemon harness
// ---------------------------------------------------------------------------

/// Sample definition used across the config suites: a `system` block
/// with two items and a templated `interfaces` block.
pub fn sample_config(commit_log: &Path) -> Config {
    let mut cfg = Config::new(commit_log);
    let root = cfg.tree.root();
    let system = cfg.tree.build_block(root, "system", "System settings");
    cfg.tree.build_item(system, "hostname", "Host name", "STRING");
    cfg.tree.build_item(system, "location", "Location", "STRING");
    let ifaces = cfg.tree.build_block(root, "interfaces", "Network interfaces");
    let tmpl = cfg.tree.build_template(ifaces, "IFACE", "STRING");
    cfg.tree.build_item(tmpl, "address", "Address", "STRING");
    cfg.add_pattern(CfgPattern::new("STRING", r"\S+", "free-form value"));
    cfg
}

/// Config daemon with the RPC glue attached and its listener started.
pub async fn start_config_daemon(
    daemon_id: &str,
    commit_log: &Path,
) -> (Arc<Session>, Arc<ConfigRpc>, SocketAddr) {
    let session = Session::new(test_session("configd", daemon_id));
    let rpc = ConfigRpc::new(sample_config(commit_log));
    rpc.attach(&session);
    let addr = session.start_server("127.0.0.1:0".parse().unwrap()).await.unwrap();
    (session, rpc, addr)
}

/// Collected response of one config request stream.
#[derive(Debug, Default)]
pub struct CfgResponse {
    pub fragments: Vec<ConfigMessage>,
}

impl CfgResponse {
    /// First value of `param` across all fragments.
    pub fn param_str(&self, param: u32) -> Option<&str> {
        self.fragments.iter().find_map(|f| f.params.str_value(param))
    }

    /// All values of `param` across all fragments.
    pub fn all_param_strs(&self, param: u32) -> Vec<String> {
        self.fragments
            .iter()
            .filter_map(|f| f.params.str_value(param))
            .map(str::to_owned)
            .collect()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.all_param_strs(params::CONFIG_CFG_AC_ERR)
    }
}

struct CfgCollect {
    fragments: Arc<Mutex<Vec<ConfigMessage>>>,
}

impl EventHandler for CfgCollect {
    fn run(&self, args: &mut EventArgs<'_>) {
        if let Some(cfg) = args.in_msg.and_then(|m| m.config()) {
            self.fragments.lock().unwrap().push(cfg.clone());
        }
        if let Some(stream) = &mut args.stream {
            stream.continue_sequence();
        }
    }
}

struct CfgDone {
    fragments: Arc<Mutex<Vec<ConfigMessage>>>,
    signal: Mutex<Option<oneshot::Sender<()>>>,
}

impl EventHandler for CfgDone {
    fn run(&self, args: &mut EventArgs<'_>) {
        if let Some(cfg) = args.in_msg.and_then(|m| m.config()) {
            self.fragments.lock().unwrap().push(cfg.clone());
        }
        if let Some(tx) = self.signal.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }
}

/// Run one config action stream against the peer and collect the
/// response fragments.
pub async fn cfg_request(
    client: &Arc<Client>,
    auth_id: &str,
    action: ConfigAction,
    extra_params: &[(u32, &[u8])],
) -> Result<CfgResponse, GdtError> {
    let peer = client.peer();
    let fragments: Arc<Mutex<Vec<ConfigMessage>>> = Arc::default();
    let (tx, rx) = oneshot::channel();

    let mut body = ConfigMessage::new(action);
    body.params.push_str(params::AUTH_ID, auth_id);
    for (id, value) in extra_params {
        body.params.push_bytes(*id, value);
    }

    let uuid = client.new_stream(&peer.ty, peer.id.as_deref())?;
    client.with_stream(&uuid, |stream| {
        stream.out_body = Some(Body::Config(body));
        stream.set_callback(
            EventType::StreamNext,
            Arc::new(CfgCollect { fragments: Arc::clone(&fragments) }),
        );
        stream.set_callback(
            EventType::StreamEnd,
            Arc::new(CfgDone {
                fragments: Arc::clone(&fragments),
                signal: Mutex::new(Some(tx)),
            }),
        );
    });
    client.send_stream(&uuid, true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), rx).await;
    let collected = std::mem::take(&mut *fragments.lock().unwrap());
    Ok(CfgResponse { fragments: collected })
}

/// Convenience: run a SET (ENTER) line as `auth_id`.
pub async fn cfg_set_line(
    client: &Arc<Client>,
    auth_id: &str,
    line: &str,
) -> Result<CfgResponse, GdtError> {
    cfg_request(
        client,
        auth_id,
        ConfigAction::CfgSet,
        &[(params::CONFIG_AC_LINE, line.as_bytes())],
    )
    .await
}

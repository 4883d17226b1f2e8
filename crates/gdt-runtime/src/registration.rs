//! GDT registration.
//!
//! An outbound client opens a REGISTER-REQUEST stream carrying its
//! daemon type, daemon id and router status; the peer answers with a
//! REGISTER-RESULT carrying its own three. The client is registered only
//! once all three result fields arrive, gated by a 10 s watchdog.
//! Unregistered clients are invisible to routing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use gdt_protocol::{params, Body, Endpoint, RegistrationAction, RegistrationMessage};

use crate::client::{Client, GdtError};
use crate::events::{EventArgs, EventHandler, EventType};

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream-end/timeout handler that absorbs the REGISTER-RESULT and
/// signals the waiting registration call.
struct RegDone {
    signal: Mutex<Option<oneshot::Sender<bool>>>,
}

impl EventHandler for RegDone {
    fn run(&self, args: &mut EventArgs<'_>) {
        let mut fields = 0;
        if let (Some(client), Some(msg)) = (&args.client, args.in_msg) {
            if let Some(reg) = msg.registration() {
                if reg.action == RegistrationAction::Result {
                    let mut peer = client.peer();
                    if let Some(v) = reg.params.str_value(params::DAEMON_TYPE) {
                        peer.ty = v.to_owned();
                        fields += 1;
                    }
                    if let Some(v) = reg.params.str_value(params::DAEMON_ID) {
                        peer.id = Some(v.to_owned());
                        fields += 1;
                    }
                    if let Some(v) = reg.params.u8_value(params::ROUTER_STATUS) {
                        client.set_router(v != 0);
                        fields += 1;
                    }
                    client.set_peer(peer);
                }
            }
            if fields >= 3 {
                client.set_registered(true);
            }
        }
        if let Some(tx) = self.signal.lock().unwrap().take() {
            let _ = tx.send(fields >= 3);
        }
    }
}

/// Register an outbound client with its peer.
pub async fn register_client(client: &Arc<Client>, dest_type: &str) -> Result<(), GdtError> {
    if client.is_registered() {
        return Ok(());
    }
    let session = client.session().ok_or(GdtError::Inactive)?;

    let (tx, rx) = oneshot::channel();
    let done = Arc::new(RegDone { signal: Mutex::new(Some(tx)) });

    let uuid = client.new_stream(dest_type, None)?;
    client.with_stream(&uuid, |stream| {
        stream.set_callback(EventType::StreamEnd, Arc::clone(&done) as _);
        stream.set_callback(EventType::StreamTimeout, Arc::clone(&done) as _);
        stream.set_callback(
            EventType::StreamNext,
            Arc::new(|args: &mut EventArgs<'_>| {
                if let Some(s) = &mut args.stream {
                    s.end_sequence();
                }
            }) as _,
        );

        let mut reg = RegistrationMessage::new(RegistrationAction::Request);
        reg.params.push_str(params::DAEMON_TYPE, session.daemon_type());
        reg.params.push_str(params::DAEMON_ID, session.daemon_id());
        reg.params.push_u8(params::ROUTER_STATUS, session.is_router() as u8);
        stream.out_body = Some(Body::Registration(reg));
    });
    client.send_stream(&uuid, true)?;

    match tokio::time::timeout(REGISTRATION_TIMEOUT, rx).await {
        Ok(Ok(true)) => Ok(()),
        Ok(_) => Err(GdtError::RegistrationFailed),
        Err(_elapsed) => Err(GdtError::RegistrationTimeout),
    }
}

/// Stream-new responder answering REGISTER-REQUEST streams; armed on
/// every accepted inbound client.
struct RegResponder;

impl EventHandler for RegResponder {
    fn run(&self, args: &mut EventArgs<'_>) {
        let Some(msg) = args.in_msg else { return };
        let Some(reg) = msg.registration() else { return };
        if reg.action != RegistrationAction::Request {
            return;
        }
        let Some(client) = args.client.clone() else { return };
        let Some(session) = client.session() else { return };

        let mut fields = 0;
        let mut peer = Endpoint::new("");
        if let Some(v) = reg.params.str_value(params::DAEMON_TYPE) {
            peer.ty = v.to_owned();
            fields += 1;
        }
        if let Some(v) = reg.params.str_value(params::DAEMON_ID) {
            peer.id = Some(v.to_owned());
            fields += 1;
        }
        if let Some(v) = reg.params.u8_value(params::ROUTER_STATUS) {
            client.set_router(v != 0);
            fields += 1;
        }
        if fields >= 3 {
            client.set_peer(peer);
            client.set_registered(true);
            debug!(client = client.id(), "inbound peer registered");
        }

        let mut res = RegistrationMessage::new(RegistrationAction::Result);
        res.params.push_str(params::DAEMON_TYPE, session.daemon_type());
        res.params.push_str(params::DAEMON_ID, session.daemon_id());
        res.params.push_u8(params::ROUTER_STATUS, session.is_router() as u8);

        if let Some(stream) = &mut args.stream {
            stream.out_body = Some(Body::Registration(res));
            stream.end_sequence();
        }
        if let Some(include_body) = &mut args.include_body {
            **include_body = true;
        }
    }
}

pub(crate) fn arm_inbound(client: &Arc<Client>) {
    client.set_callback(EventType::StreamNew, Arc::new(RegResponder));
}

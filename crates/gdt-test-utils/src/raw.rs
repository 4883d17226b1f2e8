//! Hand-driven GDT peer over the raw transport.
//!
//! Used by suites that need precise control over sequence numbers and
//! flags, or a registered peer that deliberately never answers.

use std::net::SocketAddr;
use std::time::Duration;

use gdt_protocol::{
    decode, encode, params, Body, Endpoint, GdtMessage, Header, RegistrationAction,
    RegistrationMessage, SequenceFlag,
};
use gdt_runtime::transport::{self, ConnReader, ConnWriter, TransportEvent};

pub struct RawPeer {
    pub reader: ConnReader,
    pub writer: ConnWriter,
    pub source: Endpoint,
}

impl RawPeer {
    pub async fn connect(addr: SocketAddr, daemon_type: &str, daemon_id: &str) -> Self {
        let conn = transport::connect(addr).await.expect("raw connect");
        let (reader, writer) = conn.split();
        RawPeer { reader, writer, source: Endpoint::with_id(daemon_type, daemon_id) }
    }

    /// Build a message from this peer toward `dest`.
    pub fn message(
        &self,
        dest: Endpoint,
        uuid: [u8; 16],
        sequence_num: u32,
        flag: SequenceFlag,
        body: Option<Body>,
    ) -> GdtMessage {
        let mut h = Header::new(self.source.clone(), dest, uuid, flag);
        h.sequence_num = sequence_num;
        GdtMessage { header: h, body }
    }

    pub async fn send(&mut self, msg: &GdtMessage) {
        let mut buf = [0u8; 8192];
        let len = encode(msg, &mut buf).expect("raw encode");
        self.writer.send(0, &buf[..len]).await.expect("raw send");
    }

    /// Receive the next GDT message, skipping non-data events.
    pub async fn recv(&mut self) -> GdtMessage {
        loop {
            let ev = tokio::time::timeout(Duration::from_secs(5), self.reader.recv())
                .await
                .expect("raw recv timeout")
                .expect("raw recv");
            match ev {
                TransportEvent::Data { bytes, .. } => return decode(&bytes).expect("raw decode"),
                TransportEvent::Shutdown | TransportEvent::AssocLost => {
                    panic!("connection lost while waiting for a message")
                }
            }
        }
    }

    /// Run the registration exchange so this peer becomes routable,
    /// then go quiet.
    pub async fn register(&mut self, peer_type: &str) {
        let uuid = *uuid::Uuid::new_v4().as_bytes();
        let mut reg = RegistrationMessage::new(RegistrationAction::Request);
        reg.params.push_str(params::DAEMON_TYPE, &self.source.ty);
        reg.params
            .push_str(params::DAEMON_ID, self.source.id.as_deref().unwrap_or(""));
        reg.params.push_u8(params::ROUTER_STATUS, 0);

        let start = self.message(
            Endpoint::new(peer_type),
            uuid,
            1,
            SequenceFlag::Start,
            Some(Body::Registration(reg)),
        );
        self.send(&start).await;

        // END acknowledgement carrying the registration result
        let ack = self.recv().await;
        assert_eq!(ack.header.sequence_flag, SequenceFlag::End, "registration ack");

        let complete = self.message(
            Endpoint::new(peer_type),
            uuid,
            2,
            SequenceFlag::StreamComplete,
            None,
        );
        self.send(&complete).await;
    }
}

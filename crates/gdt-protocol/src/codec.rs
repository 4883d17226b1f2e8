//! TLV codec for the fixed GDT schema.
//!
//! Every node is `tag (u8) | length (u16 BE) | value`. SEQUENCE nodes are
//! containers holding their field TLVs in schema order; the body CHOICE
//! is one container whose tag selects the message kind. Unknown tags
//! inside a container are skipped on decode.
//!
//! Encoding writes into a caller-provided buffer (normally a pooled raw
//! buffer of size B) and fails with [`CodecError::Overflow`] instead of
//! growing; a message that does not fit in B does not fit on the wire.

use thiserror::Error;

use crate::types::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("message does not fit output buffer")]
    Overflow,
    #[error("input truncated at offset {0}")]
    Truncated(usize),
    #[error("value too long for TLV length field")]
    ValueTooLong,
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

// header
const T_HEADER: u8 = 0x01;
const T_VERSION: u8 = 0x10;
const T_SOURCE: u8 = 0x11;
const T_DESTINATION: u8 = 0x12;
const T_UUID: u8 = 0x13;
const T_SEQUENCE_NUM: u8 = 0x14;
const T_SEQUENCE_FLAG: u8 = 0x15;
const T_ENDPOINT_TYPE: u8 = 0x16;
const T_ENDPOINT_ID: u8 = 0x17;
const T_ENC_INFO: u8 = 0x18;
const T_ENC_TYPE: u8 = 0x19;
const T_HOP_INFO: u8 = 0x1a;
const T_HOP_CURRENT: u8 = 0x1b;
const T_HOP_MAX: u8 = 0x1c;
const T_STATUS: u8 = 0x1d;

// body choice
const T_BODY_ENCRYPTED: u8 = 0x20;
const T_BODY_PACKET_FWD: u8 = 0x21;
const T_BODY_FILTER: u8 = 0x22;
const T_BODY_DATA_RETENTION: u8 = 0x23;
const T_BODY_CONFIG: u8 = 0x24;
const T_BODY_STATS: u8 = 0x25;
const T_BODY_AUTH: u8 = 0x26;
const T_BODY_REGISTRATION: u8 = 0x27;
const T_BODY_NOTIFY: u8 = 0x28;
const T_BODY_DATA: u8 = 0x29;
const T_BODY_ROUTING: u8 = 0x2a;
const T_BODY_SERVICE: u8 = 0x2b;
const T_BODY_STATE: u8 = 0x2c;

// body fields
const T_ACTION: u8 = 0x30;
const T_PAYLOAD_TYPE: u8 = 0x31;
const T_PAYLOAD: u8 = 0x32;
const T_PARAMS: u8 = 0x33;
const T_PARAM: u8 = 0x34;
const T_PARAM_ID: u8 = 0x35;
const T_PARAM_VALUE: u8 = 0x36;
const T_PARAM_PART: u8 = 0x37;
const T_STMCH_ID: u8 = 0x38;
const T_SERVICE_ID: u8 = 0x39;
const T_NOTIFY_TYPE: u8 = 0x3a;

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Writer { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        if self.pos + bytes.len() > self.buf.len() {
            return Err(CodecError::Overflow);
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    fn tlv(&mut self, tag: u8, value: &[u8]) -> Result<(), CodecError> {
        if value.len() > u16::MAX as usize {
            return Err(CodecError::ValueTooLong);
        }
        self.put(&[tag])?;
        self.put(&(value.len() as u16).to_be_bytes())?;
        self.put(value)
    }

    /// Open a container TLV; returns the mark to pass to `end`.
    fn begin(&mut self, tag: u8) -> Result<usize, CodecError> {
        self.put(&[tag, 0, 0])?;
        Ok(self.pos)
    }

    fn end(&mut self, mark: usize) -> Result<(), CodecError> {
        let len = self.pos - mark;
        if len > u16::MAX as usize {
            return Err(CodecError::ValueTooLong);
        }
        self.buf[mark - 2..mark].copy_from_slice(&(len as u16).to_be_bytes());
        Ok(())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn tlv(&mut self) -> Result<(u8, &'a [u8]), CodecError> {
        if self.pos + 3 > self.buf.len() {
            return Err(CodecError::Truncated(self.pos));
        }
        let tag = self.buf[self.pos];
        let len = u16::from_be_bytes([self.buf[self.pos + 1], self.buf[self.pos + 2]]) as usize;
        let start = self.pos + 3;
        if start + len > self.buf.len() {
            return Err(CodecError::Truncated(start));
        }
        self.pos = start + len;
        Ok((tag, &self.buf[start..start + len]))
    }
}

fn write_endpoint(w: &mut Writer<'_>, tag: u8, ep: &Endpoint) -> Result<(), CodecError> {
    let mark = w.begin(tag)?;
    w.tlv(T_ENDPOINT_TYPE, ep.ty.as_bytes())?;
    if let Some(id) = &ep.id {
        w.tlv(T_ENDPOINT_ID, id.as_bytes())?;
    }
    w.end(mark)
}

fn write_params(w: &mut Writer<'_>, params: &Params) -> Result<(), CodecError> {
    if params.is_empty() {
        return Ok(());
    }
    let mark = w.begin(T_PARAMS)?;
    for p in params.iter() {
        let pm = w.begin(T_PARAM)?;
        w.tlv(T_PARAM_ID, &p.id.to_be_bytes())?;
        let vm = w.begin(T_PARAM_VALUE)?;
        for part in &p.parts {
            w.tlv(T_PARAM_PART, part)?;
        }
        w.end(vm)?;
        w.end(pm)?;
    }
    w.end(mark)
}

fn write_body(w: &mut Writer<'_>, body: &Body) -> Result<(), CodecError> {
    match body {
        Body::EncryptedData(data) => w.tlv(T_BODY_ENCRYPTED, data),
        Body::PacketFwd(m) => {
            let mark = w.begin(T_BODY_PACKET_FWD)?;
            w.tlv(T_PAYLOAD_TYPE, &m.payload_type.to_be_bytes())?;
            if let Some(p) = &m.payload {
                w.tlv(T_PAYLOAD, p)?;
            }
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Filter(m) => {
            let mark = w.begin(T_BODY_FILTER)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::DataRetention(m) => {
            let mark = w.begin(T_BODY_DATA_RETENTION)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            if let Some(pt) = m.payload_type {
                w.tlv(T_PAYLOAD_TYPE, &pt.to_be_bytes())?;
            }
            if let Some(p) = &m.payload {
                w.tlv(T_PAYLOAD, p)?;
            }
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Config(m) => {
            let mark = w.begin(T_BODY_CONFIG)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            if let Some(p) = &m.payload {
                w.tlv(T_PAYLOAD, p)?;
            }
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Stats(m) => {
            let mark = w.begin(T_BODY_STATS)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Auth(m) => {
            let mark = w.begin(T_BODY_AUTH)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Registration(m) => {
            let mark = w.begin(T_BODY_REGISTRATION)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Notify(m) => {
            let mark = w.begin(T_BODY_NOTIFY)?;
            w.tlv(T_NOTIFY_TYPE, &m.message_type.to_be_bytes())?;
            if let Some(msg) = &m.message {
                w.tlv(T_PAYLOAD, msg)?;
            }
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Data(m) => {
            let mark = w.begin(T_BODY_DATA)?;
            w.tlv(T_PAYLOAD_TYPE, &m.payload_type.to_be_bytes())?;
            if let Some(p) = &m.payload {
                w.tlv(T_PAYLOAD, p)?;
            }
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Routing(m) => {
            let mark = w.begin(T_BODY_ROUTING)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::Service(m) => {
            let mark = w.begin(T_BODY_SERVICE)?;
            w.tlv(T_SERVICE_ID, &m.service_id.to_be_bytes())?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
        Body::State(m) => {
            let mark = w.begin(T_BODY_STATE)?;
            w.tlv(T_STMCH_ID, &m.stmch_id)?;
            w.tlv(T_ACTION, &[m.action as u8])?;
            write_params(w, &m.params)?;
            w.end(mark)
        }
    }
}

/// Encode `msg` into `buf`, returning the encoded length.
pub fn encode(msg: &GdtMessage, buf: &mut [u8]) -> Result<usize, CodecError> {
    let mut w = Writer::new(buf);
    let h = &msg.header;

    let hm = w.begin(T_HEADER)?;
    w.tlv(T_VERSION, &[h.version])?;
    write_endpoint(&mut w, T_SOURCE, &h.source)?;
    write_endpoint(&mut w, T_DESTINATION, &h.destination)?;
    w.tlv(T_UUID, &h.uuid)?;
    w.tlv(T_SEQUENCE_NUM, &h.sequence_num.to_be_bytes())?;
    w.tlv(T_SEQUENCE_FLAG, &[h.sequence_flag as u8])?;
    if let Some(enc) = &h.enc_info {
        let em = w.begin(T_ENC_INFO)?;
        w.tlv(T_ENC_TYPE, &enc.enc_type)?;
        write_params(&mut w, &enc.params)?;
        w.end(em)?;
    }
    if let Some(hop) = &h.hop_info {
        let hopm = w.begin(T_HOP_INFO)?;
        w.tlv(T_HOP_CURRENT, &[hop.current])?;
        w.tlv(T_HOP_MAX, &[hop.max])?;
        w.end(hopm)?;
    }
    if let Some(status) = h.status {
        w.tlv(T_STATUS, &[status as u8])?;
    }
    w.end(hm)?;

    if let Some(body) = &msg.body {
        write_body(&mut w, body)?;
    }
    Ok(w.pos)
}

fn read_endpoint(value: &[u8]) -> Result<Endpoint, CodecError> {
    let mut r = Reader::new(value);
    let mut ty = None;
    let mut id = None;
    while !r.done() {
        let (tag, v) = r.tlv()?;
        match tag {
            T_ENDPOINT_TYPE => {
                ty = Some(
                    String::from_utf8(v.to_vec())
                        .map_err(|_| CodecError::Malformed("endpoint type not utf-8"))?,
                )
            }
            T_ENDPOINT_ID => {
                id = Some(
                    String::from_utf8(v.to_vec())
                        .map_err(|_| CodecError::Malformed("endpoint id not utf-8"))?,
                )
            }
            _ => {}
        }
    }
    Ok(Endpoint { ty: ty.ok_or(CodecError::Malformed("endpoint missing type"))?, id })
}

fn read_params(value: &[u8]) -> Result<Params, CodecError> {
    let mut params = Params::new();
    let mut r = Reader::new(value);
    while !r.done() {
        let (tag, v) = r.tlv()?;
        if tag != T_PARAM {
            continue;
        }
        let mut pr = Reader::new(v);
        let mut id = None;
        let mut parts = Vec::new();
        while !pr.done() {
            let (ptag, pv) = pr.tlv()?;
            match ptag {
                T_PARAM_ID => {
                    if pv.len() != 4 {
                        return Err(CodecError::Malformed("parameter id width"));
                    }
                    id = Some(u32::from_be_bytes([pv[0], pv[1], pv[2], pv[3]]));
                }
                T_PARAM_VALUE => {
                    let mut vr = Reader::new(pv);
                    while !vr.done() {
                        let (vtag, part) = vr.tlv()?;
                        if vtag == T_PARAM_PART {
                            parts.push(part.to_vec());
                        }
                    }
                }
                _ => {}
            }
        }
        params.0.push(Param { id: id.ok_or(CodecError::Malformed("parameter missing id"))?, parts });
    }
    Ok(params)
}

fn read_u16(v: &[u8], what: &'static str) -> Result<u16, CodecError> {
    if v.len() != 2 {
        return Err(CodecError::Malformed(what));
    }
    Ok(u16::from_be_bytes([v[0], v[1]]))
}

fn read_u8(v: &[u8], what: &'static str) -> Result<u8, CodecError> {
    v.first().copied().ok_or(CodecError::Malformed(what))
}

struct BodyFields {
    action: Option<u8>,
    payload_type: Option<u16>,
    payload: Option<Vec<u8>>,
    params: Params,
    stmch_id: Option<Vec<u8>>,
    service_id: Option<u16>,
    notify_type: Option<u16>,
}

fn read_body_fields(value: &[u8]) -> Result<BodyFields, CodecError> {
    let mut f = BodyFields {
        action: None,
        payload_type: None,
        payload: None,
        params: Params::new(),
        stmch_id: None,
        service_id: None,
        notify_type: None,
    };
    let mut r = Reader::new(value);
    while !r.done() {
        let (tag, v) = r.tlv()?;
        match tag {
            T_ACTION => f.action = Some(read_u8(v, "action width")?),
            T_PAYLOAD_TYPE => f.payload_type = Some(read_u16(v, "payload type width")?),
            T_PAYLOAD => f.payload = Some(v.to_vec()),
            T_PARAMS => f.params = read_params(v)?,
            T_STMCH_ID => f.stmch_id = Some(v.to_vec()),
            T_SERVICE_ID => f.service_id = Some(read_u16(v, "service id width")?),
            T_NOTIFY_TYPE => f.notify_type = Some(read_u16(v, "notify type width")?),
            _ => {}
        }
    }
    Ok(f)
}

fn read_body(tag: u8, value: &[u8]) -> Result<Body, CodecError> {
    if tag == T_BODY_ENCRYPTED {
        return Ok(Body::EncryptedData(value.to_vec()));
    }
    let f = read_body_fields(value)?;
    let action_val = f.action;
    let action = move |what: &'static str| action_val.ok_or(CodecError::Malformed(what));
    Ok(match tag {
        T_BODY_PACKET_FWD => Body::PacketFwd(PacketFwdMessage {
            payload_type: f.payload_type.ok_or(CodecError::Malformed("packet-fwd payload type"))?,
            payload: f.payload,
            params: f.params,
        }),
        T_BODY_FILTER => Body::Filter(FilterMessage {
            action: match action("filter action")? {
                0 => FilterAction::Request,
                _ => FilterAction::Result,
            },
            params: f.params,
        }),
        T_BODY_DATA_RETENTION => Body::DataRetention(DataRetentionMessage {
            action: match action("data-retention action")? {
                0 => DataRetentionAction::Store,
                1 => DataRetentionAction::Delete,
                2 => DataRetentionAction::Fetch,
                _ => DataRetentionAction::Result,
            },
            payload_type: f.payload_type,
            payload: f.payload,
            params: f.params,
        }),
        T_BODY_CONFIG => Body::Config(ConfigMessage {
            action: ConfigAction::from_u8(action("config action")?)
                .ok_or(CodecError::Malformed("config action value"))?,
            payload: f.payload,
            params: f.params,
        }),
        T_BODY_STATS => Body::Stats(StatsMessage {
            action: match action("stats action")? {
                0 => StatsAction::Request,
                _ => StatsAction::Result,
            },
            params: f.params,
        }),
        T_BODY_AUTH => Body::Auth(AuthMessage {
            action: match action("auth action")? {
                0 => AuthAction::Request,
                _ => AuthAction::Result,
            },
            params: f.params,
        }),
        T_BODY_REGISTRATION => Body::Registration(RegistrationMessage {
            action: RegistrationAction::from_u8(action("registration action")?)
                .ok_or(CodecError::Malformed("registration action value"))?,
            params: f.params,
        }),
        T_BODY_NOTIFY => Body::Notify(NotifyMessage {
            message_type: f.notify_type.ok_or(CodecError::Malformed("notify type"))?,
            message: f.payload,
            params: f.params,
        }),
        T_BODY_DATA => Body::Data(DataMessage {
            payload_type: f.payload_type.ok_or(CodecError::Malformed("data payload type"))?,
            payload: f.payload,
            params: f.params,
        }),
        T_BODY_ROUTING => Body::Routing(RoutingMessage {
            action: match action("routing action")? {
                0 => RoutingAction::RouteSet,
                1 => RoutingAction::RouteGet,
                _ => RoutingAction::RouteResult,
            },
            params: f.params,
        }),
        T_BODY_SERVICE => Body::Service(ServiceMessage {
            service_id: f.service_id.ok_or(CodecError::Malformed("service id"))?,
            action: match action("service action")? {
                0 => ServiceAction::Request,
                1 => ServiceAction::Result,
                2 => ServiceAction::Default,
                _ => ServiceAction::Na,
            },
            params: f.params,
        }),
        T_BODY_STATE => Body::State(StateMessage {
            stmch_id: f.stmch_id.ok_or(CodecError::Malformed("state machine id"))?,
            action: StateAction::Update,
            params: f.params,
        }),
        _ => return Err(CodecError::Malformed("unknown body kind")),
    })
}

fn read_header(value: &[u8]) -> Result<Header, CodecError> {
    let mut r = Reader::new(value);
    let mut version = None;
    let mut source = None;
    let mut destination = None;
    let mut uuid = None;
    let mut sequence_num = None;
    let mut sequence_flag = None;
    let mut enc_info = None;
    let mut hop_info = None;
    let mut status = None;

    while !r.done() {
        let (tag, v) = r.tlv()?;
        match tag {
            T_VERSION => version = Some(read_u8(v, "version width")?),
            T_SOURCE => source = Some(read_endpoint(v)?),
            T_DESTINATION => destination = Some(read_endpoint(v)?),
            T_UUID => {
                if v.len() != 16 {
                    return Err(CodecError::Malformed("uuid width"));
                }
                let mut u = [0u8; 16];
                u.copy_from_slice(v);
                uuid = Some(u);
            }
            T_SEQUENCE_NUM => {
                if v.len() != 4 {
                    return Err(CodecError::Malformed("sequence number width"));
                }
                sequence_num = Some(u32::from_be_bytes([v[0], v[1], v[2], v[3]]));
            }
            T_SEQUENCE_FLAG => {
                sequence_flag = Some(
                    SequenceFlag::from_u8(read_u8(v, "sequence flag width")?)
                        .ok_or(CodecError::Malformed("sequence flag value"))?,
                )
            }
            T_ENC_INFO => {
                let mut er = Reader::new(v);
                let mut enc = EncryptionInfo::default();
                while !er.done() {
                    let (etag, ev) = er.tlv()?;
                    match etag {
                        T_ENC_TYPE => enc.enc_type = ev.to_vec(),
                        T_PARAMS => enc.params = read_params(ev)?,
                        _ => {}
                    }
                }
                enc_info = Some(enc);
            }
            T_HOP_INFO => {
                let mut hr = Reader::new(v);
                let mut current = 0;
                let mut max = crate::MAX_HOPS;
                while !hr.done() {
                    let (htag, hv) = hr.tlv()?;
                    match htag {
                        T_HOP_CURRENT => current = read_u8(hv, "hop current width")?,
                        T_HOP_MAX => max = read_u8(hv, "hop max width")?,
                        _ => {}
                    }
                }
                hop_info = Some(HopInfo { current, max });
            }
            T_STATUS => status = Some(ErrorCode::from_u8(read_u8(v, "status width")?)),
            _ => {}
        }
    }

    Ok(Header {
        version: version.ok_or(CodecError::Malformed("header missing version"))?,
        source: source.ok_or(CodecError::Malformed("header missing source"))?,
        destination: destination.ok_or(CodecError::Malformed("header missing destination"))?,
        uuid: uuid.ok_or(CodecError::Malformed("header missing uuid"))?,
        sequence_num: sequence_num.ok_or(CodecError::Malformed("header missing sequence number"))?,
        sequence_flag: sequence_flag.ok_or(CodecError::Malformed("header missing sequence flag"))?,
        enc_info,
        hop_info,
        status,
    })
}

/// Decode one GDT message from `buf`.
pub fn decode(buf: &[u8]) -> Result<GdtMessage, CodecError> {
    let mut r = Reader::new(buf);
    let (tag, hv) = r.tlv()?;
    if tag != T_HEADER {
        return Err(CodecError::Malformed("first node is not a header"));
    }
    let header = read_header(hv)?;
    let body = if r.done() {
        None
    } else {
        let (btag, bv) = r.tlv()?;
        Some(read_body(btag, bv)?)
    };
    Ok(GdtMessage { header, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn sample_header() -> Header {
        let mut h = Header::new(
            Endpoint::with_id("routingd", "r1"),
            Endpoint::with_id("sysagentd", "a2"),
            *uuid::Uuid::new_v4().as_bytes(),
            SequenceFlag::Start,
        );
        h.sequence_num = 7;
        h
    }

    #[test]
    fn round_trip_header_only() {
        let msg = GdtMessage::new(sample_header());
        let mut buf = [0u8; 512];
        let n = encode(&msg, &mut buf).unwrap();
        let back = decode(&buf[..n]).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn round_trip_with_optionals_and_body() {
        let mut h = sample_header();
        h.hop_info = Some(HopInfo { current: 3, max: 10 });
        h.status = Some(ErrorCode::Ok);
        let mut cfg = ConfigMessage::new(ConfigAction::CfgSet);
        cfg.params.push_str(params::CONFIG_AC_LINE, "set system hostname \"a\"");
        cfg.params.push_str(params::AUTH_ID, "user-1");
        cfg.params.push_u32(params::CONFIG_CFG_ITEM_COUNT, 42);
        let msg = GdtMessage { header: h, body: Some(Body::Config(cfg)) };

        let mut buf = [0u8; 1024];
        let n = encode(&msg, &mut buf).unwrap();
        let back = decode(&buf[..n]).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn round_trip_registration() {
        let mut reg = RegistrationMessage::new(RegistrationAction::Request);
        reg.params.push_str(params::DAEMON_TYPE, "configd");
        reg.params.push_str(params::DAEMON_ID, "cfg1");
        reg.params.push_u8(params::ROUTER_STATUS, 1);
        let msg = GdtMessage { header: sample_header(), body: Some(Body::Registration(reg)) };

        let mut buf = [0u8; 512];
        let n = encode(&msg, &mut buf).unwrap();
        assert_eq!(decode(&buf[..n]).unwrap(), msg);
    }

    #[test]
    fn round_trip_data_with_multi_part_param() {
        let mut data = DataMessage::new(payload_type::GDT, b"payload-bytes");
        data.params.0.push(Param {
            id: params::FILTER_DATA,
            parts: vec![b"part-one".to_vec(), b"part-two".to_vec()],
        });
        let msg = GdtMessage { header: sample_header(), body: Some(Body::Data(data)) };

        let mut buf = [0u8; 512];
        let n = encode(&msg, &mut buf).unwrap();
        assert_eq!(decode(&buf[..n]).unwrap(), msg);
    }

    #[test]
    fn encode_fails_on_small_buffer() {
        let msg = GdtMessage::new(sample_header());
        let mut buf = [0u8; 16];
        assert_eq!(encode(&msg, &mut buf), Err(CodecError::Overflow));
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let msg = GdtMessage::new(sample_header());
        let mut buf = [0u8; 512];
        let n = encode(&msg, &mut buf).unwrap();
        assert!(matches!(decode(&buf[..n - 4]), Err(CodecError::Truncated(_))));
    }

    #[test]
    fn decode_rejects_non_header_start() {
        assert!(matches!(
            decode(&[0x7f, 0, 0]),
            Err(CodecError::Malformed("first node is not a header"))
        ));
    }
}

//! Message structures mirroring the frozen GDT schema.
//!
//! Discriminant values are wire bytes.

/// Per-stream sequence flag (header, uint8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SequenceFlag {
    Start = 0,
    Continue = 1,
    End = 2,
    StatelessNoReply = 3,
    Stateless = 4,
    StreamComplete = 5,
    ContinueWait = 6,
    Heartbeat = 7,
}

impl SequenceFlag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Start),
            1 => Some(Self::Continue),
            2 => Some(Self::End),
            3 => Some(Self::StatelessNoReply),
            4 => Some(Self::Stateless),
            5 => Some(Self::StreamComplete),
            6 => Some(Self::ContinueWait),
            7 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// Header error status (uint8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    OutOfSequence = 1,
    UnknownSequence = 2,
    UnsupportedVersion = 3,
    Timeout = 4,
    UnknownRoute = 5,
    RoutingNotSupported = 6,
    MaxHopsExceeded = 7,
    Unknown = 255,
}

impl ErrorCode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Ok,
            1 => Self::OutOfSequence,
            2 => Self::UnknownSequence,
            3 => Self::UnsupportedVersion,
            4 => Self::Timeout,
            5 => Self::UnknownRoute,
            6 => Self::RoutingNotSupported,
            7 => Self::MaxHopsExceeded,
            _ => Self::Unknown,
        }
    }
}

/// Config message action code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigAction {
    CfgGet = 0,
    CfgSet = 1,
    CfgReplicate = 2,
    CfgAc = 3,
    CfgResult = 4,
    UserLogin = 5,
    UserLogout = 6,
}

impl ConfigAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::CfgGet),
            1 => Some(Self::CfgSet),
            2 => Some(Self::CfgReplicate),
            3 => Some(Self::CfgAc),
            4 => Some(Self::CfgResult),
            5 => Some(Self::UserLogin),
            6 => Some(Self::UserLogout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrationAction {
    Request = 0,
    Result = 1,
}

impl RegistrationAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Request),
            1 => Some(Self::Result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatsAction {
    Request = 0,
    Result = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthAction {
    Request = 0,
    Result = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterAction {
    Request = 0,
    Result = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoutingAction {
    RouteSet = 0,
    RouteGet = 1,
    RouteResult = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataRetentionAction {
    Store = 0,
    Delete = 1,
    Fetch = 2,
    Result = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceAction {
    Request = 0,
    Result = 1,
    Default = 2,
    Na = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StateAction {
    Update = 0,
}

/// Payload type tags carried by data-bearing bodies.
pub mod payload_type {
    pub const LAYER2: u16 = 0;
    pub const IP: u16 = 1;
    pub const SCTP: u16 = 2;
    pub const TCP: u16 = 3;
    pub const UDP: u16 = 4;
    pub const M3UA: u16 = 5;
    pub const M2UA: u16 = 6;
    pub const MTP3: u16 = 7;
    pub const ISUP: u16 = 8;
    pub const H248: u16 = 9;
    pub const SCCP: u16 = 10;
    pub const SMSTPDU: u16 = 11;
    pub const SMPP: u16 = 12;
    pub const TCAP: u16 = 13;
    pub const RTP: u16 = 14;
    pub const SIP: u16 = 15;
    pub const POP3: u16 = 16;
    pub const IMAP: u16 = 17;
    pub const HTTP: u16 = 18;
    pub const RADIUS: u16 = 19;
    pub const DHCP: u16 = 20;
    pub const SMTP: u16 = 21;
    pub const M2PA: u16 = 22;
    pub const MTP2: u16 = 23;
    pub const UNKNOWN: u16 = 1000;
    pub const GDT: u16 = 2000;
}

/// Service ids used by service messages.
pub mod service_id {
    pub const STP_ROUTING: u16 = 42;
    pub const SGN_FORWARD: u16 = 43;
    pub const FGN_FILTERING: u16 = 44;
    pub const SECURITY: u16 = 45;
    pub const PDN_FILTERING: u16 = 46;
    pub const SYSAGENT: u16 = 47;
}

/// A peer address: daemon type plus optional daemon id.
///
/// An absent id means wildcard addressing by type; the id `"*"` fans out
/// to every matching peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ty: String,
    pub id: Option<String>,
}

impl Endpoint {
    pub fn new(ty: &str) -> Self {
        Endpoint { ty: ty.to_owned(), id: None }
    }

    pub fn with_id(ty: &str, id: &str) -> Self {
        Endpoint { ty: ty.to_owned(), id: Some(id.to_owned()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopInfo {
    pub current: u8,
    pub max: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptionInfo {
    pub enc_type: Vec<u8>,
    pub params: Params,
}

/// Message header; field order is wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub uuid: [u8; 16],
    pub sequence_num: u32,
    pub sequence_flag: SequenceFlag,
    pub enc_info: Option<EncryptionInfo>,
    pub hop_info: Option<HopInfo>,
    pub status: Option<ErrorCode>,
}

impl Header {
    pub fn new(source: Endpoint, destination: Endpoint, uuid: [u8; 16], flag: SequenceFlag) -> Self {
        Header {
            version: crate::GDT_VERSION,
            source,
            destination,
            uuid,
            sequence_num: 1,
            sequence_flag: flag,
            enc_info: None,
            hop_info: None,
            status: None,
        }
    }
}

/// One parameter: an id plus one or more octet-string parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub id: u32,
    pub parts: Vec<Vec<u8>>,
}

impl Param {
    pub fn first(&self) -> Option<&[u8]> {
        self.parts.first().map(|p| p.as_slice())
    }
}

/// Ordered parameter list; repeated ids are allowed and order matters
/// (config item streaming relies on it).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params(pub Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn push_bytes(&mut self, id: u32, value: &[u8]) {
        self.0.push(Param { id, parts: vec![value.to_vec()] });
    }

    pub fn push_str(&mut self, id: u32, value: &str) {
        self.push_bytes(id, value.as_bytes());
    }

    pub fn push_u32(&mut self, id: u32, value: u32) {
        self.push_bytes(id, &value.to_be_bytes());
    }

    pub fn push_u8(&mut self, id: u32, value: u8) {
        self.push_bytes(id, &[value]);
    }

    /// First parameter with the given id.
    pub fn get(&self, id: u32) -> Option<&Param> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn bytes_value(&self, id: u32) -> Option<&[u8]> {
        self.get(id).and_then(|p| p.first())
    }

    pub fn str_value(&self, id: u32) -> Option<&str> {
        self.bytes_value(id).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn u32_value(&self, id: u32) -> Option<u32> {
        let v = self.bytes_value(id)?;
        if v.len() != 4 {
            return None;
        }
        Some(u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
    }

    pub fn u8_value(&self, id: u32) -> Option<u8> {
        self.bytes_value(id).and_then(|v| v.first().copied())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    pub action: ConfigAction,
    pub payload: Option<Vec<u8>>,
    pub params: Params,
}

impl ConfigMessage {
    pub fn new(action: ConfigAction) -> Self {
        ConfigMessage { action, payload: None, params: Params::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationMessage {
    pub action: RegistrationAction,
    pub params: Params,
}

impl RegistrationMessage {
    pub fn new(action: RegistrationAction) -> Self {
        RegistrationMessage { action, params: Params::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsMessage {
    pub action: StatsAction,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMessage {
    pub action: AuthAction,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMessage {
    pub action: FilterAction,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingMessage {
    pub action: RoutingAction,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRetentionMessage {
    pub action: DataRetentionAction,
    pub payload_type: Option<u16>,
    pub payload: Option<Vec<u8>>,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketFwdMessage {
    pub payload_type: u16,
    pub payload: Option<Vec<u8>>,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub payload_type: u16,
    pub payload: Option<Vec<u8>>,
    pub params: Params,
}

impl DataMessage {
    pub fn new(payload_type: u16, payload: &[u8]) -> Self {
        DataMessage {
            payload_type,
            payload: Some(payload.to_vec()),
            params: Params::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyMessage {
    pub message_type: u16,
    pub message: Option<Vec<u8>>,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    pub service_id: u16,
    pub action: ServiceAction,
    pub params: Params,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMessage {
    pub stmch_id: Vec<u8>,
    pub action: StateAction,
    pub params: Params,
}

/// Body CHOICE over the thirteen message kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    EncryptedData(Vec<u8>),
    PacketFwd(PacketFwdMessage),
    Filter(FilterMessage),
    DataRetention(DataRetentionMessage),
    Config(ConfigMessage),
    Stats(StatsMessage),
    Auth(AuthMessage),
    Registration(RegistrationMessage),
    Notify(NotifyMessage),
    Data(DataMessage),
    Routing(RoutingMessage),
    Service(ServiceMessage),
    State(StateMessage),
}

/// One GDT wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdtMessage {
    pub header: Header,
    pub body: Option<Body>,
}

impl GdtMessage {
    pub fn new(header: Header) -> Self {
        GdtMessage { header, body: None }
    }

    /// Body as a config message, if that is what it carries.
    pub fn config(&self) -> Option<&ConfigMessage> {
        match &self.body {
            Some(Body::Config(c)) => Some(c),
            _ => None,
        }
    }

    pub fn registration(&self) -> Option<&RegistrationMessage> {
        match &self.body {
            Some(Body::Registration(r)) => Some(r),
            _ => None,
        }
    }
}

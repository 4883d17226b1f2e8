//! Well-known parameter ids.
//!
//! Ids are grouped by protocol family; the daemon/config/filter block
//! (6000–7699) is the one the runtime and config engine use directly, the
//! rest belong to the domain plugins that ride on GDT data messages.

pub const DAEMON_TYPE: u32 = 6000;
pub const DAEMON_ID: u32 = 6001;
pub const AUTH_ID: u32 = 6002;
pub const AUTH_PASSWORD: u32 = 6003;
pub const DAEMON_IP: u32 = 6004;
pub const DAEMON_PORT: u32 = 6005;
pub const DAEMON_DESCRIPTION: u32 = 6006;
pub const ACTION: u32 = 6007;
pub const DPI: u32 = 6008;
pub const SPI: u32 = 6009;
pub const TIMESTAMP: u32 = 6010;
pub const TIMESTAMP_NSEC: u32 = 6011;
pub const SECURITY_PHASE: u32 = 6012;
pub const LOOP_COUNT: u32 = 6013;
pub const CHECKSUM: u32 = 6014;

pub const ROUTING_DESTINATION: u32 = 6100;
pub const ROUTING_SOURCE: u32 = 6101;
pub const ROUTING_GATEWAY: u32 = 6102;
pub const ROUTING_INTERFACE: u32 = 6103;
pub const ROUTING_PRIORITY: u32 = 6104;
pub const ROUTER_STATUS: u32 = 6105;
pub const ROUTING_DESTINATION_TYPE: u32 = 6106;
pub const ROUTING_INDEX: u32 = 6107;
pub const TRUNK_LABEL: u32 = 6108;
pub const CONNECTION_TYPE: u32 = 6109;
pub const SERVICE_ID: u32 = 6110;
pub const COMMAND_ID: u32 = 6111;
pub const ROUTING_SUB_DESTINATION: u32 = 6112;
pub const ROUTING_SUB_DESTINATION_TYPE: u32 = 6113;
pub const CORRELATION_NOTIFICATION: u32 = 6114;
pub const GUID: u32 = 6115;
pub const ROUTING_SERVICE_ID: u32 = 6116;

pub const EVENT_ID: u32 = 6200;
pub const EVENT_DESCRIPTION: u32 = 6201;
pub const EVENT_CALLBACK_ID: u32 = 6202;
pub const EVENT_CALLBACK_PRIORITY: u32 = 6203;

pub const ENC_PUBLIC_KEY: u32 = 6300;
pub const ENC_PRIVATE_KEY: u32 = 6301;
pub const ENC_TYPE: u32 = 6302;

pub const STATS_ID: u32 = 6400;
pub const STATS_DESCRIPTION: u32 = 6401;
pub const STATS_VALUE: u32 = 6402;
pub const STATS_COUNT: u32 = 6403;

pub const CONFIG_PARAM_NAME: u32 = 7400;
pub const CONFIG_PARAM_VALUE: u32 = 7401;
pub const CONFIG_AC_LINE: u32 = 7402;
pub const CONFIG_CFG_ITEM_NAME: u32 = 7403;
pub const CONFIG_CFG_ITEM_DESC: u32 = 7404;
pub const CONFIG_CFG_ITEM_NS: u32 = 7405;
pub const CONFIG_CFG_ITEM_VALUE: u32 = 7406;
pub const CONFIG_CFG_ITEM_NVALUE: u32 = 7407;
pub const CONFIG_CFG_ITEM_NT: u32 = 7408;
pub const CONFIG_CFG_CM_MODE: u32 = 7409;
pub const CONFIG_CFG_AC_ERR: u32 = 7410;
pub const CONFIG_CLI_PATH: u32 = 7411;
pub const CONFIG_CFG_LINE: u32 = 7412;
pub const CONFIG_AC_ERR_COUNT: u32 = 7413;
pub const CONFIG_CFG_LINE_COUNT: u32 = 7414;
pub const CONFIG_CFG_ITEM_PATH: u32 = 7415;
pub const CONFIG_CFG_ITEM_NOTIFY: u32 = 7416;
pub const CONFIG_CFG_ITEM_COUNT: u32 = 7417;
pub const CONFIG_REPLICATION_LINE: u32 = 7418;

pub const SMS_STATUS: u32 = 7500;
pub const SMS_UUID: u32 = 7501;

pub const FILTER_RESULT: u32 = 7600;
pub const FILTER_EXIT: u32 = 7601;
pub const FILTER_LIST_ID: u32 = 7602;
pub const FILTER_LIST_LABEL: u32 = 7603;
pub const FILTER_DATA: u32 = 7604;
pub const FILTER_DATA_SIZE: u32 = 7605;

pub mod eth {
    pub const DESTINATION_MAC: u32 = 600;
    pub const SOURCE_MAC: u32 = 601;
}

pub mod ip {
    pub const DESTINATION_IP: u32 = 700;
    pub const SOURCE_IP: u32 = 701;
}

pub mod tcp {
    pub const DESTINATION_PORT: u32 = 800;
    pub const SOURCE_PORT: u32 = 801;
}

pub mod udp {
    pub const DESTINATION_PORT: u32 = 900;
    pub const SOURCE_PORT: u32 = 901;
}

pub mod sctp {
    pub const DESTINATION_PORT: u32 = 1000;
    pub const SOURCE_PORT: u32 = 1001;
}

pub mod gsmmap {
    pub const SCOA_DIGITS: u32 = 500;
    pub const SCOA_TYPE_OF_NUMBER: u32 = 501;
    pub const SCOA_NUMBERING_PLAN: u32 = 502;
    pub const SCDA_DIGITS: u32 = 503;
    pub const SCDA_TYPE_OF_NUMBER: u32 = 504;
    pub const SCDA_NUMBERING_PLAN: u32 = 505;
    pub const IMSI: u32 = 506;
    pub const MSISDN_DIGITS: u32 = 507;
    pub const MSISDN_TYPE_OF_NUMBER: u32 = 508;
    pub const MSISDN_NUMBERING_PLAN: u32 = 509;
    pub const NNN_DIGITS: u32 = 519;
    pub const NNN_TYPE_OF_NUMBER: u32 = 520;
    pub const NNN_NUMBERING_PLAN: u32 = 521;
    pub const AN_DIGITS: u32 = 522;
    pub const AN_TYPE_OF_NUMBER: u32 = 523;
    pub const AN_NUMBERING_PLAN: u32 = 524;
    pub const SCA_DIGITS: u32 = 525;
    pub const SCA_TYPE_OF_NUMBER: u32 = 526;
    pub const SCA_NUMBERING_PLAN: u32 = 527;
    pub const VERSION: u32 = 533;
}

pub mod tcap {
    pub const SOURCE_TRANSACTION_ID: u32 = 510;
    pub const DESTINATION_TRANSACTION_ID: u32 = 511;
    pub const OPCODE: u32 = 512;
    pub const COMPONENT_TYPE: u32 = 513;
    pub const COMPONENT_INVOKE_ID: u32 = 514;
    pub const ERROR_TYPE: u32 = 515;
    pub const ERROR_CODE: u32 = 516;
    pub const DIALOGUE_CONTEXT_OID: u32 = 517;
    pub const MESSAGE_TYPE: u32 = 518;
    pub const COMPONENT_COUNT: u32 = 528;
    pub const DIALOGUE_CONTEXT_SUPPORTED: u32 = 529;
    pub const COMPONENT_INDEX: u32 = 530;
    pub const SOURCE_TRANSACTION_ID_LENGTH: u32 = 531;
    pub const DESTINATION_TRANSACTION_ID_LENGTH: u32 = 532;
}

pub mod smstpdu {
    pub const TP_UDHI: u32 = 400;
    pub const TP_SRI: u32 = 401;
    pub const TP_MMS: u32 = 402;
    pub const TP_MTI: u32 = 403;
    pub const TP_OA_TYPE_OF_NUMBER: u32 = 404;
    pub const TP_OA_NUMBERING_PLAN: u32 = 405;
    pub const TP_OA_DIGITS: u32 = 406;
    pub const TP_PID: u32 = 407;
    pub const TP_DCS: u32 = 408;
    pub const TP_SCTS: u32 = 409;
    pub const TP_UDL: u32 = 410;
    pub const TP_UD: u32 = 411;
    pub const TP_RP: u32 = 412;
    pub const TP_SRR: u32 = 413;
    pub const TP_VPF: u32 = 414;
    pub const TP_RD: u32 = 415;
    pub const TP_DA_TYPE_OF_NUMBER: u32 = 416;
    pub const TP_DA_NUMBERING_PLAN: u32 = 417;
    pub const TP_DA_DIGITS: u32 = 418;
    pub const TP_VP: u32 = 419;
    pub const MSG_ID: u32 = 420;
    pub const MSG_PARTS: u32 = 421;
    pub const MSG_PART: u32 = 422;
    pub const TP_MR: u32 = 423;
    pub const MESSAGE_CLASS: u32 = 424;
}

pub mod sccp {
    pub const DESTINATION_LOCAL_REFERENCE: u32 = 300;
    pub const SOURCE_LOCAL_REFERENCE: u32 = 301;
    pub const CALLED_PARTY: u32 = 301;
    pub const CALLING_PARTY: u32 = 302;
    pub const PROTOCOL_CLASS: u32 = 303;
    pub const SEGMENTING_REASSEMBLING: u32 = 304;
    pub const RECEIVE_SEQUENCE_NUMBER: u32 = 305;
    pub const SEQUENCING_SEGMENTING: u32 = 306;
    pub const CREDIT: u32 = 307;
    pub const RELEASE_CAUSE: u32 = 308;
    pub const RETURN_CAUSE: u32 = 309;
    pub const RESET_CAUSE: u32 = 310;
    pub const ERROR_CAUSE: u32 = 311;
    pub const REFUSAL_CAUSE: u32 = 312;
    pub const DATA: u32 = 313;
    pub const SEGMENTATION: u32 = 314;
    pub const HOP_COUNTER: u32 = 315;
    pub const IMPORTANCE: u32 = 316;
    pub const LONG_DATA: u32 = 317;
    pub const CALLED_PA_ROUTING_INDICATOR: u32 = 318;
    pub const CALLED_PA_GLOBAL_TITLE_INDICATOR: u32 = 319;
    pub const CALLED_PA_SSN_INDICATOR: u32 = 320;
    pub const CALLED_PA_POINT_CODE_INDICATOR: u32 = 321;
    pub const CALLED_PA_POINT_CODE_NUMBER: u32 = 322;
    pub const CALLED_PA_SUBSYSTEM_NUMBER: u32 = 323;
    pub const CALLED_PA_GT_NUMBERING_PLAN: u32 = 324;
    pub const CALLED_PA_GT_ENCODING_SCHEME: u32 = 325;
    pub const CALLED_PA_GT_NATURE_OF_ADDRESS: u32 = 326;
    pub const CALLED_PA_GT_ADDRESS: u32 = 327;
    pub const CALLED_PA_GT_TRANSLATION_TYPE: u32 = 328;
    pub const CALLING_PA_ROUTING_INDICATOR: u32 = 329;
    pub const CALLING_PA_GLOBAL_TITLE_INDICATOR: u32 = 330;
    pub const CALLING_PA_SSN_INDICATOR: u32 = 331;
    pub const CALLING_PA_POINT_CODE_INDICATOR: u32 = 332;
    pub const CALLING_PA_POINT_CODE_NUMBER: u32 = 333;
    pub const CALLING_PA_SUBSYSTEM_NUMBER: u32 = 334;
    pub const CALLING_PA_GT_NUMBERING_PLAN: u32 = 335;
    pub const CALLING_PA_GT_ENCODING_SCHEME: u32 = 336;
    pub const CALLING_PA_GT_NATURE_OF_ADDRESS: u32 = 337;
    pub const CALLING_PA_GT_ADDRESS: u32 = 338;
    pub const CALLING_PA_GT_TRANSLATION_TYPE: u32 = 339;
    pub const MESSAGE_TYPE: u32 = 340;
}

pub mod m3ua {
    pub const INFO_STRING: u32 = 200;
    pub const ROUTING_CONTEXT: u32 = 201;
    pub const DIAGNOSTIC_INFO: u32 = 202;
    pub const HEARTBEAT: u32 = 203;
    pub const TRAFFIC_MODE_TYPE: u32 = 204;
    pub const ERROR_CODE: u32 = 205;
    pub const STATUS: u32 = 206;
    pub const ASP_IDENTIFIER: u32 = 207;
    pub const AFFECTED_POINT_CODE: u32 = 208;
    pub const CORRELATION_ID: u32 = 209;
    pub const NETWORK_APPEARANCE: u32 = 210;
    pub const USER_CAUSE: u32 = 211;
    pub const CONGESTION_INDICATIONS: u32 = 212;
    pub const CONCERNED_DESTINATION: u32 = 213;
    pub const ROUTING_KEY: u32 = 214;
    pub const REGISTRATION_RESULT: u32 = 215;
    pub const DEREGISTRATION_RESULT: u32 = 216;
    pub const LOCAL_ROUTING_KEY_IDENTIFIER: u32 = 217;
    pub const DESTINATION_POINT_CODE: u32 = 218;
    pub const SERVICE_INDICATORS: u32 = 219;
    pub const ORIGINATION_POINT_CODE_LIST: u32 = 220;
    pub const CIRCUIT_RANGE: u32 = 221;
    pub const PROTOCOL_DATA: u32 = 222;
    pub const PROTOCOL_DATA_SERVICE_INDICATOR: u32 = 223;
    pub const PROTOCOL_DATA_NETWORK_INDICATOR: u32 = 224;
    pub const PROTOCOL_DATA_MESSAGE_PRIORITY: u32 = 225;
    pub const PROTOCOL_DATA_DESTINATION_POINT_CODE: u32 = 226;
    pub const PROTOCOL_DATA_ORIGINATING_POINT_CODE: u32 = 227;
    pub const PROTOCOL_DATA_SIGNALLING_LINK_SELECTION_CODE: u32 = 228;
    pub const REGISTRATION_STATUS: u32 = 229;
    pub const DEREGISTRATION_STATUS: u32 = 230;
    pub const HEADER_DATA: u32 = 231;
    pub const AS_LABEL: u32 = 232;
    pub const ASP_LABEL: u32 = 233;
}

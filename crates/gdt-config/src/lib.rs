// gdt-config: hierarchical configuration engine riding on GDT streams.
//
// The model is a tree of typed nodes with templates, per-session
// working nodes and a transactional edit/commit/rollback cycle; the
// engine provides CLI auto-completion, validation, merge and
// publish/subscribe notifications; the RPC glue maps GDT config
// streams (LOGIN/LOGOUT/AC/SET/GET/REPLICATE) onto engine operations
// and replicates committed changes to peer daemons.

pub mod engine;
pub mod pattern;
pub mod rollback;
pub mod rpc;
pub mod text;
pub mod tree;

pub use engine::{
    AcMode, AcResult, ChangeHandler, Config, ConfigMode, FlatChange, Notification, NtfUser,
    UserId, UserInfo,
};
pub use pattern::{pattern_valid, CfgPattern};
pub use rpc::{CfgUpdateListener, ConfigRpc};
pub use text::{parse, render, tokenize_line, ContentNode, ParseError, RenderView};
pub use tree::{ConfigTree, HandlerId, Node, NodeId, NodeKind, NodeState, SpecialAc};

// gdt-protocol: GDT wire message types and the TLV codec.
//
// A GDT message is a header plus an optional body. The header carries
// addressing (source/destination endpoint descriptors), a 16-byte stream
// uuid, a big-endian sequence number, a sequence flag and optional
// encryption info, hop info and error status. The body is a choice over
// thirteen message kinds, most of which carry an action code and a
// parameter list of (id, octet-string parts) pairs.
//
// The schema is frozen; all enum discriminants and parameter ids in this
// crate are wire values and must not be renumbered.

mod codec;
mod types;

pub mod params;

pub use codec::{decode, encode, CodecError};
pub use types::*;

/// Current protocol version carried in every header.
pub const GDT_VERSION: u8 = 2;

/// Default hop ceiling for router relays.
pub const MAX_HOPS: u8 = 10;

/// Transport-level protocol tag ("GDT\0") carried in frame metadata.
pub const PROTOCOL_TAG: u32 = u32::from_be_bytes(*b"GDT\0");

//! Wire protocol definitions for the Duskhold world server.
//!
//! This crate owns the two opcode identity spaces (client→server and
//! server→client), the dispatch classification enums consumed by the opcode
//! registry, and the typed packet payloads with their [`postcard`] codec.
//! It carries no I/O and no handler logic.

pub mod dispatch;
pub mod opcodes;
pub mod packets;

pub use dispatch::{ConnectionType, PacketProcessing, ServerStatus, SessionStatus};
pub use opcodes::{
    ClientOpcode, MAX_CLIENT_OPCODES, MAX_SERVER_OPCODES, NULL_OPCODE, ServerOpcode,
    is_instance_only,
};
pub use packets::{CodecError, PROTOCOL_VERSION, encode_packet, parse_packet};

//! Human-readable opcode rendering for log lines.
//!
//! Safe to call on attacker-controlled input: every `u16` produces a
//! well-formed string, registered or not, in range or not.

use duskhold_protocol::{MAX_CLIENT_OPCODES, MAX_SERVER_OPCODES};

use crate::table::OpcodeTable;

/// Marker used for in-range identifiers with no registered descriptor.
const UNKNOWN_OPCODE: &str = "UNKNOWN OPCODE";

/// Marker used for identifiers outside the lookup space entirely.
const INVALID_OPCODE: &str = "INVALID OPCODE";

fn format_opcode(opcode: u16, max: u16, name: Option<&str>) -> String {
    let marker = if opcode >= max {
        INVALID_OPCODE
    } else {
        name.unwrap_or(UNKNOWN_OPCODE)
    };
    format!("[{marker} 0x{opcode:04X} ({opcode})]")
}

impl<S> OpcodeTable<S> {
    /// Render a client opcode as `[<name> 0x<hex> (<dec>)]` for diagnostics.
    pub fn client_opcode_name(&self, opcode: u16) -> String {
        format_opcode(
            opcode,
            MAX_CLIENT_OPCODES,
            self.client_handler(opcode).map(|h| h.name.as_str()),
        )
    }

    /// Render a server opcode as `[<name> 0x<hex> (<dec>)]` for diagnostics.
    pub fn server_opcode_name(&self, opcode: u16) -> String {
        format_opcode(
            opcode,
            MAX_SERVER_OPCODES,
            self.server_handler(opcode).map(|h| h.name.as_str()),
        )
    }
}

//! The opcode table: two fixed-size identifier→descriptor arrays and the
//! validation rules that guard registration.

use duskhold_protocol::{
    ConnectionType, MAX_CLIENT_OPCODES, MAX_SERVER_OPCODES, NULL_OPCODE, PacketProcessing,
    ServerStatus, SessionStatus, is_instance_only,
};

use crate::handler::{ClientHandlerFn, ClientOpcodeHandler, ServerOpcodeHandler};

/// A registration attempt the table refused.
///
/// Every variant is non-fatal: the offending row is skipped and the rest of
/// the table loads normally. One bad row must never block startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The row used the reserved null sentinel.
    #[error("opcode {name} does not have a value")]
    NullOpcode {
        /// Display name of the attempted registration.
        name: String,
    },

    /// The identifier lies outside its space's lookup array. The value is
    /// kept wide so definition rows with garbage numbers are reported
    /// verbatim.
    #[error("tried to set handler for invalid opcode {opcode:#06X} ({name})")]
    OutOfRange {
        /// Display name of the attempted registration.
        name: String,
        /// The offending identifier.
        opcode: u32,
    },

    /// The slot is already occupied. First registration wins; this protects
    /// against duplicate rows introduced by concurrent protocol-version
    /// merges.
    #[error("tried to override handler of {existing} with {attempted} (opcode {opcode})")]
    Duplicate {
        /// Name of the descriptor already occupying the slot.
        existing: String,
        /// Name of the rejected registration.
        attempted: String,
        /// The contested identifier.
        opcode: u16,
    },

    /// An instance-only server opcode declared a non-instance channel.
    #[error("tried to set connection type {connection:?} for instance-only opcode {name}")]
    InvalidConnectionType {
        /// Display name of the attempted registration.
        name: String,
        /// The declared channel.
        connection: ConnectionType,
    },

    /// A definition row named a handler key the registry does not know.
    #[error("definition row {name} names unknown handler key {key:?}")]
    UnknownHandler {
        /// Display name of the attempted registration.
        name: String,
        /// The unresolved handler key.
        key: String,
    },
}

/// Identifier→descriptor lookup table for both opcode spaces.
///
/// Built once during startup, strictly before any network or worker task
/// reads it; afterwards it is only ever read, so sharing an
/// `Arc<OpcodeTable<S>>` across threads needs no synchronization.
pub struct OpcodeTable<S> {
    client: Box<[Option<ClientOpcodeHandler<S>>]>,
    server: Box<[Option<ServerOpcodeHandler>]>,
}

impl<S> OpcodeTable<S> {
    /// Create a table with every slot empty.
    pub fn new() -> Self {
        Self {
            client: (0..MAX_CLIENT_OPCODES).map(|_| None).collect(),
            server: (0..MAX_SERVER_OPCODES).map(|_| None).collect(),
        }
    }

    /// Register a client-originated opcode.
    ///
    /// Checks, in order: the null sentinel, the space bound, and duplicate
    /// occupancy. On any failure the table is left untouched and the error
    /// describes the row well enough to find it in the definition table.
    pub fn define_client(
        &mut self,
        opcode: u16,
        name: &str,
        status: SessionStatus,
        processing: PacketProcessing,
        call: ClientHandlerFn<S>,
    ) -> Result<(), RegistrationError> {
        if opcode == NULL_OPCODE {
            return Err(RegistrationError::NullOpcode {
                name: name.to_string(),
            });
        }
        if opcode >= MAX_CLIENT_OPCODES {
            return Err(RegistrationError::OutOfRange {
                name: name.to_string(),
                opcode: opcode.into(),
            });
        }
        let slot = &mut self.client[opcode as usize];
        if let Some(existing) = slot {
            return Err(RegistrationError::Duplicate {
                existing: existing.name.clone(),
                attempted: name.to_string(),
                opcode,
            });
        }
        *slot = Some(ClientOpcodeHandler::new(name, status, processing, call));
        Ok(())
    }

    /// Register a server-originated opcode.
    ///
    /// Same null/range/duplicate checks as the client side, plus the
    /// instance-only channel restriction. The status is restricted to
    /// `Never`/`Unhandled` by [`ServerStatus`] itself.
    pub fn define_server(
        &mut self,
        opcode: u16,
        name: &str,
        status: ServerStatus,
        connection: ConnectionType,
    ) -> Result<(), RegistrationError> {
        if opcode == NULL_OPCODE {
            return Err(RegistrationError::NullOpcode {
                name: name.to_string(),
            });
        }
        if opcode >= MAX_SERVER_OPCODES {
            return Err(RegistrationError::OutOfRange {
                name: name.to_string(),
                opcode: opcode.into(),
            });
        }
        if is_instance_only(opcode) && connection != ConnectionType::Instance {
            return Err(RegistrationError::InvalidConnectionType {
                name: name.to_string(),
                connection,
            });
        }
        let slot = &mut self.server[opcode as usize];
        if let Some(existing) = slot {
            return Err(RegistrationError::Duplicate {
                existing: existing.name.clone(),
                attempted: name.to_string(),
                opcode,
            });
        }
        *slot = Some(ServerOpcodeHandler {
            name: name.to_string(),
            status: status.into(),
            connection,
        });
        Ok(())
    }

    /// Look up the descriptor for a client opcode.
    ///
    /// Total over `u16`: out-of-range and unregistered identifiers both
    /// return `None`. Absence is an expected state — identifiers exist in
    /// the space without being wired to behavior under every protocol
    /// version.
    pub fn client_handler(&self, opcode: u16) -> Option<&ClientOpcodeHandler<S>> {
        self.client.get(opcode as usize)?.as_ref()
    }

    /// Look up the descriptor for a server opcode. Total over `u16`.
    pub fn server_handler(&self, opcode: u16) -> Option<&ServerOpcodeHandler> {
        self.server.get(opcode as usize)?.as_ref()
    }
}

impl<S> Default for OpcodeTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

//! Declarative opcode definition table and its loader.
//!
//! The protocol's opcode→handler mapping is data, not code: a RON document
//! of rows, each naming an identifier, a display name, the dispatch
//! classifications, and (client side) a handler key. The loader joins the
//! rows against a [`HandlerRegistry`] of named callables and runs the
//! generic registration step over every row, skipping and logging bad rows
//! rather than aborting. The table is hand-maintained and merged across
//! protocol versions by many contributors; this loader is the last line of
//! defense against shipping a duplicate-mapped or corrupted table.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use duskhold_protocol::{
    ConnectionType, MAX_CLIENT_OPCODES, MAX_SERVER_OPCODES, NULL_OPCODE, PacketProcessing,
    ServerStatus, SessionStatus,
};

use crate::handler::{ClientHandlerFn, null_handler};
use crate::table::{OpcodeTable, RegistrationError};

/// Errors reading or parsing a definition document.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// Failed to read the definition file from disk.
    #[error("failed to read opcode definitions: {0}")]
    Read(#[source] std::io::Error),

    /// Failed to parse RON content.
    #[error("failed to parse opcode definitions: {0}")]
    Parse(#[source] ron::error::SpannedError),
}

/// One client-opcode row.
///
/// The identifier is kept wide (`u32`) so a garbage value survives parsing
/// and is rejected by the range check with its real value in the log, the
/// same way any other bad row is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientDefinition {
    /// Numeric identifier in the client space.
    pub opcode: u32,
    /// Display name, e.g. `CMSG_PING`.
    pub name: String,
    /// Session phase gate.
    pub status: SessionStatus,
    /// Threading classification.
    pub processing: PacketProcessing,
    /// Key into the [`HandlerRegistry`]; `"null"` for unimplemented rows.
    pub handler: String,
}

/// One server-opcode row. No handler key: the server only produces these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerDefinition {
    /// Numeric identifier in the server space.
    pub opcode: u32,
    /// Display name, e.g. `SMSG_PONG`.
    pub name: String,
    /// Restricted to `Never`/`Unhandled`; any other status fails parsing.
    pub status: ServerStatus,
    /// Logical channel the message travels on.
    pub connection: ConnectionType,
}

/// The full declarative table: both opcode spaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DefinitionTable {
    /// Client-originated rows.
    pub client: Vec<ClientDefinition>,
    /// Server-originated rows.
    pub server: Vec<ServerDefinition>,
}

impl DefinitionTable {
    /// Parse a definition table from RON text.
    pub fn from_ron(text: &str) -> Result<Self, DefinitionError> {
        ron::from_str(text).map_err(DefinitionError::Parse)
    }

    /// Load a definition table from a RON file.
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let text = std::fs::read_to_string(path).map_err(DefinitionError::Read)?;
        Self::from_ron(&text)
    }
}

/// Named handler callables the definition rows can reference.
///
/// The key `"null"` is pre-bound to a no-op so `Unhandled` rows need no
/// hand-written handler.
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, ClientHandlerFn<S>>,
}

impl<S> HandlerRegistry<S> {
    /// Create a registry containing only the `"null"` handler.
    pub fn new() -> Self {
        let mut handlers: HashMap<String, ClientHandlerFn<S>> = HashMap::new();
        handlers.insert("null".to_string(), null_handler());
        Self { handlers }
    }

    /// Bind a callable to a handler key. Later bindings replace earlier
    /// ones; keys are code, not merged data, so overwrite is the useful
    /// behavior here.
    pub fn insert(&mut self, key: impl Into<String>, handler: ClientHandlerFn<S>) {
        self.handlers.insert(key.into(), handler);
    }

    /// Resolve a handler key to its callable.
    pub fn get(&self, key: &str) -> Option<ClientHandlerFn<S>> {
        self.handlers.get(key).cloned()
    }
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a [`load_definitions`] run.
#[derive(Debug, Default)]
pub struct RegistrationSummary {
    /// Rows that made it into the table.
    pub registered: usize,
    /// Rows the validation step refused, in input order.
    pub rejected: Vec<RegistrationError>,
}

impl RegistrationSummary {
    fn reject(&mut self, err: RegistrationError) {
        tracing::error!("{err}");
        self.rejected.push(err);
    }
}

/// Run the registration step over every row of a definition table.
///
/// Bad rows are logged and skipped; the rest of the table loads normally.
/// Call once at startup, before any reader of the table exists.
pub fn load_definitions<S>(
    table: &mut OpcodeTable<S>,
    definitions: &DefinitionTable,
    handlers: &HandlerRegistry<S>,
) -> RegistrationSummary {
    let mut summary = RegistrationSummary::default();

    for row in &definitions.client {
        let Some(call) = handlers.get(&row.handler) else {
            summary.reject(RegistrationError::UnknownHandler {
                name: row.name.clone(),
                key: row.handler.clone(),
            });
            continue;
        };
        // Wide-value guard: anything that cannot index the table is
        // rejected here with its raw value intact.
        if row.opcode != u32::from(NULL_OPCODE) && row.opcode >= u32::from(MAX_CLIENT_OPCODES) {
            summary.reject(RegistrationError::OutOfRange {
                name: row.name.clone(),
                opcode: row.opcode,
            });
            continue;
        }
        match table.define_client(row.opcode as u16, &row.name, row.status, row.processing, call) {
            Ok(()) => summary.registered += 1,
            Err(err) => summary.reject(err),
        }
    }

    for row in &definitions.server {
        if row.opcode != u32::from(NULL_OPCODE) && row.opcode >= u32::from(MAX_SERVER_OPCODES) {
            summary.reject(RegistrationError::OutOfRange {
                name: row.name.clone(),
                opcode: row.opcode,
            });
            continue;
        }
        match table.define_server(row.opcode as u16, &row.name, row.status, row.connection) {
            Ok(()) => summary.registered += 1,
            Err(err) => summary.reject(err),
        }
    }

    if summary.rejected.is_empty() {
        tracing::info!(registered = summary.registered, "opcode table loaded");
    } else {
        tracing::warn!(
            registered = summary.registered,
            rejected = summary.rejected.len(),
            "opcode table loaded with rejected rows"
        );
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    struct TestSession;

    fn registry() -> HandlerRegistry<TestSession> {
        let mut handlers = HandlerRegistry::new();
        handlers.insert("ping", Arc::new(|_: &mut TestSession, _: &[u8]| {}));
        handlers.insert("chat_say", Arc::new(|_: &mut TestSession, _: &[u8]| {}));
        handlers
    }

    #[test]
    fn test_parse_ron_document() {
        let text = r#"(
            client: [
                (opcode: 0x0003, name: "CMSG_PING", status: Never, processing: Inplace, handler: "ping"),
            ],
            server: [
                (opcode: 0x0003, name: "SMSG_PONG", status: Never, connection: Realm),
            ],
        )"#;
        let defs = DefinitionTable::from_ron(text).unwrap();
        assert_eq!(defs.client.len(), 1);
        assert_eq!(defs.server.len(), 1);
        assert_eq!(defs.client[0].name, "CMSG_PING");
        assert_eq!(defs.server[0].connection, ConnectionType::Realm);
    }

    #[test]
    fn test_server_row_with_client_status_fails_parse() {
        let text = r#"(
            client: [],
            server: [
                (opcode: 0x0010, name: "SMSG_BAD", status: LoggedIn, connection: Realm),
            ],
        )"#;
        assert!(matches!(
            DefinitionTable::from_ron(text),
            Err(DefinitionError::Parse(_))
        ));
    }

    #[test]
    fn test_load_happy_path() {
        let defs = DefinitionTable {
            client: vec![ClientDefinition {
                opcode: 0x0003,
                name: "CMSG_PING".into(),
                status: SessionStatus::Never,
                processing: PacketProcessing::Inplace,
                handler: "ping".into(),
            }],
            server: vec![ServerDefinition {
                opcode: 0x0003,
                name: "SMSG_PONG".into(),
                status: ServerStatus::Never,
                connection: ConnectionType::Realm,
            }],
        };
        let mut table = OpcodeTable::new();
        let summary = load_definitions(&mut table, &defs, &registry());

        assert_eq!(summary.registered, 2);
        assert!(summary.rejected.is_empty());
        assert_eq!(table.client_handler(3).unwrap().name, "CMSG_PING");
        assert_eq!(table.server_handler(3).unwrap().name, "SMSG_PONG");
    }

    #[test]
    fn test_duplicate_rows_first_wins() {
        let defs = DefinitionTable {
            client: vec![
                ClientDefinition {
                    opcode: 5,
                    name: "CMSG_PING".into(),
                    status: SessionStatus::Never,
                    processing: PacketProcessing::Inplace,
                    handler: "ping".into(),
                },
                ClientDefinition {
                    opcode: 5,
                    name: "CMSG_DUPLICATE".into(),
                    status: SessionStatus::LoggedIn,
                    processing: PacketProcessing::ThreadUnsafe,
                    handler: "null".into(),
                },
            ],
            server: vec![],
        };
        let mut table = OpcodeTable::new();
        let summary = load_definitions(&mut table, &defs, &registry());

        assert_eq!(summary.registered, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert!(matches!(
            summary.rejected[0],
            RegistrationError::Duplicate { .. }
        ));
        assert_eq!(table.client_handler(5).unwrap().name, "CMSG_PING");
    }

    #[test]
    fn test_unknown_handler_key_skips_row() {
        let defs = DefinitionTable {
            client: vec![ClientDefinition {
                opcode: 9,
                name: "CMSG_MYSTERY".into(),
                status: SessionStatus::LoggedIn,
                processing: PacketProcessing::ThreadSafe,
                handler: "does_not_exist".into(),
            }],
            server: vec![],
        };
        let mut table = OpcodeTable::new();
        let summary = load_definitions(&mut table, &defs, &registry());

        assert_eq!(summary.registered, 0);
        assert!(matches!(
            summary.rejected[0],
            RegistrationError::UnknownHandler { .. }
        ));
        assert!(table.client_handler(9).is_none());
    }

    #[test]
    fn test_adversarial_rows_degrade_gracefully() {
        // Null sentinel, huge identifier, and a duplicate, mixed in with
        // valid rows: the valid rows all load, the rest are skipped.
        let defs = DefinitionTable {
            client: vec![
                ClientDefinition {
                    opcode: 0,
                    name: "CMSG_UNASSIGNED".into(),
                    status: SessionStatus::Unhandled,
                    processing: PacketProcessing::Inplace,
                    handler: "null".into(),
                },
                ClientDefinition {
                    opcode: 999_999,
                    name: "CMSG_GARBAGE".into(),
                    status: SessionStatus::LoggedIn,
                    processing: PacketProcessing::ThreadSafe,
                    handler: "null".into(),
                },
                ClientDefinition {
                    opcode: 0x0301,
                    name: "CMSG_CHAT_MESSAGE_SAY".into(),
                    status: SessionStatus::LoggedIn,
                    processing: PacketProcessing::ThreadUnsafe,
                    handler: "chat_say".into(),
                },
                ClientDefinition {
                    opcode: 0x0301,
                    name: "CMSG_CHAT_MESSAGE_SAY_AGAIN".into(),
                    status: SessionStatus::LoggedIn,
                    processing: PacketProcessing::ThreadUnsafe,
                    handler: "chat_say".into(),
                },
            ],
            server: vec![],
        };
        let mut table = OpcodeTable::new();
        let summary = load_definitions(&mut table, &defs, &registry());

        assert_eq!(summary.registered, 1);
        assert_eq!(summary.rejected.len(), 3);
        assert!(matches!(
            summary.rejected[0],
            RegistrationError::NullOpcode { .. }
        ));
        match &summary.rejected[1] {
            RegistrationError::OutOfRange { opcode, .. } => assert_eq!(*opcode, 999_999),
            other => panic!("expected OutOfRange, got {other:?}"),
        }
        assert!(matches!(
            summary.rejected[2],
            RegistrationError::Duplicate { .. }
        ));
        assert_eq!(
            table.client_handler(0x0301).unwrap().name,
            "CMSG_CHAT_MESSAGE_SAY"
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"(
                client: [
                    (opcode: 0x0003, name: "CMSG_PING", status: Never, processing: Inplace, handler: "ping"),
                ],
                server: [],
            )"#
        )
        .unwrap();

        let defs = DefinitionTable::load(file.path()).unwrap();
        assert_eq!(defs.client.len(), 1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = DefinitionTable::load(Path::new("/nonexistent/opcodes.ron"));
        assert!(matches!(result, Err(DefinitionError::Read(_))));
    }

    #[test]
    fn test_malformed_ron_is_parse_error() {
        assert!(matches!(
            DefinitionTable::from_ron("(client: [oops"),
            Err(DefinitionError::Parse(_))
        ));
    }
}

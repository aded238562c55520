//! Opcode→handler registry for the Duskhold world server.
//!
//! The [`OpcodeTable`] maps every known message identifier to a
//! [`ClientOpcodeHandler`] or [`ServerOpcodeHandler`] describing its display
//! name, session-status requirement, and processing or connection-type
//! classification. The table is populated exactly once at startup by the
//! registration step — each entry validated for a null sentinel, range, and
//! duplicate occupancy before it becomes visible — and is immutable and
//! lock-free to read for the rest of the process. Construct it during
//! startup, wrap it in an `Arc`, and hand it to every component that needs
//! lookup; there is no global table.
//!
//! The table contents come from a declarative definition table
//! ([`DefinitionTable`], RON on disk or embedded) joined against a
//! [`HandlerRegistry`] of named callables, so duplicate or malformed rows
//! are a load-time diagnostic rather than a compile-time surprise.

pub mod definitions;
pub mod diagnostics;
pub mod handler;
pub mod table;

pub use definitions::{
    ClientDefinition, DefinitionError, DefinitionTable, HandlerRegistry, RegistrationSummary,
    ServerDefinition, load_definitions,
};
pub use handler::{ClientHandlerFn, ClientOpcodeHandler, ServerOpcodeHandler, packet_handler};
pub use table::{OpcodeTable, RegistrationError};

//! Dispatch classification enums consumed by the opcode registry.
//!
//! Every registered opcode carries a [`SessionStatus`] (the minimum session
//! phase required before the message is legal to process) and either a
//! [`PacketProcessing`] (client space: which thread may run the handler) or
//! a [`ConnectionType`] (server space: which logical channel carries the
//! message). The registry records these; the dispatcher enforces them.
//!
//! All sets are closed. The serde derives exist so the declarative opcode
//! definition table can name the variants in RON.

use serde::{Deserialize, Serialize};

/// Minimum session phase required before a message may be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Never processed by the dispatch path. These opcodes are consumed
    /// earlier in the pipeline (raw authentication, keepalive) or are
    /// server-originated; one arriving at the dispatcher is suspicious.
    Never,
    /// Account is authenticated but no character is in the world.
    Authed,
    /// A character is logged into a game world.
    LoggedIn,
    /// Logged in, or within the grace period right after logout.
    LoggedInOrRecentlyLoggedOut,
    /// Mid world-transfer between maps.
    Transfer,
    /// Recognized opcode with no implemented behavior. A safe no-op
    /// classification, not an error.
    Unhandled,
}

/// Where a client packet handler may run relative to the network task.
///
/// This is a concurrency contract, not a hint: it decides which queue the
/// dispatcher places the message on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketProcessing {
    /// Run synchronously on the network task immediately upon receipt.
    Inplace,
    /// May run on any worker; touches no unsynchronized shared state.
    ThreadSafe,
    /// Must run serially on the owning world's update tick.
    ThreadUnsafe,
}

/// Logical channel a server-originated message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionType {
    /// The primary realm connection (auth, roster, chat).
    Realm,
    /// The per-map instance connection (world-state stream).
    Instance,
}

/// Session status of a server-originated opcode.
///
/// A server-originated message is never gated on session phase the way
/// inbound messages are; only the `Never` and `Unhandled` classifications
/// are legal. Making this a separate two-variant type pushes the constraint
/// to the type system for programmatic registrations and to deserialization
/// for data-driven rows — a definition file naming any other status fails
/// to parse before the registration step ever sees the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    /// Produced by the server; never dispatched inbound.
    Never,
    /// Recognized but unimplemented in the protocol version in force.
    Unhandled,
}

impl From<ServerStatus> for SessionStatus {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Never => SessionStatus::Never,
            ServerStatus::Unhandled => SessionStatus::Unhandled,
        }
    }
}

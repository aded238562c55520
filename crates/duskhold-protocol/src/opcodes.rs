//! Opcode identity spaces for the Duskhold wire protocol.
//!
//! Opcodes are `u16` values drawn from two disjoint spaces: client→server
//! (`CMSG`) and server→client (`SMSG`). Both spaces are organized into
//! functional ranges so coarse routing decisions only need the high byte:
//!
//! - `0x00xx`: session lifecycle (auth, keepalive, disconnect)
//! - `0x01xx`: character roster and login
//! - `0x02xx`: movement
//! - `0x03xx`: chat
//! - `0x04xx`: combat
//! - `0x05xx`: queries
//! - `0x06xx`: world transfer
//! - `0x07xx`: world-state stream (server space only)
//!
//! The numeric values are the wire contract. `0x0000` is the reserved null
//! sentinel and never identifies a message; values at or above the space
//! maximum are invalid. Both `from_u16` conversions are total and return
//! `None` for unknown values — unknown opcodes are rejected by the caller,
//! never silently mapped onto a default.

/// Reserved sentinel meaning "no opcode assigned". Never registrable.
pub const NULL_OPCODE: u16 = 0x0000;

/// Size of the client-opcode lookup space. Identifiers at or above this
/// value are invalid in the client→server direction.
pub const MAX_CLIENT_OPCODES: u16 = 0x0800;

/// Size of the server-opcode lookup space. Identifiers at or above this
/// value are invalid in the server→client direction.
pub const MAX_SERVER_OPCODES: u16 = 0x0800;

/// Client→server message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ClientOpcode {
    // Session lifecycle (0x00xx)
    /// Initial authentication challenge response.
    AuthSession = 0x0001,
    /// Resume an interrupted session on a new connection.
    AuthContinuedSession = 0x0002,
    /// Keepalive ping. Answered with `SMSG_PONG` before dispatch.
    Ping = 0x0003,
    /// Idle keepalive without an expected response.
    KeepAlive = 0x0004,
    /// Client-side disconnect diagnostics.
    LogDisconnect = 0x0005,

    // Character roster (0x01xx)
    /// Request the account's character list.
    EnumCharacters = 0x0101,
    /// Create a character.
    CreateCharacter = 0x0102,
    /// Delete a character.
    DeleteCharacter = 0x0103,
    /// Enter the world with a chosen character.
    PlayerLogin = 0x0104,
    /// Begin logout from the world.
    LogoutRequest = 0x0105,
    /// Abort a pending logout.
    LogoutCancel = 0x0106,

    // Movement (0x02xx)
    /// Start moving forward.
    MoveStartForward = 0x0201,
    /// Stop all movement.
    MoveStop = 0x0202,
    /// Periodic position report while moving.
    MoveHeartbeat = 0x0203,
    /// Jump.
    MoveJump = 0x0204,
    /// Change facing.
    MoveSetFacing = 0x0205,

    // Chat (0x03xx)
    /// Say to nearby players.
    ChatMessageSay = 0x0301,
    /// Yell to the zone.
    ChatMessageYell = 0x0302,
    /// Whisper to a named player.
    ChatMessageWhisper = 0x0303,
    /// Report a whisper from an ignored player.
    ChatReportIgnored = 0x0304,

    // Combat (0x04xx)
    /// Begin auto-attacking the selected target.
    AttackSwing = 0x0401,
    /// Stop auto-attacking.
    AttackStop = 0x0402,
    /// Change the selected target.
    SetSelection = 0x0403,
    /// Cancel an in-progress cast.
    CancelCast = 0x0404,
    /// Cancel an in-progress trade. Legal during the logout grace period so
    /// a vanished partner cannot wedge the trade window.
    CancelTrade = 0x0405,

    // Queries (0x05xx)
    /// Request server time.
    QueryTime = 0x0501,
    /// Resolve a player id to a name.
    QueryPlayerName = 0x0502,
    /// Request a game-object template.
    QueryGameObject = 0x0503,
    /// Request a creature template.
    QueryCreature = 0x0504,
    /// Request the realm display name.
    QueryRealmName = 0x0505,

    // World transfer (0x06xx)
    /// Acknowledge arrival in the destination map.
    WorldPortResponse = 0x0601,
    /// Acknowledge a suspend token during transfer.
    SuspendTokenResponse = 0x0602,
}

impl ClientOpcode {
    /// Convert to the raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from a raw wire value.
    ///
    /// Total over `u16`; returns `None` for values that do not identify a
    /// known client opcode (including [`NULL_OPCODE`]).
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::AuthSession),
            0x0002 => Some(Self::AuthContinuedSession),
            0x0003 => Some(Self::Ping),
            0x0004 => Some(Self::KeepAlive),
            0x0005 => Some(Self::LogDisconnect),

            0x0101 => Some(Self::EnumCharacters),
            0x0102 => Some(Self::CreateCharacter),
            0x0103 => Some(Self::DeleteCharacter),
            0x0104 => Some(Self::PlayerLogin),
            0x0105 => Some(Self::LogoutRequest),
            0x0106 => Some(Self::LogoutCancel),

            0x0201 => Some(Self::MoveStartForward),
            0x0202 => Some(Self::MoveStop),
            0x0203 => Some(Self::MoveHeartbeat),
            0x0204 => Some(Self::MoveJump),
            0x0205 => Some(Self::MoveSetFacing),

            0x0301 => Some(Self::ChatMessageSay),
            0x0302 => Some(Self::ChatMessageYell),
            0x0303 => Some(Self::ChatMessageWhisper),
            0x0304 => Some(Self::ChatReportIgnored),

            0x0401 => Some(Self::AttackSwing),
            0x0402 => Some(Self::AttackStop),
            0x0403 => Some(Self::SetSelection),
            0x0404 => Some(Self::CancelCast),
            0x0405 => Some(Self::CancelTrade),

            0x0501 => Some(Self::QueryTime),
            0x0502 => Some(Self::QueryPlayerName),
            0x0503 => Some(Self::QueryGameObject),
            0x0504 => Some(Self::QueryCreature),
            0x0505 => Some(Self::QueryRealmName),

            0x0601 => Some(Self::WorldPortResponse),
            0x0602 => Some(Self::SuspendTokenResponse),

            _ => None,
        }
    }
}

/// Server→client message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ServerOpcode {
    // Session lifecycle (0x00xx)
    /// Authentication challenge with the server seed.
    AuthChallenge = 0x0001,
    /// Result of an authentication attempt.
    AuthResponse = 0x0002,
    /// Keepalive response.
    Pong = 0x0003,
    /// Logout accepted or denied.
    LogoutResponse = 0x0004,
    /// Logout finished; character left the world.
    LogoutComplete = 0x0005,
    /// Pending logout aborted.
    LogoutCancelAck = 0x0006,
    /// Message of the day.
    Motd = 0x0007,
    /// Login queue position update.
    WaitQueueUpdate = 0x0008,
    /// Login queue cleared.
    WaitQueueFinish = 0x0009,

    // Character roster (0x01xx)
    /// Character list for the account.
    EnumCharactersResult = 0x0101,
    /// Result of a character creation attempt.
    CreateCharacterResult = 0x0102,
    /// Result of a character deletion attempt.
    DeleteCharacterResult = 0x0103,
    /// World entry failed.
    CharacterLoginFailed = 0x0104,

    // Chat (0x03xx)
    /// Chat line fanned out to recipients.
    ChatBroadcast = 0x0301,
    /// Whisper target does not exist or is offline.
    ChatPlayerNotFound = 0x0302,
    /// Chat disabled for this session.
    ChatRestricted = 0x0303,

    // Combat (0x04xx)
    /// A unit began auto-attacking.
    AttackStart = 0x0401,
    /// A unit stopped auto-attacking.
    AttackStop = 0x0402,
    /// Auto-attack failed (bad facing, dead target, out of range).
    AttackSwingError = 0x0403,

    // Queries (0x05xx)
    /// Server time response.
    QueryTimeResponse = 0x0501,
    /// Player name resolution response.
    QueryPlayerNameResponse = 0x0502,
    /// Game-object template response.
    QueryGameObjectResponse = 0x0503,
    /// Creature template response.
    QueryCreatureResponse = 0x0504,

    // World transfer (0x06xx)
    /// A map transfer is about to begin.
    TransferPending = 0x0601,
    /// A map transfer failed.
    TransferAborted = 0x0602,
    /// Load the destination map.
    NewWorld = 0x0603,
    /// Suspend token handed out during transfer.
    SuspendToken = 0x0604,
    /// Resume token for the destination connection.
    ResumeToken = 0x0605,

    // World-state stream (0x07xx)
    /// Object create/update blocks.
    UpdateObject = 0x0701,
    /// Objects left visibility.
    DestroyObject = 0x0702,
    /// Server-driven creature movement.
    MonsterMove = 0x0703,
    /// Movement of another player.
    MoveUpdate = 0x0704,
    /// Clock synchronization request.
    TimeSyncRequest = 0x0705,
    /// Per-map server info sent on world entry.
    WorldServerInfo = 0x0706,
    /// A zone is under attack.
    ZoneUnderAttack = 0x0707,
}

impl ServerOpcode {
    /// Convert to the raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from a raw wire value.
    ///
    /// Total over `u16`; returns `None` for values that do not identify a
    /// known server opcode (including [`NULL_OPCODE`]).
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::AuthChallenge),
            0x0002 => Some(Self::AuthResponse),
            0x0003 => Some(Self::Pong),
            0x0004 => Some(Self::LogoutResponse),
            0x0005 => Some(Self::LogoutComplete),
            0x0006 => Some(Self::LogoutCancelAck),
            0x0007 => Some(Self::Motd),
            0x0008 => Some(Self::WaitQueueUpdate),
            0x0009 => Some(Self::WaitQueueFinish),

            0x0101 => Some(Self::EnumCharactersResult),
            0x0102 => Some(Self::CreateCharacterResult),
            0x0103 => Some(Self::DeleteCharacterResult),
            0x0104 => Some(Self::CharacterLoginFailed),

            0x0301 => Some(Self::ChatBroadcast),
            0x0302 => Some(Self::ChatPlayerNotFound),
            0x0303 => Some(Self::ChatRestricted),

            0x0401 => Some(Self::AttackStart),
            0x0402 => Some(Self::AttackStop),
            0x0403 => Some(Self::AttackSwingError),

            0x0501 => Some(Self::QueryTimeResponse),
            0x0502 => Some(Self::QueryPlayerNameResponse),
            0x0503 => Some(Self::QueryGameObjectResponse),
            0x0504 => Some(Self::QueryCreatureResponse),

            0x0601 => Some(Self::TransferPending),
            0x0602 => Some(Self::TransferAborted),
            0x0603 => Some(Self::NewWorld),
            0x0604 => Some(Self::SuspendToken),
            0x0605 => Some(Self::ResumeToken),

            0x0701 => Some(Self::UpdateObject),
            0x0702 => Some(Self::DestroyObject),
            0x0703 => Some(Self::MonsterMove),
            0x0704 => Some(Self::MoveUpdate),
            0x0705 => Some(Self::TimeSyncRequest),
            0x0706 => Some(Self::WorldServerInfo),
            0x0707 => Some(Self::ZoneUnderAttack),

            _ => None,
        }
    }
}

/// Whether a server opcode may only be sent on the instance channel.
///
/// The world-state stream (object updates, movement, map loading) is bound
/// to the per-map instance connection; registering one of these opcodes
/// against the realm channel is a protocol-table editing mistake.
#[must_use]
pub const fn is_instance_only(opcode: u16) -> bool {
    matches!(
        ServerOpcode::from_u16(opcode),
        Some(
            ServerOpcode::UpdateObject
                | ServerOpcode::DestroyObject
                | ServerOpcode::MonsterMove
                | ServerOpcode::MoveUpdate
                | ServerOpcode::NewWorld
                | ServerOpcode::ResumeToken
                | ServerOpcode::AttackStart
                | ServerOpcode::AttackStop
        )
    )
}

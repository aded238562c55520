//! Typed packet payloads and their [`postcard`] codec.
//!
//! The frame layer carries the opcode; the payload is the postcard encoding
//! of the matching struct here. [`parse_packet`] deliberately returns the
//! unconsumed trailing bytes alongside the value: protocol-version drift
//! shows up as a non-empty tail, which the dispatch layer logs as a
//! diagnostic instead of failing the packet.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// Protocol revision negotiated during the auth handshake.
pub const PROTOCOL_VERSION: u32 = 3;

// ---------------------------------------------------------------------------
// Client payloads
// ---------------------------------------------------------------------------

/// Response to [`AuthChallenge`]: account credentials and proof.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    /// Client build number.
    pub build: u32,
    /// Protocol revision the client speaks.
    pub protocol_version: u32,
    /// Account name.
    pub account: String,
    /// Client-chosen seed for the session proof.
    pub client_seed: u64,
    /// Proof digest over seeds and the session key.
    pub digest: Vec<u8>,
}

/// Resume an interrupted session on a new connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthContinuedSession {
    /// Key identifying the suspended session.
    pub session_key: u64,
    /// Proof digest.
    pub digest: Vec<u8>,
}

/// Keepalive ping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ping {
    /// Monotonic ping serial.
    pub serial: u32,
    /// Client-measured latency in milliseconds.
    pub latency_ms: u32,
}

/// Request the account's character list. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnumCharacters {}

/// Create a character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateCharacter {
    /// Requested character name.
    pub name: String,
    /// Class identifier.
    pub class_id: u8,
    /// Race identifier.
    pub race_id: u8,
}

/// Delete a character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteCharacter {
    /// Character guid to delete.
    pub guid: u64,
}

/// Enter the world with a chosen character.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerLogin {
    /// Character guid from the roster.
    pub guid: u64,
}

/// Begin logout. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogoutRequest {}

/// Abort a pending logout. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogoutCancel {}

/// Change the selected target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetSelection {
    /// Target guid, 0 to clear.
    pub target: u64,
}

/// Cancel an in-progress trade. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancelTrade {}

/// A chat line from the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Message text.
    pub text: String,
    /// Whisper target, when the opcode is a whisper.
    pub target: Option<String>,
}

/// Periodic position report while moving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveHeartbeat {
    /// Movement counter for ack ordering.
    pub counter: u32,
    /// Position x.
    pub x: f32,
    /// Position y.
    pub y: f32,
    /// Position z.
    pub z: f32,
    /// Facing in radians.
    pub facing: f32,
}

/// Begin auto-attacking a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackSwing {
    /// Target guid.
    pub target: u64,
}

/// Stop auto-attacking. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AttackStop {}

/// Request server time. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryTime {}

/// Resolve a player id to a name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPlayerName {
    /// Player guid to resolve.
    pub guid: u64,
}

/// Acknowledge arrival in the destination map. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldPortResponse {}

// ---------------------------------------------------------------------------
// Server payloads
// ---------------------------------------------------------------------------

/// Authentication challenge with the server seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthChallenge {
    /// Server-chosen seed for the session proof.
    pub server_seed: u64,
    /// Protocol revision the server speaks.
    pub protocol_version: u32,
}

/// Result of an authentication attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    /// Whether the session is authenticated.
    pub success: bool,
    /// Queue position when the realm is full, 0 otherwise.
    pub queue_position: u32,
}

/// Keepalive response, echoing the ping serial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    /// Echoed ping serial.
    pub serial: u32,
}

/// Message of the day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Motd {
    /// One line per entry.
    pub lines: Vec<String>,
}

/// One roster entry in [`EnumCharactersResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterSummary {
    /// Character guid.
    pub guid: u64,
    /// Character name.
    pub name: String,
    /// Class identifier.
    pub class_id: u8,
    /// Race identifier.
    pub race_id: u8,
    /// Character level.
    pub level: u32,
}

/// Character list for the account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnumCharactersResult {
    /// Roster entries, possibly empty.
    pub characters: Vec<CharacterSummary>,
}

/// Result of a character creation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateCharacterResult {
    /// 0 on success; protocol result code otherwise.
    pub result: u8,
}

/// Result of a character deletion attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteCharacterResult {
    /// 0 on success; protocol result code otherwise.
    pub result: u8,
}

/// Logout accepted or denied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogoutResponse {
    /// Whether logout will proceed.
    pub accepted: bool,
}

/// Player name resolution response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPlayerNameResponse {
    /// The queried guid.
    pub guid: u64,
    /// Resolved name, or `None` when unknown.
    pub name: Option<String>,
}

/// Logout finished. No fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogoutComplete {}

/// A chat line fanned out to recipients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatBroadcast {
    /// Speaking player's guid.
    pub speaker: u64,
    /// Speaker display name.
    pub speaker_name: String,
    /// Message text.
    pub text: String,
}

/// Whisper target does not exist or is offline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPlayerNotFound {
    /// The name that failed to resolve.
    pub target: String,
}

/// Server time response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryTimeResponse {
    /// Server unix time in seconds.
    pub server_time: u64,
}

/// A map transfer is about to begin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferPending {
    /// Destination map id.
    pub map_id: u32,
}

/// Load the destination map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWorld {
    /// Destination map id.
    pub map_id: u32,
    /// Arrival x.
    pub x: f32,
    /// Arrival y.
    pub y: f32,
    /// Arrival z.
    pub z: f32,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Errors that can occur while encoding or decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Postcard serialization or deserialization failed.
    #[error("codec error: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Encode a payload struct into wire bytes.
pub fn encode_packet<P: Serialize>(packet: &P) -> Result<Vec<u8>, CodecError> {
    Ok(postcard::to_allocvec(packet)?)
}

/// Decode a payload struct from wire bytes.
///
/// Returns the decoded value and any unconsumed trailing bytes. A non-empty
/// tail is not an error; it is how wire-format drift between client and
/// server versions stays observable.
pub fn parse_packet<P: DeserializeOwned>(payload: &[u8]) -> Result<(P, &[u8]), CodecError> {
    Ok(postcard::take_from_bytes(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_session_roundtrip() {
        let packet = AuthSession {
            build: 40120,
            protocol_version: PROTOCOL_VERSION,
            account: "ASHBRINGER".to_string(),
            client_seed: 0xDEAD_BEEF_CAFE_F00D,
            digest: vec![1, 2, 3, 4],
        };
        let bytes = encode_packet(&packet).unwrap();
        let (decoded, tail) = parse_packet::<AuthSession>(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_chat_message_roundtrip() {
        let packet = ChatMessage {
            text: "is this thing on".to_string(),
            target: Some("Maeve".to_string()),
        };
        let bytes = encode_packet(&packet).unwrap();
        let (decoded, tail) = parse_packet::<ChatMessage>(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert!(tail.is_empty());
    }

    #[test]
    fn test_trailing_bytes_preserved() {
        let packet = Ping {
            serial: 7,
            latency_ms: 42,
        };
        let mut bytes = encode_packet(&packet).unwrap();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let (decoded, tail) = parse_packet::<Ping>(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(tail, &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let packet = MoveHeartbeat {
            counter: 1,
            x: 1.0,
            y: 2.0,
            z: 3.0,
            facing: 0.5,
        };
        let bytes = encode_packet(&packet).unwrap();
        let result = parse_packet::<MoveHeartbeat>(&bytes[..bytes.len() - 2]);
        assert!(result.is_err(), "truncated payload should fail to parse");
    }

    #[test]
    fn test_empty_payload_parses_fieldless_packet() {
        let (decoded, tail) = parse_packet::<LogoutRequest>(&[]).unwrap();
        assert_eq!(decoded, LogoutRequest {});
        assert!(tail.is_empty());
    }
}

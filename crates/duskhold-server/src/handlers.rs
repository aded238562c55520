//! The built-in client packet handlers referenced by the definition table.
//!
//! Each handler receives the session under the world's write lock and the
//! already-parsed payload; responses are queued on the session and flushed
//! by the dispatcher once the handler returns. These are the baseline
//! implementations — game systems (roster database, world state, combat)
//! plug in behind them.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use duskhold_net::{SessionPhase, WorldSession};
use duskhold_protocol::packets::{
    AttackStop, AttackSwing, CancelTrade, CharacterSummary, ChatBroadcast, ChatMessage,
    ChatPlayerNotFound, CreateCharacter, CreateCharacterResult, DeleteCharacter,
    DeleteCharacterResult, EnumCharacters, EnumCharactersResult, LogoutCancel, LogoutComplete,
    LogoutRequest, LogoutResponse, MoveHeartbeat, Motd, PlayerLogin, QueryPlayerName,
    QueryPlayerNameResponse, QueryTime, QueryTimeResponse, SetSelection, WorldPortResponse,
};
use duskhold_protocol::{ServerOpcode, encode_packet};
use duskhold_registry::{HandlerRegistry, packet_handler};

/// Encode and queue a response on the session, logging encode failures
/// instead of dropping the session.
fn queue<P: Serialize>(session: &mut WorldSession, opcode: ServerOpcode, packet: &P) {
    match encode_packet(packet) {
        Ok(bytes) => session.queue_packet(opcode, bytes),
        Err(err) => tracing::error!("failed to encode {opcode:?}: {err}"),
    }
}

/// Bind every built-in handler key the definition table references.
pub fn register_default_handlers(registry: &mut HandlerRegistry<WorldSession>) {
    // Consumed by the network layer before dispatch ever sees them; the
    // key exists only so their table rows resolve.
    registry.insert(
        "early",
        Arc::new(|_session: &mut WorldSession, _payload: &[u8]| {}),
    );

    registry.insert(
        "enum_characters",
        packet_handler(|session: &mut WorldSession, _packet: EnumCharacters| {
            // Placeholder roster until the character database lands.
            let roster = EnumCharactersResult {
                characters: vec![CharacterSummary {
                    guid: 1,
                    name: session.account.clone(),
                    class_id: 1,
                    race_id: 1,
                    level: 1,
                }],
            };
            queue(session, ServerOpcode::EnumCharactersResult, &roster);
        }),
    );

    registry.insert(
        "create_character",
        packet_handler(|session: &mut WorldSession, packet: CreateCharacter| {
            tracing::info!(name = %packet.name, "character created");
            queue(
                session,
                ServerOpcode::CreateCharacterResult,
                &CreateCharacterResult { result: 0 },
            );
        }),
    );

    registry.insert(
        "delete_character",
        packet_handler(|session: &mut WorldSession, packet: DeleteCharacter| {
            tracing::info!(guid = packet.guid, "character deleted");
            queue(
                session,
                ServerOpcode::DeleteCharacterResult,
                &DeleteCharacterResult { result: 0 },
            );
        }),
    );

    registry.insert(
        "player_login",
        packet_handler(|session: &mut WorldSession, packet: PlayerLogin| {
            session.phase = SessionPhase::InWorld;
            session.player_guid = if packet.guid == 0 { 1 } else { packet.guid };
            session.player_name = session.account.clone();
            session.logout_time = None;
            queue(
                session,
                ServerOpcode::Motd,
                &Motd {
                    lines: vec!["Welcome to Duskhold.".to_string()],
                },
            );
        }),
    );

    registry.insert(
        "logout_request",
        packet_handler(|session: &mut WorldSession, _packet: LogoutRequest| {
            queue(
                session,
                ServerOpcode::LogoutResponse,
                &LogoutResponse { accepted: true },
            );
            session.phase = SessionPhase::RecentlyLoggedOut;
            session.logout_time = Some(Instant::now());
            queue(session, ServerOpcode::LogoutComplete, &LogoutComplete {});
        }),
    );

    registry.insert(
        "logout_cancel",
        packet_handler(|session: &mut WorldSession, _packet: LogoutCancel| {
            if session.phase == SessionPhase::RecentlyLoggedOut {
                session.phase = SessionPhase::InWorld;
                session.logout_time = None;
                queue(session, ServerOpcode::LogoutCancelAck, &());
            }
        }),
    );

    registry.insert(
        "movement",
        packet_handler(|session: &mut WorldSession, packet: MoveHeartbeat| {
            session.position = [packet.x, packet.y, packet.z];
            session.facing = packet.facing;
        }),
    );

    registry.insert("chat_say", chat_handler());
    registry.insert("chat_yell", chat_handler());

    registry.insert(
        "chat_whisper",
        packet_handler(|session: &mut WorldSession, packet: ChatMessage| {
            // Whisper routing needs the player index; until the chat system
            // owns that, every target is unreachable.
            let target = packet.target.unwrap_or_default();
            queue(
                session,
                ServerOpcode::ChatPlayerNotFound,
                &ChatPlayerNotFound { target },
            );
        }),
    );

    registry.insert(
        "attack_swing",
        packet_handler(|session: &mut WorldSession, packet: AttackSwing| {
            session.selection = packet.target;
        }),
    );

    registry.insert(
        "attack_stop",
        packet_handler(|session: &mut WorldSession, _packet: AttackStop| {
            session.selection = 0;
        }),
    );

    registry.insert(
        "set_selection",
        packet_handler(|session: &mut WorldSession, packet: SetSelection| {
            session.selection = packet.target;
        }),
    );

    registry.insert(
        "cancel_trade",
        packet_handler(|_session: &mut WorldSession, _packet: CancelTrade| {}),
    );

    registry.insert(
        "query_time",
        packet_handler(|session: &mut WorldSession, _packet: QueryTime| {
            let server_time = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            queue(
                session,
                ServerOpcode::QueryTimeResponse,
                &QueryTimeResponse { server_time },
            );
        }),
    );

    registry.insert(
        "query_player_name",
        packet_handler(|session: &mut WorldSession, packet: QueryPlayerName| {
            let name = (packet.guid == session.player_guid && packet.guid != 0)
                .then(|| session.player_name.clone());
            queue(
                session,
                ServerOpcode::QueryPlayerNameResponse,
                &QueryPlayerNameResponse {
                    guid: packet.guid,
                    name,
                },
            );
        }),
    );

    registry.insert(
        "world_port_response",
        packet_handler(|session: &mut WorldSession, _packet: WorldPortResponse| {
            session.phase = SessionPhase::InWorld;
        }),
    );
}

fn chat_handler() -> duskhold_registry::ClientHandlerFn<WorldSession> {
    packet_handler(|session: &mut WorldSession, packet: ChatMessage| {
        // Fanout to nearby players belongs to the world state; echo to the
        // speaker so the line is visible end to end.
        let broadcast = ChatBroadcast {
            speaker: session.player_guid,
            speaker_name: session.player_name.clone(),
            text: packet.text,
        };
        queue(session, ServerOpcode::ChatBroadcast, &broadcast);
    })
}

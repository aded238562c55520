//! World-session lifecycle and the session-status authorization gate.
//!
//! Tracks each connection's phase: Connected → Authed → InWorld, with
//! WorldTransfer while changing maps and RecentlyLoggedOut as a grace
//! period after leaving the world. The phase decides which opcodes are
//! legal right now — the gate the dispatcher consults before running any
//! handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use duskhold_protocol::{ServerOpcode, SessionStatus};

use crate::ConnectionId;

/// Phase machine for a client connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connection accepted, waiting for authentication.
    Connected,
    /// Account authenticated, character not in the world.
    Authed,
    /// A character is active in a game world.
    InWorld,
    /// Between maps; the character left one world and has not confirmed
    /// arrival in the next.
    WorldTransfer,
    /// Character just left the world; a few messages remain legal until
    /// the grace period expires.
    RecentlyLoggedOut,
}

/// A server packet queued by a handler, flushed after the handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPacket {
    /// Raw server opcode.
    pub opcode: u16,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

/// Per-connection session state. Handlers receive `&mut WorldSession`.
pub struct WorldSession {
    /// The underlying connection identifier.
    pub connection_id: ConnectionId,
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Authenticated account name (empty until auth).
    pub account: String,
    /// Active character guid (0 outside the world).
    pub player_guid: u64,
    /// Active character name.
    pub player_name: String,
    /// Timestamp of the last received message, for timeout detection.
    pub last_activity: Instant,
    /// When the character left the world, for the logout grace period.
    pub logout_time: Option<Instant>,
    /// Last reported position, persisted on disconnect.
    pub position: [f32; 3],
    /// Last reported facing in radians.
    pub facing: f32,
    /// Currently selected target guid (0 = none).
    pub selection: u64,
    outbound: Vec<OutgoingPacket>,
}

impl WorldSession {
    fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            phase: SessionPhase::Connected,
            account: String::new(),
            player_guid: 0,
            player_name: String::new(),
            last_activity: Instant::now(),
            logout_time: None,
            position: [0.0; 3],
            facing: 0.0,
            selection: 0,
            outbound: Vec::new(),
        }
    }

    /// Whether a message with the given status requirement is legal in the
    /// session's current phase.
    ///
    /// `Never` and `Unhandled` always answer `false`: the dispatcher deals
    /// with both before the phase gate is consulted.
    pub fn accepts(&self, status: SessionStatus) -> bool {
        match status {
            SessionStatus::Never | SessionStatus::Unhandled => false,
            SessionStatus::Authed => matches!(
                self.phase,
                SessionPhase::Authed | SessionPhase::RecentlyLoggedOut
            ),
            SessionStatus::LoggedIn => self.phase == SessionPhase::InWorld,
            SessionStatus::LoggedInOrRecentlyLoggedOut => matches!(
                self.phase,
                SessionPhase::InWorld | SessionPhase::RecentlyLoggedOut
            ),
            SessionStatus::Transfer => self.phase == SessionPhase::WorldTransfer,
        }
    }

    /// Queue a server packet for this session. Flushed by the dispatcher
    /// once the current handler returns.
    pub fn queue_packet(&mut self, opcode: ServerOpcode, payload: Vec<u8>) {
        self.outbound.push(OutgoingPacket {
            opcode: opcode.to_u16(),
            payload,
        });
    }

    /// Drain everything queued by [`queue_packet`](Self::queue_packet).
    pub fn take_outbound(&mut self) -> Vec<OutgoingPacket> {
        std::mem::take(&mut self.outbound)
    }
}

/// Errors from session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given connection.
    #[error("session not found for connection")]
    SessionNotFound,
    /// The session is not in a phase that allows the operation.
    #[error("invalid session phase for operation: {0:?}")]
    InvalidPhase(SessionPhase),
    /// The account name was empty.
    #[error("account name cannot be empty")]
    EmptyAccount,
}

/// Manages all active world sessions and provides lifecycle operations.
pub struct SessionManager {
    sessions: RwLock<HashMap<ConnectionId, WorldSession>>,
    /// Map from player guid to connection, for whisper routing and
    /// reconnection.
    player_index: RwLock<HashMap<u64, ConnectionId>>,
    next_player_guid: AtomicU64,
}

impl SessionManager {
    /// Create a new empty session manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            player_index: RwLock::new(HashMap::new()),
            next_player_guid: AtomicU64::new(1),
        }
    }

    /// Called when a new connection is accepted. Creates a session in the
    /// Connected phase.
    pub async fn on_connect(&self, connection_id: ConnectionId) {
        self.sessions
            .write()
            .await
            .insert(connection_id, WorldSession::new(connection_id));
    }

    /// Authenticate a connection with an account name.
    pub async fn authenticate(
        &self,
        connection_id: ConnectionId,
        account: &str,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::SessionNotFound)?;

        if session.phase != SessionPhase::Connected {
            return Err(SessionError::InvalidPhase(session.phase));
        }
        if account.is_empty() {
            return Err(SessionError::EmptyAccount);
        }

        session.phase = SessionPhase::Authed;
        session.account = account.to_string();
        session.last_activity = Instant::now();
        Ok(())
    }

    /// Enter the world with a character. Assigns a guid when the caller
    /// passes 0 (placeholder roster — persistence comes with the character
    /// database).
    pub async fn enter_world(
        &self,
        connection_id: ConnectionId,
        guid: u64,
        name: &str,
    ) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::SessionNotFound)?;

        if session.phase != SessionPhase::Authed {
            return Err(SessionError::InvalidPhase(session.phase));
        }

        let guid = if guid == 0 {
            self.next_player_guid.fetch_add(1, Ordering::Relaxed)
        } else {
            guid
        };

        session.phase = SessionPhase::InWorld;
        session.player_guid = guid;
        session.player_name = name.to_string();
        session.logout_time = None;

        drop(sessions);
        self.player_index.write().await.insert(guid, connection_id);
        Ok(guid)
    }

    /// Begin a map transfer.
    pub async fn begin_transfer(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.transition(connection_id, SessionPhase::InWorld, SessionPhase::WorldTransfer)
            .await
    }

    /// Confirm arrival in the destination map.
    pub async fn complete_transfer(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.transition(connection_id, SessionPhase::WorldTransfer, SessionPhase::InWorld)
            .await
    }

    /// Leave the world, entering the logout grace period.
    pub async fn begin_logout(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::SessionNotFound)?;

        if session.phase != SessionPhase::InWorld {
            return Err(SessionError::InvalidPhase(session.phase));
        }
        session.phase = SessionPhase::RecentlyLoggedOut;
        session.logout_time = Some(Instant::now());
        Ok(())
    }

    async fn transition(
        &self,
        connection_id: ConnectionId,
        from: SessionPhase,
        to: SessionPhase,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(&connection_id)
            .ok_or(SessionError::SessionNotFound)?;
        if session.phase != from {
            return Err(SessionError::InvalidPhase(session.phase));
        }
        session.phase = to;
        Ok(())
    }

    /// Tear down a session when its connection closes. Returns the player
    /// guid if a character was involved.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) -> Option<u64> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(&connection_id)?;
        let guid = session.player_guid;

        if !session.account.is_empty() {
            tracing::info!(
                account = %session.account,
                guid,
                "session disconnecting, persisting state"
            );
        }

        drop(sessions);
        if guid != 0 {
            self.player_index.write().await.remove(&guid);
        }
        Some(guid)
    }

    /// Update the last-activity timestamp for a connection.
    pub async fn touch(&self, connection_id: &ConnectionId) {
        if let Some(session) = self.sessions.write().await.get_mut(connection_id) {
            session.last_activity = Instant::now();
        }
    }

    /// Get the current phase of a session.
    pub async fn phase(&self, connection_id: &ConnectionId) -> Option<SessionPhase> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .map(|s| s.phase)
    }

    /// Get the connection for a player guid.
    pub async fn connection_for_player(&self, guid: u64) -> Option<ConnectionId> {
        self.player_index.read().await.get(&guid).copied()
    }

    /// Run a closure against a session under the write lock. Returns `None`
    /// if no session exists for the connection.
    pub async fn with_session<R>(
        &self,
        connection_id: ConnectionId,
        f: impl FnOnce(&mut WorldSession) -> R,
    ) -> Option<R> {
        self.sessions
            .write()
            .await
            .get_mut(&connection_id)
            .map(f)
    }

    /// Move sessions whose logout grace period has expired back to the
    /// character-select phase, releasing their player index entries.
    pub async fn purge_logged_out(&self, grace: Duration) {
        let mut expired_guids = Vec::new();
        {
            let mut sessions = self.sessions.write().await;
            for session in sessions.values_mut() {
                if session.phase == SessionPhase::RecentlyLoggedOut
                    && session
                        .logout_time
                        .is_some_and(|t| t.elapsed() > grace)
                {
                    expired_guids.push(session.player_guid);
                    session.phase = SessionPhase::Authed;
                    session.player_guid = 0;
                    session.player_name.clear();
                    session.logout_time = None;
                }
            }
        }
        if !expired_guids.is_empty() {
            let mut index = self.player_index.write().await;
            for guid in expired_guids {
                index.remove(&guid);
            }
        }
    }

    /// Collect connections whose sessions have gone silent past the
    /// timeout. The caller owns actually closing them.
    pub async fn stale_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.phase != SessionPhase::Connected && s.last_activity.elapsed() > timeout)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn authed_session(sm: &SessionManager, id: u64) -> ConnectionId {
        let cid = ConnectionId(id);
        sm.on_connect(cid).await;
        sm.authenticate(cid, "THANE").await.unwrap();
        cid
    }

    #[tokio::test]
    async fn test_new_connection_starts_unauthenticated() {
        let sm = SessionManager::new();
        let cid = ConnectionId(1);
        sm.on_connect(cid).await;
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::Connected));
    }

    #[tokio::test]
    async fn test_authenticate_transitions_to_authed() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::Authed));
    }

    #[tokio::test]
    async fn test_empty_account_rejected() {
        let sm = SessionManager::new();
        let cid = ConnectionId(1);
        sm.on_connect(cid).await;
        assert!(matches!(
            sm.authenticate(cid, "").await,
            Err(SessionError::EmptyAccount)
        ));
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::Connected));
    }

    #[tokio::test]
    async fn test_double_authenticate_rejected() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        assert!(matches!(
            sm.authenticate(cid, "THANE").await,
            Err(SessionError::InvalidPhase(SessionPhase::Authed))
        ));
    }

    #[tokio::test]
    async fn test_enter_world_assigns_guid_and_indexes_player() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;

        let guid = sm.enter_world(cid, 0, "Maeve").await.unwrap();
        assert!(guid > 0);
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::InWorld));
        assert_eq!(sm.connection_for_player(guid).await, Some(cid));
    }

    #[tokio::test]
    async fn test_enter_world_requires_authed_phase() {
        let sm = SessionManager::new();
        let cid = ConnectionId(1);
        sm.on_connect(cid).await;
        assert!(matches!(
            sm.enter_world(cid, 0, "Maeve").await,
            Err(SessionError::InvalidPhase(SessionPhase::Connected))
        ));
    }

    #[tokio::test]
    async fn test_transfer_round_trip() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        sm.enter_world(cid, 0, "Maeve").await.unwrap();

        sm.begin_transfer(cid).await.unwrap();
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::WorldTransfer));
        sm.complete_transfer(cid).await.unwrap();
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::InWorld));
    }

    #[tokio::test]
    async fn test_logout_enters_grace_period() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        sm.enter_world(cid, 0, "Maeve").await.unwrap();

        sm.begin_logout(cid).await.unwrap();
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::RecentlyLoggedOut));
    }

    #[tokio::test]
    async fn test_purge_returns_expired_sessions_to_character_select() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        let guid = sm.enter_world(cid, 0, "Maeve").await.unwrap();
        sm.begin_logout(cid).await.unwrap();

        // Backdate the logout so the grace period has elapsed.
        sm.with_session(cid, |s| {
            s.logout_time = Some(Instant::now() - Duration::from_secs(60));
        })
        .await;

        sm.purge_logged_out(Duration::from_secs(20)).await;
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::Authed));
        assert_eq!(sm.connection_for_player(guid).await, None);
    }

    #[tokio::test]
    async fn test_purge_keeps_sessions_inside_grace() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        sm.enter_world(cid, 0, "Maeve").await.unwrap();
        sm.begin_logout(cid).await.unwrap();

        sm.purge_logged_out(Duration::from_secs(20)).await;
        assert_eq!(sm.phase(&cid).await, Some(SessionPhase::RecentlyLoggedOut));
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_indexes() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        let guid = sm.enter_world(cid, 0, "Maeve").await.unwrap();

        assert_eq!(sm.on_disconnect(cid).await, Some(guid));
        assert_eq!(sm.phase(&cid).await, None);
        assert_eq!(sm.connection_for_player(guid).await, None);
    }

    #[tokio::test]
    async fn test_stale_connection_detection() {
        let sm = SessionManager::new();
        let cid = authed_session(&sm, 1).await;
        sm.with_session(cid, |s| {
            s.last_activity = Instant::now() - Duration::from_secs(120);
        })
        .await;

        let stale = sm.stale_connections(Duration::from_secs(30)).await;
        assert_eq!(stale, vec![cid]);
    }

    // --- status gate ---

    fn session_in(phase: SessionPhase) -> WorldSession {
        let mut session = WorldSession::new(ConnectionId(1));
        session.phase = phase;
        session
    }

    #[test]
    fn test_gate_authed_status() {
        assert!(session_in(SessionPhase::Authed).accepts(SessionStatus::Authed));
        assert!(session_in(SessionPhase::RecentlyLoggedOut).accepts(SessionStatus::Authed));
        assert!(!session_in(SessionPhase::Connected).accepts(SessionStatus::Authed));
        assert!(!session_in(SessionPhase::InWorld).accepts(SessionStatus::Authed));
    }

    #[test]
    fn test_gate_logged_in_status() {
        assert!(session_in(SessionPhase::InWorld).accepts(SessionStatus::LoggedIn));
        assert!(!session_in(SessionPhase::Authed).accepts(SessionStatus::LoggedIn));
        assert!(!session_in(SessionPhase::RecentlyLoggedOut).accepts(SessionStatus::LoggedIn));
        assert!(!session_in(SessionPhase::WorldTransfer).accepts(SessionStatus::LoggedIn));
    }

    #[test]
    fn test_gate_grace_period_status() {
        let status = SessionStatus::LoggedInOrRecentlyLoggedOut;
        assert!(session_in(SessionPhase::InWorld).accepts(status));
        assert!(session_in(SessionPhase::RecentlyLoggedOut).accepts(status));
        assert!(!session_in(SessionPhase::Authed).accepts(status));
    }

    #[test]
    fn test_gate_transfer_status() {
        assert!(session_in(SessionPhase::WorldTransfer).accepts(SessionStatus::Transfer));
        assert!(!session_in(SessionPhase::InWorld).accepts(SessionStatus::Transfer));
    }

    #[test]
    fn test_gate_never_and_unhandled_always_refuse() {
        for phase in [
            SessionPhase::Connected,
            SessionPhase::Authed,
            SessionPhase::InWorld,
            SessionPhase::WorldTransfer,
            SessionPhase::RecentlyLoggedOut,
        ] {
            assert!(!session_in(phase).accepts(SessionStatus::Never));
            assert!(!session_in(phase).accepts(SessionStatus::Unhandled));
        }
    }

    #[test]
    fn test_outbound_queue_drains() {
        let mut session = session_in(SessionPhase::InWorld);
        session.queue_packet(ServerOpcode::Pong, vec![1, 2]);
        session.queue_packet(ServerOpcode::Motd, vec![3]);

        let drained = session.take_outbound();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].opcode, ServerOpcode::Pong.to_u16());
        assert!(session.take_outbound().is_empty());
    }
}

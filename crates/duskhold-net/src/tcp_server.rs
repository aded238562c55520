//! TCP accept loop and connection management for the world server.
//!
//! Each accepted connection gets a session in the Connected phase and a
//! reader task. The reader consumes frames and forwards them to the
//! dispatcher over a bounded channel — except the raw-authentication and
//! keepalive opcodes, which are consumed here, before dispatch, which is
//! why their table rows carry the `Never` status.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, mpsc, watch};

use duskhold_protocol::packets::{AuthResponse, AuthSession, Ping, Pong};
use duskhold_protocol::{
    ClientOpcode, ConnectionType, PROTOCOL_VERSION, ServerOpcode, encode_packet, parse_packet,
};

use crate::dispatch::IncomingPacket;
use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::session::SessionManager;

/// Unique identifier for a connection within a server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the connection map is at capacity.
#[derive(Debug)]
pub struct ConnectionLimitReached;

/// Errors sending a packet to a connection.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// No connection with that id.
    #[error("unknown connection")]
    UnknownConnection,
    /// The packet wants the instance channel but none is attached.
    #[error("no instance channel attached")]
    NoInstanceChannel,
    /// The framing layer failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Write halves for one connection's logical channels.
struct ConnectionChannels {
    realm: OwnedWriteHalf,
    /// Attached after the client opens its per-map connection.
    instance: Option<OwnedWriteHalf>,
}

/// Thread-safe map of active connections keyed by [`ConnectionId`].
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, ConnectionChannels>>,
    max_connections: usize,
    frame: FrameConfig,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize, frame: FrameConfig) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
            frame,
        }
    }

    /// Insert a connection's realm channel. Returns `Err` at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        realm: OwnedWriteHalf,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(
            id,
            ConnectionChannels {
                realm,
                instance: None,
            },
        );
        Ok(())
    }

    /// Attach an instance channel to an existing connection.
    pub async fn attach_instance(
        &self,
        id: ConnectionId,
        instance: OwnedWriteHalf,
    ) -> Result<(), SendError> {
        let mut map = self.inner.write().await;
        let channels = map.get_mut(&id).ok_or(SendError::UnknownConnection)?;
        channels.instance = Some(instance);
        Ok(())
    }

    /// Remove a connection.
    pub async fn remove(&self, id: &ConnectionId) {
        self.inner.write().await.remove(id);
    }

    /// Return the number of active connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Write one packet frame on the requested channel of a connection.
    pub async fn send(
        &self,
        id: ConnectionId,
        channel: ConnectionType,
        opcode: u16,
        payload: &[u8],
    ) -> Result<(), SendError> {
        let mut map = self.inner.write().await;
        let channels = map.get_mut(&id).ok_or(SendError::UnknownConnection)?;
        let writer = match channel {
            ConnectionType::Realm => &mut channels.realm,
            ConnectionType::Instance => channels
                .instance
                .as_mut()
                .ok_or(SendError::NoInstanceChannel)?,
        };
        write_frame(writer, opcode, payload, &self.frame).await?;
        Ok(())
    }
}

/// Configuration for [`WorldServer`].
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:8085`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 1024.
    pub max_connections: usize,
    /// Framing limits.
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8085".parse().unwrap(),
            max_connections: 1024,
            frame: FrameConfig::default(),
        }
    }
}

/// TCP world server: accepts connections, runs the early auth/keepalive
/// pipeline, and feeds everything else to the dispatcher.
pub struct WorldServer {
    config: ServerConfig,
    /// Active connection map (shared with the dispatcher for sends).
    pub connections: Arc<ConnectionMap>,
    sessions: Arc<SessionManager>,
    packet_tx: mpsc::Sender<IncomingPacket>,
    id_gen: Arc<IdGenerator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorldServer {
    /// Create a new server. Incoming packets that survive the early
    /// pipeline are delivered on `packet_tx`.
    pub fn new(
        config: ServerConfig,
        sessions: Arc<SessionManager>,
        packet_tx: mpsc::Sender<IncomingPacket>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionMap::new(
                config.max_connections,
                config.frame.clone(),
            )),
            sessions,
            packet_tx,
            id_gen: Arc::new(IdGenerator::new()),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("World server listening on {}", self.config.bind_addr);
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = result?;
                    stream.set_nodelay(true)?;

                    let id = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();

                    if self.connections.insert(id, writer).await.is_err() {
                        tracing::warn!("Connection limit reached, rejecting {peer_addr}");
                        continue;
                    }
                    self.sessions.on_connect(id).await;

                    tracing::info!("Accepted connection {id:?} from {peer_addr}");

                    let connections = Arc::clone(&self.connections);
                    let sessions = Arc::clone(&self.sessions);
                    let packet_tx = self.packet_tx.clone();
                    let frame = self.config.frame.clone();
                    let mut task_shutdown = self.shutdown_rx.clone();

                    tokio::spawn(async move {
                        Self::handle_connection(
                            id,
                            reader,
                            &frame,
                            &connections,
                            &sessions,
                            &packet_tx,
                            &mut task_shutdown,
                        )
                        .await;
                        sessions.on_disconnect(id).await;
                        connections.remove(&id).await;
                        tracing::info!("Connection {id:?} closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("World server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal the server to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Per-connection reader loop: frames in, early pipeline, dispatch out.
    async fn handle_connection(
        id: ConnectionId,
        mut reader: OwnedReadHalf,
        frame_config: &FrameConfig,
        connections: &ConnectionMap,
        sessions: &SessionManager,
        packet_tx: &mpsc::Sender<IncomingPacket>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, frame_config) => {
                    let frame = match result {
                        Ok(frame) => frame,
                        Err(FrameError::ConnectionClosed) => break,
                        Err(err) => {
                            tracing::warn!("Connection {id:?} read error: {err}");
                            break;
                        }
                    };

                    sessions.touch(&id).await;

                    match ClientOpcode::from_u16(frame.opcode) {
                        Some(ClientOpcode::Ping) => {
                            Self::handle_ping(id, &frame.payload, connections).await;
                        }
                        Some(ClientOpcode::KeepAlive) => {
                            // Activity timestamp already updated; nothing else.
                        }
                        Some(ClientOpcode::AuthSession) => {
                            Self::handle_auth_session(id, &frame.payload, connections, sessions)
                                .await;
                        }
                        Some(ClientOpcode::AuthContinuedSession) => {
                            // Resumption needs the cross-realm session cache;
                            // refuse so the client falls back to a full
                            // handshake.
                            tracing::debug!("Connection {id:?} attempted session resume, refusing");
                        }
                        _ => {
                            let packet = IncomingPacket {
                                connection_id: id,
                                opcode: frame.opcode,
                                payload: frame.payload,
                            };
                            if packet_tx.send(packet).await.is_err() {
                                tracing::error!("Dispatcher gone, dropping connection {id:?}");
                                break;
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_ping(id: ConnectionId, payload: &[u8], connections: &ConnectionMap) {
        let Ok((ping, _)) = parse_packet::<Ping>(payload) else {
            tracing::warn!("Connection {id:?} sent malformed ping");
            return;
        };
        let pong = Pong { serial: ping.serial };
        match encode_packet(&pong) {
            Ok(bytes) => {
                if let Err(err) = connections
                    .send(id, ConnectionType::Realm, ServerOpcode::Pong.to_u16(), &bytes)
                    .await
                {
                    tracing::warn!("Failed to answer ping on {id:?}: {err}");
                }
            }
            Err(err) => tracing::error!("Failed to encode pong: {err}"),
        }
    }

    async fn handle_auth_session(
        id: ConnectionId,
        payload: &[u8],
        connections: &ConnectionMap,
        sessions: &SessionManager,
    ) {
        let Ok((auth, _)) = parse_packet::<AuthSession>(payload) else {
            tracing::warn!("Connection {id:?} sent malformed auth session");
            return;
        };

        let success = auth.protocol_version == PROTOCOL_VERSION
            && sessions.authenticate(id, &auth.account).await.is_ok();

        if success {
            tracing::info!(account = %auth.account, build = auth.build, "session authenticated");
        } else {
            tracing::warn!(
                account = %auth.account,
                protocol_version = auth.protocol_version,
                "authentication refused"
            );
        }

        let response = AuthResponse {
            success,
            queue_position: 0,
        };
        match encode_packet(&response) {
            Ok(bytes) => {
                if let Err(err) = connections
                    .send(
                        id,
                        ConnectionType::Realm,
                        ServerOpcode::AuthResponse.to_u16(),
                        &bytes,
                    )
                    .await
                {
                    tracing::warn!("Failed to send auth response on {id:?}: {err}");
                }
            }
            Err(err) => tracing::error!("Failed to encode auth response: {err}"),
        }
    }
}

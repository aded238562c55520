//! The dispatcher: consumes the opcode table to authorize and route
//! inbound packets.
//!
//! For every packet the dispatcher looks up the descriptor, applies the
//! session-status gate, and places the work on the queue the processing
//! classification demands:
//!
//! - `Inplace` runs the handler synchronously on the network task,
//! - `ThreadSafe` hands the packet to the tokio worker pool,
//! - `ThreadUnsafe` queues it for the world-update tick, which drains the
//!   queue serially via [`process_world_queue`].
//!
//! The table itself is shared immutably; nothing here writes to it.

use std::sync::Arc;

use tokio::sync::mpsc;

use duskhold_protocol::{PacketProcessing, SessionStatus};
use duskhold_registry::OpcodeTable;

use crate::session::{OutgoingPacket, SessionManager, WorldSession};
use crate::tcp_server::{ConnectionId, ConnectionMap};

/// An inbound packet on its way from the reader task to a handler.
#[derive(Debug)]
pub struct IncomingPacket {
    /// The connection that sent this packet.
    pub connection_id: ConnectionId,
    /// Raw opcode value from the frame header.
    pub opcode: u16,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Routes inbound packets according to their table descriptors.
pub struct Dispatcher {
    table: Arc<OpcodeTable<WorldSession>>,
    sessions: Arc<SessionManager>,
    connections: Arc<ConnectionMap>,
    world_tx: mpsc::Sender<IncomingPacket>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiving end of its world-update
    /// queue. The caller drains that queue once per world tick.
    pub fn new(
        table: Arc<OpcodeTable<WorldSession>>,
        sessions: Arc<SessionManager>,
        connections: Arc<ConnectionMap>,
        world_queue_depth: usize,
    ) -> (Self, mpsc::Receiver<IncomingPacket>) {
        let (world_tx, world_rx) = mpsc::channel(world_queue_depth);
        (
            Self {
                table,
                sessions,
                connections,
                world_tx,
            },
            world_rx,
        )
    }

    /// Route one inbound packet.
    pub async fn dispatch(&self, packet: IncomingPacket) {
        let Some(handler) = self.table.client_handler(packet.opcode) else {
            tracing::warn!(
                "No handler for {}, dropping packet",
                self.table.client_opcode_name(packet.opcode)
            );
            return;
        };

        match handler.status {
            SessionStatus::Never => {
                // Consumed earlier in the pipeline when legitimate; one
                // arriving here is a client poking at the dispatch path.
                tracing::warn!(
                    "Received not-allowed opcode {} from {:?}",
                    self.table.client_opcode_name(packet.opcode),
                    packet.connection_id
                );
                return;
            }
            SessionStatus::Unhandled => {
                tracing::debug!(
                    "Received unhandled opcode {}",
                    self.table.client_opcode_name(packet.opcode)
                );
                return;
            }
            _ => {}
        }

        match handler.processing {
            PacketProcessing::Inplace => {
                execute_packet(&self.table, &self.sessions, &self.connections, packet).await;
            }
            PacketProcessing::ThreadSafe => {
                let table = Arc::clone(&self.table);
                let sessions = Arc::clone(&self.sessions);
                let connections = Arc::clone(&self.connections);
                tokio::spawn(async move {
                    execute_packet(&table, &sessions, &connections, packet).await;
                });
            }
            PacketProcessing::ThreadUnsafe => {
                let name = self.table.client_opcode_name(packet.opcode);
                if self.world_tx.send(packet).await.is_err() {
                    tracing::error!("World queue closed, dropping {name}");
                }
            }
        }
    }
}

/// Drain the world-update queue, running every deferred thread-unsafe
/// handler serially. Called once per world tick.
pub async fn process_world_queue(
    receiver: &mut mpsc::Receiver<IncomingPacket>,
    table: &Arc<OpcodeTable<WorldSession>>,
    sessions: &Arc<SessionManager>,
    connections: &Arc<ConnectionMap>,
) {
    while let Ok(packet) = receiver.try_recv() {
        execute_packet(table, sessions, connections, packet).await;
    }
}

/// Apply the status gate and run the handler, then flush anything it
/// queued for sending.
async fn execute_packet(
    table: &OpcodeTable<WorldSession>,
    sessions: &SessionManager,
    connections: &ConnectionMap,
    packet: IncomingPacket,
) {
    // Re-lookup: deferred packets execute later, and the descriptor borrow
    // must not outlive the queue hop.
    let Some(handler) = table.client_handler(packet.opcode) else {
        return;
    };

    let outbound = sessions
        .with_session(packet.connection_id, |session| {
            if !session.accepts(handler.status) {
                tracing::warn!(
                    "Opcode {} not legal in phase {:?}, dropping",
                    table.client_opcode_name(packet.opcode),
                    session.phase
                );
                return None;
            }
            handler.call(session, &packet.payload);
            Some(session.take_outbound())
        })
        .await;

    match outbound {
        Some(Some(outbound)) => {
            flush_outbound(table, connections, packet.connection_id, outbound).await;
        }
        Some(None) => {}
        None => {
            tracing::debug!(
                "Session gone before {} could run",
                table.client_opcode_name(packet.opcode)
            );
        }
    }
}

/// Send handler-queued packets, choosing each one's channel from its
/// server-space descriptor. An unregistered server opcode is refused here:
/// nothing leaves this process without a table entry.
async fn flush_outbound(
    table: &OpcodeTable<WorldSession>,
    connections: &ConnectionMap,
    connection_id: ConnectionId,
    outbound: Vec<OutgoingPacket>,
) {
    for out in outbound {
        let Some(descriptor) = table.server_handler(out.opcode) else {
            tracing::error!(
                "Refusing to send unregistered server opcode {}",
                table.server_opcode_name(out.opcode)
            );
            continue;
        };
        if let Err(err) = connections
            .send(connection_id, descriptor.connection, out.opcode, &out.payload)
            .await
        {
            tracing::warn!(
                "Failed to send {} to {:?}: {}",
                table.server_opcode_name(out.opcode),
                connection_id,
                err
            );
        }
    }
}

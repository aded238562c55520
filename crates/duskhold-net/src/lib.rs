//! Networking for the Duskhold world server: frame codec, world-session
//! lifecycle, the dispatcher that consumes the opcode table, and the TCP
//! accept loop.

pub mod dispatch;
pub mod framing;
pub mod session;
pub mod tcp_server;

pub use dispatch::{Dispatcher, IncomingPacket, process_world_queue};
pub use framing::{Frame, FrameConfig, FrameError, read_frame, write_frame};
pub use session::{OutgoingPacket, SessionManager, SessionPhase, WorldSession};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, IdGenerator, SendError, ServerConfig,
    WorldServer,
};

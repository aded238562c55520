//! Handler descriptors: the immutable per-opcode records the table owns.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use duskhold_protocol::packets::parse_packet;
use duskhold_protocol::{ConnectionType, PacketProcessing, SessionStatus};

/// Uniform client handler signature: session plus raw payload bytes.
///
/// `Arc` rather than `Box` because the same callable may back many table
/// slots (every `Unhandled` row shares the null handler).
pub type ClientHandlerFn<S> = Arc<dyn Fn(&mut S, &[u8]) + Send + Sync>;

/// Descriptor for a client-originated opcode: diagnostics name, the session
/// phase gate, the threading classification, and the bound callable.
pub struct ClientOpcodeHandler<S> {
    /// Display name for diagnostics only.
    pub name: String,
    /// Minimum session phase required to process this message.
    pub status: SessionStatus,
    /// Which thread/queue may run the handler.
    pub processing: PacketProcessing,
    call: ClientHandlerFn<S>,
}

impl<S> ClientOpcodeHandler<S> {
    /// Build a descriptor around an already-wrapped callable.
    pub fn new(
        name: impl Into<String>,
        status: SessionStatus,
        processing: PacketProcessing,
        call: ClientHandlerFn<S>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            processing,
            call,
        }
    }

    /// Invoke the bound handler with the raw payload.
    pub fn call(&self, session: &mut S, payload: &[u8]) {
        (self.call)(session, payload);
    }
}

/// Descriptor for a server-originated opcode. Carries no callable: the
/// server produces these messages, it does not consume them.
pub struct ServerOpcodeHandler {
    /// Display name for diagnostics only.
    pub name: String,
    /// Always `Never` or `Unhandled`; see
    /// [`ServerStatus`](duskhold_protocol::ServerStatus).
    pub status: SessionStatus,
    /// Which logical channel the message travels on.
    pub connection: ConnectionType,
}

/// Wrap a typed handler into the uniform `(session, bytes)` signature.
///
/// The wrapper parses the payload into `P`, invokes the handler, and logs
/// any unconsumed trailing bytes at debug level — wire-format drift should
/// be observable, not crash-inducing. A payload that fails to parse is
/// logged and dropped; the session stays up.
pub fn packet_handler<S, P, F>(handler: F) -> ClientHandlerFn<S>
where
    P: DeserializeOwned,
    F: Fn(&mut S, P) + Send + Sync + 'static,
{
    Arc::new(move |session: &mut S, payload: &[u8]| {
        match parse_packet::<P>(payload) {
            Ok((packet, tail)) => {
                handler(session, packet);
                if !tail.is_empty() {
                    tracing::debug!(
                        packet = std::any::type_name::<P>(),
                        unread = tail.len(),
                        "unprocessed tail bytes after packet read"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    packet = std::any::type_name::<P>(),
                    %err,
                    "dropped malformed packet payload"
                );
            }
        }
    })
}

/// The shared no-op callable for `Unhandled` rows.
pub(crate) fn null_handler<S>() -> ClientHandlerFn<S> {
    Arc::new(|_session: &mut S, _payload: &[u8]| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskhold_protocol::packets::{Ping, encode_packet};

    #[derive(Default)]
    struct TestSession {
        pings: Vec<u32>,
    }

    #[test]
    fn test_packet_handler_parses_and_invokes() {
        let call = packet_handler(|session: &mut TestSession, ping: Ping| {
            session.pings.push(ping.serial);
        });
        let mut session = TestSession::default();
        let bytes = encode_packet(&Ping {
            serial: 9,
            latency_ms: 31,
        })
        .unwrap();

        call(&mut session, &bytes);
        assert_eq!(session.pings, vec![9]);
    }

    #[test]
    fn test_packet_handler_tolerates_trailing_bytes() {
        let call = packet_handler(|session: &mut TestSession, ping: Ping| {
            session.pings.push(ping.serial);
        });
        let mut session = TestSession::default();
        let mut bytes = encode_packet(&Ping {
            serial: 4,
            latency_ms: 0,
        })
        .unwrap();
        bytes.extend_from_slice(&[0xFF; 16]);

        call(&mut session, &bytes);
        assert_eq!(session.pings, vec![4], "handler still ran despite tail");
    }

    #[test]
    fn test_packet_handler_drops_malformed_payload() {
        let call = packet_handler(|session: &mut TestSession, ping: Ping| {
            session.pings.push(ping.serial);
        });
        let mut session = TestSession::default();

        // A truncated varint that cannot decode into Ping.
        call(&mut session, &[0x80]);
        assert!(session.pings.is_empty(), "malformed payload must not invoke");
    }

    #[test]
    fn test_null_handler_is_a_no_op() {
        let call = null_handler::<TestSession>();
        let mut session = TestSession::default();
        call(&mut session, &[1, 2, 3]);
        assert!(session.pings.is_empty());
    }
}

//! Length-prefixed framing for TCP streams.
//!
//! Every message on the wire is a length-prefixed frame carrying its opcode
//! in the header:
//!
//! ```text
//! +-------------------+-------------------+--------------------+
//! | length (4 bytes)  | opcode (2 bytes)  |   payload          |
//! | u32 little-endian | u16 little-endian |   (length bytes)   |
//! +-------------------+-------------------+--------------------+
//! ```
//!
//! The length prefix encodes the payload size only — it does not include
//! the 6 header bytes. A length of 0 is valid: many opcodes carry no
//! payload at all.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Configuration for the framing layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 256 KB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 262_144,
        }
    }
}

/// A single decoded frame: the raw opcode and its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw opcode value. Not validated here; the dispatcher decides what
    /// it means.
    pub opcode: u16,
    /// Payload bytes, possibly empty.
    pub payload: Vec<u8>,
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: u32,
        /// The configured maximum.
        max: u32,
    },

    /// The connection was closed before a complete frame was received.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single frame from the stream.
///
/// Blocks until the full frame is available. Returns
/// [`FrameError::ConnectionClosed`] if the peer closes the connection
/// mid-frame. The length check runs before any payload allocation, so a
/// hostile length prefix cannot balloon memory.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Frame, FrameError> {
    let mut header = [0u8; 6];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(FrameError::Io(e)),
    }

    let payload_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let opcode = u16::from_le_bytes([header[4], header[5]]);

    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    if payload_len > 0 {
        reader.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FrameError::ConnectionClosed
            } else {
                FrameError::Io(e)
            }
        })?;
    }

    Ok(Frame { opcode, payload })
}

/// Write a single frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    opcode: u16,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: config.max_payload_size,
        });
    }

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&opcode.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    fn default_config() -> FrameConfig {
        FrameConfig::default()
    }

    #[tokio::test]
    async fn test_single_frame_roundtrip() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, 0x0003, b"ping body", &config)
            .await
            .unwrap();
        let frame = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(frame.opcode, 0x0003);
        assert_eq!(frame.payload, b"ping body");
    }

    #[tokio::test]
    async fn test_frames_in_sequence_dont_merge() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, 1, b"aaa", &config).await.unwrap();
        write_frame(&mut client, 2, b"bbb", &config).await.unwrap();

        let first = read_frame(&mut server, &config).await.unwrap();
        let second = read_frame(&mut server, &config).await.unwrap();
        assert_eq!((first.opcode, first.payload.as_slice()), (1, &b"aaa"[..]));
        assert_eq!((second.opcode, second.payload.as_slice()), (2, &b"bbb"[..]));
    }

    #[tokio::test]
    async fn test_zero_length_payload_valid() {
        let (mut client, mut server) = duplex(8192);
        let config = default_config();

        write_frame(&mut client, 0x0105, &[], &config).await.unwrap();
        let frame = read_frame(&mut server, &config).await.unwrap();
        assert_eq!(frame.opcode, 0x0105);
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_read() {
        let (mut client, mut server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        // Hostile length prefix far beyond the limit.
        client.write_all(&1024u32.to_le_bytes()).await.unwrap();
        client.write_all(&5u16.to_le_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let result = read_frame(&mut server, &config).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_write() {
        let (mut client, _server) = duplex(8192);
        let config = FrameConfig {
            max_payload_size: 16,
        };

        let result = write_frame(&mut client, 1, &[0u8; 1024], &config).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_connection_closed_during_header_read() {
        let (client, mut server) = duplex(8192);
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_connection_closed_mid_payload() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&8u32.to_le_bytes()).await.unwrap();
        client.write_all(&7u16.to_le_bytes()).await.unwrap();
        client.write_all(b"par").await.unwrap(); // 3 of 8 promised bytes
        client.flush().await.unwrap();
        drop(client);

        let result = read_frame(&mut server, &default_config()).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_header_layout_is_little_endian() {
        let (mut client, mut server) = duplex(8192);

        // Hand-built frame: len=5, opcode=0x0301, payload "hello".
        client.write_all(&[5, 0, 0, 0]).await.unwrap();
        client.write_all(&[0x01, 0x03]).await.unwrap();
        client.write_all(b"hello").await.unwrap();
        client.flush().await.unwrap();

        let frame = read_frame(&mut server, &default_config()).await.unwrap();
        assert_eq!(frame.opcode, 0x0301);
        assert_eq!(frame.payload, b"hello");
    }
}

//! Message header shared by every wire command.
//!
//! ## Wire format (8 bytes, little-endian)
//!
//! ```text
//! size:  u32  (4)   total message size, header included
//! kind:  u8   (1)
//! pad:   [u8] (3)   zero-filled
//! ```
//!
//! Revisions keep every field fixed-width and append new fields only;
//! nothing is ever reordered.

use crate::error::RemError;

/// Maximum size a header may declare. Anything larger is treated as a
/// corrupted stream and the connection is dropped.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Encoded header size on the wire.
pub const HEADER_SIZE: usize = 8;

// ── MsgKind ──────────────────────────────────────────────────────

/// Every command understood by the protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// Never valid on the wire; catches zeroed buffers.
    Invalid = 0,
    /// Liveness marker, also signals the end of an outgoing burst.
    Ping = 1,
    /// Graceful teardown request.
    Disconnect = 2,
    /// Handshake payload, exchanged exactly once per connection.
    Version = 3,
    /// Texture create/update/delete (client → server).
    Texture = 4,
    /// Keyboard/mouse/display state (server → client).
    Input = 5,
    /// One whole encoded UI frame (client → server).
    DrawFrame = 6,
}

impl TryFrom<u8> for MsgKind {
    type Error = RemError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MsgKind::Ping),
            2 => Ok(MsgKind::Disconnect),
            3 => Ok(MsgKind::Version),
            4 => Ok(MsgKind::Texture),
            5 => Ok(MsgKind::Input),
            6 => Ok(MsgKind::DrawFrame),
            _ => Err(RemError::UnknownVariant {
                type_name: "MsgKind",
                value: value as u64,
            }),
        }
    }
}

impl std::fmt::Display for MsgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MsgKind::Invalid => "Invalid",
            MsgKind::Ping => "Ping",
            MsgKind::Disconnect => "Disconnect",
            MsgKind::Version => "Version",
            MsgKind::Texture => "Texture",
            MsgKind::Input => "Input",
            MsgKind::DrawFrame => "DrawFrame",
        };
        write!(f, "{name}")
    }
}

// ── MsgHeader ────────────────────────────────────────────────────

/// The fixed 8-byte prefix of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total message size in bytes, this header included.
    pub size: u32,
    /// Command discriminant.
    pub kind: MsgKind,
}

impl MsgHeader {
    pub fn new(kind: MsgKind, size: u32) -> Self {
        Self { size, kind }
    }

    /// Serialize to bytes (little-endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4] = self.kind as u8;
        buf
    }

    /// Deserialize from bytes, rejecting unknown kinds and sizes that
    /// cannot possibly be valid.
    pub fn decode(data: &[u8]) -> Result<Self, RemError> {
        if data.len() < HEADER_SIZE {
            return Err(RemError::InvalidPayloadLength {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        let size = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let kind = MsgKind::try_from(data[4])?;
        if (size as usize) < HEADER_SIZE {
            return Err(RemError::ProtocolViolation(
                "declared size smaller than the header itself",
            ));
        }
        if size as usize > MAX_MESSAGE_SIZE {
            return Err(RemError::MessageTooLarge {
                size: size as usize,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(Self { size, kind })
    }

    /// Payload byte count following the header.
    pub fn payload_size(&self) -> usize {
        self.size as usize - HEADER_SIZE
    }
}

/// Encode a header-only message (Ping, Disconnect).
pub fn encode_bare(kind: MsgKind) -> [u8; HEADER_SIZE] {
    MsgHeader::new(kind, HEADER_SIZE as u32).encode()
}

// ── Tests ────────────────────────────────────────────────────────

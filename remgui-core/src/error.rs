//! Domain-specific error types for the remgui protocol.
//!
//! All fallible operations return `Result<T, RemError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the remgui protocol.
#[derive(Debug, Error)]
pub enum RemError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// The peer offered a protocol version different from ours.
    ///
    /// Hard rejection: a connection is usable only when both version
    /// integers are bit-for-bit equal.
    #[error("protocol version mismatch: local {local}, peer {peer}")]
    VersionMismatch { local: u32, peer: u32 },

    /// The peer sent something other than a Version command during
    /// the handshake.
    #[error("handshake expected a Version command, got {0}")]
    HandshakeProtocol(&'static str),

    /// A message violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Payload Errors ───────────────────────────────────────────
    /// A message header declared a size beyond the sane maximum.
    ///
    /// Treated as a transport failure: the stream is assumed corrupt
    /// and the connection is dropped (no partial recovery).
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The received payload is shorter or longer than its header or
    /// fields declare.
    #[error("invalid payload length: expected {expected}, got {actual}")]
    InvalidPayloadLength { expected: usize, actual: usize },

    /// A relocatable region offset does not address a valid area of
    /// the received buffer.
    #[error("invalid region offset: {0}")]
    InvalidRegionOffset(&'static str),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A channel between the session task and its owner was closed
    /// unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// The server has no free client slot for a new connection.
    #[error("no free client slot")]
    SlotsExhausted,
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RemError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RemError::ChannelClosed
    }
}

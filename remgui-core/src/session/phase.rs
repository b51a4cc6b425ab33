//! Session lifecycle state machine shared by both sides.
//!
//! Transitions are validated and return `Result` instead of silently
//! mutating, so a caller driving the session out of order is caught at
//! the boundary rather than by the peer.

use std::time::Instant;

use crate::error::RemError;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of a session.
///
/// ```text
///  Handshaking ──► Active ──► Disconnecting ──► Closed
///       │                          ▲              ▲
///       └──────────────────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// TCP link is up; exchanging Version commands.
    #[default]
    Handshaking,

    /// Handshake complete; frames, textures and input flow.
    Active {
        /// When the session entered the `Active` state.
        since: Instant,
    },

    /// A Disconnect was sent or received; draining before close.
    Disconnecting,

    /// Terminal. The socket is gone and the slot can be reused.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Active { .. } => write!(f, "Active"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// How long the session has been `Active`, `None` otherwise.
    pub fn active_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Active { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Active`.
    ///
    /// Valid from: `Handshaking`.
    pub fn complete_handshake(&mut self) -> Result<(), RemError> {
        match self {
            Self::Handshaking => {
                *self = Self::Active {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(RemError::ProtocolViolation(
                "cannot complete handshake: not in Handshaking state",
            )),
        }
    }

    /// Transition to `Disconnecting`.
    ///
    /// Valid from: `Active`.
    pub fn begin_disconnect(&mut self) -> Result<(), RemError> {
        match self {
            Self::Active { .. } => {
                *self = Self::Disconnecting;
                Ok(())
            }
            _ => Err(RemError::ProtocolViolation(
                "cannot disconnect: not in Active state",
            )),
        }
    }

    /// Transition to `Closed`.
    ///
    /// Valid from: `Disconnecting`, `Handshaking` (failed or rejected
    /// handshake skips the drain).
    pub fn close(&mut self) -> Result<(), RemError> {
        match self {
            Self::Disconnecting | Self::Handshaking => {
                *self = Self::Closed;
                Ok(())
            }
            _ => Err(RemError::ProtocolViolation(
                "cannot close: not in a closeable state",
            )),
        }
    }

    /// Force-close regardless of current state.
    ///
    /// For unrecoverable errors (I/O failure mid-stream) where the
    /// drain cannot happen.
    pub fn force_close(&mut self) {
        *self = Self::Closed;
    }
}

// ── DisconnectReason ─────────────────────────────────────────────

/// Why a session ended, for logging and slot bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local side asked for the disconnect.
    LocalRequest,
    /// The peer sent a Disconnect command.
    PeerRequest,
    /// Version handshake failed.
    VersionMismatch,
    /// The socket died or the peer broke protocol.
    TransportError,
}

impl DisconnectReason {
    /// Classify a session-ending error for logging and bookkeeping.
    pub fn from_error(err: &RemError) -> Self {
        match err {
            RemError::VersionMismatch { .. } => Self::VersionMismatch,
            _ => Self::TransportError,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalRequest => write!(f, "local request"),
            Self::PeerRequest => write!(f, "peer request"),
            Self::VersionMismatch => write!(f, "version mismatch"),
            Self::TransportError => write!(f, "transport error"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Session layer: version handshake and the command exchange loop
//! shared by both sides.
//!
//! Each iteration of the loop sends everything the local side has
//! pending (always ending with a Ping), then receives commands until
//! the peer's Ping arrives. The Ping therefore delimits one exchange
//! round; neither side ever blocks waiting for traffic the other has
//! not promised.

pub mod phase;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::RemError;
use crate::transport::Transport;
use crate::wire::header::{MsgHeader, MsgKind, encode_bare};
use crate::wire::version::{CmdVersion, PROTOCOL_VERSION, VERSION_CMD_SIZE};

pub use phase::{DisconnectReason, SessionPhase};

/// How long the disconnecting side waits for the peer to close after
/// the Disconnect command has been sent.
const DISCONNECT_DRAIN: Duration = Duration::from_secs(1);

// ── Handshake ────────────────────────────────────────────────────

/// Exchange Version commands with the peer.
///
/// Sends ours first, then reads theirs; both commands are small enough
/// that the symmetric order cannot deadlock. On a mismatch the caller
/// closes the socket without any further payload, so an incompatible
/// peer learns nothing about the local build beyond the version it
/// already received.
pub async fn exchange_version(
    transport: &mut Transport,
    local_name: &str,
) -> Result<CmdVersion, RemError> {
    let ours = CmdVersion::new(local_name);
    transport.send_exact(&ours.encode()).await?;

    let mut buf = [0u8; VERSION_CMD_SIZE];
    transport.receive_exact(&mut buf).await?;
    let header = MsgHeader::decode(&buf)?;
    if header.kind != MsgKind::Version || header.size as usize != VERSION_CMD_SIZE {
        return Err(RemError::HandshakeProtocol(
            "first command must be a Version command",
        ));
    }
    let theirs = CmdVersion::decode(&buf)?;
    if theirs.version != PROTOCOL_VERSION {
        warn!(
            local = PROTOCOL_VERSION,
            peer = theirs.version,
            "rejecting peer with incompatible protocol version"
        );
        return Err(RemError::VersionMismatch {
            local: PROTOCOL_VERSION,
            peer: theirs.version,
        });
    }
    debug!(peer = theirs.name(), "handshake complete");
    Ok(theirs)
}

// ── SessionDelegate ──────────────────────────────────────────────

/// Role-specific behavior plugged into [`run_session`]. The client
/// side pumps frames and textures and handles input; the server side
/// does the reverse.
#[async_trait]
pub trait SessionDelegate: Send {
    /// Send every pending outgoing command, then a Ping. Called once
    /// per loop iteration.
    async fn pump_outgoing(&mut self, transport: &mut Transport) -> Result<(), RemError>;

    /// Handle one received command. Ping and Disconnect never reach
    /// this; they terminate the receive phase instead.
    async fn handle_payload(&mut self, header: MsgHeader, blob: Bytes) -> Result<(), RemError>;

    /// Whether the local side wants to end the session.
    fn disconnect_requested(&self) -> bool;

    /// Sleep between iterations. Keeps an idle session from spinning.
    fn pace(&self) -> Duration;
}

// ── Exchange loop ────────────────────────────────────────────────

/// Drive an `Active` session until either side disconnects.
///
/// On a transport or protocol error the phase is force-closed and the
/// error propagated; on a clean disconnect the phase ends `Closed` and
/// the reason says which side asked for it.
pub async fn run_session<D: SessionDelegate>(
    transport: &mut Transport,
    session_phase: &mut SessionPhase,
    delegate: &mut D,
) -> Result<DisconnectReason, RemError> {
    if !session_phase.is_active() {
        return Err(RemError::ProtocolViolation(
            "session loop requires an Active session",
        ));
    }
    match exchange_loop(transport, session_phase, delegate).await {
        Ok(reason) => {
            info!(peer = %transport.peer_addr(), %reason, "session ended");
            Ok(reason)
        }
        Err(e) => {
            session_phase.force_close();
            Err(e)
        }
    }
}

async fn exchange_loop<D: SessionDelegate>(
    transport: &mut Transport,
    session_phase: &mut SessionPhase,
    delegate: &mut D,
) -> Result<DisconnectReason, RemError> {
    loop {
        if delegate.disconnect_requested() {
            transport.send_exact(&encode_bare(MsgKind::Disconnect)).await?;
            session_phase.begin_disconnect()?;
            transport.shutdown().await?;
            // Drain until the peer closes its half. Dropping the
            // socket with unread data in flight could turn into a
            // reset that discards the Disconnect before the peer
            // reads it.
            let _ = tokio::time::timeout(DISCONNECT_DRAIN, async {
                while transport.receive_message().await.is_ok() {}
            })
            .await;
            session_phase.close()?;
            return Ok(DisconnectReason::LocalRequest);
        }

        delegate.pump_outgoing(transport).await?;

        // Receive until the peer's Ping closes its half of the round.
        loop {
            let (header, blob) = transport.receive_message().await?;
            match header.kind {
                MsgKind::Ping => break,
                MsgKind::Disconnect => {
                    session_phase.begin_disconnect()?;
                    session_phase.close()?;
                    return Ok(DisconnectReason::PeerRequest);
                }
                MsgKind::Invalid | MsgKind::Version => {
                    return Err(RemError::ProtocolViolation(
                        "unexpected command in an active session",
                    ));
                }
                _ => delegate.handle_payload(header, blob).await?,
            }
        }

        tokio::time::sleep(delegate.pace()).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────

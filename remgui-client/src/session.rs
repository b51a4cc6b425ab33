//! Client-side session: connect (or wait for the server to connect),
//! handshake, then pump frames and textures out and input in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::ToSocketAddrs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use remgui_core::{
    CmdInput, CmdTexture, DisconnectReason, Listener, MsgHeader, MsgKind, RemError,
    SessionDelegate, SessionPhase, Transport, exchange_version, run_session,
};

use crate::context::ClientContext;

/// Delay between exchange rounds. The client leads the protocol, so
/// this bounds how fast an idle connection spins.
const CLIENT_PACE: Duration = Duration::from_millis(1);

// ── Entry points ─────────────────────────────────────────────────

/// Connect to a server and run the session until either side
/// disconnects.
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
    ctx: Arc<ClientContext>,
) -> Result<DisconnectReason, RemError> {
    let transport = Transport::connect(addr).await?;
    info!(peer = %transport.peer_addr(), "connected to server");
    run_connection(transport, ctx).await
}

/// Reverse connect: listen on `addr` and let the server dial in. This
/// suits clients behind a firewall that blocks outbound connections.
/// Accepts a single server, then runs the session to completion.
pub async fn listen<A: ToSocketAddrs>(
    addr: A,
    ctx: Arc<ClientContext>,
) -> Result<DisconnectReason, RemError> {
    let listener = Listener::bind(addr).await?;
    accept_from(&listener, ctx).await
}

/// Accept one server on an already-bound listener and run the session.
pub async fn accept_from(
    listener: &Listener,
    ctx: Arc<ClientContext>,
) -> Result<DisconnectReason, RemError> {
    let transport = listener.accept().await?;
    info!(peer = %transport.peer_addr(), "server connected to us");
    run_connection(transport, ctx).await
}

// ── Session driver ───────────────────────────────────────────────

async fn run_connection(
    mut transport: Transport,
    ctx: Arc<ClientContext>,
) -> Result<DisconnectReason, RemError> {
    let mut session_phase = SessionPhase::Handshaking;
    let peer = match exchange_version(&mut transport, ctx.name()).await {
        Ok(peer) => peer,
        Err(e) => {
            // An incompatible peer gets the socket closed, nothing
            // more.
            let reason = DisconnectReason::from_error(&e);
            warn!(%reason, "handshake failed: {e}");
            session_phase.close()?;
            let _ = transport.shutdown().await;
            return Err(e);
        }
    };
    session_phase.complete_handshake()?;

    let mut texture_rx = ctx
        .take_texture_rx()
        .ok_or(RemError::ProtocolViolation("a session is already running"))?;

    // The server starts each session with an empty texture table. The
    // live map already reflects every command sitting in the queue, so
    // the queue is discarded and the map replayed as the opening
    // texture state.
    while texture_rx.try_recv().is_ok() {}
    let replay = ctx.live_texture_snapshot();
    if !replay.is_empty() {
        debug!(count = replay.len(), "replaying live textures");
    }
    let mut delegate = ClientDelegate {
        ctx: Arc::clone(&ctx),
        texture_rx,
        replay,
    };

    ctx.set_connected(true);
    info!(peer = peer.name(), "session active");
    let result = run_session(&mut transport, &mut session_phase, &mut delegate).await;

    ctx.set_connected(false);
    ctx.reset_disconnect_request();
    ctx.return_texture_rx(delegate.texture_rx);
    result
}

// ── ClientDelegate ───────────────────────────────────────────────

/// The client half of the exchange loop: textures first (ordered,
/// lossless), then the newest frame, input coming back.
struct ClientDelegate {
    ctx: Arc<ClientContext>,
    texture_rx: mpsc::Receiver<CmdTexture>,
    /// Textures to re-send before anything else, drained on the first
    /// pump.
    replay: Vec<CmdTexture>,
}

#[async_trait]
impl SessionDelegate for ClientDelegate {
    async fn pump_outgoing(&mut self, transport: &mut Transport) -> Result<(), RemError> {
        for cmd in self.replay.drain(..) {
            transport.send_exact(&cmd.encode()).await?;
        }
        while let Ok(cmd) = self.texture_rx.try_recv() {
            transport.send_exact(&cmd.encode()).await?;
        }
        if let Some(frame) = self.ctx.take_frame() {
            transport.send_exact(frame.as_bytes()).await?;
        }
        transport
            .send_exact(&remgui_core::wire::encode_bare(MsgKind::Ping))
            .await?;
        Ok(())
    }

    async fn handle_payload(&mut self, header: MsgHeader, blob: Bytes) -> Result<(), RemError> {
        match header.kind {
            MsgKind::Input => {
                self.ctx.store_input(CmdInput::decode(&blob)?);
                Ok(())
            }
            _ => Err(RemError::ProtocolViolation(
                "server sent a command only clients produce",
            )),
        }
    }

    fn disconnect_requested(&self) -> bool {
        self.ctx.disconnect_requested()
    }

    fn pace(&self) -> Duration {
        CLIENT_PACE
    }
}

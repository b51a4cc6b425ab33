//! Accept loop and per-client session tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::ToSocketAddrs;
use tracing::{info, warn};

use remgui_core::{
    CmdTexture, DisconnectReason, DrawFrame, Listener, MsgHeader, MsgKind, RemError,
    SessionDelegate, SessionPhase, Transport, exchange_version, run_session, wire,
};

use crate::config::ServerConfig;
use crate::slot::{ClientSlot, SlotTable};

// The client paces the exchange; the server blocks on the client's
// traffic in the receive phase and adds no delay of its own.
const SERVER_PACE: Duration = Duration::ZERO;

// ── Server ───────────────────────────────────────────────────────

/// The streaming server: owns the slot table and accepts clients
/// until stopped.
pub struct Server {
    config: ServerConfig,
    table: Arc<SlotTable>,
    /// True until [`Server::stop`]. Sessions watch this flag too, so
    /// it must not double as "accept loop active": reverse-connect
    /// sessions can start before (or without) the accept loop.
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let table = Arc::new(SlotTable::new(config.network.max_clients));
        Self {
            config,
            table,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The slot table, for a display frontend running alongside the
    /// accept loop.
    pub fn slot_table(&self) -> Arc<SlotTable> {
        Arc::clone(&self.table)
    }

    /// Handle to stop the server from another task or a signal
    /// handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Accept clients until stopped.
    ///
    /// A connection that arrives while every slot is taken is closed
    /// immediately, before any handshake, so the client's connect
    /// succeeds and its handshake read fails fast.
    pub async fn run(&self) -> Result<(), RemError> {
        let listener = Listener::bind(self.config.bind_addr()).await?;
        self.serve(listener).await
    }

    /// Accept clients on an already-bound listener until stopped.
    pub async fn serve(&self, listener: Listener) -> Result<(), RemError> {
        info!(addr = %listener.local_addr()?, slots = self.table.capacity(), "server listening");

        while self.running.load(Ordering::SeqCst) {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = Self::wait_for_stop(&self.running) => break,
            };
            let transport = match accepted {
                Ok(t) => t,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            let Some(slot) = self.table.acquire() else {
                warn!(peer = %transport.peer_addr(), "all slots taken, rejecting connection");
                drop(transport);
                continue;
            };

            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                Self::run_client(transport, slot, running).await;
            });
        }

        info!("server stopped");
        Ok(())
    }

    /// Reverse connect: dial a client that is listening for us. Used
    /// when the client cannot reach the server's port. The session
    /// occupies a slot exactly like an accepted one.
    pub async fn connect_to_client<A: ToSocketAddrs>(&self, addr: A) -> Result<(), RemError> {
        let slot = self.table.acquire().ok_or(RemError::SlotsExhausted)?;
        let transport = match Transport::connect(addr).await {
            Ok(t) => t,
            Err(e) => {
                slot.release();
                return Err(e);
            }
        };
        info!(peer = %transport.peer_addr(), slot = slot.index(), "connected to listening client");
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            Self::run_client(transport, slot, running).await;
        });
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn run_client(mut transport: Transport, slot: Arc<ClientSlot>, running: Arc<AtomicBool>) {
        let peer = transport.peer_addr();
        let mut session_phase = SessionPhase::Handshaking;
        // Releases the slot on every exit path, a panicking session
        // task included; a leaked slot would shrink the table forever.
        let _guard = SlotGuard(Arc::clone(&slot));

        match exchange_version(&mut transport, env!("CARGO_PKG_NAME")).await {
            Ok(client) => {
                slot.set_name(client.name());
                info!(
                    peer = %peer,
                    name = client.name(),
                    slot = slot.index(),
                    "client handshake complete"
                );
            }
            Err(e) => {
                let reason = DisconnectReason::from_error(&e);
                warn!(peer = %peer, %reason, "handshake failed: {e}");
                let _ = session_phase.close();
                let _ = transport.shutdown().await;
                return;
            }
        }
        if session_phase.complete_handshake().is_err() {
            return;
        }
        slot.set_connected(true);

        let mut delegate = ServerDelegate {
            slot: Arc::clone(&slot),
            running,
        };
        match run_session(&mut transport, &mut session_phase, &mut delegate).await {
            Ok(DisconnectReason::LocalRequest) => {
                info!(peer = %peer, slot = slot.index(), "client disconnected by server")
            }
            Ok(reason) => info!(peer = %peer, slot = slot.index(), %reason, "client disconnected"),
            Err(e) => {
                let reason = DisconnectReason::from_error(&e);
                warn!(peer = %peer, slot = slot.index(), %reason, "session error: {e}");
            }
        }
    }

    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Returns the slot to the free pool when dropped, so the table never
/// loses a slot to an abnormal session exit.
struct SlotGuard(Arc<ClientSlot>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

// ── ServerDelegate ───────────────────────────────────────────────

/// The server half of the exchange loop: input out, frames and
/// textures in.
struct ServerDelegate {
    slot: Arc<ClientSlot>,
    running: Arc<AtomicBool>,
}

#[async_trait]
impl SessionDelegate for ServerDelegate {
    async fn pump_outgoing(&mut self, transport: &mut Transport) -> Result<(), RemError> {
        if let Some(input) = self.slot.take_input() {
            let encoded = input.encode();
            transport.send_exact(&encoded).await?;
            self.slot.record_sent(encoded.len() as u64);
        }
        transport.send_exact(&wire::encode_bare(MsgKind::Ping)).await?;
        self.slot.record_sent(wire::HEADER_SIZE as u64);
        Ok(())
    }

    async fn handle_payload(&mut self, header: MsgHeader, blob: Bytes) -> Result<(), RemError> {
        match header.kind {
            MsgKind::DrawFrame => {
                let size = blob.len() as u64;
                let frame = DrawFrame::decode(blob)?;
                self.slot.store_frame(frame, size);
                Ok(())
            }
            MsgKind::Texture => {
                self.slot.apply_texture(CmdTexture::decode(blob)?);
                Ok(())
            }
            _ => Err(RemError::ProtocolViolation(
                "client sent a command only servers produce",
            )),
        }
    }

    fn disconnect_requested(&self) -> bool {
        // Stopping the server disconnects every active session, not
        // just the accept loop.
        self.slot.disconnect_requested() || !self.running.load(Ordering::SeqCst)
    }

    fn pace(&self) -> Duration {
        SERVER_PACE
    }
}

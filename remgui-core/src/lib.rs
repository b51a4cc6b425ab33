//! # remgui-core
//!
//! Core protocol library for remote immediate-mode UI streaming: a
//! client renders its UI into draw commands and ships them over TCP to
//! a server, which rasterizes them and sends keyboard/mouse input
//! back.
//!
//! This crate contains:
//! - **Wire**: every command on the wire — `MsgHeader`, `CmdVersion`,
//!   `CmdInput`, `CmdTexture` and the quantized `DrawFrame` codec
//! - **Transport**: `Transport` / `Listener` for exact-length framed
//!   TCP I/O
//! - **Session**: the `Version` handshake, the ping-delimited exchange
//!   loop and the `SessionPhase` state machine
//! - **Sync**: `ExchangeSlot` (latest-wins mailbox) and `RingBuffer`
//!   (lock-free SPSC queue) connecting render threads to the network
//! - **Stats**: rolling frame rate and traffic counters
//! - **Error**: `RemError` — typed, `thiserror`-based error hierarchy

pub mod error;
pub mod session;
pub mod stats;
pub mod sync;
pub mod transport;
pub mod wire;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use error::RemError;
pub use session::{
    DisconnectReason, SessionDelegate, SessionPhase, exchange_version, run_session,
};
pub use stats::{FrameRateEstimator, SessionStats};
pub use sync::{ExchangeSlot, RingBuffer};
pub use transport::{DEFAULT_PORT, Listener, Transport};
pub use wire::{
    CmdInput, CmdTexture, CmdVersion, DrawCall, DrawData, DrawFrame, DrawList, EncodedDrawFrame,
    HEADER_SIZE, IndexList, ListCommand, MAX_MESSAGE_SIZE, MsgHeader, MsgKind, PROTOCOL_VERSION,
    TextureFormat, Vertex, encode_draw_frame,
};

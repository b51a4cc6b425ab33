//! Shared state between the application's render thread and the
//! network session task.
//!
//! The render thread never blocks on the network: frames go through a
//! latest-wins [`ExchangeSlot`] (an unsent frame is simply replaced by
//! the next one), input arrives through another slot in the opposite
//! direction, and typed characters accumulate in a lock-free ring so
//! none are lost between frames. Textures are the one exception: they
//! must all arrive and in order, so they travel through a bounded
//! channel that blocks the producer when the session falls behind.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use remgui_core::{
    CmdInput, CmdTexture, DrawData, EncodedDrawFrame, ExchangeSlot, RemError, RingBuffer,
    encode_draw_frame,
};

/// Queued texture commands before the producer starts blocking.
pub const TEXTURE_QUEUE_DEPTH: usize = 64;

/// Typed characters buffered between application frames.
pub const CHAR_RING_CAPACITY: usize = 1024;

// ── ClientContext ────────────────────────────────────────────────

/// Handle shared by the application and the session task.
///
/// The application side calls [`submit_frame`], [`queue_texture`] and
/// the input getters from its render thread; the session task drains
/// the other end. Both sides hold the same `Arc`.
///
/// [`submit_frame`]: Self::submit_frame
/// [`queue_texture`]: Self::queue_texture
pub struct ClientContext {
    /// Peer name announced during the handshake.
    name: String,

    /// Latest encoded frame awaiting transmission.
    frame_out: ExchangeSlot<EncodedDrawFrame>,
    /// Latest input snapshot received from the server.
    input_in: ExchangeSlot<CmdInput>,
    /// Typed characters, drained by the application each frame.
    char_ring: RingBuffer<u16, CHAR_RING_CAPACITY>,

    /// Ordered, lossless texture path to the session task.
    texture_tx: mpsc::Sender<CmdTexture>,
    texture_rx: Mutex<Option<mpsc::Receiver<CmdTexture>>>,
    /// Every texture the server should currently hold, replayed on
    /// reconnect.
    live_textures: Mutex<HashMap<u64, CmdTexture>>,

    connected: AtomicBool,
    disconnect_request: AtomicBool,
}

impl ClientContext {
    pub fn new(name: impl Into<String>) -> Self {
        let (texture_tx, texture_rx) = mpsc::channel(TEXTURE_QUEUE_DEPTH);
        Self {
            name: name.into(),
            frame_out: ExchangeSlot::new(),
            input_in: ExchangeSlot::new(),
            char_ring: RingBuffer::new(),
            texture_tx,
            texture_rx: Mutex::new(Some(texture_rx)),
            live_textures: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            disconnect_request: AtomicBool::new(false),
        }
    }

    /// Name announced to the server during the handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Application side ─────────────────────────────────────────

    /// Encode and publish a frame. If the previous frame was never
    /// sent it is dropped; the server only ever wants the newest one.
    pub fn submit_frame(&self, data: &DrawData) -> Result<(), RemError> {
        let encoded = encode_draw_frame(data)?;
        self.frame_out.assign(encoded);
        Ok(())
    }

    /// Queue a texture create/update or delete for transmission.
    ///
    /// Blocks the calling thread when [`TEXTURE_QUEUE_DEPTH`] commands
    /// are already waiting; textures are never dropped. Must be called
    /// from a plain thread, not from inside the async runtime.
    pub fn queue_texture(&self, cmd: CmdTexture) -> Result<(), RemError> {
        self.record_live(&cmd);
        self.texture_tx
            .blocking_send(cmd)
            .map_err(|_| RemError::ChannelClosed)
    }

    /// Like [`queue_texture`] but for callers already inside the async
    /// runtime; awaits instead of blocking when the queue is full.
    ///
    /// [`queue_texture`]: Self::queue_texture
    pub async fn queue_texture_async(&self, cmd: CmdTexture) -> Result<(), RemError> {
        self.record_live(&cmd);
        self.texture_tx
            .send(cmd)
            .await
            .map_err(|_| RemError::ChannelClosed)
    }

    fn record_live(&self, cmd: &CmdTexture) {
        let mut live = self.live_textures.lock().unwrap();
        if cmd.is_delete() {
            live.remove(&cmd.texture_id);
        } else {
            live.insert(cmd.texture_id, cmd.clone());
        }
    }

    /// Latest input snapshot from the server, if one arrived since the
    /// last call.
    pub fn take_input(&self) -> Option<CmdInput> {
        self.input_in.take()
    }

    /// Drain buffered typed characters into `out`, returning how many
    /// were written.
    pub fn read_chars(&self, out: &mut [u16]) -> usize {
        self.char_ring.read(out)
    }

    /// Ask the session to end after its current exchange round.
    pub fn request_disconnect(&self) {
        self.disconnect_request.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // ── Session side ─────────────────────────────────────────────

    pub(crate) fn take_frame(&self) -> Option<EncodedDrawFrame> {
        self.frame_out.take()
    }

    pub(crate) fn store_input(&self, input: CmdInput) {
        let written = self.char_ring.write(input.chars());
        if written < input.chars().len() {
            debug!(
                dropped = input.chars().len() - written,
                "character ring full, typed input dropped"
            );
        }
        self.input_in.assign(input);
    }

    /// Take the texture receiver for the lifetime of one session.
    pub(crate) fn take_texture_rx(&self) -> Option<mpsc::Receiver<CmdTexture>> {
        self.texture_rx.lock().unwrap().take()
    }

    /// Return the receiver when the session ends so a reconnect can
    /// pick it up again.
    pub(crate) fn return_texture_rx(&self, rx: mpsc::Receiver<CmdTexture>) {
        *self.texture_rx.lock().unwrap() = Some(rx);
    }

    /// Snapshot of every live texture, oldest id first, for replay
    /// after a reconnect.
    pub(crate) fn live_texture_snapshot(&self) -> Vec<CmdTexture> {
        let live = self.live_textures.lock().unwrap();
        let mut all: Vec<CmdTexture> = live.values().cloned().collect();
        all.sort_by_key(|t| t.texture_id);
        all
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
        if !connected {
            // A frame or input snapshot from a dead session must not
            // leak into the next one.
            self.frame_out.clear();
            self.input_in.clear();
        }
    }

    pub(crate) fn disconnect_requested(&self) -> bool {
        self.disconnect_request.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_disconnect_request(&self) {
        self.disconnect_request.store(false, Ordering::SeqCst);
    }
}

// ── Tests ────────────────────────────────────────────────────────

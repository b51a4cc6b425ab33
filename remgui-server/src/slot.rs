//! Client slot registry: a fixed table of per-client state.
//!
//! A slot is claimed with a single `compare_exchange` before the
//! handshake starts, so two racing connections can never share one,
//! and released only after every per-client field has been reset. The
//! display side reads slots concurrently with the session tasks that
//! fill them, so mutable state sits behind mutexes with short critical
//! sections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use remgui_core::{
    CmdInput, CmdTexture, DrawFrame, ExchangeSlot, FrameRateEstimator, SessionStats,
};

/// Slots available when no configuration says otherwise.
pub const DEFAULT_SLOT_COUNT: usize = 8;

// ── ClientSlot ───────────────────────────────────────────────────

/// Everything the server holds for one connected client.
pub struct ClientSlot {
    index: usize,
    /// Claimed by a session task. Owns the rest of the fields while
    /// set.
    used: AtomicBool,
    /// Handshake finished; frame and texture state is meaningful.
    connected: AtomicBool,
    /// The display side asked this client's session to end.
    disconnect_request: AtomicBool,

    name: Mutex<String>,
    /// Textures the client has sent and not deleted.
    textures: Mutex<HashMap<u64, CmdTexture>>,
    /// Newest decoded frame, replaced wholesale on arrival.
    frame: Mutex<Option<DrawFrame>>,
    /// Latest-wins input snapshot awaiting transmission to the client.
    input_out: ExchangeSlot<CmdInput>,

    stats: Mutex<SessionStats>,
    estimator: Mutex<FrameRateEstimator>,
}

impl ClientSlot {
    fn new(index: usize) -> Self {
        Self {
            index,
            used: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            disconnect_request: AtomicBool::new(false),
            name: Mutex::new(String::new()),
            textures: Mutex::new(HashMap::new()),
            frame: Mutex::new(None),
            input_out: ExchangeSlot::new(),
            stats: Mutex::new(SessionStats::default()),
            estimator: Mutex::new(FrameRateEstimator::new()),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    // ── Display side ─────────────────────────────────────────────

    /// Newest frame, leaving it in place for repeated redraws.
    pub fn with_frame<R>(&self, f: impl FnOnce(Option<&DrawFrame>) -> R) -> R {
        f(self.frame.lock().unwrap().as_ref())
    }

    /// Look up a texture by the id a draw call references.
    pub fn texture(&self, texture_id: u64) -> Option<CmdTexture> {
        self.textures.lock().unwrap().get(&texture_id).cloned()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.lock().unwrap().len()
    }

    /// Publish an input snapshot for the next exchange round. An
    /// unsent previous snapshot is replaced.
    pub fn publish_input(&self, input: CmdInput) {
        self.input_out.assign(input);
    }

    /// Ask the session task to disconnect this client.
    pub fn request_disconnect(&self) {
        self.disconnect_request.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = *self.stats.lock().unwrap();
        stats.fps = self.estimator.lock().unwrap().fps();
        stats
    }

    // ── Session side ─────────────────────────────────────────────

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.lock().unwrap() = name.to_string();
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn take_input(&self) -> Option<CmdInput> {
        self.input_out.take()
    }

    pub(crate) fn disconnect_requested(&self) -> bool {
        self.disconnect_request.load(Ordering::SeqCst)
    }

    pub(crate) fn store_frame(&self, frame: DrawFrame, wire_bytes: u64) {
        {
            let mut stats = self.stats.lock().unwrap();
            stats.frames_received += 1;
            stats.bytes_received += wire_bytes;
        }
        self.estimator.lock().unwrap().record_frame(wire_bytes);
        *self.frame.lock().unwrap() = Some(frame);
    }

    pub(crate) fn apply_texture(&self, cmd: CmdTexture) {
        let mut textures = self.textures.lock().unwrap();
        if cmd.is_delete() {
            if textures.remove(&cmd.texture_id).is_none() {
                warn!(
                    slot = self.index,
                    texture_id = cmd.texture_id,
                    "delete for unknown texture ignored"
                );
            }
        } else {
            textures.insert(cmd.texture_id, cmd);
        }
        self.stats.lock().unwrap().textures_received += 1;
    }

    pub(crate) fn record_sent(&self, bytes: u64) {
        self.stats.lock().unwrap().bytes_sent += bytes;
    }

    /// Claim this slot. Returns `false` when another connection got
    /// here first.
    fn try_claim(&self) -> bool {
        self.used
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Reset every per-client field, then mark the slot free. Order
    /// matters: a new claimant must never observe the old client's
    /// state.
    pub(crate) fn release(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnect_request.store(false, Ordering::SeqCst);
        self.name.lock().unwrap().clear();
        self.textures.lock().unwrap().clear();
        *self.frame.lock().unwrap() = None;
        self.input_out.clear();
        *self.stats.lock().unwrap() = SessionStats::default();
        *self.estimator.lock().unwrap() = FrameRateEstimator::new();
        self.used.store(false, Ordering::Release);
    }
}

// ── SlotTable ────────────────────────────────────────────────────

/// Fixed-size table of client slots.
pub struct SlotTable {
    slots: Vec<Arc<ClientSlot>>,
}

impl SlotTable {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|i| Arc::new(ClientSlot::new(i))).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&Arc<ClientSlot>> {
        self.slots.get(index)
    }

    /// Iterate connected slots, for the display side.
    pub fn connected(&self) -> impl Iterator<Item = &Arc<ClientSlot>> {
        self.slots.iter().filter(|s| s.is_connected())
    }

    pub fn used_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_used()).count()
    }

    /// Claim the first free slot, lowest index first.
    pub fn acquire(&self) -> Option<Arc<ClientSlot>> {
        self.slots.iter().find(|s| s.try_claim()).map(Arc::clone)
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_COUNT)
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! # remgui-server
//!
//! Server side of the remote UI stream: accepts clients into a fixed
//! slot table, decodes their frames and textures for a display
//! frontend, and relays keyboard/mouse input back.

pub mod config;
pub mod server;
pub mod slot;

pub use config::ServerConfig;
pub use server::Server;
pub use slot::{ClientSlot, DEFAULT_SLOT_COUNT, SlotTable};

//! Wire protocol: every command the two sides exchange, as
//! position-independent little-endian blobs.

pub mod frame;
pub mod header;
pub mod input;
pub mod texture;
pub mod version;

pub use frame::{
    DrawCall, DrawData, DrawFrame, DrawList, EncodedDrawFrame, IndexList, ListCommand, Vertex,
    encode_draw_frame,
};
pub use header::{HEADER_SIZE, MAX_MESSAGE_SIZE, MsgHeader, MsgKind, encode_bare};
pub use input::CmdInput;
pub use texture::{CmdTexture, TextureFormat};
pub use version::{CmdVersion, PROTOCOL_VERSION};

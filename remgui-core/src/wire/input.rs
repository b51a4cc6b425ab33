//! Input payload: the server's keyboard/mouse/display state, pushed to
//! the client every exchange so the UI library can consume it.
//!
//! ## Wire format (192 bytes)
//!
//! ```text
//! header:       MsgHeader  (8)
//! screen_size:  [u16; 2]   (4)
//! mouse_pos:    [i16; 2]   (4)
//! wheel_vert:   f32        (4)
//! wheel_horiz:  f32        (4)
//! key_chars:    [u16; 64]  (128)  newly typed character codes
//! keys_down:    [u64; 4]   (32)   bitmask of held keys/buttons
//! char_count:   u8         (1)    valid entries in key_chars
//! pad:          [u8; 7]    (7)
//! ```
//!
//! The mask width and character queue capacity are build-time fixed;
//! characters beyond capacity wait for the next input message.

use crate::error::RemError;
use crate::wire::header::{HEADER_SIZE, MsgHeader, MsgKind};

/// Characters one input message can carry.
pub const KEY_CHAR_CAPACITY: usize = 64;

/// Words in the keys-down bitmask (4 × u64 = 256 keys).
pub const KEY_MASK_WORDS: usize = 4;

/// Encoded size on the wire.
pub const INPUT_CMD_SIZE: usize = 192;

/// One snapshot of remote input state.
#[derive(Debug, Clone, PartialEq)]
pub struct CmdInput {
    /// Display size the server is rendering this client into.
    pub screen_size: [u16; 2],
    /// Pointer position in display coordinates.
    pub mouse_pos: [i16; 2],
    /// Vertical scroll delta since the previous input message.
    pub wheel_vert: f32,
    /// Horizontal scroll delta since the previous input message.
    pub wheel_horiz: f32,
    /// Newly typed character codes; only `char_count` entries valid.
    pub key_chars: [u16; KEY_CHAR_CAPACITY],
    /// Currently held keys and mouse buttons, one bit per key code.
    pub keys_down: [u64; KEY_MASK_WORDS],
    /// Valid prefix length of `key_chars`.
    pub char_count: u8,
}

impl Default for CmdInput {
    fn default() -> Self {
        Self {
            screen_size: [0; 2],
            mouse_pos: [0; 2],
            wheel_vert: 0.0,
            wheel_horiz: 0.0,
            key_chars: [0; KEY_CHAR_CAPACITY],
            keys_down: [0; KEY_MASK_WORDS],
            char_count: 0,
        }
    }
}

impl CmdInput {
    /// Append typed characters, up to the fixed capacity. Returns how
    /// many were accepted; the rest belong in the next message.
    pub fn push_chars(&mut self, chars: &[u16]) -> usize {
        let free = KEY_CHAR_CAPACITY - self.char_count as usize;
        let take = chars.len().min(free);
        let start = self.char_count as usize;
        self.key_chars[start..start + take].copy_from_slice(&chars[..take]);
        self.char_count += take as u8;
        take
    }

    /// The valid typed characters.
    pub fn chars(&self) -> &[u16] {
        &self.key_chars[..self.char_count as usize]
    }

    /// Whether the key/button with code `key` is currently held.
    pub fn is_key_down(&self, key: u16) -> bool {
        let key = key as usize;
        if key >= KEY_MASK_WORDS * 64 {
            return false;
        }
        self.keys_down[key / 64] & (1u64 << (key % 64)) != 0
    }

    /// Set or clear the held bit for key code `key`. Codes beyond the
    /// mask width are ignored.
    pub fn set_key_down(&mut self, key: u16, down: bool) {
        let key = key as usize;
        if key >= KEY_MASK_WORDS * 64 {
            return;
        }
        let bit = 1u64 << (key % 64);
        if down {
            self.keys_down[key / 64] |= bit;
        } else {
            self.keys_down[key / 64] &= !bit;
        }
    }

    /// Serialize the whole message, header included.
    pub fn encode(&self) -> [u8; INPUT_CMD_SIZE] {
        let mut buf = [0u8; INPUT_CMD_SIZE];
        let header = MsgHeader::new(MsgKind::Input, INPUT_CMD_SIZE as u32);
        buf[0..HEADER_SIZE].copy_from_slice(&header.encode());
        buf[8..10].copy_from_slice(&self.screen_size[0].to_le_bytes());
        buf[10..12].copy_from_slice(&self.screen_size[1].to_le_bytes());
        buf[12..14].copy_from_slice(&self.mouse_pos[0].to_le_bytes());
        buf[14..16].copy_from_slice(&self.mouse_pos[1].to_le_bytes());
        buf[16..20].copy_from_slice(&self.wheel_vert.to_le_bytes());
        buf[20..24].copy_from_slice(&self.wheel_horiz.to_le_bytes());
        for (i, c) in self.key_chars.iter().enumerate() {
            buf[24 + i * 2..26 + i * 2].copy_from_slice(&c.to_le_bytes());
        }
        for (i, w) in self.keys_down.iter().enumerate() {
            buf[152 + i * 8..160 + i * 8].copy_from_slice(&w.to_le_bytes());
        }
        buf[184] = self.char_count;
        buf
    }

    /// Deserialize from a whole message, header included.
    pub fn decode(data: &[u8]) -> Result<Self, RemError> {
        let header = MsgHeader::decode(data)?;
        if header.kind != MsgKind::Input {
            return Err(RemError::ProtocolViolation("expected an Input command"));
        }
        if data.len() != INPUT_CMD_SIZE || header.size as usize != INPUT_CMD_SIZE {
            return Err(RemError::InvalidPayloadLength {
                expected: INPUT_CMD_SIZE,
                actual: data.len(),
            });
        }

        let mut cmd = CmdInput {
            screen_size: [
                u16::from_le_bytes(data[8..10].try_into().unwrap()),
                u16::from_le_bytes(data[10..12].try_into().unwrap()),
            ],
            mouse_pos: [
                i16::from_le_bytes(data[12..14].try_into().unwrap()),
                i16::from_le_bytes(data[14..16].try_into().unwrap()),
            ],
            wheel_vert: f32::from_le_bytes(data[16..20].try_into().unwrap()),
            wheel_horiz: f32::from_le_bytes(data[20..24].try_into().unwrap()),
            ..Default::default()
        };
        for i in 0..KEY_CHAR_CAPACITY {
            cmd.key_chars[i] = u16::from_le_bytes(data[24 + i * 2..26 + i * 2].try_into().unwrap());
        }
        for i in 0..KEY_MASK_WORDS {
            cmd.keys_down[i] = u64::from_le_bytes(data[152 + i * 8..160 + i * 8].try_into().unwrap());
        }
        let char_count = data[184];
        if char_count as usize > KEY_CHAR_CAPACITY {
            return Err(RemError::ProtocolViolation(
                "char_count beyond queue capacity",
            ));
        }
        cmd.char_count = char_count;
        Ok(cmd)
    }
}

// ── Tests ────────────────────────────────────────────────────────

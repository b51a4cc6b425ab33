//! Texture payload: create/update a texture's pixels, or delete it.
//!
//! ## Wire format (32 bytes + pixel region)
//!
//! ```text
//! header:        MsgHeader (8)
//! pixel_offset:  u64       (8)   relocatable, from message base; 0 = none
//! texture_id:    u64       (8)   opaque handle chosen by the producer
//! width:         u16       (2)
//! height:        u16       (2)
//! format:        u8        (1)
//! pad:           [u8; 3]   (3)
//! pixels:        [u8]            width * height * bpp, padded to 8
//! ```
//!
//! A delete carries the `Invalid` format sentinel and no pixel region;
//! there is no separate delete message kind.

use bytes::Bytes;

use crate::error::RemError;
use crate::wire::header::{HEADER_SIZE, MsgHeader, MsgKind};

/// Fixed part of the message, before the pixel region.
pub const TEXTURE_CMD_FIXED_SIZE: usize = 32;

// ── TextureFormat ────────────────────────────────────────────────

/// Pixel format tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Single-channel alpha, 1 byte per pixel.
    A8 = 0,
    /// Packed RGBA, 4 bytes per pixel.
    Rgba8 = 1,
    /// Delete sentinel: no pixel data follows.
    Invalid = 255,
}

impl TextureFormat {
    /// Bytes per pixel, zero for the delete sentinel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::A8 => 1,
            TextureFormat::Rgba8 => 4,
            TextureFormat::Invalid => 0,
        }
    }
}

impl TryFrom<u8> for TextureFormat {
    type Error = RemError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TextureFormat::A8),
            1 => Ok(TextureFormat::Rgba8),
            255 => Ok(TextureFormat::Invalid),
            _ => Err(RemError::UnknownVariant {
                type_name: "TextureFormat",
                value: value as u64,
            }),
        }
    }
}

// ── CmdTexture ───────────────────────────────────────────────────

/// A decoded texture command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdTexture {
    pub texture_id: u64,
    pub width: u16,
    pub height: u16,
    pub format: TextureFormat,
    /// Pixel bytes for create/update, empty for delete.
    pub pixels: Bytes,
}

impl CmdTexture {
    /// Build a create/update command. The pixel slice length must be
    /// exactly `width * height * bytes_per_pixel(format)`.
    pub fn create(
        texture_id: u64,
        width: u16,
        height: u16,
        format: TextureFormat,
        pixels: Bytes,
    ) -> Result<Self, RemError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if format == TextureFormat::Invalid || pixels.len() != expected || expected == 0 {
            return Err(RemError::InvalidPayloadLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            texture_id,
            width,
            height,
            format,
            pixels,
        })
    }

    /// Build a delete command for `texture_id`.
    pub fn delete(texture_id: u64) -> Self {
        Self {
            texture_id,
            width: 0,
            height: 0,
            format: TextureFormat::Invalid,
            pixels: Bytes::new(),
        }
    }

    /// Whether this command deletes rather than creates.
    pub fn is_delete(&self) -> bool {
        self.format == TextureFormat::Invalid
    }

    /// Serialize the whole message, header included. The pixel region
    /// is padded to an 8-byte boundary and addressed by a relocatable
    /// offset from the start of this buffer.
    pub fn encode(&self) -> Vec<u8> {
        let pixel_padded = self.pixels.len().next_multiple_of(8);
        let total = TEXTURE_CMD_FIXED_SIZE + pixel_padded;
        let mut buf = vec![0u8; total];

        let header = MsgHeader::new(MsgKind::Texture, total as u32);
        buf[0..HEADER_SIZE].copy_from_slice(&header.encode());
        let pixel_offset: u64 = if self.pixels.is_empty() {
            0
        } else {
            TEXTURE_CMD_FIXED_SIZE as u64
        };
        buf[8..16].copy_from_slice(&pixel_offset.to_le_bytes());
        buf[16..24].copy_from_slice(&self.texture_id.to_le_bytes());
        buf[24..26].copy_from_slice(&self.width.to_le_bytes());
        buf[26..28].copy_from_slice(&self.height.to_le_bytes());
        buf[28] = self.format as u8;
        buf[TEXTURE_CMD_FIXED_SIZE..TEXTURE_CMD_FIXED_SIZE + self.pixels.len()]
            .copy_from_slice(&self.pixels);
        buf
    }

    /// Deserialize from a whole received message, header included.
    ///
    /// This is the single offset-to-slice relocation step: the stored
    /// pixel offset is validated against this buffer and never
    /// dereferenced as-is.
    pub fn decode(data: Bytes) -> Result<Self, RemError> {
        let header = MsgHeader::decode(&data)?;
        if header.kind != MsgKind::Texture {
            return Err(RemError::ProtocolViolation("expected a Texture command"));
        }
        if data.len() < TEXTURE_CMD_FIXED_SIZE || header.size as usize != data.len() {
            return Err(RemError::InvalidPayloadLength {
                expected: header.size as usize,
                actual: data.len(),
            });
        }

        let pixel_offset = u64::from_le_bytes(data[8..16].try_into().unwrap()) as usize;
        let texture_id = u64::from_le_bytes(data[16..24].try_into().unwrap());
        let width = u16::from_le_bytes(data[24..26].try_into().unwrap());
        let height = u16::from_le_bytes(data[26..28].try_into().unwrap());
        let format = TextureFormat::try_from(data[28])?;

        let pixel_len = width as usize * height as usize * format.bytes_per_pixel();
        if format == TextureFormat::Invalid {
            if pixel_offset != 0 {
                return Err(RemError::InvalidRegionOffset(
                    "delete command with a pixel region",
                ));
            }
            return Ok(Self::delete(texture_id));
        }

        if pixel_offset != TEXTURE_CMD_FIXED_SIZE || pixel_offset % 8 != 0 {
            return Err(RemError::InvalidRegionOffset(
                "pixel offset not at the region start",
            ));
        }
        if pixel_offset + pixel_len > data.len() {
            return Err(RemError::InvalidRegionOffset(
                "pixel region beyond the received buffer",
            ));
        }

        Ok(Self {
            texture_id,
            width,
            height,
            format,
            pixels: data.slice(pixel_offset..pixel_offset + pixel_len),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

//! Draw-frame payload: one whole UI frame as a single contiguous,
//! relocatable message.
//!
//! ## Wire format (64 bytes + three regions)
//!
//! ```text
//! header:           MsgHeader (8)
//! vertex_count:     u32       (4)
//! index_byte_size:  u32       (4)
//! draw_count:       u32       (4)
//! mouse_cursor:     u32       (4)
//! display_area:     [f32; 4]  (16)
//! vertices_offset:  u64       (8)   relocatable, from message base
//! indices_offset:   u64       (8)
//! draws_offset:     u64       (8)
//! vertices:         12 B each: pos [u16;2], uv [u16;2], color u32
//! indices:          2 or 4 B each, width chosen per source list
//! draws:            40 B each: texture_id u64, clip_rect [f32;4],
//!                   vertex_offset u32, index_byte_offset u32,
//!                   index_count u32, index_width u32
//! ```
//!
//! Each region start is 8-byte aligned. The offsets are byte distances
//! from the start of the message blob, so the blob stays valid after a
//! byte-for-byte copy to any other address; [`DrawFrame::decode`] is
//! the single place they are validated and turned back into slices.
//!
//! Vertex positions and UVs are quantized to `u16` over fixed
//! build-time ranges; colors travel verbatim as packed RGBA8.

use bytes::Bytes;

use crate::error::RemError;
use crate::wire::header::{HEADER_SIZE, MsgHeader, MsgKind};

/// Fixed part of the message, before the vertex region.
pub const FRAME_CMD_FIXED_SIZE: usize = 64;

/// Bytes per quantized vertex on the wire.
pub const VERTEX_WIRE_SIZE: usize = 12;

/// Bytes per draw call on the wire.
pub const DRAW_WIRE_SIZE: usize = 40;

/// Real-valued range mapped onto the full `u16` span for positions.
pub const POS_RANGE: (f32, f32) = (-4096.0, 4096.0);

/// Real-valued range mapped onto the full `u16` span for UVs.
pub const UV_RANGE: (f32, f32) = (0.0, 1.0);

// ── Producer-side frame description ──────────────────────────────

/// An unquantized vertex as produced by the UI library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    /// Packed RGBA8, copied verbatim through the codec.
    pub color: u32,
}

/// A source draw list's index array, in whichever width the UI library
/// produced it. The wire width is chosen per list from the vertex
/// count, independently of this.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexList {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexList {
    pub fn len(&self) -> usize {
        match self {
            IndexList::U16(v) => v.len(),
            IndexList::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One command within a source draw list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListCommand {
    /// Draws `index_count` indices with one texture and clip rect.
    Draw {
        texture_id: u64,
        index_count: u32,
        clip_rect: [f32; 4],
    },
    /// A user-callback marker; carries no geometry and is not
    /// transmitted.
    Callback,
}

/// One source draw list: its own vertex/index/command arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
    pub indices: IndexList,
    pub commands: Vec<ListCommand>,
}

/// A whole frame description handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawData {
    /// Visible area: `[min_x, min_y, max_x, max_y]`.
    pub display_area: [f32; 4],
    /// Cursor shape the client wants shown.
    pub mouse_cursor: u32,
    pub lists: Vec<DrawList>,
}

// ── Decoded frame ────────────────────────────────────────────────

/// One emitted draw call after decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub texture_id: u64,
    pub clip_rect: [f32; 4],
    /// Index of the first vertex this call references, within the
    /// frame-wide vertex region.
    pub vertex_offset: u32,
    /// Byte offset of this call's first index within the index region.
    pub index_byte_offset: u32,
    pub index_count: u32,
    /// 2 or 4, chosen per source list.
    pub index_width: u32,
}

/// A fully decoded, validated frame. Positions and UVs are back in
/// real units (within one quantization step of the source values).
#[derive(Debug, Clone, PartialEq)]
pub struct DrawFrame {
    pub vertex_count: u32,
    pub index_byte_size: u32,
    pub mouse_cursor: u32,
    pub display_area: [f32; 4],
    pub vertices: Vec<Vertex>,
    /// Raw index region; interpret per draw call via [`Self::indices_of`].
    pub indices: Bytes,
    pub draws: Vec<DrawCall>,
}

impl DrawFrame {
    pub fn draw_count(&self) -> u32 {
        self.draws.len() as u32
    }

    /// Widen one draw call's indices to `u32` for the rasterizer.
    pub fn indices_of(&self, draw: &DrawCall) -> Vec<u32> {
        let start = draw.index_byte_offset as usize;
        let width = draw.index_width as usize;
        (0..draw.index_count as usize)
            .map(|i| {
                let at = start + i * width;
                if width == 2 {
                    u16::from_le_bytes(self.indices[at..at + 2].try_into().unwrap()) as u32
                } else {
                    u32::from_le_bytes(self.indices[at..at + 4].try_into().unwrap())
                }
            })
            .collect()
    }
}

// ── Quantization ─────────────────────────────────────────────────

fn quantize(value: f32, (min, max): (f32, f32)) -> u16 {
    let scaled = (value - min) * 65536.0 / (max - min);
    scaled.round().clamp(0.0, 65535.0) as u16
}

fn dequantize(q: u16, (min, max): (f32, f32)) -> f32 {
    min + q as f32 * (max - min) / 65536.0
}

// ── Encode ───────────────────────────────────────────────────────

/// The wire form of a frame, offsets already in place. Decoding
/// consumes it, so the offset-to-slice conversion can only ever run
/// once per received copy.
#[derive(Debug, Clone)]
pub struct EncodedDrawFrame {
    bytes: Vec<u8>,
}

impl EncodedDrawFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Transmitted size in bytes, header included.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

const fn align8(n: usize) -> usize {
    n.next_multiple_of(8)
}

/// Wire index width for one source list: 2 bytes unless the list's
/// vertex count cannot be addressed by a `u16`.
fn index_width_for(list: &DrawList) -> usize {
    if list.vertices.len() <= 0xFFFF { 2 } else { 4 }
}

/// Convert a UI frame description into one contiguous, relocatable
/// message blob.
///
/// The buffer is laid out regions-last (vertices, indices, draws, each
/// 8-byte aligned) with every region offset computed before any data
/// is written. Callback-only commands are skipped, so the emitted draw
/// count can be smaller than the reserved worst case; the reported
/// message size shrinks accordingly.
pub fn encode_draw_frame(data: &DrawData) -> Result<EncodedDrawFrame, RemError> {
    // Pass 1: totals and region sizes.
    let mut vertex_count = 0usize;
    let mut index_byte_size = 0usize;
    let mut worst_draw_count = 0usize;
    for list in &data.lists {
        let declared: u64 = list
            .commands
            .iter()
            .map(|c| match c {
                ListCommand::Draw { index_count, .. } => *index_count as u64,
                ListCommand::Callback => 0,
            })
            .sum();
        if declared != list.indices.len() as u64 {
            return Err(RemError::ProtocolViolation(
                "draw commands do not cover the list's index array",
            ));
        }
        vertex_count += list.vertices.len();
        // Per-list byte size rounded to 4, accumulated.
        index_byte_size += (list.indices.len() * index_width_for(list)).next_multiple_of(4);
        worst_draw_count += list.commands.len();
    }

    let vertices_offset = FRAME_CMD_FIXED_SIZE;
    let indices_offset = vertices_offset + align8(vertex_count * VERTEX_WIRE_SIZE);
    let draws_offset = indices_offset + align8(index_byte_size);
    let worst_size = draws_offset + worst_draw_count * DRAW_WIRE_SIZE;
    if worst_size > crate::wire::header::MAX_MESSAGE_SIZE {
        return Err(RemError::MessageTooLarge {
            size: worst_size,
            max: crate::wire::header::MAX_MESSAGE_SIZE,
        });
    }

    // Worst-case allocation; the reported size shrinks at the end if
    // callback commands were skipped.
    let mut buf = vec![0u8; worst_size];

    // Pass 2: vertices.
    let mut cursor = vertices_offset;
    for list in &data.lists {
        for v in &list.vertices {
            buf[cursor..cursor + 2].copy_from_slice(&quantize(v.pos[0], POS_RANGE).to_le_bytes());
            buf[cursor + 2..cursor + 4]
                .copy_from_slice(&quantize(v.pos[1], POS_RANGE).to_le_bytes());
            buf[cursor + 4..cursor + 6].copy_from_slice(&quantize(v.uv[0], UV_RANGE).to_le_bytes());
            buf[cursor + 6..cursor + 8].copy_from_slice(&quantize(v.uv[1], UV_RANGE).to_le_bytes());
            buf[cursor + 8..cursor + 12].copy_from_slice(&v.color.to_le_bytes());
            cursor += VERTEX_WIRE_SIZE;
        }
    }

    // Pass 3: indices, converted to each list's wire width.
    let mut index_cursor = 0usize; // bytes into the index region
    for list in &data.lists {
        let width = index_width_for(list);
        let base = indices_offset + index_cursor;
        match (&list.indices, width) {
            (IndexList::U16(idx), 2) => {
                for (i, &v) in idx.iter().enumerate() {
                    buf[base + i * 2..base + i * 2 + 2].copy_from_slice(&v.to_le_bytes());
                }
            }
            (IndexList::U16(idx), _) => {
                for (i, &v) in idx.iter().enumerate() {
                    buf[base + i * 4..base + i * 4 + 4].copy_from_slice(&(v as u32).to_le_bytes());
                }
            }
            (IndexList::U32(idx), 4) => {
                for (i, &v) in idx.iter().enumerate() {
                    buf[base + i * 4..base + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
                }
            }
            (IndexList::U32(idx), _) => {
                // Narrowing is safe: width 2 implies every vertex index
                // of this list fits a u16.
                for (i, &v) in idx.iter().enumerate() {
                    buf[base + i * 2..base + i * 2 + 2]
                        .copy_from_slice(&(v as u16).to_le_bytes());
                }
            }
        }
        index_cursor = (index_cursor + list.indices.len() * width).next_multiple_of(4);
    }

    // Pass 4: draw calls, with running offsets carried across lists.
    let mut draw_count = 0usize;
    let mut vertex_offset = 0u32;
    let mut index_cursor = 0usize;
    for list in &data.lists {
        let width = index_width_for(list);
        for cmd in &list.commands {
            let ListCommand::Draw {
                texture_id,
                index_count,
                clip_rect,
            } = cmd
            else {
                continue;
            };
            let at = draws_offset + draw_count * DRAW_WIRE_SIZE;
            buf[at..at + 8].copy_from_slice(&texture_id.to_le_bytes());
            for (i, c) in clip_rect.iter().enumerate() {
                buf[at + 8 + i * 4..at + 12 + i * 4].copy_from_slice(&c.to_le_bytes());
            }
            buf[at + 24..at + 28].copy_from_slice(&vertex_offset.to_le_bytes());
            buf[at + 28..at + 32].copy_from_slice(&(index_cursor as u32).to_le_bytes());
            buf[at + 32..at + 36].copy_from_slice(&index_count.to_le_bytes());
            buf[at + 36..at + 40].copy_from_slice(&(width as u32).to_le_bytes());
            index_cursor += *index_count as usize * width;
            draw_count += 1;
        }
        vertex_offset += list.vertices.len() as u32;
        index_cursor = index_cursor.next_multiple_of(4);
    }

    // Shrink to the actually emitted draw count.
    let actual_size = draws_offset + draw_count * DRAW_WIRE_SIZE;
    buf.truncate(actual_size);

    // Fixed header fields last, now that the final counts are known.
    let header = MsgHeader::new(MsgKind::DrawFrame, actual_size as u32);
    buf[0..HEADER_SIZE].copy_from_slice(&header.encode());
    buf[8..12].copy_from_slice(&(vertex_count as u32).to_le_bytes());
    buf[12..16].copy_from_slice(&(index_byte_size as u32).to_le_bytes());
    buf[16..20].copy_from_slice(&(draw_count as u32).to_le_bytes());
    buf[20..24].copy_from_slice(&data.mouse_cursor.to_le_bytes());
    for (i, c) in data.display_area.iter().enumerate() {
        buf[24 + i * 4..28 + i * 4].copy_from_slice(&c.to_le_bytes());
    }
    buf[40..48].copy_from_slice(&(vertices_offset as u64).to_le_bytes());
    buf[48..56].copy_from_slice(&(indices_offset as u64).to_le_bytes());
    buf[56..64].copy_from_slice(&(draws_offset as u64).to_le_bytes());

    Ok(EncodedDrawFrame { bytes: buf })
}

// ── Decode ───────────────────────────────────────────────────────

/// Validate one stored region offset and return it as a byte range.
///
/// All arithmetic is checked: a hostile offset near the top of the
/// address space must fail validation, not wrap around it.
fn resolve_region(
    offset: u64,
    len: usize,
    buf_len: usize,
    what: &'static str,
) -> Result<(usize, usize), RemError> {
    let offset = usize::try_from(offset)
        .map_err(|_| RemError::InvalidRegionOffset("offset beyond addressable range"))?;
    if offset < FRAME_CMD_FIXED_SIZE || offset % 8 != 0 {
        return Err(RemError::InvalidRegionOffset(what));
    }
    let end = offset
        .checked_add(len)
        .ok_or(RemError::InvalidRegionOffset(what))?;
    if end > buf_len {
        return Err(RemError::InvalidRegionOffset(what));
    }
    Ok((offset, end))
}

impl DrawFrame {
    /// Decode one received message blob, header included.
    ///
    /// This is the single relocation step: the stored offsets are
    /// rebased against this buffer exactly once, checked for bounds,
    /// alignment and ordering before any field behind them is read.
    /// Consuming the blob makes a second conversion inexpressible.
    pub fn decode(data: Bytes) -> Result<Self, RemError> {
        let header = MsgHeader::decode(&data)?;
        if header.kind != MsgKind::DrawFrame {
            return Err(RemError::ProtocolViolation("expected a DrawFrame command"));
        }
        if data.len() < FRAME_CMD_FIXED_SIZE || header.size as usize != data.len() {
            return Err(RemError::InvalidPayloadLength {
                expected: header.size as usize,
                actual: data.len(),
            });
        }

        let vertex_count = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let index_byte_size = u32::from_le_bytes(data[12..16].try_into().unwrap());
        let draw_count = u32::from_le_bytes(data[16..20].try_into().unwrap());
        let mouse_cursor = u32::from_le_bytes(data[20..24].try_into().unwrap());
        let mut display_area = [0f32; 4];
        for (i, c) in display_area.iter_mut().enumerate() {
            *c = f32::from_le_bytes(data[24 + i * 4..28 + i * 4].try_into().unwrap());
        }

        let vertex_bytes = (vertex_count as usize)
            .checked_mul(VERTEX_WIRE_SIZE)
            .ok_or(RemError::InvalidRegionOffset("vertex region"))?;
        let draw_bytes = (draw_count as usize)
            .checked_mul(DRAW_WIRE_SIZE)
            .ok_or(RemError::InvalidRegionOffset("draw region"))?;
        let (vertices_at, vertices_end) = resolve_region(
            u64::from_le_bytes(data[40..48].try_into().unwrap()),
            vertex_bytes,
            data.len(),
            "vertex region",
        )?;
        let (indices_at, indices_end) = resolve_region(
            u64::from_le_bytes(data[48..56].try_into().unwrap()),
            index_byte_size as usize,
            data.len(),
            "index region",
        )?;
        let (draws_at, _) = resolve_region(
            u64::from_le_bytes(data[56..64].try_into().unwrap()),
            draw_bytes,
            data.len(),
            "draw region",
        )?;
        // Regions live in one allocation in a fixed order and must not
        // overlap.
        if vertices_end > indices_at || indices_end > draws_at {
            return Err(RemError::InvalidRegionOffset("regions overlap or reorder"));
        }

        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for i in 0..vertex_count as usize {
            let at = vertices_at + i * VERTEX_WIRE_SIZE;
            vertices.push(Vertex {
                pos: [
                    dequantize(
                        u16::from_le_bytes(data[at..at + 2].try_into().unwrap()),
                        POS_RANGE,
                    ),
                    dequantize(
                        u16::from_le_bytes(data[at + 2..at + 4].try_into().unwrap()),
                        POS_RANGE,
                    ),
                ],
                uv: [
                    dequantize(
                        u16::from_le_bytes(data[at + 4..at + 6].try_into().unwrap()),
                        UV_RANGE,
                    ),
                    dequantize(
                        u16::from_le_bytes(data[at + 6..at + 8].try_into().unwrap()),
                        UV_RANGE,
                    ),
                ],
                color: u32::from_le_bytes(data[at + 8..at + 12].try_into().unwrap()),
            });
        }

        let mut draws = Vec::with_capacity(draw_count as usize);
        for i in 0..draw_count as usize {
            let at = draws_at + i * DRAW_WIRE_SIZE;
            let mut clip_rect = [0f32; 4];
            for (j, c) in clip_rect.iter_mut().enumerate() {
                *c = f32::from_le_bytes(data[at + 8 + j * 4..at + 12 + j * 4].try_into().unwrap());
            }
            let draw = DrawCall {
                texture_id: u64::from_le_bytes(data[at..at + 8].try_into().unwrap()),
                clip_rect,
                vertex_offset: u32::from_le_bytes(data[at + 24..at + 28].try_into().unwrap()),
                index_byte_offset: u32::from_le_bytes(data[at + 28..at + 32].try_into().unwrap()),
                index_count: u32::from_le_bytes(data[at + 32..at + 36].try_into().unwrap()),
                index_width: u32::from_le_bytes(data[at + 36..at + 40].try_into().unwrap()),
            };
            if draw.index_width != 2 && draw.index_width != 4 {
                return Err(RemError::ProtocolViolation("index width must be 2 or 4"));
            }
            let end = draw.index_byte_offset as u64 + draw.index_count as u64 * draw.index_width as u64;
            if end > index_byte_size as u64 {
                return Err(RemError::InvalidRegionOffset(
                    "draw call indices beyond the index region",
                ));
            }
            if draw.vertex_offset > vertex_count {
                return Err(RemError::InvalidRegionOffset(
                    "draw call vertex offset beyond the vertex region",
                ));
            }
            draws.push(draw);
        }

        Ok(Self {
            vertex_count,
            index_byte_size,
            mouse_cursor,
            display_area,
            vertices,
            indices: data.slice(indices_at..indices_at + index_byte_size as usize),
            draws,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

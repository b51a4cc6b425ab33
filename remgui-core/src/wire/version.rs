//! Handshake payload: protocol version plus a peer name.
//!
//! ## Wire format (32 bytes)
//!
//! ```text
//! header:   MsgHeader (8)
//! version:  u32       (4)
//! name:     [u8; 16]  (16)  NUL-terminated, informational only
//! pad:      [u8; 4]   (4)
//! ```
//!
//! A connection is usable only when both peers' version integers are
//! bit-for-bit equal; the name never participates in the decision.

use crate::error::RemError;
use crate::wire::header::{HEADER_SIZE, MsgHeader, MsgKind};

/// Version integer advertised by this build. Bump on any wire change.
pub const PROTOCOL_VERSION: u32 = 1;

/// Fixed length of the peer name field.
pub const NAME_LEN: usize = 16;

/// Encoded size on the wire.
pub const VERSION_CMD_SIZE: usize = 32;

/// The version-exchange command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdVersion {
    pub version: u32,
    name: [u8; NAME_LEN],
}

impl CmdVersion {
    /// Build a handshake command for the local peer.
    ///
    /// `name` is truncated to 15 bytes so the field always keeps a
    /// trailing NUL.
    pub fn new(name: &str) -> Self {
        let mut fixed = [0u8; NAME_LEN];
        let take = name.len().min(NAME_LEN - 1);
        fixed[..take].copy_from_slice(&name.as_bytes()[..take]);
        Self {
            version: PROTOCOL_VERSION,
            name: fixed,
        }
    }

    /// The peer name, up to the first NUL.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Serialize the whole message, header included.
    pub fn encode(&self) -> [u8; VERSION_CMD_SIZE] {
        let mut buf = [0u8; VERSION_CMD_SIZE];
        let header = MsgHeader::new(MsgKind::Version, VERSION_CMD_SIZE as u32);
        buf[0..HEADER_SIZE].copy_from_slice(&header.encode());
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..28].copy_from_slice(&self.name);
        buf
    }

    /// Deserialize from a whole message, header included.
    pub fn decode(data: &[u8]) -> Result<Self, RemError> {
        let header = MsgHeader::decode(data)?;
        if header.kind != MsgKind::Version {
            return Err(RemError::HandshakeProtocol("non-Version command"));
        }
        if data.len() != VERSION_CMD_SIZE || header.size as usize != VERSION_CMD_SIZE {
            return Err(RemError::InvalidPayloadLength {
                expected: VERSION_CMD_SIZE,
                actual: data.len(),
            });
        }
        let version = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&data[12..28]);
        Ok(Self { version, name })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cmd = CmdVersion::new("sandbox");
        let decoded = CmdVersion::decode(&cmd.encode()).unwrap();
        assert_eq!(decoded.version, PROTOCOL_VERSION);
        assert_eq!(decoded.name(), "sandbox");
    }

    #[test]
    fn long_name_truncated_with_nul() {
        let cmd = CmdVersion::new("a-needlessly-long-client-name");
        assert_eq!(cmd.name().len(), NAME_LEN - 1);
        let decoded = CmdVersion::decode(&cmd.encode()).unwrap();
        assert_eq!(decoded.name(), cmd.name());
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut raw = CmdVersion::new("x").encode();
        raw[4] = MsgKind::Ping as u8;
        // Header size no longer matches a Ping, but the kind check
        // fires first.
        assert!(matches!(
            CmdVersion::decode(&raw),
            Err(RemError::HandshakeProtocol(_))
        ));
    }

    #[test]
    fn truncated_rejected() {
        let raw = CmdVersion::new("x").encode();
        assert!(CmdVersion::decode(&raw[..20]).is_err());
    }
}

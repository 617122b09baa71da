//! Command/response frame codec.
//!
//! Wire format (command channel):
//! ```text
//! command:  ┌────────┬─────────┬───────────────┐
//!           │ id (1B)│ len (1B)│ payload (≤255)│
//!           └────────┴─────────┴───────────────┘
//! response: ┌────────┬──────────┬─────────┬───────────────┐
//!           │ id (1B)│ status 1B│ len (1B)│ payload (≤255)│
//!           └────────┴──────────┴─────────┴───────────────┘
//! ```
//!
//! The parser never panics on firmware-controlled input; anything shorter
//! than its declared size is rejected with a typed [`FrameError`].

use heapless::Vec;

use super::{CommandId, StatusCode};
use crate::error::FrameError;

/// Maximum payload a single frame can carry (one length byte).
pub const MAX_PAYLOAD: usize = 255;

/// Maximum encoded command size: id + len + payload.
pub const MAX_FRAME: usize = 2 + MAX_PAYLOAD;

// ---------------------------------------------------------------------------
// Outbound command frames
// ---------------------------------------------------------------------------

/// An outbound command, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    id: CommandId,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl CommandFrame {
    /// Build a frame, rejecting payloads over the one-byte length limit.
    pub fn new(id: CommandId, payload: &[u8]) -> Result<Self, FrameError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(payload)
            .map_err(|()| FrameError::PayloadTooLarge { len: payload.len() })?;
        Ok(Self { id, payload: buf })
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to `[id][len][payload]`.
    pub fn encode(&self) -> Vec<u8, MAX_FRAME> {
        let mut out = Vec::new();
        // Capacity is MAX_FRAME and payload is bounded at MAX_PAYLOAD, so
        // these pushes cannot fail.
        let _ = out.push(self.id as u8);
        let _ = out.push(self.payload.len() as u8);
        let _ = out.extend_from_slice(&self.payload);
        out
    }
}

// ---------------------------------------------------------------------------
// Inbound response frames
// ---------------------------------------------------------------------------

/// A parsed response notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Echoed command id, raw; unknown ids are preserved for logging.
    pub command: u8,
    pub status: StatusCode,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl ResponseFrame {
    /// Parse a raw notification into a response frame.
    pub fn parse(raw: &[u8]) -> Result<Self, FrameError> {
        if raw.len() < 3 {
            return Err(FrameError::Malformed { len: raw.len() });
        }

        let declared = raw[2] as usize;
        let available = raw.len() - 3;
        if available < declared {
            return Err(FrameError::Truncated {
                declared,
                available,
            });
        }

        let mut payload = Vec::new();
        // declared ≤ 255 == capacity, cannot fail.
        let _ = payload.extend_from_slice(&raw[3..3 + declared]);

        Ok(Self {
            command: raw[0],
            status: StatusCode::from_wire(raw[1]),
            payload,
        })
    }

    /// The echoed command id, if it names a known command.
    pub fn command_id(&self) -> Option<CommandId> {
        CommandId::from_wire(self.command)
    }
}

// ---------------------------------------------------------------------------
// Hex dump helper for protocol logging
// ---------------------------------------------------------------------------

/// Format bytes as space-separated hex for debug log lines. Long buffers
/// are elided after 24 bytes.
pub fn hex_dump(bytes: &[u8]) -> String {
    const LIMIT: usize = 24;
    let shown = &bytes[..bytes.len().min(LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3 + 8);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    if bytes.len() > LIMIT {
        out.push_str(&format!(" …(+{})", bytes.len() - LIMIT));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::CommandId;

    #[test]
    fn encode_layout() {
        let f = CommandFrame::new(CommandId::StartTransfer, &[0x13]).unwrap();
        assert_eq!(f.encode().as_slice(), &[0x01, 0x01, 0x13]);
    }

    #[test]
    fn encode_empty_payload() {
        let f = CommandFrame::new(CommandId::GetImageList, &[]).unwrap();
        assert_eq!(f.encode().as_slice(), &[0x06, 0x00]);
    }

    #[test]
    fn oversized_payload_rejected() {
        let big = [0u8; 256];
        let err = CommandFrame::new(CommandId::ReorderImages, &big).unwrap_err();
        assert_eq!(err, FrameError::PayloadTooLarge { len: 256 });
    }

    #[test]
    fn max_payload_accepted() {
        let max = [0xAB; 255];
        let f = CommandFrame::new(CommandId::ReorderImages, &max).unwrap();
        assert_eq!(f.encode().len(), 257);
    }

    #[test]
    fn parse_roundtrip() {
        // pack() output with a synthetic status byte spliced in.
        let f = CommandFrame::new(CommandId::GetStatus, &[1, 2, 3]).unwrap();
        let cmd = f.encode();
        let mut raw = vec![cmd[0], 0x00];
        raw.extend_from_slice(&cmd[1..]);

        let r = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(r.command_id(), Some(CommandId::GetStatus));
        assert_eq!(r.status, StatusCode::Success);
        assert_eq!(r.payload.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn parse_too_short() {
        assert_eq!(
            ResponseFrame::parse(&[0x06, 0x00]).unwrap_err(),
            FrameError::Malformed { len: 2 }
        );
        assert_eq!(
            ResponseFrame::parse(&[]).unwrap_err(),
            FrameError::Malformed { len: 0 }
        );
    }

    #[test]
    fn parse_truncated_payload() {
        // Declares 5 payload bytes, delivers 2.
        let raw = [0x06, 0x00, 0x05, 0xAA, 0xBB];
        assert_eq!(
            ResponseFrame::parse(&raw).unwrap_err(),
            FrameError::Truncated {
                declared: 5,
                available: 2
            }
        );
    }

    #[test]
    fn parse_tolerates_trailing_bytes() {
        // Some firmware revisions pad notifications; extra bytes after the
        // declared payload are ignored.
        let raw = [0x08, 0x00, 0x01, 0x42, 0xFF, 0xFF];
        let r = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(r.payload.as_slice(), &[0x42]);
    }

    #[test]
    fn unknown_command_id_preserved() {
        let raw = [0x77, 0x01, 0x00];
        let r = ResponseFrame::parse(&raw).unwrap();
        assert_eq!(r.command, 0x77);
        assert_eq!(r.command_id(), None);
        assert_eq!(r.status, StatusCode::GeneralError);
    }

    #[test]
    fn hex_dump_elides() {
        assert_eq!(hex_dump(&[0x01, 0xAB]), "01 AB");
        let long = [0u8; 30];
        assert!(hex_dump(&long).ends_with("…(+6)"));
    }
}

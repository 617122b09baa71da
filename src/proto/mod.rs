//! Wire protocol definitions shared by the codec, decoder and link layers.
//!
//! The pendant speaks a tiny command/response protocol over two GATT
//! characteristics: a command channel (write + notify) and a data channel
//! (write only, used for image chunk streaming). Every image on the device
//! is identified on the wire by a single *combined index* byte:
//!
//! ```text
//! ┌───────────────┬───────────────┐
//! │ bits 7..4     │ bits 3..0     │
//! │ format tag    │ slot (0-15)   │
//! └───────────────┴───────────────┘
//! ```
//!
//! The two halves are never manipulated independently; [`CombinedIndex`]
//! is the only way to build or split the byte.

pub mod frame;
pub mod gifpack;
pub mod records;

use core::fmt;

// ---------------------------------------------------------------------------
// Command identifiers
// ---------------------------------------------------------------------------

/// One-byte command IDs understood by the pendant firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    StartTransfer = 0x01,
    /// Raw image chunk. Sent on the data channel, never queued as a command.
    ImageData = 0x02,
    EndTransfer = 0x03,
    DeleteImage = 0x04,
    ReorderImages = 0x05,
    GetImageList = 0x06,
    SetDisplay = 0x07,
    GetStatus = 0x08,
}

impl CommandId {
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::StartTransfer),
            0x02 => Some(Self::ImageData),
            0x03 => Some(Self::EndTransfer),
            0x04 => Some(Self::DeleteImage),
            0x05 => Some(Self::ReorderImages),
            0x06 => Some(Self::GetImageList),
            0x07 => Some(Self::SetDisplay),
            0x08 => Some(Self::GetStatus),
            _ => None,
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartTransfer => "StartTransfer",
            Self::ImageData => "ImageData",
            Self::EndTransfer => "EndTransfer",
            Self::DeleteImage => "DeleteImage",
            Self::ReorderImages => "ReorderImages",
            Self::GetImageList => "GetImageList",
            Self::SetDisplay => "SetDisplay",
            Self::GetStatus => "GetStatus",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Response status codes
// ---------------------------------------------------------------------------

/// One-byte status codes carried in every response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0x00,
    GeneralError = 0x01,
    FilesystemError = 0x02,
    TransferError = 0x03,
    ParamError = 0x04,
}

impl StatusCode {
    /// Unknown codes map to `GeneralError` rather than failing the frame;
    /// firmware revisions have added codes before.
    pub fn from_wire(raw: u8) -> Self {
        match raw {
            0x00 => Self::Success,
            0x02 => Self::FilesystemError,
            0x03 => Self::TransferError,
            0x04 => Self::ParamError,
            _ => Self::GeneralError,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::GeneralError => "general error",
            Self::FilesystemError => "filesystem error",
            Self::TransferError => "transfer error",
            Self::ParamError => "parameter error",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Image formats and the combined index byte
// ---------------------------------------------------------------------------

/// Image format tag stored in the high nibble of the combined index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ImageFormat {
    #[default]
    Raw = 0x00,
    Jpeg = 0x10,
    Png = 0x20,
    GifPack = 0x30,
}

impl ImageFormat {
    /// Decode from a high-nibble tag. Unknown tags fall back to `Raw`,
    /// matching the firmware's behaviour for unrecognized formats.
    pub fn from_tag(tag: u8) -> Self {
        match tag & 0xF0 {
            0x10 => Self::Jpeg,
            0x20 => Self::Png,
            0x30 => Self::GifPack,
            _ => Self::Raw,
        }
    }

    /// Filename extension used when synthesizing display names.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Raw => "bin",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::GifPack => "gfp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Raw => "BIN",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::GifPack => "GIFPACK",
        };
        write!(f, "{name}")
    }
}

/// The canonical on-wire image identity: format tag in the high nibble,
/// slot in the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinedIndex(u8);

impl CombinedIndex {
    /// Compose from format and slot. The slot is masked to its low 4 bits
    /// before combining; slots above 15 wrap rather than corrupting the
    /// format nibble.
    pub fn new(format: ImageFormat, slot: u8) -> Self {
        Self((format as u8) | (slot & 0x0F))
    }

    pub fn from_wire(raw: u8) -> Self {
        Self(raw)
    }

    pub fn format(self) -> ImageFormat {
        ImageFormat::from_tag(self.0)
    }

    pub fn slot(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Synthesized display name, e.g. `img_3.jpg`.
    pub fn display_name(self) -> String {
        format!("img_{}.{}", self.slot(), self.format().extension())
    }
}

impl fmt::Display for CombinedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} slot {}", self.format(), self.slot())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_index_roundtrip_all() {
        for format in [
            ImageFormat::Raw,
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::GifPack,
        ] {
            for slot in 0..16u8 {
                let ci = CombinedIndex::new(format, slot);
                assert_eq!(ci.format(), format);
                assert_eq!(ci.slot(), slot);
            }
        }
    }

    #[test]
    fn slot_masked_before_combining() {
        let ci = CombinedIndex::new(ImageFormat::Png, 0x1F);
        assert_eq!(ci.slot(), 0x0F);
        assert_eq!(ci.format(), ImageFormat::Png);
    }

    #[test]
    fn command_id_wire_roundtrip() {
        for raw in 0x01..=0x08u8 {
            let id = CommandId::from_wire(raw).unwrap();
            assert_eq!(id as u8, raw);
        }
        assert!(CommandId::from_wire(0x00).is_none());
        assert!(CommandId::from_wire(0x09).is_none());
    }

    #[test]
    fn unknown_status_maps_to_general_error() {
        assert_eq!(StatusCode::from_wire(0x7F), StatusCode::GeneralError);
        assert!(StatusCode::from_wire(0x00).is_success());
    }

    #[test]
    fn display_name_synthesis() {
        assert_eq!(
            CombinedIndex::new(ImageFormat::Jpeg, 3).display_name(),
            "img_3.jpg"
        );
        assert_eq!(
            CombinedIndex::new(ImageFormat::Raw, 0).display_name(),
            "img_0.bin"
        );
        assert_eq!(
            CombinedIndex::new(ImageFormat::GifPack, 15).display_name(),
            "img_15.gfp"
        );
    }
}

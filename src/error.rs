//! Unified error types for the glyphlink protocol core.
//!
//! A single `LinkError` enum that every subsystem can convert into, keeping
//! the control loop's error handling uniform. Transient link errors carry
//! enough context (originating command, byte counts) to be logged usefully;
//! every error path converges back to a defined connection state.

use core::fmt;

use crate::proto::CommandId;

// ---------------------------------------------------------------------------
// Top-level link error
// ---------------------------------------------------------------------------

/// Every fallible operation in the protocol core funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Connection establishment failed.
    Connect(ConnectError),
    /// A characteristic write failed or timed out.
    Write(WriteError),
    /// A command/response frame could not be built or parsed.
    Frame(FrameError),
    /// A response payload could not be decoded.
    Decode(DecodeError),
    /// A chunked transfer was aborted.
    Transfer(TransferError),
    /// GifPack container encoding or decoding failed.
    Container(ContainerError),
    /// The platform transport is unusable (e.g. radio off).
    TransportUnavailable,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "connect: {e}"),
            Self::Write(e) => write!(f, "write: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Transfer(e) => write!(f, "transfer: {e}"),
            Self::Container(e) => write!(f, "container: {e}"),
            Self::TransportUnavailable => write!(f, "transport unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// Scan ended without finding a matching device.
    ScanTimeout,
    /// The link did not come up within the connect timeout.
    Timeout,
    /// The transport reported a link failure; retries exhausted.
    Failed,
    /// Required service or characteristics are missing. Fatal, no retry.
    IncompatibleDevice,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanTimeout => write!(f, "scan timed out with no matching device"),
            Self::Timeout => write!(f, "connect timed out"),
            Self::Failed => write!(f, "connect failed after retries"),
            Self::IncompatibleDevice => write!(f, "device is missing the required service"),
        }
    }
}

impl From<ConnectError> for LinkError {
    fn from(e: ConnectError) -> Self {
        Self::Connect(e)
    }
}

// ---------------------------------------------------------------------------
// Write errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// No acknowledgment arrived within the write timeout; the write was
    /// abandoned (the caller must re-issue the command, never replayed).
    Timeout { command: Option<CommandId> },
    /// The transport rejected the write; one retry already spent.
    Failed { command: Option<CommandId> },
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { command: Some(c) } => write!(f, "timeout on {c}"),
            Self::Timeout { command: None } => write!(f, "timeout on data chunk"),
            Self::Failed { command: Some(c) } => write!(f, "write of {c} rejected"),
            Self::Failed { command: None } => write!(f, "data chunk write rejected"),
        }
    }
}

impl From<WriteError> for LinkError {
    fn from(e: WriteError) -> Self {
        Self::Write(e)
    }
}

// ---------------------------------------------------------------------------
// Frame codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Raw response shorter than the 3-byte header.
    Malformed { len: usize },
    /// Declared payload length exceeds the bytes actually present.
    Truncated { declared: usize, available: usize },
    /// Command payload exceeds the 255-byte wire limit.
    PayloadTooLarge { len: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { len } => write!(f, "response too short ({len} bytes)"),
            Self::Truncated {
                declared,
                available,
            } => write!(f, "payload truncated (declared {declared}, got {available})"),
            Self::PayloadTooLarge { len } => write!(f, "payload too large ({len} > 255)"),
        }
    }
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Response decode errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Status payload shorter than any known layout.
    StatusTooShort { len: usize },
    /// No known image-list layout matched the payload.
    UnknownListLayout,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusTooShort { len } => write!(f, "status payload too short ({len} bytes)"),
            Self::UnknownListLayout => write!(f, "unrecognized image list layout"),
        }
    }
}

impl From<DecodeError> for LinkError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Transfer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// Superseded by a newer transfer or by disconnect.
    Interrupted,
    /// A chunk write failed twice at the given offset.
    WriteFailed { offset: usize, total: usize },
    /// Transfer requested outside the Ready state.
    NotReady,
    /// Transfer requested with nothing to send.
    EmptyPayload,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupted"),
            Self::WriteFailed { offset, total } => {
                write!(f, "chunk write failed at {offset}/{total}")
            }
            Self::NotReady => write!(f, "link not ready"),
            Self::EmptyPayload => write!(f, "transfer payload is empty"),
        }
    }
}

impl From<TransferError> for LinkError {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

// ---------------------------------------------------------------------------
// Container errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    /// A pack must contain at least one frame.
    NoFrames,
    /// Frame count exceeds the format limit.
    TooManyFrames { count: usize },
    /// A frame blob was empty.
    EmptyFrame { index: usize },
    /// Magic bytes did not match "GFPK".
    BadMagic,
    /// Unsupported container version.
    BadVersion { version: u8 },
    /// Buffer ends before the declared header/table/frames.
    Truncated,
    /// An offset points outside the buffer or behind its predecessor.
    BadOffset { index: usize },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFrames => write!(f, "no frames"),
            Self::TooManyFrames { count } => write!(f, "too many frames ({count})"),
            Self::EmptyFrame { index } => write!(f, "frame {index} is empty"),
            Self::BadMagic => write!(f, "bad magic"),
            Self::BadVersion { version } => write!(f, "unsupported version {version}"),
            Self::Truncated => write!(f, "container truncated"),
            Self::BadOffset { index } => write!(f, "invalid offset for frame {index}"),
        }
    }
}

impl From<ContainerError> for LinkError {
    fn from(e: ContainerError) -> Self {
        Self::Container(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, LinkError>;

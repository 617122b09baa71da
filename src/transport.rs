//! Transport port — the boundary between the link layer and the radio.
//!
//! ```text
//!   BLE adapter ──▶ Transport trait ──▶ LinkManager (domain)
//! ```
//!
//! The link layer never touches a radio stack directly. A platform adapter
//! implements [`Transport`] and feeds results back as [`TransportEvent`]s,
//! so every transport outcome flows through the same serialized event
//! path as user intents and timer ticks. Transport calls must not invoke
//! the link layer re-entrantly; they enqueue events instead.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Channel identity
// ───────────────────────────────────────────────────────────────

/// The two device characteristics the protocol writes to.
///
/// Ordering, pacing, and the one-in-flight rule are tracked per channel:
/// a bulk transfer on [`Data`](LinkChannel::Data) never blocks a command
/// on [`Command`](LinkChannel::Command).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChannel {
    /// Control frames: every command except image chunks.
    Command,
    /// Bulk image chunks during a transfer.
    Data,
}

impl fmt::Display for LinkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkChannel::Command => write!(f, "cmd"),
            LinkChannel::Data => write!(f, "data"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Scan and connect types
// ───────────────────────────────────────────────────────────────

/// What the scanner should match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Advertised-name prefix; empty matches everything.
    pub name_prefix: String,
}

/// Opaque handle to a discovered peer, minted by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: String,
    pub name: String,
}

// ───────────────────────────────────────────────────────────────
// Transport events
// ───────────────────────────────────────────────────────────────

/// Everything a transport adapter can report back to the link layer.
///
/// Delivered on the same serialized path as intents and ticks; the link
/// layer is the only consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Scanner saw an advertising peer matching the filter.
    DeviceFound(DeviceHandle),
    /// Physical link established.
    LinkUp,
    /// Physical link dropped, whether requested or not.
    LinkDown,
    /// Service discovery found both protocol channels.
    ChannelsResolved,
    /// Service discovery finished without the protocol channels; the
    /// peer is not one of ours.
    ChannelsMissing,
    /// Notifications are flowing; the link is usable.
    SubscribeReady,
    /// A write on the given channel was acknowledged.
    WriteAck(LinkChannel),
    /// A write on the given channel failed at the radio layer.
    WriteFailed(LinkChannel),
    /// Inbound notification bytes (a response frame).
    Notification(Vec<u8>),
}

// ───────────────────────────────────────────────────────────────
// Transport port
// ───────────────────────────────────────────────────────────────

/// Driven port implemented by a platform radio adapter.
///
/// All methods are fire-and-forget: completion and failure arrive later
/// as [`TransportEvent`]s. The error type covers only immediate refusals
/// (radio off, invalid handle), not eventual outcomes.
pub trait Transport {
    type Error: fmt::Debug + fmt::Display;

    /// Begin scanning for peers matching the filter. Matches arrive as
    /// [`TransportEvent::DeviceFound`].
    fn start_scan(&mut self, filter: &ScanFilter) -> Result<(), Self::Error>;

    /// Stop an in-progress scan. Idempotent.
    fn stop_scan(&mut self) -> Result<(), Self::Error>;

    /// Connect to a previously discovered peer. Outcome arrives as
    /// [`TransportEvent::LinkUp`] or [`TransportEvent::LinkDown`].
    fn connect(&mut self, device: &DeviceHandle) -> Result<(), Self::Error>;

    /// Resolve the protocol channels on the connected peer. Outcome is
    /// [`TransportEvent::ChannelsResolved`] or
    /// [`TransportEvent::ChannelsMissing`].
    fn discover_channels(&mut self) -> Result<(), Self::Error>;

    /// Enable notifications on the response channel. Completion is
    /// [`TransportEvent::SubscribeReady`].
    fn subscribe(&mut self) -> Result<(), Self::Error>;

    /// Write one frame to a channel. Acknowledgement arrives as
    /// [`TransportEvent::WriteAck`] or [`TransportEvent::WriteFailed`]
    /// for the same channel.
    fn write(&mut self, channel: LinkChannel, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Tear down the link. Idempotent; a dropped link still reports
    /// [`TransportEvent::LinkDown`].
    fn disconnect(&mut self) -> Result<(), Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Null transport
// ───────────────────────────────────────────────────────────────

/// A transport with no radio behind it. Every call succeeds and nothing
/// ever happens; useful as a placeholder and in tests that only exercise
/// state transitions.
#[derive(Debug, Default)]
pub struct NullTransport;

/// Error type for [`NullTransport`]; never constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeverError {}

impl fmt::Display for NeverError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl Transport for NullTransport {
    type Error = NeverError;

    fn start_scan(&mut self, _filter: &ScanFilter) -> Result<(), Self::Error> {
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn connect(&mut self, _device: &DeviceHandle) -> Result<(), Self::Error> {
        Ok(())
    }

    fn discover_channels(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn subscribe(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write(&mut self, _channel: LinkChannel, _bytes: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

//! Link-layer events and the sink port they are emitted through.

use crate::error::LinkError;
use crate::proto::records::{DeviceImageRecord, DeviceStatusRecord};
use crate::proto::{CommandId, StatusCode};
use crate::transport::DeviceHandle;

use super::ConnectionState;

/// Everything the link layer reports to the outside world.
///
/// Emitted in the order things happen on the serialized event path, so a
/// consumer can mirror link state without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection state machine moved.
    StateChanged(ConnectionState),
    /// Scanning matched a peer and the link layer is connecting to it.
    DeviceDiscovered(DeviceHandle),
    /// A command's response frame arrived; carries the device's verdict.
    CommandCompleted {
        command: CommandId,
        status: StatusCode,
    },
    /// Fresh image inventory decoded from the device.
    ImageList(Vec<DeviceImageRecord>),
    /// Fresh device status.
    Status(DeviceStatusRecord),
    /// Bulk transfer advanced.
    TransferProgress { sent: usize, total: usize },
    /// The device confirmed the transfer end-to-end.
    TransferComplete,
    /// Something went wrong; the state machine has already recovered to
    /// a stable state when this is emitted.
    Error(LinkError),
}

/// Driven port: the link layer emits events, the adapter decides where
/// they go (UI channel, log, test recorder).
pub trait LinkEventSink {
    fn emit(&mut self, event: LinkEvent);
}

/// Sink that drops everything; for tests that only inspect state.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl LinkEventSink for NullEventSink {
    fn emit(&mut self, _event: LinkEvent) {}
}

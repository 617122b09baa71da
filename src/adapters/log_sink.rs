//! Event sink adapters: structured log output and channel forwarding.

use log::{error, info, warn};

use crate::link::channels::EVENT_CHANNEL;
use crate::link::events::{LinkEvent, LinkEventSink};

/// Writes every link event to the log. Errors log at `error`, dropped
/// data at `warn`, everything else at `info`.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LinkEventSink for LogEventSink {
    fn emit(&mut self, event: LinkEvent) {
        match &event {
            LinkEvent::StateChanged(state) => info!("state: {state}"),
            LinkEvent::DeviceDiscovered(handle) => {
                info!("discovered {} ({})", handle.name, handle.id);
            }
            LinkEvent::CommandCompleted { command, status } => {
                if status.is_success() {
                    info!("{command}: {status}");
                } else {
                    warn!("{command}: {status}");
                }
            }
            LinkEvent::ImageList(list) => info!("image list: {} entries", list.len()),
            LinkEvent::Status(status) => info!(
                "status: counter={} storage={} slot={}",
                status.counter, status.storage_used, status.current_slot
            ),
            LinkEvent::TransferProgress { sent, total } => {
                info!("transfer: {sent}/{total} bytes");
            }
            LinkEvent::TransferComplete => info!("transfer complete"),
            LinkEvent::Error(e) => error!("link error: {e}"),
        }
    }
}

/// Forwards link events into [`EVENT_CHANNEL`] for async consumers.
/// A full channel drops the event with a warning rather than blocking
/// the control loop.
#[derive(Debug, Default)]
pub struct ChannelEventSink;

impl LinkEventSink for ChannelEventSink {
    fn emit(&mut self, event: LinkEvent) {
        if EVENT_CHANNEL.try_send(event).is_err() {
            warn!("event channel full, dropping link event");
        }
    }
}

/// Fan-out to both sinks; the usual production wiring.
#[derive(Debug, Default)]
pub struct TeeEventSink {
    log: LogEventSink,
    channel: ChannelEventSink,
}

impl LinkEventSink for TeeEventSink {
    fn emit(&mut self, event: LinkEvent) {
        self.log.emit(event.clone());
        self.channel.emit(event);
    }
}

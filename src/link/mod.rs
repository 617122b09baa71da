//! Link layer: connection lifecycle, command ordering, bulk transfer.
//!
//! ```text
//!   UI intents ──▶ ┌─────────────┐ ──▶ Transport port
//!   Transport ───▶ │ LinkManager │
//!   Timer tick ──▶ └─────────────┘ ──▶ LinkEvent sink
//! ```
//!
//! The manager is sans-IO: it owns no clock, no radio, and no task. Every
//! entry point takes the current time in milliseconds, and all outside
//! effects happen through the [`Transport`] port and the
//! [`LinkEventSink`]. Callers must serialize entry points (intents,
//! transport events, ticks) onto one path; the channel plumbing in
//! [`channels`] does exactly that for the async adapter.

pub mod channels;
pub mod events;
pub mod queue;
pub mod transfer;

use core::fmt;

use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{
    ConnectError, FrameError, LinkError, Result, TransferError, WriteError,
};
use crate::proto::frame::{CommandFrame, ResponseFrame};
use crate::proto::records::{decode_image_list, decode_status, DeviceImageRecord, DeviceStatusRecord};
use crate::proto::{CombinedIndex, CommandId};
use crate::transport::{
    DeviceHandle, LinkChannel, ScanFilter, Transport, TransportEvent,
};

use self::events::{LinkEvent, LinkEventSink};
use self::queue::{CommandQueue, FailureDisposition};
use self::transfer::{ChunkDisposition, TransferEngine};

// ───────────────────────────────────────────────────────────────
// Connection state machine
// ───────────────────────────────────────────────────────────────

/// Lifecycle of the device link.
///
/// ```text
/// Disconnected → Scanning → Connecting → DiscoveringServices → Ready
///                                                               ↕
///                                                          Transmitting
/// ```
///
/// Any state can fall back to `Disconnected`; `disconnect` from any state
/// is a no-op at worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    DiscoveringServices,
    Ready,
    Transmitting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::DiscoveringServices => "discovering-services",
            ConnectionState::Ready => "ready",
            ConnectionState::Transmitting => "transmitting",
        };
        f.write_str(name)
    }
}

// ───────────────────────────────────────────────────────────────
// Link manager
// ───────────────────────────────────────────────────────────────

/// Owns the connection state machine, the command queue, and the
/// transfer engine. Generic over the transport port and the event sink
/// so tests can drive it with mocks and record what comes out.
pub struct LinkManager<T: Transport, S: LinkEventSink> {
    config: LinkConfig,
    transport: T,
    sink: S,
    state: ConnectionState,
    /// Peer picked during scanning; kept for reconnect retries.
    target: Option<DeviceHandle>,
    retries_left: u8,
    /// Pending reconnect attempt, absolute ms.
    retry_at: Option<u64>,
    /// Deadline for the current scan/connect/discovery phase.
    phase_deadline: Option<u64>,
    queue: CommandQueue,
    transfer: TransferEngine,
    images: Vec<DeviceImageRecord>,
    status: Option<DeviceStatusRecord>,
}

impl<T: Transport, S: LinkEventSink> LinkManager<T, S> {
    pub fn new(config: LinkConfig, transport: T, sink: S) -> Self {
        let queue = CommandQueue::new(&config);
        let transfer = TransferEngine::new(&config);
        Self {
            config,
            transport,
            sink,
            state: ConnectionState::Disconnected,
            target: None,
            retries_left: 0,
            retry_at: None,
            phase_deadline: None,
            queue,
            transfer,
            images: Vec::new(),
            status: None,
        }
    }

    // ── Read side ────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Last image inventory received from the device.
    pub fn images(&self) -> &[DeviceImageRecord] {
        &self.images
    }

    /// Last status received from the device.
    pub fn status(&self) -> Option<DeviceStatusRecord> {
        self.status
    }

    pub fn transfer_active(&self) -> bool {
        self.transfer.is_active()
    }

    pub fn transfer_progress_percent(&self) -> Option<u8> {
        self.transfer.progress_percent()
    }

    // ── Intents ──────────────────────────────────────────────

    /// Start scanning for a device. Only meaningful from
    /// `Disconnected`; anything else is ignored with a warning.
    pub fn connect(&mut self, now: u64) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            warn!("connect ignored in state {}", self.state);
            return Ok(());
        }

        let filter = ScanFilter {
            name_prefix: self.config.device_name_prefix.clone(),
        };
        if let Err(e) = self.transport.start_scan(&filter) {
            warn!("start_scan refused: {e}");
            return Err(LinkError::TransportUnavailable);
        }

        self.retries_left = self.config.max_connect_retries;
        self.phase_deadline = Some(now + self.config.scan_timeout_ms);
        self.set_state(ConnectionState::Scanning);
        Ok(())
    }

    /// Tear the link down from any state. Idempotent: clears the queue,
    /// aborts any transfer (reporting it interrupted), and cancels every
    /// pending deadline.
    pub fn disconnect(&mut self, _now: u64) {
        if self.state == ConnectionState::Scanning {
            if let Err(e) = self.transport.stop_scan() {
                debug!("stop_scan refused: {e}");
            }
        }
        if let Err(e) = self.transport.disconnect() {
            debug!("disconnect refused: {e}");
        }

        self.queue.clear();
        if self.transfer.abort() {
            self.sink
                .emit(LinkEvent::Error(TransferError::Interrupted.into()));
        }
        self.target = None;
        self.retry_at = None;
        self.phase_deadline = None;
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn request_image_list(&mut self, now: u64) -> Result<()> {
        self.enqueue(CommandId::GetImageList, &[], now)
    }

    pub fn request_status(&mut self, now: u64) -> Result<()> {
        self.enqueue(CommandId::GetStatus, &[], now)
    }

    /// Ask the device to show the given image.
    pub fn set_display(&mut self, image: CombinedIndex, now: u64) -> Result<()> {
        self.enqueue(CommandId::SetDisplay, &[image.as_byte()], now)
    }

    pub fn delete_image(&mut self, image: CombinedIndex, now: u64) -> Result<()> {
        self.enqueue(CommandId::DeleteImage, &[image.as_byte()], now)
    }

    /// Reorder the device's slots; `order` lists slot indices in their
    /// new display order. At most 16 entries, one per slot; entries are
    /// masked to the 4-bit slot space.
    pub fn reorder_images(&mut self, order: &[u8], now: u64) -> Result<()> {
        if order.len() > 16 {
            return Err(FrameError::PayloadTooLarge { len: order.len() }.into());
        }
        let mut payload = [0u8; 16];
        for (dst, src) in payload.iter_mut().zip(order) {
            *dst = src & 0x0F;
        }
        self.enqueue(CommandId::ReorderImages, &payload[..order.len()], now)
    }

    /// Start uploading an image. A transfer already in progress is
    /// superseded: it is reported as interrupted and replaced. The
    /// payload must be non-empty.
    pub fn begin_transfer(
        &mut self,
        target: CombinedIndex,
        payload: Vec<u8>,
        now: u64,
    ) -> Result<()> {
        if !matches!(
            self.state,
            ConnectionState::Ready | ConnectionState::Transmitting
        ) {
            return Err(TransferError::NotReady.into());
        }
        if payload.is_empty() {
            return Err(TransferError::EmptyPayload.into());
        }

        if self.transfer.is_active() {
            info!("transfer superseded by new upload to {target}");
            self.transfer.abort();
            self.sink
                .emit(LinkEvent::Error(TransferError::Interrupted.into()));
        }

        // Start-of-transfer control frame: target byte + total size.
        let mut start = [0u8; 5];
        start[0] = target.as_byte();
        start[1..5].copy_from_slice(&(payload.len() as u32).to_le_bytes());

        info!("transfer to {target}: {} bytes", payload.len());
        self.enqueue(CommandId::StartTransfer, &start, now)?;
        self.transfer.begin(target, payload);
        Ok(())
    }

    // ── Event and timer entry points ─────────────────────────

    /// Feed one transport event through the state machine.
    pub fn handle_event(&mut self, event: TransportEvent, now: u64) {
        match event {
            TransportEvent::DeviceFound(handle) => self.on_device_found(handle, now),
            TransportEvent::LinkUp => self.on_link_up(now),
            TransportEvent::LinkDown => self.on_link_down(now),
            TransportEvent::ChannelsResolved => self.on_channels_resolved(),
            TransportEvent::ChannelsMissing => self.on_channels_missing(),
            TransportEvent::SubscribeReady => self.on_subscribe_ready(now),
            TransportEvent::WriteAck(channel) => self.on_write_ack(channel, now),
            TransportEvent::WriteFailed(channel) => self.on_write_failed(channel, now),
            TransportEvent::Notification(bytes) => self.on_notification(&bytes),
        }
        self.pump(now);
    }

    /// Advance time: fire expired deadlines, then pump pending writes.
    /// Call at a steady cadence; all timing flows from here.
    pub fn tick(&mut self, now: u64) {
        self.check_phase_deadline(now);
        self.check_reconnect(now);

        if let Some(command) = self.queue.check_timeout(now) {
            self.sink.emit(LinkEvent::Error(
                WriteError::Timeout {
                    command: Some(command),
                }
                .into(),
            ));
            self.on_command_abandoned(command);
        }
        if let Some(ChunkDisposition::Aborted { offset, total }) =
            self.transfer.check_timeout(now)
        {
            self.transfer_failed(offset, total);
        }

        self.pump(now);
    }

    // ── Connection phase handling ────────────────────────────

    fn on_device_found(&mut self, handle: DeviceHandle, now: u64) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        // First match wins.
        if !handle.name.starts_with(&self.config.device_name_prefix) {
            debug!("ignoring peer {:?}", handle.name);
            return;
        }

        info!("found {} ({})", handle.name, handle.id);
        if let Err(e) = self.transport.stop_scan() {
            debug!("stop_scan refused: {e}");
        }
        self.sink.emit(LinkEvent::DeviceDiscovered(handle.clone()));

        if let Err(e) = self.transport.connect(&handle) {
            warn!("connect refused: {e}");
            self.fail_connect(ConnectError::Failed);
            return;
        }
        self.target = Some(handle);
        self.phase_deadline = Some(now + self.config.connect_timeout_ms);
        self.set_state(ConnectionState::Connecting);
    }

    fn on_link_up(&mut self, now: u64) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        // A fresh link earns a fresh retry budget.
        self.retries_left = self.config.max_connect_retries;
        if let Err(e) = self.transport.discover_channels() {
            warn!("discover_channels refused: {e}");
            self.fail_connect(ConnectError::Failed);
            return;
        }
        self.phase_deadline = Some(now + self.config.connect_timeout_ms);
        self.set_state(ConnectionState::DiscoveringServices);
    }

    fn on_channels_resolved(&mut self) {
        if self.state != ConnectionState::DiscoveringServices {
            return;
        }
        if let Err(e) = self.transport.subscribe() {
            warn!("subscribe refused: {e}");
            self.fail_connect(ConnectError::Failed);
        }
    }

    fn on_channels_missing(&mut self) {
        if self.state != ConnectionState::DiscoveringServices {
            return;
        }
        // Wrong device entirely; retrying would find the same services.
        warn!("peer lacks the protocol channels");
        if let Err(e) = self.transport.disconnect() {
            debug!("disconnect refused: {e}");
        }
        self.retries_left = 0;
        self.fail_connect(ConnectError::IncompatibleDevice);
    }

    fn on_subscribe_ready(&mut self, now: u64) {
        if self.state != ConnectionState::DiscoveringServices {
            return;
        }
        self.phase_deadline = None;
        self.retry_at = None;
        self.set_state(ConnectionState::Ready);

        // Prime the caches so the UI has data as soon as the link is up.
        if self.request_status(now).is_err() || self.request_image_list(now).is_err() {
            warn!("initial status/list request could not be queued");
        }
    }

    fn on_link_down(&mut self, now: u64) {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Scanning => {}
            ConnectionState::Connecting | ConnectionState::DiscoveringServices => {
                self.try_reconnect(now, ConnectError::Failed);
            }
            ConnectionState::Ready | ConnectionState::Transmitting => {
                warn!("link dropped unexpectedly");
                self.queue.clear();
                if self.transfer.abort() {
                    self.sink
                        .emit(LinkEvent::Error(TransferError::Interrupted.into()));
                }
                self.phase_deadline = None;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// A connection-phase failure: burn one retry or give up.
    fn try_reconnect(&mut self, now: u64, on_exhausted: ConnectError) {
        if self.retries_left == 0 || self.target.is_none() {
            self.fail_connect(on_exhausted);
            return;
        }
        self.retries_left -= 1;
        info!(
            "connect attempt failed, retrying in {}ms ({} left)",
            self.config.connect_retry_delay_ms, self.retries_left
        );
        self.phase_deadline = None;
        self.retry_at = Some(now + self.config.connect_retry_delay_ms);
        self.set_state(ConnectionState::Connecting);
    }

    fn check_reconnect(&mut self, now: u64) {
        let Some(at) = self.retry_at else { return };
        if now < at {
            return;
        }
        self.retry_at = None;

        let Some(target) = self.target.clone() else {
            self.fail_connect(ConnectError::Failed);
            return;
        };
        if let Err(e) = self.transport.connect(&target) {
            warn!("reconnect refused: {e}");
            self.try_reconnect(now, ConnectError::Failed);
            return;
        }
        self.phase_deadline = Some(now + self.config.connect_timeout_ms);
    }

    fn check_phase_deadline(&mut self, now: u64) {
        let Some(deadline) = self.phase_deadline else {
            return;
        };
        if now < deadline {
            return;
        }
        self.phase_deadline = None;

        match self.state {
            ConnectionState::Scanning => {
                warn!("scan timed out");
                if let Err(e) = self.transport.stop_scan() {
                    debug!("stop_scan refused: {e}");
                }
                self.fail_connect(ConnectError::ScanTimeout);
            }
            ConnectionState::Connecting | ConnectionState::DiscoveringServices => {
                warn!("connect timed out in state {}", self.state);
                if let Err(e) = self.transport.disconnect() {
                    debug!("disconnect refused: {e}");
                }
                self.try_reconnect(now, ConnectError::Timeout);
            }
            _ => {}
        }
    }

    /// Give up on the connection attempt and settle in `Disconnected`.
    fn fail_connect(&mut self, err: ConnectError) {
        self.target = None;
        self.retry_at = None;
        self.phase_deadline = None;
        self.sink.emit(LinkEvent::Error(err.into()));
        self.set_state(ConnectionState::Disconnected);
    }

    // ── Write completion and responses ───────────────────────

    fn on_write_ack(&mut self, channel: LinkChannel, now: u64) {
        match channel {
            LinkChannel::Command => {
                self.queue.on_ack(now);
            }
            LinkChannel::Data => {
                let target = self.transfer.target();
                if let Some(progress) = self.transfer.on_ack(now) {
                    self.sink.emit(LinkEvent::TransferProgress {
                        sent: progress.sent,
                        total: progress.total,
                    });
                    if progress.done {
                        self.finish_transfer(target, now);
                    }
                }
            }
        }
    }

    /// All chunks acknowledged: the session is complete. The
    /// end-of-transfer control frame rides the command queue like any
    /// other command; its response surfaces as `CommandCompleted`.
    fn finish_transfer(&mut self, target: Option<CombinedIndex>, now: u64) {
        let Some(target) = target else { return };
        self.sink.emit(LinkEvent::TransferComplete);
        if self.state == ConnectionState::Transmitting {
            self.set_state(ConnectionState::Ready);
        }
        if let Err(e) = self.enqueue(CommandId::EndTransfer, &[target.as_byte()], now) {
            warn!("end-of-transfer could not be queued: {e}");
            self.sink.emit(LinkEvent::Error(e));
        }
    }

    fn on_write_failed(&mut self, channel: LinkChannel, now: u64) {
        match channel {
            LinkChannel::Command => {
                if let Some(FailureDisposition::Abandoned(command)) =
                    self.queue.on_write_failed(now)
                {
                    self.sink.emit(LinkEvent::Error(
                        WriteError::Failed {
                            command: Some(command),
                        }
                        .into(),
                    ));
                    self.on_command_abandoned(command);
                }
            }
            LinkChannel::Data => {
                if let Some(ChunkDisposition::Aborted { offset, total }) =
                    self.transfer.on_write_failed(now)
                {
                    self.transfer_failed(offset, total);
                }
            }
        }
    }

    /// An abandoned start-of-transfer command means its response will
    /// never arm the waiting session; drop it so `transfer_active` does
    /// not report a session the device never heard of.
    fn on_command_abandoned(&mut self, command: CommandId) {
        if command == CommandId::StartTransfer && self.transfer.abort() {
            warn!("start-of-transfer abandoned, dropping session");
            self.sink
                .emit(LinkEvent::Error(TransferError::Interrupted.into()));
        }
    }

    fn transfer_failed(&mut self, offset: usize, total: usize) {
        self.sink.emit(LinkEvent::Error(
            TransferError::WriteFailed { offset, total }.into(),
        ));
        if self.state == ConnectionState::Transmitting {
            self.set_state(ConnectionState::Ready);
        }
    }

    fn on_notification(&mut self, bytes: &[u8]) {
        debug!("rx {}", crate::proto::frame::hex_dump(bytes));
        let response = match ResponseFrame::parse(bytes) {
            Ok(response) => response,
            Err(e) => {
                warn!("unparseable response: {e}");
                self.sink.emit(LinkEvent::Error(e.into()));
                return;
            }
        };
        let Some(command) = response.command_id() else {
            warn!("response for unknown command 0x{:02X}", response.command);
            return;
        };

        debug!("response: {} -> {}", command, response.status);
        self.sink.emit(LinkEvent::CommandCompleted {
            command,
            status: response.status,
        });

        match (command, response.status.is_success()) {
            (CommandId::GetImageList, true) => match decode_image_list(&response.payload) {
                Ok(list) => {
                    self.images = list.clone();
                    self.sink.emit(LinkEvent::ImageList(list));
                }
                Err(e) => {
                    warn!("image list undecodable: {e}");
                    self.sink.emit(LinkEvent::Error(e.into()));
                }
            },
            (CommandId::GetStatus, true) => match decode_status(&response.payload) {
                Ok(status) => {
                    self.status = Some(status);
                    self.sink.emit(LinkEvent::Status(status));
                }
                Err(e) => {
                    warn!("status undecodable: {e}");
                    self.sink.emit(LinkEvent::Error(e.into()));
                }
            },
            (CommandId::StartTransfer, true) => {
                self.transfer.arm();
                if self.transfer.is_active() {
                    self.set_state(ConnectionState::Transmitting);
                }
            }
            (CommandId::StartTransfer, false) => {
                warn!("device refused transfer: {}", response.status);
                self.transfer.abort();
                self.sink
                    .emit(LinkEvent::Error(TransferError::NotReady.into()));
            }
            (CommandId::EndTransfer, false) => {
                warn!("device rejected transfer end: {}", response.status);
            }
            _ => {}
        }
    }

    // ── Write pump ───────────────────────────────────────────

    /// Push pending writes out on both channels. Safe to call any time;
    /// pacing and in-flight rules live in the queue and the engine.
    fn pump(&mut self, now: u64) {
        if let Some(bytes) = self.queue.poll(now).map(CommandFrame::encode) {
            if let Err(e) = self.transport.write(LinkChannel::Command, &bytes) {
                warn!("command write refused: {e}");
                self.on_write_failed(LinkChannel::Command, now);
            }
        }

        if let Some(chunk) = self.transfer.poll(now).map(<[u8]>::to_vec) {
            if let Err(e) = self.transport.write(LinkChannel::Data, &chunk) {
                warn!("chunk write refused: {e}");
                self.on_write_failed(LinkChannel::Data, now);
            }
        }
    }

    fn enqueue(&mut self, id: CommandId, payload: &[u8], now: u64) -> Result<()> {
        if !matches!(
            self.state,
            ConnectionState::Ready | ConnectionState::Transmitting
        ) {
            return Err(LinkError::TransportUnavailable);
        }
        let frame = CommandFrame::new(id, payload)?;
        self.queue.push(frame).map_err(|f| {
            warn!("command queue full, dropping {}", f.id());
            LinkError::Write(WriteError::Failed {
                command: Some(f.id()),
            })
        })?;
        self.pump(now);
        Ok(())
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        info!("link {} -> {next}", self.state);
        self.state = next;
        self.sink.emit(LinkEvent::StateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::events::NullEventSink;
    use crate::transport::NullTransport;

    fn manager() -> LinkManager<NullTransport, NullEventSink> {
        LinkManager::new(LinkConfig::default(), NullTransport, NullEventSink)
    }

    #[test]
    fn commands_rejected_while_disconnected() {
        let mut m = manager();
        assert!(matches!(
            m.request_status(0),
            Err(LinkError::TransportUnavailable)
        ));
    }

    #[test]
    fn connect_is_only_valid_from_disconnected() {
        let mut m = manager();
        m.connect(0).unwrap();
        assert_eq!(m.state(), ConnectionState::Scanning);
        // Second connect is a no-op, not an error.
        m.connect(1).unwrap();
        assert_eq!(m.state(), ConnectionState::Scanning);
    }

    #[test]
    fn scan_times_out_to_disconnected() {
        let mut m = manager();
        m.connect(0).unwrap();
        m.tick(5_000);
        assert_eq!(m.state(), ConnectionState::Scanning);
        m.tick(10_000);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut m = manager();
        m.disconnect(0);
        m.disconnect(1);
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn non_matching_peer_is_ignored() {
        let mut m = manager();
        m.connect(0).unwrap();
        m.handle_event(
            TransportEvent::DeviceFound(DeviceHandle {
                id: "aa:bb".into(),
                name: "SomeOtherThing".into(),
            }),
            10,
        );
        assert_eq!(m.state(), ConnectionState::Scanning);
    }

    #[test]
    fn matching_peer_starts_connecting() {
        let mut m = manager();
        m.connect(0).unwrap();
        m.handle_event(
            TransportEvent::DeviceFound(DeviceHandle {
                id: "aa:bb".into(),
                name: "Glyph-01".into(),
            }),
            10,
        );
        assert_eq!(m.state(), ConnectionState::Connecting);
    }
}

//! Inter-task channels serializing everything onto one control path.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge async adapters
//! (radio callbacks, UI) with the synchronous control loop that owns the
//! [`LinkManager`](super::LinkManager).
//!
//! ```text
//! ┌──────────┐  UiIntent       ┌──────────────┐
//! │    UI    │────────────────▶│              │
//! └──────────┘                 │ Control loop │  LinkEvent  ┌────────┐
//! ┌──────────┐  TransportEvent │ (sync, owns  │────────────▶│  Sink  │
//! │  Radio   │────────────────▶│ LinkManager) │             └────────┘
//! └──────────┘                 └──────────────┘
//! ```
//!
//! The manager is only ever touched by the control loop, so intents,
//! transport events, and ticks can never interleave.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use log::warn;

use crate::proto::CombinedIndex;
use crate::transport::{Transport, TransportEvent};

use super::events::{LinkEvent, LinkEventSink};
use super::LinkManager;

/// Everything the UI can ask of the link layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiIntent {
    Connect,
    Disconnect,
    RequestImageList,
    RequestStatus,
    SetDisplay(CombinedIndex),
    DeleteImage(CombinedIndex),
    /// Slot indices in their new display order.
    ReorderImages(Vec<u8>),
    /// Upload an image blob to the given slot.
    SendImage {
        target: CombinedIndex,
        payload: Vec<u8>,
    },
}

/// Channel depth for UI intents.
const INTENT_DEPTH: usize = 8;

/// Channel depth for transport events; notification bursts during a
/// transfer make this the deepest channel.
const TRANSPORT_DEPTH: usize = 32;

/// Channel depth for outbound link events.
const EVENT_DEPTH: usize = 16;

/// UI → control loop.
pub static INTENT_CHANNEL: Channel<CriticalSectionRawMutex, UiIntent, INTENT_DEPTH> =
    Channel::new();

/// Radio adapter → control loop.
pub static TRANSPORT_CHANNEL: Channel<CriticalSectionRawMutex, TransportEvent, TRANSPORT_DEPTH> =
    Channel::new();

/// Control loop → whoever listens (UI, logger).
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_DEPTH> =
    Channel::new();

/// Translate one UI intent into the matching [`LinkManager`] call. A
/// rejected intent (link down, queue full) is logged; the manager has
/// already emitted the matching [`LinkEvent::Error`] where one applies.
pub fn dispatch<T: Transport, S: LinkEventSink>(
    manager: &mut LinkManager<T, S>,
    intent: UiIntent,
    now: u64,
) {
    let outcome = match intent {
        UiIntent::Connect => manager.connect(now),
        UiIntent::Disconnect => {
            manager.disconnect(now);
            Ok(())
        }
        UiIntent::RequestImageList => manager.request_image_list(now),
        UiIntent::RequestStatus => manager.request_status(now),
        UiIntent::SetDisplay(image) => manager.set_display(image, now),
        UiIntent::DeleteImage(image) => manager.delete_image(image, now),
        UiIntent::ReorderImages(order) => manager.reorder_images(&order, now),
        UiIntent::SendImage { target, payload } => {
            manager.begin_transfer(target, payload, now)
        }
    };
    if let Err(e) = outcome {
        warn!("intent rejected: {e}");
    }
}

/// One control-loop pass: drain pending transport events and UI intents
/// into the manager, then advance its deadlines. The embedding app calls
/// this from the single task that owns the manager, at its tick cadence.
pub fn service<T: Transport, S: LinkEventSink>(manager: &mut LinkManager<T, S>, now: u64) {
    while let Ok(event) = TRANSPORT_CHANNEL.try_receive() {
        manager.handle_event(event, now);
    }
    while let Ok(intent) = INTENT_CHANNEL.try_receive() {
        dispatch(manager, intent, now);
    }
    manager.tick(now);
}

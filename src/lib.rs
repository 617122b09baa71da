//! GlyphLink — device link layer for the glyph display pendant.
//!
//! Speaks the pendant's two-channel protocol: short control frames on a
//! command channel, chunked image uploads on a data channel, responses
//! back as notifications. The crate is sans-IO: the [`link`] state
//! machine is driven entirely by intents, transport events, and timer
//! ticks, and talks to the radio only through the [`transport`] port, so
//! any platform's BLE stack can sit behind it.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod link;
pub mod proto;
pub mod transport;

mod error;

pub use crate::error::{
    ConnectError, ContainerError, DecodeError, FrameError, LinkError, Result, TransferError,
    WriteError,
};
pub use crate::link::{ConnectionState, LinkManager};

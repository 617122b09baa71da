//! Driven adapters: concrete implementations of the link layer's ports.

pub mod log_sink;

pub use self::log_sink::{ChannelEventSink, LogEventSink};

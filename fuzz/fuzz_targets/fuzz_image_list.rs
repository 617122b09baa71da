//! Fuzz target: `decode_image_list` and `decode_status`
//!
//! The list decoder branches on structural cues (JSON text, count byte,
//! self-describing records), so arbitrary bytes exercise every layout
//! path, including malformed UTF-8 names and short reads.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Decoded slots always fit the 4-bit slot space
//!
//! cargo fuzz run fuzz_image_list

#![no_main]

use glyphlink::proto::records::{decode_image_list, decode_status};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(list) = decode_image_list(data) {
        for record in &list {
            assert!(record.slot <= 0x0F);
        }
    }
    let _ = decode_status(data);
});

//! Property tests for the wire codecs and the transfer engine.

use glyphlink::config::LinkConfig;
use glyphlink::link::transfer::{ChunkDisposition, TransferEngine};
use glyphlink::proto::frame::{CommandFrame, ResponseFrame};
use glyphlink::proto::CommandId;
use glyphlink::proto::gifpack::{self, PackInfo};
use glyphlink::proto::records::{decode_image_list, decode_status};
use glyphlink::proto::{CombinedIndex, ImageFormat};
use proptest::prelude::*;

// ── Wire codecs ───────────────────────────────────────────────

proptest! {
    /// Packing a command and re-reading it as a response (with a
    /// synthetic status byte spliced in) recovers the id and payload.
    #[test]
    fn command_pack_parse_round_trip(
        raw_id in 1u8..=8u8,
        payload in proptest::collection::vec(any::<u8>(), 0..=255),
    ) {
        let id = CommandId::from_wire(raw_id).unwrap();
        let encoded = CommandFrame::new(id, &payload).unwrap().encode();

        let mut raw = vec![encoded[0], 0x00];
        raw.extend_from_slice(&encoded[1..]);
        let parsed = ResponseFrame::parse(&raw).unwrap();
        prop_assert_eq!(parsed.command_id(), Some(id));
        prop_assert_eq!(parsed.payload.as_slice(), payload.as_slice());
    }

    /// A well-formed response frame always parses back to its parts,
    /// regardless of payload content or trailing padding.
    #[test]
    fn response_frame_round_trip(
        command in 0u8..=255u8,
        status in 0u8..=255u8,
        payload in proptest::collection::vec(any::<u8>(), 0..=255),
        padding in proptest::collection::vec(any::<u8>(), 0..=8),
    ) {
        let mut raw = vec![command, status, payload.len() as u8];
        raw.extend_from_slice(&payload);
        raw.extend_from_slice(&padding);

        let frame = ResponseFrame::parse(&raw).unwrap();
        prop_assert_eq!(frame.command, command);
        prop_assert_eq!(frame.payload.as_slice(), payload.as_slice());
    }

    /// Arbitrary bytes never panic the response parser.
    #[test]
    fn response_parser_is_total(raw in proptest::collection::vec(any::<u8>(), 0..=300)) {
        let _ = ResponseFrame::parse(&raw);
    }

    /// Arbitrary bytes never panic the list or status decoders.
    #[test]
    fn record_decoders_are_total(raw in proptest::collection::vec(any::<u8>(), 0..=300)) {
        let _ = decode_image_list(&raw);
        let _ = decode_status(&raw);
    }

    /// The combined index byte survives a split-and-rebuild for every
    /// format tag and slot.
    #[test]
    fn combined_index_round_trip(slot in 0u8..=15u8, tag in 0u8..=3u8) {
        let format = match tag {
            0 => ImageFormat::Raw,
            1 => ImageFormat::Jpeg,
            2 => ImageFormat::Png,
            _ => ImageFormat::GifPack,
        };
        let index = CombinedIndex::new(format, slot);
        let back = CombinedIndex::from_wire(index.as_byte());
        prop_assert_eq!(back.format(), format);
        prop_assert_eq!(back.slot(), slot);
    }

    /// Encode-then-decode of an animation container recovers every frame
    /// byte-for-byte.
    #[test]
    fn gifpack_round_trip(
        frames in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 1..=64),
            1..=8,
        ),
        fps in 1u8..=60u8,
    ) {
        let info = PackInfo { fps, width: 240, height: 240 };
        let refs: Vec<&[u8]> = frames.iter().map(Vec::as_slice).collect();
        let blob = gifpack::encode(&refs, info).unwrap();

        let pack = gifpack::decode(&blob).unwrap();
        prop_assert_eq!(pack.info, info);
        prop_assert_eq!(pack.frames.len(), frames.len());
        for (got, want) in pack.frames.iter().zip(&frames) {
            prop_assert_eq!(*got, want.as_slice());
        }
    }

    /// Truncating a valid container anywhere never panics the decoder.
    #[test]
    fn gifpack_decode_is_total_under_truncation(
        len in 1usize..=40,
        cut in 0usize..=40,
    ) {
        let frame = vec![0x5Au8; len];
        let blob = gifpack::encode(&[&frame, &frame], PackInfo { fps: 10, width: 8, height: 8 })
            .unwrap();
        let cut = cut.min(blob.len());
        let _ = gifpack::decode(&blob[..cut]);
    }
}

// ── Transfer engine ───────────────────────────────────────────

proptest! {
    /// Acknowledged chunks cover the payload exactly once, in order, and
    /// progress is strictly monotonic with exactly one completion.
    #[test]
    fn chunks_cover_payload_in_order(
        payload in proptest::collection::vec(any::<u8>(), 1..=2_000),
        chunk_size in 1usize..=600,
    ) {
        let config = LinkConfig { chunk_size, ..LinkConfig::default() };
        let mut engine = TransferEngine::new(&config);
        engine.begin(CombinedIndex::new(ImageFormat::Raw, 0), payload.clone());
        engine.arm();

        let mut now = 0u64;
        let mut rebuilt = Vec::new();
        let mut completions = 0;
        let mut last_sent = 0;

        while engine.is_active() {
            if let Some(chunk) = engine.poll(now).map(<[u8]>::to_vec) {
                rebuilt.extend_from_slice(&chunk);
                let progress = engine.on_ack(now).unwrap();
                prop_assert!(progress.sent > last_sent);
                last_sent = progress.sent;
                if progress.done {
                    completions += 1;
                }
            }
            now += 10;
        }

        prop_assert_eq!(rebuilt, payload);
        prop_assert_eq!(completions, 1);
    }

    /// With any pattern of per-chunk write failures the engine terminates:
    /// either the payload completes or the session aborts. It never loops
    /// and never sends bytes past the payload.
    #[test]
    fn transfer_terminates_under_failures(
        payload_len in 1usize..=1_000,
        chunk_size in 1usize..=300,
        failures in proptest::collection::vec(any::<bool>(), 1..=64),
    ) {
        let config = LinkConfig { chunk_size, ..LinkConfig::default() };
        let mut engine = TransferEngine::new(&config);
        engine.begin(CombinedIndex::new(ImageFormat::Raw, 0), vec![0; payload_len]);
        engine.arm();

        let mut now = 0u64;
        let mut fail_iter = failures.iter().cycle();
        let mut acked = 0usize;
        let mut aborted = false;

        // Each written chunk either acks or fails per the pattern; a
        // failed chunk retries once then aborts, so the loop is bounded.
        for _ in 0..payload_len.div_ceil(chunk_size) * 4 + 8 {
            if !engine.is_active() {
                break;
            }
            if let Some(chunk) = engine.poll(now).map(<[u8]>::to_vec) {
                if *fail_iter.next().unwrap() {
                    if let Some(ChunkDisposition::Aborted { .. }) = engine.on_write_failed(now) {
                        aborted = true;
                    }
                } else {
                    acked += chunk.len();
                    engine.on_ack(now);
                }
            }
            now += 200;
        }

        prop_assert!(!engine.is_active());
        prop_assert!(aborted || acked == payload_len);
        prop_assert!(acked <= payload_len);
    }
}

//! GFPK animation container.
//!
//! Packs a sequence of pre-rendered frames into one blob the device can
//! play back without decoding GIF on-target. Layout:
//!
//! ```text
//! offset 0   magic       "GFPK"
//! offset 4   version     u8 (currently 1)
//! offset 5   frame_count u16 LE
//! offset 7   fps         u8
//! offset 8   width       u16 LE
//! offset 10  height      u16 LE
//! offset 12  reserved    [0u8; 4]
//! offset 16  offsets     u32 LE * frame_count, absolute from blob start
//! ...        frame data  concatenated
//! ```

use crate::error::ContainerError;

pub const MAGIC: [u8; 4] = *b"GFPK";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 16;
/// Playback RAM on the device bounds the frame table.
pub const MAX_FRAMES: usize = 500;

/// Container metadata, shared by encode input and decode output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackInfo {
    pub fps: u8,
    pub width: u16,
    pub height: u16,
}

/// A decoded container borrowing the frame bytes from the source blob.
#[derive(Debug)]
pub struct GifPack<'a> {
    pub info: PackInfo,
    pub frames: Vec<&'a [u8]>,
}

/// Build a GFPK blob from per-frame byte slices.
///
/// Every frame must be non-empty and the count must fit the device's
/// playback table.
pub fn encode(frames: &[&[u8]], info: PackInfo) -> Result<Vec<u8>, ContainerError> {
    if frames.is_empty() {
        return Err(ContainerError::NoFrames);
    }
    if frames.len() > MAX_FRAMES {
        return Err(ContainerError::TooManyFrames {
            count: frames.len(),
        });
    }
    for (index, frame) in frames.iter().enumerate() {
        if frame.is_empty() {
            return Err(ContainerError::EmptyFrame { index });
        }
    }

    let table_len = 4 * frames.len();
    let data_len: usize = frames.iter().map(|f| f.len()).sum();
    let mut blob = Vec::with_capacity(HEADER_LEN + table_len + data_len);

    blob.extend_from_slice(&MAGIC);
    blob.push(VERSION);
    blob.extend_from_slice(&(frames.len() as u16).to_le_bytes());
    blob.push(info.fps);
    blob.extend_from_slice(&info.width.to_le_bytes());
    blob.extend_from_slice(&info.height.to_le_bytes());
    blob.extend_from_slice(&[0u8; 4]);

    let mut offset = (HEADER_LEN + table_len) as u32;
    for frame in frames {
        blob.extend_from_slice(&offset.to_le_bytes());
        offset += frame.len() as u32;
    }
    for frame in frames {
        blob.extend_from_slice(frame);
    }

    Ok(blob)
}

/// Parse a GFPK blob, validating the offset table against the blob length.
pub fn decode(blob: &[u8]) -> Result<GifPack<'_>, ContainerError> {
    if blob.len() < HEADER_LEN {
        return Err(ContainerError::Truncated);
    }
    if blob[0..4] != MAGIC {
        return Err(ContainerError::BadMagic);
    }
    if blob[4] != VERSION {
        return Err(ContainerError::BadVersion { version: blob[4] });
    }

    let frame_count = u16::from_le_bytes([blob[5], blob[6]]) as usize;
    if frame_count == 0 {
        return Err(ContainerError::NoFrames);
    }
    if frame_count > MAX_FRAMES {
        return Err(ContainerError::TooManyFrames { count: frame_count });
    }

    let info = PackInfo {
        fps: blob[7],
        width: u16::from_le_bytes([blob[8], blob[9]]),
        height: u16::from_le_bytes([blob[10], blob[11]]),
    };

    let table_end = HEADER_LEN + 4 * frame_count;
    if blob.len() < table_end {
        return Err(ContainerError::Truncated);
    }

    let mut offsets = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        let at = HEADER_LEN + 4 * i;
        offsets.push(u32::from_le_bytes([
            blob[at],
            blob[at + 1],
            blob[at + 2],
            blob[at + 3],
        ]) as usize);
    }

    // Each frame runs to the next offset; the last one runs to the end of
    // the blob. Offsets must be in-range, ordered, and past the table.
    let mut frames = Vec::with_capacity(frame_count);
    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(blob.len());
        if start < table_end || end > blob.len() || start >= end {
            return Err(ContainerError::BadOffset { index: i });
        }
        frames.push(&blob[start..end]);
    }

    Ok(GifPack { info, frames })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: PackInfo = PackInfo {
        fps: 12,
        width: 240,
        height: 240,
    };

    #[test]
    fn roundtrip_single_frame() {
        let blob = encode(&[&[0xAA, 0xBB, 0xCC]], INFO).unwrap();
        assert_eq!(&blob[0..4], b"GFPK");
        assert_eq!(blob.len(), HEADER_LEN + 4 + 3);

        let pack = decode(&blob).unwrap();
        assert_eq!(pack.info, INFO);
        assert_eq!(pack.frames, vec![&[0xAA, 0xBB, 0xCC][..]]);
    }

    #[test]
    fn roundtrip_max_frames() {
        let frame = [0x42u8; 8];
        let frames: Vec<&[u8]> = (0..MAX_FRAMES).map(|_| &frame[..]).collect();
        let blob = encode(&frames, INFO).unwrap();

        let pack = decode(&blob).unwrap();
        assert_eq!(pack.frames.len(), MAX_FRAMES);
        assert!(pack.frames.iter().all(|f| *f == frame));
    }

    #[test]
    fn offsets_are_absolute() {
        let blob = encode(&[&[1, 2], &[3]], INFO).unwrap();
        let first = u32::from_le_bytes([blob[16], blob[17], blob[18], blob[19]]);
        assert_eq!(first as usize, HEADER_LEN + 8);
        let second = u32::from_le_bytes([blob[20], blob[21], blob[22], blob[23]]);
        assert_eq!(second, first + 2);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(encode(&[], INFO).unwrap_err(), ContainerError::NoFrames);
    }

    #[test]
    fn rejects_empty_frame() {
        assert_eq!(
            encode(&[&[1], &[]], INFO).unwrap_err(),
            ContainerError::EmptyFrame { index: 1 }
        );
    }

    #[test]
    fn rejects_too_many_frames() {
        let frame = [0u8; 1];
        let frames: Vec<&[u8]> = (0..MAX_FRAMES + 1).map(|_| &frame[..]).collect();
        assert_eq!(
            encode(&frames, INFO).unwrap_err(),
            ContainerError::TooManyFrames { count: 501 }
        );
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut blob = encode(&[&[1]], INFO).unwrap();
        blob[0] = b'X';
        assert_eq!(decode(&blob).unwrap_err(), ContainerError::BadMagic);
    }

    #[test]
    fn decode_rejects_bad_version() {
        let mut blob = encode(&[&[1]], INFO).unwrap();
        blob[4] = 9;
        assert_eq!(
            decode(&blob).unwrap_err(),
            ContainerError::BadVersion { version: 9 }
        );
    }

    #[test]
    fn decode_rejects_out_of_range_offset() {
        let mut blob = encode(&[&[1]], INFO).unwrap();
        let len = blob.len() as u32;
        blob[16..20].copy_from_slice(&len.to_le_bytes());
        assert_eq!(
            decode(&blob).unwrap_err(),
            ContainerError::BadOffset { index: 0 }
        );
    }

    #[test]
    fn decode_rejects_truncated_table() {
        let blob = encode(&[&[1], &[2]], INFO).unwrap();
        assert_eq!(
            decode(&blob[..HEADER_LEN + 4]).unwrap_err(),
            ContainerError::Truncated
        );
    }
}

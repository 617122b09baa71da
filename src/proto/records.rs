//! Tolerant decoders for device responses.
//!
//! The pendant's image-list and status payloads have shipped in several
//! incompatible shapes across firmware revisions:
//!
//! - count-prefixed fixed-stride binary records (6 or 7 bytes per record),
//! - self-describing variable-length binary records,
//! - a JSON text revision whose field names vary (`index` vs `idx`,
//!   `name` vs `n`, …).
//!
//! Rather than assuming one layout, the decoder picks it from structural
//! cues: a leading `{` means the text revision, a plausible count byte
//! whose implied total length matches the payload means fixed-stride
//! records, anything else falls back to the self-describing layout. Short payloads decode as
//! many complete records as are present and log the short read instead of
//! discarding everything.

use log::{debug, warn};
use serde_json::Value;

use super::{CombinedIndex, ImageFormat};
use crate::error::DecodeError;

// ---------------------------------------------------------------------------
// Decoded record types
// ---------------------------------------------------------------------------

/// One image resident on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceImageRecord {
    /// Storage slot, 0-15.
    pub slot: u8,
    pub format: ImageFormat,
    /// Size in bytes as reported by the device.
    pub size: u32,
    /// UI-side selection flag; the wire carries it only in the text
    /// revision, where a missing flag defaults to true.
    pub selected: bool,
    /// Display name; synthesized from slot and format when absent.
    pub name: String,
}

impl DeviceImageRecord {
    /// The on-wire identity byte for this record.
    pub fn combined_index(&self) -> CombinedIndex {
        CombinedIndex::new(self.format, self.slot)
    }
}

/// Which status layout the payload used. The first 32-bit field has meant
/// different things across firmware revisions; the tag tells the caller
/// how to read [`DeviceStatusRecord::counter`] without the crate guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRevision {
    /// 9-byte layout: the counter is seconds since boot.
    UptimeSeconds,
    /// 5/6-byte layout: the counter is a battery percentage.
    BatteryPercent,
}

/// Decoded device status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatusRecord {
    /// First field of the payload, semantics per [`StatusRevision`].
    pub counter: u32,
    pub revision: StatusRevision,
    /// Bytes used on the device filesystem.
    pub storage_used: u32,
    /// Slot currently on screen; -1 when the payload did not carry it.
    pub current_slot: i8,
}

// ---------------------------------------------------------------------------
// Image list decoding
// ---------------------------------------------------------------------------

/// Decode a `GetImageList` response payload.
pub fn decode_image_list(payload: &[u8]) -> Result<Vec<DeviceImageRecord>, DecodeError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    if payload[0] == b'{' {
        return decode_text_list(payload);
    }

    let count = payload[0] as usize;
    let rest = &payload[1..];

    if count == 0 {
        return Ok(Vec::new());
    }

    // Structural cue: a plausible count byte (the device has 16 slots, so
    // anything above that is a combined index, not a count) whose implied
    // total matches the payload selects the fixed-stride layout and its
    // stride. A short remainder still decodes as count-prefixed; anything
    // else means there never was a count byte.
    if count <= 16 && rest.len() == count * 7 {
        Ok(decode_fixed_stride(rest, count, 7))
    } else if count <= 16 && rest.len() <= count * 6 {
        Ok(decode_fixed_stride(rest, count, 6))
    } else {
        decode_self_describing(payload)
    }
}

/// Fixed-stride records: `{pos, combined, size u32 LE}` (stride 6) or
/// `{pos, combined, reserved, size u32 LE}` (stride 7).
fn decode_fixed_stride(data: &[u8], declared: usize, stride: usize) -> Vec<DeviceImageRecord> {
    let complete = data.len() / stride;
    if complete < declared {
        warn!(
            "image list short read: {declared} records declared, {} bytes hold {complete}",
            data.len()
        );
    }

    let mut records = Vec::with_capacity(complete.min(declared));
    for i in 0..complete.min(declared) {
        let rec = &data[i * stride..(i + 1) * stride];
        let combined = CombinedIndex::from_wire(rec[1]);
        let size_at = stride - 4;
        let size = u32::from_le_bytes([
            rec[size_at],
            rec[size_at + 1],
            rec[size_at + 2],
            rec[size_at + 3],
        ]);
        debug!(
            "image list record {}: pos={} slot={} format={} size={}",
            i,
            rec[0],
            combined.slot(),
            combined.format(),
            size
        );
        records.push(DeviceImageRecord {
            slot: combined.slot(),
            format: combined.format(),
            size,
            selected: true,
            name: combined.display_name(),
        });
    }
    records
}

/// Self-describing records: `{index u8, size u32 LE, name_len u8, name}`.
/// Stops at the last complete record instead of failing the whole payload.
fn decode_self_describing(payload: &[u8]) -> Result<Vec<DeviceImageRecord>, DecodeError> {
    let mut records = Vec::new();
    let mut at = 0;

    while at < payload.len() {
        if at + 6 > payload.len() {
            warn!(
                "image list short read: {} trailing bytes after {} records",
                payload.len() - at,
                records.len()
            );
            break;
        }

        let combined = CombinedIndex::from_wire(payload[at]);
        let size = u32::from_le_bytes([
            payload[at + 1],
            payload[at + 2],
            payload[at + 3],
            payload[at + 4],
        ]);
        let name_len = payload[at + 5] as usize;
        at += 6;

        let name = if name_len == 0 {
            combined.display_name()
        } else if at + name_len <= payload.len() {
            let text = String::from_utf8_lossy(&payload[at..at + name_len]).into_owned();
            at += name_len;
            text
        } else {
            // Name bytes cut off mid-record: the record is incomplete.
            warn!(
                "image list record {}: name length {name_len} exceeds remaining bytes",
                records.len()
            );
            break;
        };

        records.push(DeviceImageRecord {
            slot: combined.slot(),
            format: format_for_name(&name, combined.format()),
            size,
            selected: true,
            name,
        });
    }

    if records.is_empty() {
        return Err(DecodeError::UnknownListLayout);
    }
    Ok(records)
}

/// The text revision carries the format only in the filename extension.
fn format_for_name(name: &str, fallback: ImageFormat) -> ImageFormat {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        ImageFormat::Jpeg
    } else if lower.ends_with(".png") {
        ImageFormat::Png
    } else if lower.ends_with(".gif") || lower.ends_with(".gfp") {
        ImageFormat::GifPack
    } else {
        fallback
    }
}

// ---------------------------------------------------------------------------
// Text (JSON) revision with field aliases
// ---------------------------------------------------------------------------

/// Fetch a field under any of its known aliases. New firmware aliases are
/// additive here rather than branching at every use site.
fn field<'a>(obj: &'a serde_json::Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|k| obj.get(*k))
}

fn decode_text_list(payload: &[u8]) -> Result<Vec<DeviceImageRecord>, DecodeError> {
    let text = core::str::from_utf8(payload).map_err(|_| DecodeError::UnknownListLayout)?;
    let root: Value = serde_json::from_str(text).map_err(|_| DecodeError::UnknownListLayout)?;
    let obj = root.as_object().ok_or(DecodeError::UnknownListLayout)?;

    let items = field(obj, &["images", "list", "items"])
        .and_then(Value::as_array)
        .ok_or(DecodeError::UnknownListLayout)?;

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Some(entry) = item.as_object() else {
            warn!("image list text record is not an object, skipping");
            continue;
        };

        let slot = field(entry, &["index", "idx", "i"])
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8
            & 0x0F;

        let name = field(entry, &["name", "n"])
            .and_then(Value::as_str)
            .map_or_else(|| slot.to_string(), str::to_owned);

        let selected = field(entry, &["active", "sel", "selected"])
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let size = field(entry, &["size", "sz", "len"])
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        records.push(DeviceImageRecord {
            slot,
            format: format_for_name(&name, ImageFormat::Raw),
            size,
            selected,
            name,
        });
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Status decoding
// ---------------------------------------------------------------------------

/// Decode a `GetStatus` response payload, selecting the revision from the
/// payload length.
pub fn decode_status(payload: &[u8]) -> Result<DeviceStatusRecord, DecodeError> {
    if payload.len() >= 9 {
        // {uptime u32 LE, storage u32 LE, combined index u8}
        let counter = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let storage_used = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let current_slot = CombinedIndex::from_wire(payload[8]).slot() as i8;
        return Ok(DeviceStatusRecord {
            counter,
            revision: StatusRevision::UptimeSeconds,
            storage_used,
            current_slot,
        });
    }

    if payload.len() >= 5 {
        // {battery u8, storage u32 LE, [combined index u8]}
        let counter = u32::from(payload[0]);
        let storage_used = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
        let current_slot = payload
            .get(5)
            .map_or(-1, |&b| CombinedIndex::from_wire(b).slot() as i8);
        return Ok(DeviceStatusRecord {
            counter,
            revision: StatusRevision::BatteryPercent,
            storage_used,
            current_slot,
        });
    }

    Err(DecodeError::StatusTooShort {
        len: payload.len(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

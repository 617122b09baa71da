//! Chunked bulk transfer over the data channel.
//!
//! One session at a time. The session owns the full payload; chunks are
//! cut at write time, so a retry resends exactly the bytes that failed.
//! Pacing and the one-in-flight rule are independent of the command
//! queue — control frames keep flowing on their own channel while a
//! transfer runs.
//!
//! A session starts disarmed: the caller enqueues the start-of-transfer
//! control frame first and arms the session only once the device accepts
//! it, so chunks never race ahead of the device's session setup.

use log::{debug, warn};

use crate::config::LinkConfig;
use crate::proto::CombinedIndex;

/// Progress after an acknowledged chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub sent: usize,
    pub total: usize,
    /// True when the acknowledged chunk was the last one.
    pub done: bool,
}

/// What became of a failed chunk write.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// The same chunk will be offered again after the retry delay.
    RetryScheduled,
    /// Retry already spent; the session is dead.
    Aborted { offset: usize, total: usize },
}

struct ChunkInFlight {
    offset: usize,
    len: usize,
    deadline: u64,
    retried: bool,
    retry_at: Option<u64>,
}

struct Session {
    target: CombinedIndex,
    payload: Vec<u8>,
    /// First byte not yet acknowledged.
    cursor: usize,
    armed: bool,
    in_flight: Option<ChunkInFlight>,
    next_write_at: u64,
}

/// Drives one chunked upload at a time.
pub struct TransferEngine {
    session: Option<Session>,
    chunk_size: usize,
    write_timeout_ms: u64,
    write_gap_ms: u64,
    write_retry_delay_ms: u64,
}

impl TransferEngine {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            session: None,
            chunk_size: config.chunk_size,
            write_timeout_ms: config.write_timeout_ms,
            write_gap_ms: config.write_gap_ms,
            write_retry_delay_ms: config.write_retry_delay_ms,
        }
    }

    /// Install a new disarmed session, replacing any previous one. The
    /// caller is responsible for reporting the old session as
    /// interrupted before calling this.
    pub fn begin(&mut self, target: CombinedIndex, payload: Vec<u8>) {
        debug!("transfer session for {target}: {} bytes", payload.len());
        self.session = Some(Session {
            target,
            payload,
            cursor: 0,
            armed: false,
            in_flight: None,
            next_write_at: 0,
        });
    }

    /// The device accepted the start-of-transfer command; chunks may
    /// flow.
    pub fn arm(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.armed = true;
        }
    }

    /// The chunk that should be written right now, if any. Marks it in
    /// flight; the caller reports the outcome.
    pub fn poll(&mut self, now: u64) -> Option<&[u8]> {
        let session = self.session.as_mut()?;
        if !session.armed {
            return None;
        }

        if let Some(chunk) = session.in_flight.as_mut() {
            match chunk.retry_at {
                Some(at) if now >= at => {
                    warn!(
                        "retrying chunk at offset {} after write failure",
                        chunk.offset
                    );
                    chunk.retry_at = None;
                    chunk.deadline = now + self.write_timeout_ms;
                    let (offset, len) = (chunk.offset, chunk.len);
                    return Some(&session.payload[offset..offset + len]);
                }
                _ => return None,
            }
        }

        if now < session.next_write_at || session.cursor >= session.payload.len() {
            return None;
        }

        let offset = session.cursor;
        let len = self.chunk_size.min(session.payload.len() - offset);
        session.in_flight = Some(ChunkInFlight {
            offset,
            len,
            deadline: now + self.write_timeout_ms,
            retried: false,
            retry_at: None,
        });
        Some(&session.payload[offset..offset + len])
    }

    /// The in-flight chunk was acknowledged.
    pub fn on_ack(&mut self, now: u64) -> Option<Progress> {
        let session = self.session.as_mut()?;
        let chunk = session.in_flight.take()?;
        session.cursor = chunk.offset + chunk.len;
        session.next_write_at = now + self.write_gap_ms;

        let total = session.payload.len();
        let done = session.cursor >= total;
        let progress = Progress {
            sent: session.cursor,
            total,
            done,
        };
        if done {
            self.session = None;
        }
        Some(progress)
    }

    /// The in-flight chunk write failed. First failure schedules one
    /// delayed resend of the same chunk; the second kills the session.
    pub fn on_write_failed(&mut self, now: u64) -> Option<ChunkDisposition> {
        let session = self.session.as_mut()?;
        let chunk = session.in_flight.as_mut()?;
        if chunk.retried {
            let offset = chunk.offset;
            let total = session.payload.len();
            warn!("chunk at offset {offset} failed twice, aborting transfer");
            self.session = None;
            return Some(ChunkDisposition::Aborted { offset, total });
        }
        chunk.retried = true;
        chunk.retry_at = Some(now + self.write_retry_delay_ms);
        Some(ChunkDisposition::RetryScheduled)
    }

    /// Abort the session if the in-flight chunk's deadline passed.
    pub fn check_timeout(&mut self, now: u64) -> Option<ChunkDisposition> {
        let session = self.session.as_ref()?;
        let chunk = session.in_flight.as_ref()?;
        if chunk.retry_at.is_some() || now < chunk.deadline {
            return None;
        }
        let offset = chunk.offset;
        let total = session.payload.len();
        warn!("chunk at offset {offset} unacknowledged, aborting transfer");
        self.session = None;
        Some(ChunkDisposition::Aborted { offset, total })
    }

    /// Tear the session down. Returns true if one was active.
    pub fn abort(&mut self) -> bool {
        self.session.take().is_some()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<CombinedIndex> {
        self.session.as_ref().map(|s| s.target)
    }

    /// Acknowledged progress as a 0-100 percentage.
    pub fn progress_percent(&self) -> Option<u8> {
        let session = self.session.as_ref()?;
        if session.payload.is_empty() {
            return Some(100);
        }
        Some((session.cursor * 100 / session.payload.len()) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::ImageFormat;

    fn engine(chunk_size: usize) -> TransferEngine {
        let config = LinkConfig {
            chunk_size,
            ..LinkConfig::default()
        };
        TransferEngine::new(&config)
    }

    fn target() -> CombinedIndex {
        CombinedIndex::new(ImageFormat::Png, 2)
    }

    #[test]
    fn disarmed_session_emits_no_chunks() {
        let mut t = engine(4);
        t.begin(target(), vec![0; 10]);
        assert!(t.poll(0).is_none());
        t.arm();
        assert!(t.poll(0).is_some());
    }

    #[test]
    fn chunks_cover_payload_exactly_once() {
        let mut t = engine(4);
        t.begin(target(), (0u8..10).collect());
        t.arm();

        let mut now = 0;
        let mut seen = Vec::new();
        loop {
            let Some(chunk) = t.poll(now) else {
                now += 100;
                if !t.is_active() {
                    break;
                }
                continue;
            };
            seen.extend_from_slice(chunk);
            now += 1;
            let progress = t.on_ack(now).unwrap();
            assert_eq!(progress.sent, seen.len());
            assert_eq!(progress.total, 10);
            if progress.done {
                break;
            }
        }
        assert_eq!(seen, (0u8..10).collect::<Vec<_>>());
        assert!(!t.is_active());
    }

    #[test]
    fn last_chunk_is_short() {
        let mut t = engine(4);
        t.begin(target(), vec![7; 6]);
        t.arm();

        assert_eq!(t.poll(0).unwrap().len(), 4);
        t.on_ack(0);
        assert_eq!(t.poll(100).unwrap().len(), 2);
    }

    #[test]
    fn failed_chunk_retries_same_bytes_then_aborts() {
        let mut t = engine(4);
        t.begin(target(), (0u8..8).collect());
        t.arm();

        let first: Vec<u8> = t.poll(0).unwrap().to_vec();
        assert_eq!(
            t.on_write_failed(0),
            Some(ChunkDisposition::RetryScheduled)
        );
        assert!(t.poll(50).is_none());
        let retry: Vec<u8> = t.poll(100).unwrap().to_vec();
        assert_eq!(first, retry);

        assert_eq!(
            t.on_write_failed(100),
            Some(ChunkDisposition::Aborted { offset: 0, total: 8 })
        );
        assert!(!t.is_active());
    }

    #[test]
    fn timeout_aborts_session() {
        let mut t = engine(4);
        t.begin(target(), vec![0; 8]);
        t.arm();
        assert!(t.poll(0).is_some());

        assert!(t.check_timeout(100).is_none());
        assert_eq!(
            t.check_timeout(250),
            Some(ChunkDisposition::Aborted { offset: 0, total: 8 })
        );
    }

    #[test]
    fn progress_tracks_acknowledged_bytes_only() {
        let mut t = engine(5);
        t.begin(target(), vec![0; 10]);
        t.arm();
        assert_eq!(t.progress_percent(), Some(0));

        assert!(t.poll(0).is_some());
        // In flight but unacknowledged: progress unchanged.
        assert_eq!(t.progress_percent(), Some(0));
        t.on_ack(1);
        assert_eq!(t.progress_percent(), Some(50));
    }

    #[test]
    fn begin_replaces_previous_session() {
        let mut t = engine(4);
        t.begin(target(), vec![0; 8]);
        t.arm();
        t.poll(0);

        t.begin(CombinedIndex::new(ImageFormat::Raw, 0), vec![1; 4]);
        assert!(t.is_active());
        // New session starts disarmed with a fresh cursor.
        assert!(t.poll(100).is_none());
        t.arm();
        assert_eq!(t.poll(100).unwrap(), &[1, 1, 1, 1]);
    }
}

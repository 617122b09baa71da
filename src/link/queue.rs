//! Outbound command queue for the control channel.
//!
//! Enforces the per-channel ordering rules: one frame in flight at a
//! time, a fixed gap between consecutive writes, one delayed retry after
//! a write failure, and abandonment (never replay) after an
//! acknowledgement timeout — a frame that timed out may still have
//! reached the device, and replaying a delete or reorder would be worse
//! than dropping it.

use heapless::Deque;
use log::{debug, warn};

use crate::config::LinkConfig;
use crate::proto::frame::CommandFrame;
use crate::proto::CommandId;

/// Upper bound on queued commands; the UI never has more than a handful
/// outstanding.
pub const QUEUE_DEPTH: usize = 16;

/// What became of a failed write.
#[derive(Debug, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The same frame will be offered again after the retry delay.
    RetryScheduled,
    /// Retry already spent; the frame is dropped and the caller should
    /// surface the failure.
    Abandoned(CommandId),
}

struct InFlight {
    frame: CommandFrame,
    /// Acknowledgement deadline, absolute ms.
    deadline: u64,
    retried: bool,
    /// When set, the frame is parked until this instant before being
    /// offered again.
    retry_at: Option<u64>,
}

/// FIFO of control frames with in-flight tracking and pacing.
pub struct CommandQueue {
    pending: Deque<CommandFrame, QUEUE_DEPTH>,
    in_flight: Option<InFlight>,
    /// Earliest instant the next write may start (gap pacing).
    next_write_at: u64,
    write_timeout_ms: u64,
    write_gap_ms: u64,
    write_retry_delay_ms: u64,
}

impl CommandQueue {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            pending: Deque::new(),
            in_flight: None,
            next_write_at: 0,
            write_timeout_ms: config.write_timeout_ms,
            write_gap_ms: config.write_gap_ms,
            write_retry_delay_ms: config.write_retry_delay_ms,
        }
    }

    /// Enqueue a frame. Fails when the queue is full; the caller decides
    /// whether that is an error worth surfacing.
    pub fn push(&mut self, frame: CommandFrame) -> Result<(), CommandFrame> {
        self.pending.push_back(frame)
    }

    /// Return the frame that should be written right now, if any, moving
    /// it in flight. The caller must attempt the write and report the
    /// outcome via [`on_ack`](Self::on_ack),
    /// [`on_write_failed`](Self::on_write_failed) or a later timeout.
    pub fn poll(&mut self, now: u64) -> Option<&CommandFrame> {
        // A parked retry takes priority over new frames; it falls through
        // to the common return below.
        if let Some(inflight) = self.in_flight.as_mut() {
            match inflight.retry_at {
                Some(at) if now >= at => {
                    debug!("retrying {} after write failure", inflight.frame.id());
                    inflight.retry_at = None;
                    inflight.deadline = now + self.write_timeout_ms;
                }
                _ => return None,
            }
        } else {
            if now < self.next_write_at {
                return None;
            }
            let frame = self.pending.pop_front()?;
            self.in_flight = Some(InFlight {
                frame,
                deadline: now + self.write_timeout_ms,
                retried: false,
                retry_at: None,
            });
        }
        self.in_flight.as_ref().map(|f| &f.frame)
    }

    /// The in-flight frame was acknowledged.
    pub fn on_ack(&mut self, now: u64) -> Option<CommandId> {
        let done = self.in_flight.take()?;
        self.next_write_at = now + self.write_gap_ms;
        Some(done.frame.id())
    }

    /// The in-flight write failed at the transport. First failure parks
    /// the frame for one delayed retry; the second abandons it.
    pub fn on_write_failed(&mut self, now: u64) -> Option<FailureDisposition> {
        let inflight = self.in_flight.as_mut()?;
        if inflight.retried {
            let id = inflight.frame.id();
            warn!("{id} failed twice, abandoning");
            self.in_flight = None;
            self.next_write_at = now + self.write_gap_ms;
            return Some(FailureDisposition::Abandoned(id));
        }
        inflight.retried = true;
        inflight.retry_at = Some(now + self.write_retry_delay_ms);
        Some(FailureDisposition::RetryScheduled)
    }

    /// Drop the in-flight frame if its acknowledgement deadline passed.
    /// Timed-out frames are never replayed.
    pub fn check_timeout(&mut self, now: u64) -> Option<CommandId> {
        let inflight = self.in_flight.as_ref()?;
        if inflight.retry_at.is_some() || now < inflight.deadline {
            return None;
        }
        let id = inflight.frame.id();
        warn!("{id} unacknowledged after {}ms, abandoning", self.write_timeout_ms);
        self.in_flight = None;
        self.next_write_at = now + self.write_gap_ms;
        Some(id)
    }

    /// Command of the frame currently awaiting acknowledgement.
    pub fn in_flight_command(&self) -> Option<CommandId> {
        self.in_flight.as_ref().map(|f| f.frame.id())
    }

    /// Drop everything, queued and in flight.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = None;
        self.next_write_at = 0;
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: CommandId) -> CommandFrame {
        CommandFrame::new(id, &[]).unwrap()
    }

    fn queue() -> CommandQueue {
        CommandQueue::new(&LinkConfig::default())
    }

    #[test]
    fn one_frame_in_flight_at_a_time() {
        let mut q = queue();
        q.push(frame(CommandId::GetStatus)).unwrap();
        q.push(frame(CommandId::GetImageList)).unwrap();

        assert_eq!(q.poll(0).map(|f| f.id()), Some(CommandId::GetStatus));
        // Second frame held back until the first is acknowledged.
        assert!(q.poll(1).is_none());

        q.on_ack(10);
        // Gap pacing: next write waits out the inter-write gap.
        assert!(q.poll(10).is_none());
        assert_eq!(q.poll(40).map(|f| f.id()), Some(CommandId::GetImageList));
    }

    #[test]
    fn write_failure_retries_once_then_abandons() {
        let mut q = queue();
        q.push(frame(CommandId::SetDisplay)).unwrap();
        assert!(q.poll(0).is_some());

        assert_eq!(
            q.on_write_failed(0),
            Some(FailureDisposition::RetryScheduled)
        );
        // Parked until the retry delay elapses.
        assert!(q.poll(50).is_none());
        assert_eq!(q.poll(100).map(|f| f.id()), Some(CommandId::SetDisplay));

        assert_eq!(
            q.on_write_failed(100),
            Some(FailureDisposition::Abandoned(CommandId::SetDisplay))
        );
        assert!(q.is_idle());
    }

    #[test]
    fn timeout_abandons_without_replay() {
        let mut q = queue();
        q.push(frame(CommandId::DeleteImage)).unwrap();
        assert!(q.poll(0).is_some());

        assert!(q.check_timeout(100).is_none());
        assert_eq!(q.check_timeout(250), Some(CommandId::DeleteImage));
        assert!(q.is_idle());
    }

    #[test]
    fn parked_retry_does_not_time_out() {
        let mut q = queue();
        q.push(frame(CommandId::GetStatus)).unwrap();
        assert!(q.poll(0).is_some());
        q.on_write_failed(0);

        // The ack deadline from the first attempt must not fire while the
        // frame is parked for retry.
        assert!(q.check_timeout(10_000).is_none());
    }

    #[test]
    fn clear_drops_in_flight_and_pending() {
        let mut q = queue();
        q.push(frame(CommandId::GetStatus)).unwrap();
        q.push(frame(CommandId::GetImageList)).unwrap();
        assert!(q.poll(0).is_some());

        q.clear();
        assert!(q.is_idle());
        assert!(q.poll(1_000).is_none());
    }
}

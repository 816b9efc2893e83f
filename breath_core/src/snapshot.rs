//! Per-tick state snapshots for display consumers.
//!
//! The control loop is the sole writer; consumers receive immutable copies
//! over a bounded channel and never share buffers with the core. When the
//! channel is full the oldest snapshot is dropped so the loop never blocks
//! on a slow chart or remote display.

use crossbeam_channel as xch;

use crate::SessionPhase;

/// Immutable copy of the observable state of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSnapshot {
    /// Seconds of processed samples since session start.
    pub elapsed_s: f64,
    pub raw_hpa: f64,
    pub filtered_hpa: f64,
    pub phase: SessionPhase,
    pub position: i32,
    pub target_period_s: f64,
}

/// Create a bounded snapshot channel. `capacity` snapshots are retained;
/// at 60 Hz a capacity of 600 holds the most recent ten seconds.
pub fn channel(capacity: usize) -> (SnapshotPublisher, xch::Receiver<TickSnapshot>) {
    let (tx, rx) = xch::bounded(capacity.max(1));
    (
        SnapshotPublisher {
            tx,
            overflow: rx.clone(),
        },
        rx,
    )
}

/// Sending half held by the control loop.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    tx: xch::Sender<TickSnapshot>,
    // Same queue as the consumer's receiver; used to evict the oldest
    // entry when the channel is full.
    overflow: xch::Receiver<TickSnapshot>,
}

impl SnapshotPublisher {
    /// Non-blocking publish with drop-oldest overflow policy.
    pub fn publish(&self, snapshot: TickSnapshot) {
        if let Err(xch::TrySendError::Full(snap)) = self.tx.try_send(snapshot) {
            let _ = self.overflow.try_recv();
            let _ = self.tx.try_send(snap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(i: usize) -> TickSnapshot {
        TickSnapshot {
            elapsed_s: i as f64,
            raw_hpa: 1013.0,
            filtered_hpa: 1013.0,
            phase: SessionPhase::Warmup,
            position: 0,
            target_period_s: 4.0,
        }
    }

    #[test]
    fn overflow_drops_oldest_not_newest() {
        let (publisher, rx) = channel(3);
        for i in 0..5 {
            publisher.publish(snap(i));
        }
        let kept: Vec<f64> = rx.try_iter().map(|s| s.elapsed_s).collect();
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn publish_never_blocks_without_consumer() {
        let (publisher, _rx) = channel(2);
        for i in 0..1000 {
            publisher.publish(snap(i));
        }
    }
}

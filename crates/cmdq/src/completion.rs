//! Consumption waits against the consumer-reported read cursor.
//!
//! Two distinct questions get two distinct operations: [`wait_for`] /
//! [`wait_drained`] answer "has the engine *fetched* everything up to
//! here" from the read cursor alone, while an [`InterruptEvent`] paired
//! with `RingQueue::submit_signal` answers the stronger "has the engine
//! *processed* it". A timeout is an ordinary `false` return, not an
//! error; the tracker never retries on the caller's behalf.
//!
//! [`wait_for`]: CompletionTracker::wait_for
//! [`wait_drained`]: CompletionTracker::wait_drained
//! [`InterruptEvent`]: crate::event::InterruptEvent

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::regs::{QueueRegs, WriteCursor};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Polls a queue's read cursor until a target is reached or a deadline
/// passes. Obtained from `RingQueue::completion`.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    regs: Arc<QueueRegs>,
    poll_interval: Duration,
}

impl CompletionTracker {
    pub(crate) fn new(regs: Arc<QueueRegs>) -> CompletionTracker {
        CompletionTracker {
            regs,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> CompletionTracker {
        self.poll_interval = interval;
        self
    }

    /// Blocks until the read cursor reaches `target` or `timeout`
    /// elapses; returns whether the target was reached.
    ///
    /// A zero timeout never blocks: it reports whether the target has
    /// already been reached.
    pub fn wait_for(&self, target: WriteCursor, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.regs.read_cursor().reached(target) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(
                    target = target.units(),
                    read = self.regs.read_cursor().units(),
                    "consumption wait timed out"
                );
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Waits until everything published *as of this call* has been
    /// fetched. The write cursor is snapshotted once; packets submitted
    /// after the call do not extend the wait.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let target = self.regs.write_cursor();
        self.wait_for(target, timeout)
    }
}

//! The producer-side ring queue state machine.
//!
//! One producer thread owns a [`RingQueue`]; the engine drains it
//! asynchronously, reporting progress only through the read cursor in the
//! shared register block. `place` stages packets behind a pending cursor
//! the engine cannot see; `submit` publishes the pending position and
//! rings the doorbell.
//!
//! Two invariants the queue maintains unconditionally:
//!
//! - a packet's encoded dwords are never split across the wrap boundary
//!   (no-op padding fills the tail of the ring instead);
//! - `pending - read` never exceeds `ring_units - 1` (one unit stays
//!   reserved so a full ring is distinguishable from an empty one), and a
//!   `place` that cannot fit fails without touching the ring.

use std::sync::Arc;

use cmdq_proto::{pm4, sdma, Dialect, Packet};
use tracing::{debug, trace};

use crate::buffer::{AllocationError, CommandBuffer, SharedView};
use crate::completion::CompletionTracker;
use crate::error::QueueError;
use crate::event::{InterruptEvent, FENCE_SIGNALED};
use crate::regs::{CursorWidth, QueueRegs, WriteCursor};

/// Fixed per-queue hardware description, supplied at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub dialect: Dialect,
    pub cursor_width: CursorWidth,
    /// Ring size in bytes; must be a nonzero multiple of 4 KiB.
    pub ring_bytes: usize,
}

/// Single-producer command ring.
pub struct RingQueue {
    config: DeviceConfig,
    buffer: CommandBuffer,
    regs: Arc<QueueRegs>,
    /// Staged producer position. Runs ahead of the published write cursor
    /// between `place` and `submit`.
    pending: WriteCursor,
    /// Ring size in the dialect's addressing units.
    ring_units: u64,
}

impl RingQueue {
    pub fn new(config: DeviceConfig) -> Result<RingQueue, AllocationError> {
        let buffer = CommandBuffer::allocate(config.ring_bytes)?;
        let ring_units = config.ring_bytes as u64 / config.dialect.unit_bytes();
        debug!(
            dialect = ?config.dialect,
            ring_bytes = config.ring_bytes,
            ring_units,
            "ring queue created"
        );
        Ok(RingQueue {
            config,
            buffer,
            regs: Arc::new(QueueRegs::new()),
            pending: WriteCursor::new(0),
            ring_units,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Ring capacity in addressing units. One unit of it is permanently
    /// reserved, so at most `ring_units() - 1` units can be in flight.
    pub fn ring_units(&self) -> u64 {
        self.ring_units
    }

    /// Staged producer position (not yet visible to the engine unless
    /// `submit` has been called since the last `place`).
    pub fn pending_cursor(&self) -> WriteCursor {
        self.pending
    }

    /// Units currently free for `place`, after the reserved unit.
    pub fn free_units(&self) -> u64 {
        self.ring_units - 1 - self.pending.in_flight(self.regs.read_cursor())
    }

    pub fn regs(&self) -> &Arc<QueueRegs> {
        &self.regs
    }

    /// Consumer-side read handle over the ring memory, for the engine.
    pub fn shared_view(&self) -> SharedView {
        self.buffer.shared_view()
    }

    /// A tracker that waits on this queue's read cursor.
    pub fn completion(&self) -> CompletionTracker {
        CompletionTracker::new(Arc::clone(&self.regs))
    }

    /// Stages `packet` at the pending position, padding to the wrap
    /// boundary with no-ops if the packet would straddle it.
    ///
    /// On error nothing is written and the pending cursor is unchanged.
    pub fn place(&mut self, packet: &Packet) -> Result<(), QueueError> {
        if packet.dialect() != self.config.dialect {
            return Err(QueueError::DialectMismatch {
                packet: packet.dialect(),
                queue: self.config.dialect,
            });
        }

        let size = packet.size_units();
        let free = self.free_units();
        let pos = self.pending.offset_in(self.ring_units);
        let pad = if pos + size > self.ring_units {
            self.ring_units - pos
        } else {
            0
        };
        if pad + size > free {
            return Err(QueueError::QueueFull {
                needed: pad + size,
                free,
            });
        }

        if pad > 0 {
            trace!(pad, pos, "padding to wrap boundary");
            self.write_noops(pos, pad);
            self.pending = self.pending.advanced(pad);
        }
        let offset = self.pending.offset_in(self.ring_units);
        self.write_words(offset, packet.words());
        self.pending = self.pending.advanced(size);
        trace!(kind = ?packet.kind(), size, pending = self.pending.units(), "packet placed");
        Ok(())
    }

    /// Publishes everything staged so far and rings the doorbell. Never
    /// blocks; a no-op if nothing new was placed.
    pub fn submit(&self) {
        self.regs.publish_write(self.pending, self.config.cursor_width);
        trace!(write = self.pending.units(), "submitted");
    }

    pub fn place_and_submit(&mut self, packet: &Packet) -> Result<(), QueueError> {
        self.place(packet)?;
        self.submit();
        Ok(())
    }

    /// Stages a fence write to the event's address followed by a trap
    /// carrying the event's interrupt context, then submits. When the
    /// engine has processed everything ahead of the pair, it fires the
    /// event.
    pub fn submit_signal(&mut self, event: &InterruptEvent) -> Result<(), QueueError> {
        let (fence, trap) = match self.config.dialect {
            Dialect::Dma => (
                sdma::fence(event.fence_addr(), FENCE_SIGNALED)?,
                sdma::trap(event.id())?,
            ),
            Dialect::Compute => (
                pm4::fence(event.fence_addr(), FENCE_SIGNALED)?,
                pm4::trap(event.id())?,
            ),
        };
        self.place(&fence)?;
        self.place(&trap)?;
        self.submit();
        Ok(())
    }

    fn write_words(&mut self, unit_offset: u64, words: &[u32]) {
        let byte_offset = (unit_offset * self.config.dialect.unit_bytes()) as usize;
        self.buffer.write_dwords(byte_offset, words);
    }

    fn write_noops(&mut self, unit_offset: u64, units: u64) {
        let unit_bytes = self.config.dialect.unit_bytes();
        // Packets are dword-granular in both dialects, so the tail being
        // padded is always a whole number of dwords.
        debug_assert_eq!(units * unit_bytes % 4, 0);
        let noops = vec![self.config.dialect.noop_word(); (units * unit_bytes / 4) as usize];
        self.write_words(unit_offset, &noops);
    }
}

impl std::fmt::Debug for RingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingQueue")
            .field("dialect", &self.config.dialect)
            .field("ring_units", &self.ring_units)
            .field("pending", &self.pending.units())
            .finish()
    }
}

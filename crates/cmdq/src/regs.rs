//! Hardware-visible queue registers and typed cursors.
//!
//! Cursor registers are atomics with explicit acquire/release ordering
//! rather than volatile fields behind manual barriers. Host-side
//! counters stay monotonic `u64` for their whole life; the configured
//! [`CursorWidth`] is applied only when a value is published to the
//! doorbell, so wraparound of a narrow hardware register never corrupts
//! ring arithmetic.
//!
//! Cursor values are newtypes rather than bare integers: a [`WriteCursor`]
//! and a [`ReadCursor`] both count the queue's addressing units (bytes on
//! the DMA engine, dwords on the compute engine), and keeping them as
//! distinct types stops read/write confusion at call sites.

use std::sync::atomic::{AtomicU64, Ordering};

/// Width of the hardware cursor/doorbell registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorWidth {
    Bits32,
    Bits64,
}

impl CursorWidth {
    /// Truncates a monotonic counter to the register width.
    pub const fn mask(self, value: u64) -> u64 {
        match self {
            CursorWidth::Bits32 => value & 0xFFFF_FFFF,
            CursorWidth::Bits64 => value,
        }
    }
}

/// Monotonic producer-side position, in queue units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteCursor(u64);

impl WriteCursor {
    pub const fn new(units: u64) -> Self {
        WriteCursor(units)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    pub const fn advanced(self, units: u64) -> Self {
        WriteCursor(self.0 + units)
    }

    /// Wrapped position within a ring of `ring_units` units.
    pub const fn offset_in(self, ring_units: u64) -> u64 {
        self.0 % ring_units
    }

    /// Units currently in flight given the consumer's position.
    pub const fn in_flight(self, read: ReadCursor) -> u64 {
        self.0 - read.0
    }
}

/// Monotonic consumer-reported position, in queue units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadCursor(u64);

impl ReadCursor {
    pub const fn new(units: u64) -> Self {
        ReadCursor(units)
    }

    pub const fn units(self) -> u64 {
        self.0
    }

    /// Whether the consumer has drained everything up to `target`.
    pub const fn reached(self, target: WriteCursor) -> bool {
        self.0 >= target.0
    }
}

/// The shared cursor/doorbell block both sides observe.
///
/// The producer stores `write_cursor` with release ordering after the
/// packet dwords are in place, so a consumer that acquires the cursor is
/// guaranteed to see the bytes it covers. The consumer stores
/// `read_cursor` with release ordering after it has finished fetching a
/// packet's bytes.
#[derive(Debug, Default)]
pub struct QueueRegs {
    write_cursor: AtomicU64,
    read_cursor: AtomicU64,
    doorbell: AtomicU64,
}

impl QueueRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the producer position and rings the doorbell with the
    /// width-masked value.
    pub fn publish_write(&self, cursor: WriteCursor, width: CursorWidth) {
        self.write_cursor.store(cursor.units(), Ordering::Release);
        self.doorbell.store(width.mask(cursor.units()), Ordering::Release);
    }

    pub fn write_cursor(&self) -> WriteCursor {
        WriteCursor(self.write_cursor.load(Ordering::Acquire))
    }

    pub fn read_cursor(&self) -> ReadCursor {
        ReadCursor(self.read_cursor.load(Ordering::Acquire))
    }

    /// Last value rung on the doorbell, as the hardware register holds it.
    pub fn doorbell(&self) -> u64 {
        self.doorbell.load(Ordering::Acquire)
    }

    /// Consumer-side: report progress. Only the engine (or a test harness
    /// standing in for one) calls this.
    pub fn store_read_cursor(&self, cursor: ReadCursor) {
        self.read_cursor.store(cursor.units(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_masks_doorbell_but_not_counter() {
        let regs = QueueRegs::new();
        let c = WriteCursor::new(0x1_0000_0020);
        regs.publish_write(c, CursorWidth::Bits32);
        assert_eq!(regs.write_cursor(), c);
        assert_eq!(regs.doorbell(), 0x20);

        regs.publish_write(c, CursorWidth::Bits64);
        assert_eq!(regs.doorbell(), 0x1_0000_0020);
    }

    #[test]
    fn cursor_arithmetic() {
        let w = WriteCursor::new(4100).advanced(12);
        assert_eq!(w.units(), 4112);
        assert_eq!(w.offset_in(4096), 16);
        assert_eq!(w.in_flight(ReadCursor::new(4100)), 12);
        assert!(ReadCursor::new(4112).reached(w));
        assert!(!ReadCursor::new(4111).reached(w));
    }
}

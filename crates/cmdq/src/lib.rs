//! User-mode command-ring submission.
//!
//! A [`RingQueue`] owns a fixed-size, page-aligned [`CommandBuffer`] and
//! feeds an asynchronous engine through it. Coordination is deliberately
//! thin, matching how the hardware actually works: two monotonically
//! increasing cursors in a shared [`QueueRegs`] block (producer write
//! cursor, consumer read cursor) plus a doorbell. There is no lock on the
//! hardware side.
//!
//! The expected flow:
//!
//! ```no_run
//! use std::time::Duration;
//! use cmdq::{CursorWidth, DeviceConfig, RingQueue};
//! use cmdq_proto::{sdma, Dialect};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut queue = RingQueue::new(DeviceConfig {
//!     dialect: Dialect::Dma,
//!     cursor_width: CursorWidth::Bits64,
//!     ring_bytes: 4096,
//! })?;
//!
//! queue.place(&sdma::write_data(0x1_0000, &[1, 2, 3, 4])?)?;
//! queue.place(&sdma::fence(0x2_0000, 0x1)?)?;
//! queue.submit();
//!
//! let done = queue.completion().wait_drained(Duration::from_millis(1000));
//! # let _ = done;
//! # Ok(())
//! # }
//! ```
//!
//! Packets come pre-encoded from [`cmdq_proto`]; the queue treats them as
//! opaque dwords and only guarantees placement (contiguous, never split
//! across the wrap boundary) and publication ordering.
//!
//! A `RingQueue` belongs to one producer thread. It is `Send` but not
//! shareable; concurrent producers serialize externally or use a queue
//! per thread.

pub mod buffer;
pub mod completion;
pub mod error;
pub mod event;
pub mod queue;
pub mod regs;

pub use buffer::{AllocationError, CommandBuffer, SharedView, PAGE_SIZE};
pub use completion::CompletionTracker;
pub use error::QueueError;
pub use event::{EventSignaler, InterruptEvent, FENCE_SIGNALED};
pub use queue::{DeviceConfig, RingQueue};
pub use regs::{CursorWidth, QueueRegs, ReadCursor, WriteCursor};

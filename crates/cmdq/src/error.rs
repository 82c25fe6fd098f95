use cmdq_proto::{Dialect, PacketError};
use thiserror::Error;

/// Producer-side queue errors. All are recoverable: the ring, cursors and
/// pending position are untouched when any of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Not enough free space for the packet plus any wrap padding it
    /// needs. Retry after the consumer has drained. Sizes are in the
    /// queue's addressing units.
    #[error("queue full: need {needed} units (incl. padding), {free} free")]
    QueueFull { needed: u64, free: u64 },
    /// The packet was encoded for the other engine dialect.
    #[error("packet dialect {packet:?} does not match queue dialect {queue:?}")]
    DialectMismatch { packet: Dialect, queue: Dialect },
    /// Arguments to an internally encoded packet were out of range
    /// (e.g. an event id too wide for a trap's interrupt context).
    #[error(transparent)]
    Packet(#[from] PacketError),
}

//! Wire-format command packets for the two engine dialects.
//!
//! This crate is the host side of a fixed binary contract with engine
//! firmware: every packet layout here is bit-exact and must not be altered.
//! Two protocol families ("dialects") are covered:
//!
//! - [`sdma`] — the DMA-copy engine dialect. Cursors count **bytes**;
//!   packets are dword-granular records with an `{op:8, sub_op:8}` header.
//! - [`pm4`] — the compute engine dialect. Cursors count **dwords**;
//!   packets are PM4 type-3 records with the opcode and dword count packed
//!   into the header.
//!
//! Encoding is pure: a builder either returns a fully formed [`Packet`] or
//! a [`PacketError`] describing the malformed argument; nothing is ever
//! partially encoded. The matching [`peek`] decoders report a packet's kind
//! and size so a consumer (or a test harness standing in for one) can walk
//! a ring in cursor order.

pub mod pm4;
pub mod sdma;

/// A hardware-queue protocol family.
///
/// The set of dialects is closed and known, so dialect-specific behavior is
/// expressed as per-variant functions rather than trait objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// DMA-copy engine. Byte-unit cursors.
    Dma,
    /// Compute engine (PM4). Dword-unit cursors.
    Compute,
}

impl Dialect {
    /// Size in bytes of the dialect's cursor addressing unit.
    pub const fn unit_bytes(self) -> u64 {
        match self {
            Dialect::Dma => 1,
            Dialect::Compute => 4,
        }
    }

    /// Converts a dword count into the dialect's cursor units.
    pub const fn dwords_to_units(self, dwords: usize) -> u64 {
        match self {
            Dialect::Dma => (dwords as u64) * 4,
            Dialect::Compute => dwords as u64,
        }
    }

    /// The single-dword no-op sentinel the engine skips over. Used by the
    /// ring producer for wrap padding; callers never place these directly.
    pub const fn noop_word(self) -> u32 {
        match self {
            Dialect::Dma => sdma::NOOP_WORD,
            Dialect::Compute => pm4::NOOP_WORD,
        }
    }
}

/// Packet kinds shared by both dialects. Not every kind exists in every
/// dialect (`IndirectBuffer` is compute-only, `Timestamp`/`PollRegMem` are
/// DMA-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    NoOp,
    WriteData,
    CopyLinear,
    ConstantFill,
    Fence,
    Trap,
    Timestamp,
    PollRegMem,
    IndirectBuffer,
}

/// An immutable, fully encoded command packet.
///
/// The ring producer only ever copies a packet's bytes; it never inspects
/// or rewrites them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    dialect: Dialect,
    kind: PacketKind,
    words: Vec<u32>,
}

impl Packet {
    pub(crate) fn new(dialect: Dialect, kind: PacketKind, words: Vec<u32>) -> Self {
        debug_assert!(!words.is_empty());
        Packet {
            dialect,
            kind,
            words,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// The encoded dwords, in wire order.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn size_dwords(&self) -> usize {
        self.words.len()
    }

    /// Packet size in the owning dialect's cursor units.
    pub fn size_units(&self) -> u64 {
        self.dialect.dwords_to_units(self.words.len())
    }
}

/// A caller supplied packet arguments outside the dialect's legal range.
///
/// These are local, recoverable errors: correct the argument and encode
/// again. Nothing is partially encoded on failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("{op}: transfer length must be nonzero")]
    ZeroLength { op: &'static str },
    #[error("{op}: {field} value {value:#x} does not fit in {bits} bits")]
    FieldOverflow {
        op: &'static str,
        field: &'static str,
        value: u64,
        bits: u32,
    },
    #[error("{op}: address {addr:#x} is not {align}-byte aligned")]
    MisalignedAddress {
        op: &'static str,
        addr: u64,
        align: u64,
    },
    #[error("{op}: payload must contain at least one dword")]
    EmptyPayload { op: &'static str },
    #[error("{op}: between one and two destinations required, got {count}")]
    BadDestinationCount { op: &'static str, count: usize },
    #[error("{op}: length {len:#x} is not a multiple of {granule} bytes")]
    UnalignedLength {
        op: &'static str,
        len: u64,
        granule: u64,
    },
}

/// A header dword (or packet body) that the decoder cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty packet stream")]
    Empty,
    #[error("unknown opcode {opcode:#x} in header {header:#010x}")]
    UnknownOpcode { opcode: u32, header: u32 },
    #[error("header {header:#010x} is not a type-3 packet")]
    BadPacketType { header: u32 },
    #[error("packet needs {needed} dwords but only {available} are present")]
    Truncated { needed: usize, available: usize },
}

/// Reports the kind and size (in dwords) of the packet starting at
/// `words[0]`, for the given dialect. The full packet must be present.
pub fn peek(dialect: Dialect, words: &[u32]) -> Result<(PacketKind, usize), DecodeError> {
    match dialect {
        Dialect::Dma => sdma::peek(words),
        Dialect::Compute => pm4::peek(words),
    }
}

pub(crate) fn check_fits(
    op: &'static str,
    field: &'static str,
    value: u64,
    bits: u32,
) -> Result<(), PacketError> {
    if bits < 64 && value >> bits != 0 {
        return Err(PacketError::FieldOverflow {
            op,
            field,
            value,
            bits,
        });
    }
    Ok(())
}

pub(crate) fn check_aligned(op: &'static str, addr: u64, align: u64) -> Result<(), PacketError> {
    if addr % align != 0 {
        return Err(PacketError::MisalignedAddress { op, addr, align });
    }
    Ok(())
}

pub(crate) fn split_addr(addr: u64) -> (u32, u32) {
    (addr as u32, (addr >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_units() {
        assert_eq!(Dialect::Dma.unit_bytes(), 1);
        assert_eq!(Dialect::Compute.unit_bytes(), 4);
        assert_eq!(Dialect::Dma.dwords_to_units(3), 12);
        assert_eq!(Dialect::Compute.dwords_to_units(3), 3);
    }

    #[test]
    fn packet_size_units_follow_dialect() {
        let dma = sdma::fence(0x1000, 7).unwrap();
        assert_eq!(dma.size_dwords(), 4);
        assert_eq!(dma.size_units(), 16);

        let pm4 = pm4::fence(0x1000, 7).unwrap();
        assert_eq!(pm4.size_dwords(), 7);
        assert_eq!(pm4.size_units(), 7);
    }

    #[test]
    fn field_overflow_reports_offender() {
        let err = check_fits("fence", "count", 1 << 23, 22).unwrap_err();
        assert_eq!(
            err,
            PacketError::FieldOverflow {
                op: "fence",
                field: "count",
                value: 1 << 23,
                bits: 22,
            }
        );
    }
}

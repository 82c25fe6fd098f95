//! DMA-copy engine dialect.
//!
//! Cursors on this engine count bytes; every packet is a dword-granular
//! record whose first dword carries `{op:8, sub_op:8}` in the low half.
//! Field layouts below are the firmware contract — bit positions are
//! spelled out with explicit shifts rather than bitfield structs so the
//! layout is visible at the encoding site.

use crate::{
    check_aligned, check_fits, split_addr, DecodeError, Dialect, Packet, PacketError, PacketKind,
};

pub const OP_NOP: u32 = 0;
pub const OP_COPY: u32 = 1;
pub const OP_WRITE: u32 = 2;
pub const OP_FENCE: u32 = 5;
pub const OP_TRAP: u32 = 6;
pub const OP_POLL_REGMEM: u32 = 8;
pub const OP_CONST_FILL: u32 = 11;
pub const OP_TIMESTAMP: u32 = 13;

pub const SUBOP_COPY_LINEAR: u32 = 0;
pub const SUBOP_WRITE_LINEAR: u32 = 0;
pub const SUBOP_TIMESTAMP_GET_GLOBAL: u32 = 2;

/// `count` fields (dword or byte counts, stored N-1) are 22 bits wide.
const COUNT_BITS: u32 = 22;
const COUNT_MASK: u32 = (1 << COUNT_BITS) - 1;
/// Trap interrupt-context field width.
const INT_CONTEXT_BITS: u32 = 28;

/// Broadcast-linear copies carry the flag at bit 27 of the header and
/// exactly two destination address pairs.
const HEADER_BROADCAST_BIT: u32 = 1 << 27;

/// Poll comparison function: `*addr == reference` (after masking).
const POLL_FUNC_EQUAL: u32 = 3;
/// Poll target is memory, not a register.
const POLL_MEM_BIT: u32 = 1 << 31;
/// Default poll cadence: re-check every 4 clocks, retry indefinitely.
const POLL_INTERVAL: u32 = 0x04;
const POLL_RETRY_FOREVER: u32 = 0xFFF;

/// The single-dword skip sentinel (`op = NOP`, everything else zero).
pub const NOOP_WORD: u32 = 0;

const _: () = assert!(NOOP_WORD & 0xFF == OP_NOP);

fn header(op: u32, sub_op: u32) -> u32 {
    (op & 0xFF) | ((sub_op & 0xFF) << 8)
}

/// `WriteData`: store `data` dwords at `dst_addr`.
///
/// Layout: header; dst_lo; dst_hi; `{count:22, sw:2@24}` with
/// `count = n_dwords - 1`; data dwords.
pub fn write_data(dst_addr: u64, data: &[u32]) -> Result<Packet, PacketError> {
    const OP: &str = "write_data";
    if data.is_empty() {
        return Err(PacketError::EmptyPayload { op: OP });
    }
    check_aligned(OP, dst_addr, 4)?;
    check_fits(OP, "count", (data.len() - 1) as u64, COUNT_BITS)?;

    let (lo, hi) = split_addr(dst_addr);
    let mut words = Vec::with_capacity(4 + data.len());
    words.push(header(OP_WRITE, SUBOP_WRITE_LINEAR));
    words.push(lo);
    words.push(hi);
    words.push((data.len() as u32 - 1) & COUNT_MASK);
    words.extend_from_slice(data);
    Ok(Packet::new(Dialect::Dma, PacketKind::WriteData, words))
}

/// `CopyLinear`: copy `byte_count` bytes from `src_addr` to each
/// destination. One destination is a plain linear copy; two destinations
/// set the broadcast header bit. Addresses are byte-granular.
///
/// Layout: header (+broadcast@27); `count:22 = byte_count - 1`; parameter
/// dword (`dst_sw:2@16, dst_ha:1@22, src_sw:2@24, src_ha:1@30`, all zero
/// here); src_lo/hi; dst_lo/hi per destination.
pub fn copy_linear(src_addr: u64, dst_addrs: &[u64], byte_count: u64) -> Result<Packet, PacketError> {
    const OP: &str = "copy_linear";
    if byte_count == 0 {
        return Err(PacketError::ZeroLength { op: OP });
    }
    if dst_addrs.is_empty() || dst_addrs.len() > 2 {
        return Err(PacketError::BadDestinationCount {
            op: OP,
            count: dst_addrs.len(),
        });
    }
    check_fits(OP, "count", byte_count - 1, COUNT_BITS)?;

    let broadcast = dst_addrs.len() == 2;
    let mut hdr = header(OP_COPY, SUBOP_COPY_LINEAR);
    if broadcast {
        hdr |= HEADER_BROADCAST_BIT;
    }

    let (src_lo, src_hi) = split_addr(src_addr);
    let mut words = Vec::with_capacity(5 + 2 * dst_addrs.len());
    words.push(hdr);
    words.push((byte_count as u32 - 1) & COUNT_MASK);
    words.push(0); // parameter: swizzle / address-high selectors unused
    words.push(src_lo);
    words.push(src_hi);
    for &dst in dst_addrs {
        let (lo, hi) = split_addr(dst);
        words.push(lo);
        words.push(hi);
    }
    Ok(Packet::new(Dialect::Dma, PacketKind::CopyLinear, words))
}

/// `ConstantFill`: fill `byte_count` bytes at `dst_addr` with a dword
/// pattern. The engine fills in dword quanta (`fillsize = 2`), so both the
/// address and length must be dword-granular.
///
/// Layout: header `{sw:2@16, fillsize:2@30}`; dst_lo/hi; fill_data;
/// `count:22 = byte_count - 1`.
pub fn constant_fill(dst_addr: u64, pattern: u32, byte_count: u64) -> Result<Packet, PacketError> {
    const OP: &str = "constant_fill";
    const FILLSIZE_DWORD: u32 = 2 << 30;
    if byte_count == 0 {
        return Err(PacketError::ZeroLength { op: OP });
    }
    if byte_count % 4 != 0 {
        return Err(PacketError::UnalignedLength {
            op: OP,
            len: byte_count,
            granule: 4,
        });
    }
    check_aligned(OP, dst_addr, 4)?;
    check_fits(OP, "count", byte_count - 1, COUNT_BITS)?;

    let (lo, hi) = split_addr(dst_addr);
    let words = vec![
        header(OP_CONST_FILL, 0) | FILLSIZE_DWORD,
        lo,
        hi,
        pattern,
        (byte_count as u32 - 1) & COUNT_MASK,
    ];
    Ok(Packet::new(Dialect::Dma, PacketKind::ConstantFill, words))
}

/// `Fence`: the engine writes `data` to `addr` when it reaches this point
/// in the stream.
pub fn fence(addr: u64, data: u32) -> Result<Packet, PacketError> {
    const OP: &str = "fence";
    check_aligned(OP, addr, 4)?;
    let (lo, hi) = split_addr(addr);
    let words = vec![header(OP_FENCE, 0), lo, hi, data];
    Ok(Packet::new(Dialect::Dma, PacketKind::Fence, words))
}

/// `Trap`: the engine raises the interrupt identified by `int_context`
/// when it reaches this point in the stream.
pub fn trap(int_context: u32) -> Result<Packet, PacketError> {
    const OP: &str = "trap";
    check_fits(OP, "int_context", int_context as u64, INT_CONTEXT_BITS)?;
    let words = vec![header(OP_TRAP, 0), int_context];
    Ok(Packet::new(Dialect::Dma, PacketKind::Trap, words))
}

/// `NoOp`: a single dword the engine skips.
pub fn noop() -> Packet {
    Packet::new(Dialect::Dma, PacketKind::NoOp, vec![NOOP_WORD])
}

/// `Timestamp`: the engine writes its 64-bit global clock to `addr`.
pub fn timestamp(addr: u64) -> Result<Packet, PacketError> {
    const OP: &str = "timestamp";
    check_aligned(OP, addr, 8)?;
    let (lo, hi) = split_addr(addr);
    let words = vec![header(OP_TIMESTAMP, SUBOP_TIMESTAMP_GET_GLOBAL), lo, hi];
    Ok(Packet::new(Dialect::Dma, PacketKind::Timestamp, words))
}

/// `PollRegMem`: the engine stalls until `*addr & mask == reference`.
///
/// Layout: header `{func:3@28 = equal, mem_poll:1@31}`; addr_lo/hi;
/// reference; mask; `{interval:16, retry_count:12@16}`.
pub fn poll_regmem(addr: u64, reference: u32, mask: u32) -> Result<Packet, PacketError> {
    const OP: &str = "poll_regmem";
    check_aligned(OP, addr, 4)?;
    let (lo, hi) = split_addr(addr);
    let words = vec![
        header(OP_POLL_REGMEM, 0) | (POLL_FUNC_EQUAL << 28) | POLL_MEM_BIT,
        lo,
        hi,
        reference,
        mask,
        POLL_INTERVAL | (POLL_RETRY_FOREVER << 16),
    ];
    Ok(Packet::new(Dialect::Dma, PacketKind::PollRegMem, words))
}

/// Reports the kind and dword length of the packet at `words[0]`.
pub fn peek(words: &[u32]) -> Result<(PacketKind, usize), DecodeError> {
    let hdr = *words.first().ok_or(DecodeError::Empty)?;
    let op = hdr & 0xFF;
    let (kind, len) = match op {
        OP_NOP => (PacketKind::NoOp, 1),
        OP_WRITE => {
            if words.len() < 4 {
                return Err(DecodeError::Truncated {
                    needed: 4,
                    available: words.len(),
                });
            }
            let count = (words[3] & COUNT_MASK) as usize;
            (PacketKind::WriteData, 4 + count + 1)
        }
        OP_COPY => {
            let broadcast = hdr & HEADER_BROADCAST_BIT != 0;
            (PacketKind::CopyLinear, if broadcast { 9 } else { 7 })
        }
        OP_CONST_FILL => (PacketKind::ConstantFill, 5),
        OP_FENCE => (PacketKind::Fence, 4),
        OP_TRAP => (PacketKind::Trap, 2),
        OP_TIMESTAMP => (PacketKind::Timestamp, 3),
        OP_POLL_REGMEM => (PacketKind::PollRegMem, 6),
        opcode => return Err(DecodeError::UnknownOpcode { opcode, header: hdr }),
    };
    if words.len() < len {
        return Err(DecodeError::Truncated {
            needed: len,
            available: words.len(),
        });
    }
    Ok((kind, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_data_layout_is_bit_exact() {
        let p = write_data(0x0001_0000_2000, &[0xAABB_CCDD, 0x1122_3344]).unwrap();
        assert_eq!(
            p.words(),
            &[0x0000_0002, 0x0000_2000, 0x0000_0001, 1, 0xAABB_CCDD, 0x1122_3344]
        );
        assert_eq!(p.kind(), PacketKind::WriteData);
    }

    #[test]
    fn copy_linear_layout_single_and_broadcast() {
        let p = copy_linear(0x1000, &[0x2000], 64).unwrap();
        assert_eq!(p.words(), &[0x0000_0001, 63, 0, 0x1000, 0, 0x2000, 0]);

        let p = copy_linear(0x1000, &[0x2000, 0x3000], 64).unwrap();
        assert_eq!(
            p.words(),
            &[0x0000_0001 | (1 << 27), 63, 0, 0x1000, 0, 0x2000, 0, 0x3000, 0]
        );
    }

    #[test]
    fn constant_fill_layout() {
        let p = constant_fill(0x4000, 0xDEAD_BEEF, 256).unwrap();
        assert_eq!(
            p.words(),
            &[0x0000_000B | (2 << 30), 0x4000, 0, 0xDEAD_BEEF, 255]
        );
    }

    #[test]
    fn fence_trap_noop_layouts() {
        assert_eq!(fence(0x8000, 0x55AA).unwrap().words(), &[0x05, 0x8000, 0, 0x55AA]);
        assert_eq!(trap(0x1234).unwrap().words(), &[0x06, 0x1234]);
        assert_eq!(noop().words(), &[0]);
    }

    #[test]
    fn timestamp_and_poll_layouts() {
        assert_eq!(
            timestamp(0x9000).unwrap().words(),
            &[0x0D | (2 << 8), 0x9000, 0]
        );
        assert_eq!(
            poll_regmem(0x9000, 7, 0xFFFF_FFFF).unwrap().words(),
            &[
                0x08 | (3 << 28) | (1 << 31),
                0x9000,
                0,
                7,
                0xFFFF_FFFF,
                0x04 | (0xFFF << 16)
            ]
        );
    }

    #[test]
    fn rejects_malformed_args() {
        assert!(matches!(
            write_data(0x1001, &[1]),
            Err(PacketError::MisalignedAddress { .. })
        ));
        assert!(matches!(
            write_data(0x1000, &[]),
            Err(PacketError::EmptyPayload { .. })
        ));
        assert!(matches!(
            copy_linear(0, &[0x1000], 0),
            Err(PacketError::ZeroLength { .. })
        ));
        assert!(matches!(
            copy_linear(0, &[], 16),
            Err(PacketError::BadDestinationCount { count: 0, .. })
        ));
        assert!(matches!(
            copy_linear(0, &[1, 2, 3], 16),
            Err(PacketError::BadDestinationCount { count: 3, .. })
        ));
        assert!(matches!(
            copy_linear(0, &[0x1000], (1 << 22) + 1),
            Err(PacketError::FieldOverflow { .. })
        ));
        assert!(matches!(
            constant_fill(0x1000, 0, 6),
            Err(PacketError::UnalignedLength { .. })
        ));
        assert!(matches!(
            trap(1 << 28),
            Err(PacketError::FieldOverflow { .. })
        ));
    }

    #[test]
    fn peek_round_trips_every_kind() {
        let packets = [
            noop(),
            write_data(0x1000, &[1, 2, 3]).unwrap(),
            copy_linear(0x1000, &[0x2000], 32).unwrap(),
            copy_linear(0x1000, &[0x2000, 0x3000], 32).unwrap(),
            constant_fill(0x1000, 0xAA, 16).unwrap(),
            fence(0x1000, 1).unwrap(),
            trap(9).unwrap(),
            timestamp(0x1000).unwrap(),
            poll_regmem(0x1000, 0, 0).unwrap(),
        ];
        for p in &packets {
            let (kind, len) = peek(p.words()).unwrap();
            assert_eq!(kind, p.kind());
            assert_eq!(len, p.size_dwords());
        }
    }

    #[test]
    fn peek_reports_truncation_and_unknown_opcodes() {
        let p = write_data(0x1000, &[1, 2, 3]).unwrap();
        let short = &p.words()[..3];
        assert!(matches!(peek(short), Err(DecodeError::Truncated { .. })));
        assert!(matches!(peek(&[]), Err(DecodeError::Empty)));
        assert!(matches!(
            peek(&[0xFF]),
            Err(DecodeError::UnknownOpcode { opcode: 0xFF, .. })
        ));
    }
}

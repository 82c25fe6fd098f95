//! Compute engine dialect (PM4 type-3 packets).
//!
//! Cursors on this engine count dwords. Every packet starts with a type-3
//! header: `{type:2@30 = 3, count:14@16 = ndw - 2, opcode:8@8}`. A single
//! no-op dword uses the reserved count value `0x3FFF`.
//!
//! The compute dialect has no dedicated fence or trap opcodes; both map
//! onto `RELEASE_MEM`, with `int_sel` distinguishing a pure memory fence
//! from an interrupt request. Copy and fill both map onto `DMA_DATA`, with
//! `src_sel` distinguishing a memory source from an immediate pattern.

use crate::{
    check_aligned, check_fits, split_addr, DecodeError, Dialect, Packet, PacketError, PacketKind,
};

pub const IT_NOP: u32 = 0x10;
pub const IT_WRITE_DATA: u32 = 0x37;
pub const IT_INDIRECT_BUFFER: u32 = 0x3F;
pub const IT_RELEASE_MEM: u32 = 0x49;
pub const IT_DMA_DATA: u32 = 0x50;

const TYPE3: u32 = 3 << 30;
const COUNT_SHIFT: u32 = 16;
const COUNT_MASK: u32 = 0x3FFF;
/// Reserved count value marking a bare single-dword NOP header.
const NOP_SINGLE_COUNT: u32 = 0x3FFF;

/// WRITE_DATA control: destination select = memory, confirm the write.
const WRITE_DST_SEL_MEMORY: u32 = 5 << 8;
const WRITE_CONFIRM: u32 = 1 << 20;

/// RELEASE_MEM event control: end-of-pipe cache flush with timestamp.
const RELEASE_EVENT_EOP_TS: u32 = 0x14;
const RELEASE_EVENT_INDEX: u32 = 5 << 8;
/// RELEASE_MEM data control fields.
const RELEASE_INT_SEL_SHIFT: u32 = 24;
const RELEASE_INT_SEL_NONE: u32 = 0;
const RELEASE_INT_SEL_SEND: u32 = 2;
const RELEASE_DATA_SEL_U32: u32 = 1 << 29;

/// DMA_DATA source select values (bits 30:29 of the control dword).
const DMA_SRC_SEL_SHIFT: u32 = 29;
const DMA_SRC_SEL_MEMORY: u32 = 0;
const DMA_SRC_SEL_DATA: u32 = 2;
/// DMA_DATA byte-count field width in the command dword.
const DMA_COUNT_BITS: u32 = 21;

const INT_CONTEXT_BITS: u32 = 28;
const IB_SIZE_BITS: u32 = 20;
const VMID_BITS: u32 = 4;

/// The single-dword skip sentinel.
pub const NOOP_WORD: u32 = TYPE3 | (NOP_SINGLE_COUNT << COUNT_SHIFT) | (IT_NOP << 8);

const _: () = assert!(NOOP_WORD >> 30 == 3);
const _: () = assert!((NOOP_WORD >> 8) & 0xFF == IT_NOP);

fn header3(opcode: u32, ndw: usize) -> u32 {
    debug_assert!(ndw >= 2);
    TYPE3 | ((ndw as u32 - 2) & COUNT_MASK) << COUNT_SHIFT | (opcode & 0xFF) << 8
}

/// `WriteData`: store `data` dwords at `dst_addr`.
pub fn write_data(dst_addr: u64, data: &[u32]) -> Result<Packet, PacketError> {
    const OP: &str = "write_data";
    if data.is_empty() {
        return Err(PacketError::EmptyPayload { op: OP });
    }
    check_aligned(OP, dst_addr, 4)?;
    let ndw = 4 + data.len();
    check_fits(OP, "count", (ndw - 2) as u64, 14)?;

    let (lo, hi) = split_addr(dst_addr);
    let mut words = Vec::with_capacity(ndw);
    words.push(header3(IT_WRITE_DATA, ndw));
    words.push(WRITE_DST_SEL_MEMORY | WRITE_CONFIRM);
    words.push(lo);
    words.push(hi);
    words.extend_from_slice(data);
    Ok(Packet::new(Dialect::Compute, PacketKind::WriteData, words))
}

fn release_mem(
    kind: PacketKind,
    int_sel: u32,
    addr: u64,
    data: u32,
) -> Result<Packet, PacketError> {
    let (lo, hi) = split_addr(addr);
    let words = vec![
        header3(IT_RELEASE_MEM, 7),
        RELEASE_EVENT_EOP_TS | RELEASE_EVENT_INDEX,
        (int_sel << RELEASE_INT_SEL_SHIFT) | RELEASE_DATA_SEL_U32,
        lo,
        hi,
        data,
        0, // data_hi, unused for 32-bit payloads
    ];
    Ok(Packet::new(Dialect::Compute, kind, words))
}

/// `Fence`: end-of-pipe release that writes `data` to `addr`, no interrupt.
pub fn fence(addr: u64, data: u32) -> Result<Packet, PacketError> {
    check_aligned("fence", addr, 4)?;
    release_mem(PacketKind::Fence, RELEASE_INT_SEL_NONE, addr, data)
}

/// `Trap`: end-of-pipe release that raises an interrupt. The interrupt
/// context travels in the data-low dword; no memory write is requested
/// (`addr = 0`).
pub fn trap(int_context: u32) -> Result<Packet, PacketError> {
    check_fits("trap", "int_context", int_context as u64, INT_CONTEXT_BITS)?;
    release_mem(PacketKind::Trap, RELEASE_INT_SEL_SEND, 0, int_context)
}

fn dma_data(
    kind: PacketKind,
    src_sel: u32,
    src_lo: u32,
    src_hi: u32,
    dst_addr: u64,
    byte_count: u64,
) -> Result<Packet, PacketError> {
    const OP: &str = "dma_data";
    if byte_count == 0 {
        return Err(PacketError::ZeroLength { op: OP });
    }
    check_fits(OP, "byte_count", byte_count, DMA_COUNT_BITS)?;

    let (dst_lo, dst_hi) = split_addr(dst_addr);
    let words = vec![
        header3(IT_DMA_DATA, 7),
        src_sel << DMA_SRC_SEL_SHIFT,
        src_lo,
        src_hi,
        dst_lo,
        dst_hi,
        byte_count as u32,
    ];
    Ok(Packet::new(Dialect::Compute, kind, words))
}

/// `CopyLinear`: copy `byte_count` bytes from `src_addr` to `dst_addr`.
pub fn copy_linear(src_addr: u64, dst_addr: u64, byte_count: u64) -> Result<Packet, PacketError> {
    let (lo, hi) = split_addr(src_addr);
    dma_data(
        PacketKind::CopyLinear,
        DMA_SRC_SEL_MEMORY,
        lo,
        hi,
        dst_addr,
        byte_count,
    )
}

/// `ConstantFill`: fill `byte_count` bytes at `dst_addr` with a dword
/// pattern carried in the source-low dword.
pub fn constant_fill(dst_addr: u64, pattern: u32, byte_count: u64) -> Result<Packet, PacketError> {
    if byte_count % 4 != 0 {
        return Err(PacketError::UnalignedLength {
            op: "constant_fill",
            len: byte_count,
            granule: 4,
        });
    }
    check_aligned("constant_fill", dst_addr, 4)?;
    dma_data(
        PacketKind::ConstantFill,
        DMA_SRC_SEL_DATA,
        pattern,
        0,
        dst_addr,
        byte_count,
    )
}

/// `IndirectBuffer`: dispatch a secondary command buffer of `size_dwords`
/// dwords at `ib_base`, executed in address space `vmid`.
pub fn indirect_buffer(ib_base: u64, size_dwords: u32, vmid: u32) -> Result<Packet, PacketError> {
    const OP: &str = "indirect_buffer";
    if size_dwords == 0 {
        return Err(PacketError::ZeroLength { op: OP });
    }
    check_aligned(OP, ib_base, 4)?;
    check_fits(OP, "ib_size", size_dwords as u64, IB_SIZE_BITS)?;
    check_fits(OP, "vmid", vmid as u64, VMID_BITS)?;

    let (lo, hi) = split_addr(ib_base);
    let words = vec![
        header3(IT_INDIRECT_BUFFER, 4),
        lo,
        hi,
        size_dwords | (vmid << 24),
    ];
    Ok(Packet::new(
        Dialect::Compute,
        PacketKind::IndirectBuffer,
        words,
    ))
}

/// `NoOp`: a single dword the engine skips.
pub fn noop() -> Packet {
    Packet::new(Dialect::Compute, PacketKind::NoOp, vec![NOOP_WORD])
}

/// Reports the kind and dword length of the packet at `words[0]`.
pub fn peek(words: &[u32]) -> Result<(PacketKind, usize), DecodeError> {
    let hdr = *words.first().ok_or(DecodeError::Empty)?;
    if hdr >> 30 != 3 {
        return Err(DecodeError::BadPacketType { header: hdr });
    }
    let opcode = (hdr >> 8) & 0xFF;
    let count = (hdr >> COUNT_SHIFT) & COUNT_MASK;
    let len = if opcode == IT_NOP && count == NOP_SINGLE_COUNT {
        1
    } else {
        count as usize + 2
    };
    if words.len() < len {
        return Err(DecodeError::Truncated {
            needed: len,
            available: words.len(),
        });
    }
    let kind = match opcode {
        IT_NOP => PacketKind::NoOp,
        IT_WRITE_DATA => PacketKind::WriteData,
        IT_INDIRECT_BUFFER => PacketKind::IndirectBuffer,
        IT_RELEASE_MEM => {
            let int_sel = (words[2] >> RELEASE_INT_SEL_SHIFT) & 0x7;
            if int_sel != 0 {
                PacketKind::Trap
            } else {
                PacketKind::Fence
            }
        }
        IT_DMA_DATA => {
            let src_sel = (words[1] >> DMA_SRC_SEL_SHIFT) & 0x3;
            if src_sel == DMA_SRC_SEL_DATA {
                PacketKind::ConstantFill
            } else {
                PacketKind::CopyLinear
            }
        }
        opcode => return Err(DecodeError::UnknownOpcode { opcode, header: hdr }),
    };
    Ok((kind, len))
}

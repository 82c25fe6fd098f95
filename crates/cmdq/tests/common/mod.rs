//! A software engine that drains a ring the way hardware would: fetch at
//! the read cursor, decode the packet header, execute, advance, report
//! progress through the shared register block.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use cmdq::{EventSignaler, InterruptEvent, QueueRegs, ReadCursor, RingQueue, SharedView};
use cmdq_proto::{peek, Dialect, PacketKind};

pub struct SimEngine {
    dialect: Dialect,
    view: SharedView,
    regs: Arc<QueueRegs>,
    ring_units: u64,
    /// Flat dword-granular model of engine-visible memory.
    pub memory: HashMap<u64, u32>,
    signalers: HashMap<u32, EventSignaler>,
    /// Every executed packet, in fetch order (padding no-ops included).
    pub executed: Vec<PacketKind>,
}

impl SimEngine {
    pub fn new(queue: &RingQueue) -> SimEngine {
        SimEngine {
            dialect: queue.dialect(),
            view: queue.shared_view(),
            regs: Arc::clone(queue.regs()),
            ring_units: queue.ring_units(),
            memory: HashMap::new(),
            signalers: HashMap::new(),
            executed: Vec::new(),
        }
    }

    /// Wire an event up the way the interrupt path would: a trap whose
    /// context matches this event's id fires it.
    pub fn register_event(&mut self, event: &InterruptEvent) {
        self.signalers.insert(event.id(), event.signaler());
    }

    pub fn read_memory(&self, addr: u64) -> Option<u32> {
        self.memory.get(&addr).copied()
    }

    fn unit_bytes(&self) -> u64 {
        self.dialect.unit_bytes()
    }

    /// Executes everything published up to the current write cursor and
    /// reports progress. Returns how many packets were executed.
    pub fn drain(&mut self) -> usize {
        let write = self.regs.write_cursor();
        let mut read = self.regs.read_cursor().units();
        let mut executed = 0;
        while read < write.units() {
            let offset = read % self.ring_units;
            let dword_index = (offset * self.unit_bytes() / 4) as usize;
            // Packets are never split across the wrap, so the whole
            // packet lies in the contiguous span up to the lesser of the
            // write cursor and the ring end.
            let span_units = (write.units() - read).min(self.ring_units - offset);
            let span_dwords = (span_units * self.unit_bytes() / 4) as usize;
            let words = self.view.read_dwords(dword_index, span_dwords);
            let (kind, len_dwords) = peek(self.dialect, &words).expect("undecodable ring content");
            self.execute(kind, &words[..len_dwords]);
            self.executed.push(kind);
            executed += 1;
            read += self.dialect.dwords_to_units(len_dwords);
            self.regs.store_read_cursor(ReadCursor::new(read));
        }
        executed
    }

    fn execute(&mut self, kind: PacketKind, words: &[u32]) {
        match (self.dialect, kind) {
            (_, PacketKind::NoOp) => {}
            (Dialect::Dma, PacketKind::WriteData) => {
                let dst = addr64(words[1], words[2]);
                let count = (words[3] & 0x3F_FFFF) as usize + 1;
                self.store_dwords(dst, &words[4..4 + count]);
            }
            (Dialect::Dma, PacketKind::Fence) => {
                self.memory.insert(addr64(words[1], words[2]), words[3]);
            }
            (Dialect::Dma, PacketKind::Trap) => self.fire(words[1] & 0x0FFF_FFFF),
            (Dialect::Compute, PacketKind::WriteData) => {
                let dst = addr64(words[2], words[3]);
                self.store_dwords(dst, &words[4..]);
            }
            (Dialect::Compute, PacketKind::Fence) => {
                self.memory.insert(addr64(words[3], words[4]), words[5]);
            }
            (Dialect::Compute, PacketKind::Trap) => self.fire(words[5]),
            // Copy/fill/timestamp/poll/indirect semantics are not needed
            // by these tests; fetching and advancing past them is enough.
            _ => {}
        }
    }

    fn store_dwords(&mut self, dst: u64, data: &[u32]) {
        for (i, &w) in data.iter().enumerate() {
            self.memory.insert(dst + i as u64 * 4, w);
        }
    }

    fn fire(&mut self, context: u32) {
        if let Some(signaler) = self.signalers.get(&context) {
            signaler.signal();
        }
    }
}

fn addr64(lo: u32, hi: u32) -> u64 {
    (hi as u64) << 32 | lo as u64
}

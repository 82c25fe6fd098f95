//! The command buffer: a fixed-size, page-aligned, zero-initialized block
//! shared between the host producer and the engine.
//!
//! The host writes packets through [`CommandBuffer`]; the consumer side
//! (real hardware, or the simulated engine in tests) reads through a
//! [`SharedView`]. Consumer reads are volatile because the region is
//! written behind the compiler's back from its point of view; ordering is
//! supplied by the cursor atomics in `regs`, not by the accesses here.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

use thiserror::Error;

/// Rings live in page-granular mappings.
pub const PAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("ring size {size:#x} must be a nonzero multiple of {PAGE_SIZE:#x} bytes")]
    BadSize { size: usize },
    #[error("failed to allocate {size:#x} bytes of ring memory")]
    OutOfMemory { size: usize },
}

/// The owned allocation. Shared between the buffer and any outstanding
/// views so the memory outlives whichever side drops last.
#[derive(PartialEq)]
struct RawRing {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The raw pointer is only a region handle; access discipline lives in
// CommandBuffer (single writer) and SharedView (volatile reads).
unsafe impl Send for RawRing {}
unsafe impl Sync for RawRing {}

impl Drop for RawRing {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Fixed-size, 4 KiB-aligned, zeroed command ring memory.
///
/// Only the owning queue writes to it. Dropping the buffer frees the
/// memory; the engine must be drained first, drop is not a cancellation
/// primitive.
#[derive(PartialEq)]
pub struct CommandBuffer {
    ring: Arc<RawRing>,
    len: usize,
}

impl CommandBuffer {
    /// Allocates `size` bytes, page-aligned and zero-initialized.
    pub fn allocate(size: usize) -> Result<CommandBuffer, AllocationError> {
        if size == 0 || size % PAGE_SIZE != 0 {
            return Err(AllocationError::BadSize { size });
        }
        // size is a nonzero PAGE_SIZE multiple, so the layout is valid.
        let layout = Layout::from_size_align(size, PAGE_SIZE)
            .map_err(|_| AllocationError::BadSize { size })?;
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })
            .ok_or(AllocationError::OutOfMemory { size })?;
        Ok(CommandBuffer {
            ring: Arc::new(RawRing { ptr, layout }),
            len: size,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ring.ptr.as_ptr(), self.len) }
    }

    /// The ring as dwords. Page alignment makes the cast sound.
    pub fn as_dwords(&self) -> &[u32] {
        unsafe { std::slice::from_raw_parts(self.ring.ptr.as_ptr().cast::<u32>(), self.len / 4) }
    }

    /// Writes `words` at `byte_offset`. Offset must be dword-aligned and
    /// the write must fit; the queue guarantees both.
    pub(crate) fn write_dwords(&mut self, byte_offset: usize, words: &[u32]) {
        debug_assert_eq!(byte_offset % 4, 0);
        debug_assert!(byte_offset + words.len() * 4 <= self.len);
        let base = unsafe { self.ring.ptr.as_ptr().add(byte_offset) }.cast::<u32>();
        for (i, &w) in words.iter().enumerate() {
            // Volatile: the engine reads this region concurrently once the
            // write cursor is published.
            unsafe { base.add(i).write_volatile(w.to_le()) };
        }
    }

    /// A read-only handle for the consumer side. Keeps the allocation
    /// alive independently of the buffer.
    pub fn shared_view(&self) -> SharedView {
        SharedView {
            ring: Arc::clone(&self.ring),
            len: self.len,
        }
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("len", &self.len)
            .finish()
    }
}

/// Consumer-side read handle over the ring memory.
#[derive(Clone)]
pub struct SharedView {
    ring: Arc<RawRing>,
    len: usize,
}

impl SharedView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Volatile read of the dword at dword index `index`.
    pub fn read_dword(&self, index: usize) -> u32 {
        assert!(index * 4 + 4 <= self.len, "dword index {index} out of ring");
        let base = self.ring.ptr.as_ptr().cast::<u32>();
        u32::from_le(unsafe { base.add(index).read_volatile() })
    }

    /// Copies `count` dwords starting at dword index `index`.
    pub fn read_dwords(&self, index: usize, count: usize) -> Vec<u32> {
        (index..index + count).map(|i| self.read_dword(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_page_aligned_and_zeroed() {
        let buf = CommandBuffer::allocate(PAGE_SIZE).unwrap();
        assert_eq!(buf.len(), PAGE_SIZE);
        assert_eq!(buf.as_bytes().as_ptr() as usize % PAGE_SIZE, 0);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_non_page_sizes() {
        assert_eq!(
            CommandBuffer::allocate(0),
            Err(AllocationError::BadSize { size: 0 })
        );
        assert_eq!(
            CommandBuffer::allocate(100),
            Err(AllocationError::BadSize { size: 100 })
        );
    }

    #[test]
    fn shared_view_sees_owner_writes() {
        let mut buf = CommandBuffer::allocate(PAGE_SIZE).unwrap();
        let view = buf.shared_view();
        buf.write_dwords(8, &[0xDEAD_BEEF, 0x0102_0304]);
        assert_eq!(buf.as_dwords()[2], 0xDEAD_BEEF);
        assert_eq!(view.read_dword(2), 0xDEAD_BEEF);
        assert_eq!(view.read_dwords(2, 2), vec![0xDEAD_BEEF, 0x0102_0304]);
        assert_eq!(view.read_dword(0), 0);
    }

    #[test]
    fn view_outlives_buffer() {
        let view = {
            let mut buf = CommandBuffer::allocate(PAGE_SIZE).unwrap();
            buf.write_dwords(0, &[7]);
            buf.shared_view()
        };
        assert_eq!(view.read_dword(0), 7);
    }
}

//! Page-aligned IO buffers
//!
//! O_DIRECT requires the user buffer, the file offset and the transfer length
//! to be multiples of the device alignment. Every IO slot owns exactly one
//! `AlignedBuffer` of `block_size` bytes and reuses it for its whole lifetime.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};

/// Alignment unit required by direct IO on all supported backends
pub const ALIGN_SIZE: usize = 4096;

/// Heap block whose start address is a multiple of `alignment`
///
/// The memory is zeroed on allocation and freed on drop.
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to `alignment`
    ///
    /// # Panics
    /// Panics if alignment is not a power of 2 or size is zero
    pub fn new(size: usize, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "Alignment must be a power of 2");
        assert!(size > 0, "Buffer size must be greater than 0");

        let layout = match Layout::from_size_align(size, alignment) {
            Ok(layout) => layout,
            Err(_) => panic!("Invalid layout parameters: size={}, alignment={}", size, alignment),
        };

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            handle_alloc_error(layout);
        }

        AlignedBuffer { ptr, size, layout }
    }

    /// Allocate a block-sized buffer aligned to [`ALIGN_SIZE`]
    pub fn block(size: usize) -> Self {
        Self::new(size, ALIGN_SIZE)
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for `size` initialized bytes until drop
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for `size` bytes and uniquely borrowed through &mut self
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// Verify that the buffer start honours its alignment
    #[inline(always)]
    pub fn is_aligned(&self) -> bool {
        (self.ptr as usize) % self.layout.align() == 0
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_buffer_is_page_aligned() {
        let buffer = AlignedBuffer::block(4 * ALIGN_SIZE);
        assert_eq!(buffer.len(), 16384);
        assert_eq!(buffer.alignment(), ALIGN_SIZE);
        assert!(buffer.is_aligned());
        assert_eq!(buffer.as_slice().as_ptr() as usize % ALIGN_SIZE, 0);
    }

    #[test]
    fn test_buffer_starts_zeroed() {
        let buffer = AlignedBuffer::new(8192, 512);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_is_writable() {
        let mut buffer = AlignedBuffer::block(ALIGN_SIZE);
        buffer.as_mut_slice()[100] = 0xAB;
        assert_eq!(buffer.as_slice()[100], 0xAB);
    }

    #[test]
    #[should_panic(expected = "Alignment must be a power of 2")]
    fn test_invalid_alignment() {
        let _ = AlignedBuffer::new(4096, 513);
    }

    #[test]
    #[should_panic(expected = "Buffer size must be greater than 0")]
    fn test_zero_size() {
        let _ = AlignedBuffer::new(0, 4096);
    }
}

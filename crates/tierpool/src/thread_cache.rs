//! Thread cache: the per-thread front tier.
//!
//! One free list per size class, touched by exactly one thread, so the
//! hit path is a plain pointer pop with no atomics. Misses refill in
//! batches from the central cache; frees push locally and spill the
//! suffix half of a list back to the central cache once it outgrows the
//! high-water mark. Requests above [`MAX_BYTES`] bypass the pool entirely
//! and go to the host allocator.
//!
//! The tier takes its collaborators as parameters instead of reaching for
//! globals, so tests can compose fresh cache stacks. The public API wires
//! up the process-wide singletons (see `api`).

use crate::central_cache::CentralCache;
use crate::free_list::{FreeBlock, FreeList};
use crate::page_cache::PageCache;
use crate::size_class::{batch_count, class_index, class_size, CLASS_COUNT};
use crate::util::{ALIGNMENT, MAX_BYTES};
use core::ptr;

/// A class list longer than this returns its suffix half to the central
/// cache on the next free.
pub const LIST_HIGH_WATER: usize = 64;

/// Per-thread free lists, one per size class.
pub struct ThreadCache {
    lists: Box<[FreeList]>,
}

impl ThreadCache {
    /// The list array is half a megabyte per thread, so it lives on the
    /// host heap rather than inline in TLS.
    pub fn new() -> Self {
        Self {
            lists: (0..CLASS_COUNT).map(|_| FreeList::new()).collect(),
        }
    }

    /// Allocate `size` bytes. Returns null only when the OS is out of
    /// memory. Zero-size requests are bumped to one alignment unit.
    pub fn allocate(&mut self, size: usize, central: &CentralCache, pages: &PageCache) -> *mut u8 {
        let size = if size == 0 { ALIGNMENT } else { size };
        if size > MAX_BYTES {
            return unsafe { libc::malloc(size) as *mut u8 };
        }

        let index = class_index(size);
        let block = unsafe { self.lists[index].pop() };
        if !block.is_null() {
            return block as *mut u8;
        }
        self.refill(index, central, pages)
    }

    /// Free a block previously returned by `allocate` with the same
    /// `size`. Null is a no-op.
    pub fn deallocate(&mut self, ptr: *mut u8, size: usize, central: &CentralCache) {
        if ptr.is_null() {
            return;
        }
        let size = if size == 0 { ALIGNMENT } else { size };
        if size > MAX_BYTES {
            unsafe { libc::free(ptr as *mut libc::c_void) };
            return;
        }

        let index = class_index(size);
        unsafe { self.lists[index].push(ptr as *mut FreeBlock) };
        if self.lists[index].len() > LIST_HIGH_WATER {
            self.trim(index, central);
        }
    }

    /// Miss path: pull a batch from the central cache, keep everything but
    /// the first block, and hand that one out.
    #[cold]
    fn refill(&mut self, index: usize, central: &CentralCache, pages: &PageCache) -> *mut u8 {
        let batch = batch_count(class_size(index));
        let (head, got) = central.fetch_range(index, batch, pages);
        if head.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            if got > 1 {
                self.lists[index].install((*head).next, got - 1);
            }
            head as *mut u8
        }
    }

    /// Overflow path: keep the newer half of the list (it is the hotter
    /// half, having just been pushed) and return the rest.
    fn trim(&mut self, index: usize, central: &CentralCache) {
        let len = self.lists[index].len();
        if len <= 1 {
            return;
        }
        let retain = (len / 2).max(1);
        let (suffix, returned) = unsafe { self.lists[index].split_after(retain) };
        if !suffix.is_null() {
            central.return_range(suffix, returned, index);
        }
    }

    /// Hand every cached block back to the central cache. Called when the
    /// owning thread exits so nothing is stranded in dead TLS.
    pub fn flush(&mut self, central: &CentralCache) {
        for index in 0..CLASS_COUNT {
            if self.lists[index].is_empty() {
                continue;
            }
            let (head, count) = self.lists[index].take_all();
            central.return_range(head, count, index);
        }
    }

    /// Current length of the free list for `index`.
    pub fn list_len(&self, index: usize) -> usize {
        self.lists[index].len()
    }
}

//! Central cache: process-wide free lists, one per size class.
//!
//! Each class pairs a spinlock with a list head. Distinct classes never
//! contend; within a class the critical section is a short pointer walk,
//! which is why the lock spins instead of sleeping. When a class runs dry
//! it carves a fresh span from the page cache into blocks in address
//! order, hands the requested batch to the caller, and keeps the rest.

use crate::free_list::FreeBlock;
use crate::page_cache::PageCache;
use crate::size_class::{class_size, CLASS_COUNT};
use crate::sync::SpinLock;
use crate::util::{PAGE_SIZE, SPAN_PAGES};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// One size class: its lock and list head. The head is only written under
/// the lock; loads there can be relaxed because the lock acquisition
/// already orders them, while stores use release so a later acquirer of
/// the same lock sees a fully linked chain.
struct ClassList {
    lock: SpinLock,
    head: AtomicPtr<FreeBlock>,
}

impl ClassList {
    const fn new() -> Self {
        Self {
            lock: SpinLock::new(),
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Process-wide middle tier. All state is zero-initialized, so a static
/// instance costs nothing until first use.
pub struct CentralCache {
    classes: [ClassList; CLASS_COUNT],
}

impl CentralCache {
    pub const fn new() -> Self {
        const EMPTY: ClassList = ClassList::new();
        Self {
            classes: [EMPTY; CLASS_COUNT],
        }
    }

    /// Fetch up to `batch` blocks of class `index` as a null-terminated
    /// chain. Returns the chain head and the actual count, which may be
    /// smaller than `batch`; `(null, 0)` means the page cache could not
    /// provide memory.
    pub fn fetch_range(
        &self,
        index: usize,
        batch: usize,
        pages: &PageCache,
    ) -> (*mut FreeBlock, usize) {
        if index >= CLASS_COUNT || batch == 0 {
            return (ptr::null_mut(), 0);
        }

        let class = &self.classes[index];
        let _guard = class.lock.lock();

        let head = class.head.load(Ordering::Relaxed);
        if head.is_null() {
            return unsafe { Self::refill(class, index, batch, pages) };
        }

        // Walk at most `batch` blocks and sever the chain there.
        unsafe {
            let mut tail = head;
            let mut count = 1;
            while count < batch && !(*tail).next.is_null() {
                tail = (*tail).next;
                count += 1;
            }
            let rest = (*tail).next;
            (*tail).next = ptr::null_mut();
            class.head.store(rest, Ordering::Release);
            (head, count)
        }
    }

    /// Splice a chain of `count` blocks back onto class `index`. The walk
    /// to the chain's tail stops early at a null next-pointer, so a
    /// mis-counted chain cannot run off the end.
    pub fn return_range(&self, head: *mut FreeBlock, count: usize, index: usize) {
        if head.is_null() || index >= CLASS_COUNT {
            return;
        }

        let class = &self.classes[index];
        let _guard = class.lock.lock();

        unsafe {
            let mut tail = head;
            let mut walked = 1;
            while walked < count && !(*tail).next.is_null() {
                tail = (*tail).next;
                walked += 1;
            }
            (*tail).next = class.head.load(Ordering::Relaxed);
            class.head.store(head, Ordering::Release);
        }
    }

    /// Slow path: carve a fresh span into blocks. Called with the class
    /// lock held.
    ///
    /// # Safety
    /// The caller must hold `class`'s lock, and `class` must be the entry
    /// for `index`.
    unsafe fn refill(
        class: &ClassList,
        index: usize,
        batch: usize,
        pages: &PageCache,
    ) -> (*mut FreeBlock, usize) {
        let size = class_size(index);
        // Default spans hold many blocks; classes too big for the default
        // span get exactly enough pages for one block.
        let span_pages = if size <= SPAN_PAGES * PAGE_SIZE {
            SPAN_PAGES
        } else {
            size.div_ceil(PAGE_SIZE)
        };

        let start = pages.allocate_span(span_pages);
        if start.is_null() {
            return (ptr::null_mut(), 0);
        }

        let total = (span_pages * PAGE_SIZE) / size;
        let take = batch.min(total);
        debug_assert!(take >= 1);

        // Thread next-pointers through the span in address order: first the
        // chain handed to the caller, then the remainder kept here. Every
        // block from 0 to total - 1 gets its link written.
        let block_at = |i: usize| unsafe { start.add(i * size) as *mut FreeBlock };
        for i in 0..take {
            (*block_at(i)).next = if i + 1 < take {
                block_at(i + 1)
            } else {
                ptr::null_mut()
            };
        }
        if total > take {
            for i in take..total {
                (*block_at(i)).next = if i + 1 < total {
                    block_at(i + 1)
                } else {
                    ptr::null_mut()
                };
            }
            class.head.store(block_at(take), Ordering::Release);
        }

        (start as *mut FreeBlock, take)
    }

    /// Length of a class's current chain. Test support only; takes the
    /// class lock.
    #[cfg(test)]
    pub(crate) fn chain_len(&self, index: usize) -> usize {
        let class = &self.classes[index];
        let _guard = class.lock.lock();
        let mut node = class.head.load(Ordering::Relaxed);
        let mut count = 0;
        while !node.is_null() {
            count += 1;
            node = unsafe { (*node).next };
        }
        count
    }
}

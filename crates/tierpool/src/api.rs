//! Public surface: `allocate` / `deallocate` over process-wide tiers.
//!
//! The central and page caches are zero-initialized statics. Each thread
//! lazily builds its own [`ThreadCache`] in TLS; when the thread exits,
//! the holder's `Drop` flushes every cached block back to the central
//! cache so nothing is stranded. If TLS is unreachable (thread teardown,
//! re-entrancy), requests fall through to the central cache directly with
//! a batch of one.

use crate::central_cache::CentralCache;
use crate::config;
use crate::free_list::FreeBlock;
use crate::page_cache::PageCache;
use crate::size_class::class_index;
use crate::thread_cache::ThreadCache;
use crate::util::{ALIGNMENT, MAX_BYTES};
use core::ptr;
use std::cell::RefCell;

static PAGE_CACHE: PageCache = PageCache::new();
static CENTRAL_CACHE: CentralCache = CentralCache::new();

/// TLS holder whose drop drains the thread's lists into the central
/// cache. The singletons are `'static` and only blocks flow between
/// tiers, so destruction order against other TLS is irrelevant.
struct CacheHolder(RefCell<ThreadCache>);

impl Drop for CacheHolder {
    fn drop(&mut self) {
        self.0.get_mut().flush(&CENTRAL_CACHE);
    }
}

thread_local! {
    static THREAD_CACHE: CacheHolder = CacheHolder(RefCell::new(ThreadCache::new()));
}

/// Run `f` against this thread's cache. Returns None if TLS is gone or
/// the cache is already borrowed (re-entrant call).
#[inline]
fn with_thread_cache<R>(f: impl FnOnce(&mut ThreadCache) -> R) -> Option<R> {
    THREAD_CACHE
        .try_with(|holder| holder.0.try_borrow_mut().ok().map(|mut cache| f(&mut cache)))
        .ok()
        .flatten()
}

/// Allocate `size` bytes, at least 8-byte aligned. Returns null only on
/// out-of-memory. Requests above [`MAX_BYTES`] are served by the host
/// allocator; zero-size requests are bumped to one alignment unit.
pub fn allocate(size: usize) -> *mut u8 {
    if config::pool_disabled() {
        let size = if size == 0 { ALIGNMENT } else { size };
        return unsafe { libc::malloc(size) as *mut u8 };
    }

    match with_thread_cache(|tc| tc.allocate(size, &CENTRAL_CACHE, &PAGE_CACHE)) {
        Some(ptr) => ptr,
        None => allocate_direct(size),
    }
}

/// Free a pointer returned by [`allocate`]. `size` must equal the size
/// originally requested; the pool keeps no per-allocation metadata and
/// re-derives the size class from it. Null is a no-op.
pub fn deallocate(ptr: *mut u8, size: usize) {
    if ptr.is_null() {
        return;
    }
    if config::pool_disabled() {
        unsafe { libc::free(ptr as *mut libc::c_void) };
        return;
    }

    if with_thread_cache(|tc| tc.deallocate(ptr, size, &CENTRAL_CACHE)).is_none() {
        deallocate_direct(ptr, size);
    }
}

/// Fallback when the thread cache is unavailable: one block straight from
/// the central cache.
#[cold]
fn allocate_direct(size: usize) -> *mut u8 {
    let size = if size == 0 { ALIGNMENT } else { size };
    if size > MAX_BYTES {
        return unsafe { libc::malloc(size) as *mut u8 };
    }
    let (head, count) = CENTRAL_CACHE.fetch_range(class_index(size), 1, &PAGE_CACHE);
    if count == 0 {
        ptr::null_mut()
    } else {
        head as *mut u8
    }
}

/// Fallback when the thread cache is unavailable: hand the block straight
/// back to the central cache.
#[cold]
fn deallocate_direct(ptr: *mut u8, size: usize) {
    let size = if size == 0 { ALIGNMENT } else { size };
    if size > MAX_BYTES {
        unsafe { libc::free(ptr as *mut libc::c_void) };
        return;
    }
    let block = ptr as *mut FreeBlock;
    unsafe { (*block).next = ptr::null_mut() };
    CENTRAL_CACHE.return_range(block, 1, class_index(size));
}

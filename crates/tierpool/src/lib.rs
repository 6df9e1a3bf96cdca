//! tierpool: a three-tier concurrent memory pool for small-to-medium objects.
//!
//! The design follows the tcmalloc family:
//! - Per-thread caches (fast path, no synchronization at all)
//! - A process-wide central cache (one spinlock per size class)
//! - A page cache managing multi-page spans (one mutex)
//!
//! Requests above [`MAX_BYTES`] delegate to the host allocator; everything
//! else is served from intrusive free lists threaded through the blocks
//! themselves.
//!
//! # Usage
//!
//! ```ignore
//! let p = tierpool::allocate(24);
//! // ... use up to 24 bytes at p ...
//! tierpool::deallocate(p, 24);
//! ```
//!
//! The `size` passed to [`deallocate`] must equal the size originally
//! requested; the pool keeps no per-allocation metadata.

pub mod api;
pub mod central_cache;
pub mod config;
pub mod free_list;
pub mod page_cache;
pub mod platform;
pub mod size_class;
pub mod sync;
pub mod thread_cache;
pub mod util;

pub use api::{allocate, deallocate};
pub use thread_cache::LIST_HIGH_WATER;
pub use util::{ALIGNMENT, MAX_BYTES, PAGE_SIZE, SPAN_PAGES};
